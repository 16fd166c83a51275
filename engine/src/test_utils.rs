use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use publisher_common::test_utils::{SimpleRegistry, attr, child_type, type_id, versioned_type};
use publisher_common::{AttributeType, OwnedRelation, RecordTypeId, RelationType};

use crate::domain::{
    ChildRecord, Clock, LifecycleEvent, LifecycleObserver, LifecycleSignal, NewChild, NewRecord,
    RecordId, RecordRef, RecordStore, StoreError, StoredRecord, Translation,
};

/// Clock that only moves when told to. Clones share the same time.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    pub fn advance(&self, delta: TimeDelta) {
        let mut now = self.now.lock().unwrap();
        *now += delta;
    }

    pub fn advance_seconds(&self, seconds: i64) {
        self.advance(TimeDelta::seconds(seconds));
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

/// Observer keeping every event it was notified of.
#[derive(Debug, Clone, Default)]
pub struct RecordingObserver {
    events: Arc<Mutex<Vec<LifecycleEvent>>>,
}

impl RecordingObserver {
    pub fn events(&self) -> Vec<LifecycleEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn signals(&self) -> Vec<LifecycleSignal> {
        self.events().into_iter().map(|event| event.signal).collect()
    }

    pub fn clear(&self) {
        self.events.lock().unwrap().clear();
    }
}

impl LifecycleObserver for RecordingObserver {
    fn notify(&self, event: &LifecycleEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

/// Store wrapper whose deletes fail on demand, e.g. like statements
/// issued in an aborted database transaction.
#[derive(Debug, Clone)]
pub struct FaultyStore<S> {
    inner: S,
    failing_deletes: Arc<AtomicBool>,
}

impl<S: RecordStore> FaultyStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            failing_deletes: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn fail_deletes(&self, failing: bool) {
        self.failing_deletes.store(failing, Ordering::SeqCst);
    }

    fn check_delete(&self) -> Result<(), StoreError> {
        if self.failing_deletes.load(Ordering::SeqCst) {
            return Err(StoreError::DatabaseError("delete rejected".into()));
        }
        Ok(())
    }
}

impl<S: RecordStore> RecordStore for FaultyStore<S> {
    async fn insert_record(&self, record: NewRecord) -> Result<StoredRecord, StoreError> {
        self.inner.insert_record(record).await
    }

    async fn find_record(
        &self,
        record_type: &RecordTypeId,
        id: RecordId,
    ) -> Result<Option<StoredRecord>, StoreError> {
        self.inner.find_record(record_type, id).await
    }

    async fn find_by_link(
        &self,
        record_type: &RecordTypeId,
        linked_id: RecordId,
    ) -> Result<Option<StoredRecord>, StoreError> {
        self.inner.find_by_link(record_type, linked_id).await
    }

    async fn list_records(
        &self,
        record_type: &RecordTypeId,
        is_draft: bool,
    ) -> Result<Vec<StoredRecord>, StoreError> {
        self.inner.list_records(record_type, is_draft).await
    }

    async fn update_record(
        &self,
        record: &StoredRecord,
        expected_link: Option<RecordId>,
    ) -> Result<(), StoreError> {
        self.inner.update_record(record, expected_link).await
    }

    async fn delete_record(&self, record_type: &RecordTypeId, id: RecordId) -> Result<(), StoreError> {
        self.check_delete()?;
        self.inner.delete_record(record_type, id).await
    }

    async fn related(
        &self,
        owner: &RecordRef,
        relation: &OwnedRelation,
    ) -> Result<Vec<ChildRecord>, StoreError> {
        self.inner.related(owner, relation).await
    }

    async fn find_child(&self, child: &RecordRef) -> Result<Option<ChildRecord>, StoreError> {
        self.inner.find_child(child).await
    }

    async fn owner_of(&self, child: &RecordRef) -> Result<Option<RecordRef>, StoreError> {
        self.inner.owner_of(child).await
    }

    async fn insert_child(
        &self,
        owner: &RecordRef,
        relation: &OwnedRelation,
        child: NewChild,
    ) -> Result<ChildRecord, StoreError> {
        self.inner.insert_child(owner, relation, child).await
    }

    async fn update_child(&self, child: &ChildRecord) -> Result<(), StoreError> {
        self.inner.update_child(child).await
    }

    async fn delete_child(
        &self,
        owner: &RecordRef,
        relation: &OwnedRelation,
        child: &RecordRef,
    ) -> Result<(), StoreError> {
        self.check_delete()?;
        self.inner.delete_child(owner, relation, child).await
    }

    async fn translations(&self, master: &RecordRef) -> Result<Vec<Translation>, StoreError> {
        self.inner.translations(master).await
    }

    async fn save_translation(
        &self,
        record_type: &RecordTypeId,
        translation: &Translation,
    ) -> Result<(), StoreError> {
        self.inner.save_translation(record_type, translation).await
    }
}

/// A small schema: localized `page`s own `block`s and `tag`s, blocks own `item`s.
pub fn sample_registry() -> &'static SimpleRegistry {
    let page = versioned_type("page", &["en", "ro"])
        .with_field(attr("slug"), AttributeType::Text, true, false)
        .with_field(attr("title"), AttributeType::Text, false, true)
        .with_relation(attr("tags"), RelationType::ManyToMany, type_id("tag"))
        .with_relation(attr("blocks"), RelationType::HasMany, type_id("block"));
    let note = versioned_type("note", &[]).with_field(attr("body"), AttributeType::Text, false, false);
    let block = child_type("block")
        .with_field(attr("body"), AttributeType::Text, false, false)
        .with_relation(attr("items"), RelationType::HasMany, type_id("item"));
    let item = child_type("item").with_field(attr("label"), AttributeType::Text, false, false);
    let tag = child_type("tag").with_field(attr("name"), AttributeType::Text, true, false);

    SimpleRegistry::leak(vec![page, note, block, item, tag])
}
