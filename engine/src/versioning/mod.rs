use publisher_common::{AttributeId, LocalizationId, OwnedRelation, RecordType, RecordTypeId, RecordTypes};
use serde::Serialize;

use crate::domain::{
    ChildRecord, Clock, Content, Draft, LifecycleEvent, LifecycleObserver, LifecycleSignal,
    NewChild, NewRecord, NoopObserver, Published, RecordId, RecordRef, RecordStore, StoreError,
    StoredRecord, SystemClock, Translation, VersionedRecord, VersioningError, VersioningResult,
};

mod dirty;
mod graph;
mod lifecycle;

pub use dirty::CHILD_EDIT_THRESHOLD_SECONDS;

use dirty::DirtyEvaluator;
use graph::GraphCloner;

/// Where a draft stands relative to its published snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum PublicationStatus {
    /// never published, or unpublished since
    Unpublished,
    /// linked and up to date
    Published,
    /// linked, with changes not yet published
    Dirty,
}

/// Which side of a versioned pair a reader wants to see.
/// Editors preview drafts, everyone else sees the published snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum View {
    Draft,
    #[default]
    Published,
}

/// The draft/publish state machine.
///
/// Owns a record store and reports lifecycle transitions to an observer.
/// Every operation is a sequence of store calls; run it inside a store
/// transaction to make it all-or-nothing.
pub struct Publisher<S, O = NoopObserver, C = SystemClock> {
    store: S,
    registry: &'static dyn RecordTypes,
    observer: O,
    clock: C,
}

impl<S: RecordStore> Publisher<S> {
    pub fn new(store: S, registry: &'static dyn RecordTypes) -> Self {
        Self {
            store,
            registry,
            observer: NoopObserver,
            clock: SystemClock,
        }
    }
}

impl<S, O, C> Publisher<S, O, C> {
    pub fn with_observer<P: LifecycleObserver>(self, observer: P) -> Publisher<S, P, C> {
        Publisher {
            store: self.store,
            registry: self.registry,
            observer,
            clock: self.clock,
        }
    }

    pub fn with_clock<D: Clock>(self, clock: D) -> Publisher<S, O, D> {
        Publisher {
            store: self.store,
            registry: self.registry,
            observer: self.observer,
            clock,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Give the store back, e.g. to commit its transaction.
    pub fn into_store(self) -> S {
        self.store
    }

    pub fn registry(&self) -> &'static dyn RecordTypes {
        self.registry
    }
}

impl<S, O, C> Publisher<S, O, C>
where
    S: RecordStore,
    O: LifecycleObserver,
    C: Clock,
{
    /// Create a new, never published draft.
    pub async fn create_draft(
        &self,
        record_type: &RecordTypeId,
        content: Content,
    ) -> VersioningResult<Draft> {
        let record_type = self.versioned_type(record_type)?;
        validate(record_type, &content, false)?;

        let now = self.clock.now();
        let stored = self
            .store
            .insert_record(NewRecord::draft(record_type.id.clone(), content, now))
            .await?;
        let draft = VersionedRecord::try_from(stored)?.into_draft("create")?;

        tracing::info!(record_type = %draft.record_type, id = %draft.id, "draft created");
        Ok(draft)
    }

    /// Persist edits of a draft and stamp its modification time.
    pub async fn save(&self, draft: &mut Draft) -> VersioningResult<()> {
        let record_type = self.versioned_type(&draft.record_type)?;
        validate(record_type, &draft.content, false)?;

        let mut stored = draft.to_stored();
        stored.modified_at = self.clock.now();
        self.update(&stored, draft.linked_id).await?;

        draft.modified_at = stored.modified_at;
        Ok(())
    }

    pub async fn load(&self, record_type: &RecordTypeId, id: RecordId) -> VersioningResult<VersionedRecord> {
        self.versioned_type(record_type)?;
        let stored = self
            .store
            .find_record(record_type, id)
            .await?
            .ok_or_else(|| VersioningError::NotFound {
                record_type: record_type.clone(),
                id,
            })?;
        Ok(VersionedRecord::try_from(stored)?)
    }

    pub async fn load_draft(&self, record_type: &RecordTypeId, id: RecordId) -> VersioningResult<Draft> {
        self.load(record_type, id).await?.into_draft("edit")
    }

    /// The published snapshot a draft links to, if any.
    pub async fn published_of(&self, draft: &Draft) -> VersioningResult<Option<Published>> {
        let Some(linked_id) = draft.linked_id else {
            return Ok(None);
        };
        let Some(stored) = self.store.find_record(&draft.record_type, linked_id).await? else {
            return Ok(None);
        };
        match VersionedRecord::try_from(stored)? {
            VersionedRecord::Published(published) => Ok(Some(published)),
            VersionedRecord::Draft(linked) => Err(StoreError::InvalidRow(format!(
                "{} {} links to draft {}",
                draft.record_type, draft.id, linked.id
            ))
            .into()),
        }
    }

    /// The draft owning a published snapshot.
    pub async fn draft_of(&self, published: &Published) -> VersioningResult<Option<Draft>> {
        match self.store.find_by_link(&published.record_type, published.id).await? {
            Some(stored) => Ok(Some(VersionedRecord::try_from(stored)?.into_draft("read")?)),
            None => Ok(None),
        }
    }

    pub async fn drafts(&self, record_type: &RecordTypeId) -> VersioningResult<Vec<Draft>> {
        self.versioned_type(record_type)?;
        self.store
            .list_records(record_type, true)
            .await?
            .into_iter()
            .map(|stored| VersionedRecord::try_from(stored)?.into_draft("list"))
            .collect()
    }

    pub async fn published(&self, record_type: &RecordTypeId) -> VersioningResult<Vec<Published>> {
        self.versioned_type(record_type)?;
        let mut published = Vec::new();
        for stored in self.store.list_records(record_type, false).await? {
            if let VersionedRecord::Published(record) = VersionedRecord::try_from(stored)? {
                published.push(record);
            }
        }
        Ok(published)
    }

    /// Look a draft up and return the side of the pair `view` asks for.
    /// A never published draft has nothing to show in the published view.
    pub async fn resolve(
        &self,
        record_type: &RecordTypeId,
        draft_id: RecordId,
        view: View,
    ) -> VersioningResult<Option<VersionedRecord>> {
        let draft = self.load_draft(record_type, draft_id).await?;
        match view {
            View::Draft => Ok(Some(VersionedRecord::Draft(draft))),
            View::Published => Ok(self.published_of(&draft).await?.map(VersionedRecord::Published)),
        }
    }

    pub async fn is_dirty(&self, draft: &Draft) -> VersioningResult<bool> {
        DirtyEvaluator::new(&self.store, self.registry).is_dirty(draft).await
    }

    /// Published records are never dirty.
    pub async fn is_record_dirty(&self, record: &VersionedRecord) -> VersioningResult<bool> {
        match record {
            VersionedRecord::Draft(draft) => self.is_dirty(draft).await,
            VersionedRecord::Published(_) => Ok(false),
        }
    }

    pub async fn status(&self, draft: &Draft) -> VersioningResult<PublicationStatus> {
        if !draft.is_linked() {
            return Ok(PublicationStatus::Unpublished);
        }
        if self.is_dirty(draft).await? {
            Ok(PublicationStatus::Dirty)
        } else {
            Ok(PublicationStatus::Published)
        }
    }

    /// Children owned by `owner` through `relation`.
    pub async fn children(
        &self,
        owner: &RecordRef,
        relation: &AttributeId,
    ) -> VersioningResult<Vec<ChildRecord>> {
        let (relation, _) = self.owned_relation(&owner.record_type, relation)?;
        Ok(self.store.related(owner, relation).await?)
    }

    /// Create a child and attach it to `owner`.
    /// The versioned record at the root of `owner` must be a draft;
    /// published snapshots are read-only down to their last child.
    pub async fn add_child(
        &self,
        owner: &RecordRef,
        relation: &AttributeId,
        content: Content,
    ) -> VersioningResult<ChildRecord> {
        let (relation, target) = self.owned_relation(&owner.record_type, relation)?;
        validate(target, &content, false)?;
        self.ensure_editable(owner, "add a child to").await?;

        let child = NewChild::new(target.id.clone(), content, self.clock.now());
        let child = self.store.insert_child(owner, relation, child).await?;

        tracing::debug!(owner = %owner, relation = %relation.id, child = %child.id, "child added");
        Ok(child)
    }

    /// Persist edits of a child owned by `owner`.
    pub async fn save_child(
        &self,
        owner: &RecordRef,
        child: &mut ChildRecord,
    ) -> VersioningResult<()> {
        let record_type = registered_type(self.registry, &child.record_type)?;
        validate(record_type, &child.content, false)?;
        if self.store.owner_of(&child.record_ref()).await?.as_ref() != Some(owner) {
            return Err(VersioningError::NotFound {
                record_type: child.record_type.clone(),
                id: child.id,
            });
        }
        self.ensure_editable(owner, "edit a child of").await?;

        let mut updated = child.clone();
        updated.modified_at = self.clock.now();
        self.store.update_child(&updated).await?;

        *child = updated;
        Ok(())
    }

    /// Detach a child from `owner` and delete it with everything it owns.
    pub async fn remove_child(
        &self,
        owner: &RecordRef,
        relation: &AttributeId,
        child: ChildRecord,
    ) -> VersioningResult<()> {
        let (relation, target) = self.owned_relation(&owner.record_type, relation)?;
        self.ensure_editable(owner, "remove a child from").await?;

        let child_ref = child.record_ref();
        self.cloner().retire(target, child_ref.clone()).await?;
        self.store.delete_child(owner, relation, &child_ref).await?;

        tracing::debug!(owner = %owner, relation = %relation.id, child = %child.id, "child removed");
        Ok(())
    }

    pub async fn translations(&self, record: &RecordRef) -> VersioningResult<Vec<Translation>> {
        self.versioned_type(&record.record_type)?;
        Ok(self.store.translations(record).await?)
    }

    /// Insert or replace a translation of a draft.
    /// The draft is saved as well, so its localized edits make it dirty.
    pub async fn save_translation(
        &self,
        draft: &mut Draft,
        locale: LocalizationId,
        content: Content,
    ) -> VersioningResult<Translation> {
        let record_type = self.versioned_type(&draft.record_type)?;
        if !record_type.supports_locale(&locale) {
            return Err(VersioningError::UnsupportedLocale {
                record_type: record_type.id.clone(),
                locale,
            });
        }
        validate(record_type, &content, true)?;

        let translation = Translation {
            master: draft.id,
            locale,
            content,
        };
        self.store.save_translation(&record_type.id, &translation).await?;
        self.save(draft).await?;
        Ok(translation)
    }

    // helpers

    fn versioned_type(&self, id: &RecordTypeId) -> VersioningResult<&'static RecordType> {
        let record_type = registered_type(self.registry, id)?;
        if !record_type.is_versioned() {
            return Err(VersioningError::NotVersioned(id.clone()));
        }
        Ok(record_type)
    }

    fn owned_relation(
        &self,
        owner_type: &RecordTypeId,
        relation: &AttributeId,
    ) -> VersioningResult<(&'static OwnedRelation, &'static RecordType)> {
        let owner_type = registered_type(self.registry, owner_type)?;
        let relation = owner_type
            .relation(relation)
            .ok_or_else(|| VersioningError::UnknownRelation {
                record_type: owner_type.id.clone(),
                relation: relation.clone(),
            })?;
        let target = registered_type(self.registry, &relation.target)?;
        Ok((relation, target))
    }

    // walks from `owner` up to the versioned record owning it, which must be a draft
    async fn ensure_editable(
        &self,
        owner: &RecordRef,
        operation: &'static str,
    ) -> VersioningResult<()> {
        let mut current = owner.clone();
        loop {
            let current_type = registered_type(self.registry, &current.record_type)?;
            if current_type.is_versioned() {
                self.load(&current.record_type, current.id).await?.into_draft(operation)?;
                return Ok(());
            }
            if self.store.find_child(&current).await?.is_none() {
                return Err(VersioningError::NotFound {
                    record_type: current.record_type.clone(),
                    id: current.id,
                });
            }
            match self.store.owner_of(&current).await? {
                Some(parent) => current = parent,
                None => return Ok(()),
            }
        }
    }

    async fn update(
        &self,
        stored: &StoredRecord,
        expected_link: Option<RecordId>,
    ) -> VersioningResult<()> {
        self.store
            .update_record(stored, expected_link)
            .await
            .map_err(|err| match err {
                StoreError::NotFound(_) => VersioningError::NotFound {
                    record_type: stored.record_type.clone(),
                    id: stored.id,
                },
                other => other.into(),
            })
    }

    fn cloner(&self) -> GraphCloner<'_, S> {
        GraphCloner::new(&self.store, self.registry)
    }

    fn emit(&self, signal: LifecycleSignal, draft: &Draft) {
        self.observer
            .notify(&LifecycleEvent::new(signal, draft, self.clock.now()));
    }
}

pub(crate) fn registered_type(
    registry: &'static dyn RecordTypes,
    id: &RecordTypeId,
) -> VersioningResult<&'static RecordType> {
    registry
        .get(id)
        .ok_or_else(|| VersioningError::UnknownRecordType(id.clone()))
}

fn validate(record_type: &RecordType, content: &Content, localized: bool) -> VersioningResult<()> {
    content
        .validate(record_type, localized)
        .map_err(|source| VersioningError::InvalidContent {
            record_type: record_type.id.clone(),
            source,
        })
}
