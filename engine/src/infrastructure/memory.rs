use std::collections::BTreeMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use publisher_common::{AttributeId, LocalizationId, OwnedRelation, RecordTypeId};

use crate::domain::{
    ChildRecord, Content, NewChild, NewRecord, RecordId, RecordRef, RecordStore, StoreError,
    StoredRecord, Translation,
};

type RowKey = (RecordTypeId, RecordId);

#[derive(Debug, Default)]
struct Tables {
    last_id: i64,
    records: BTreeMap<RowKey, StoredRecord>,
    children: BTreeMap<RowKey, ChildRecord>,
    relations: Vec<RelationRow>,
    translations: BTreeMap<(RecordTypeId, RecordId, LocalizationId), Content>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct RelationRow {
    owner: RecordRef,
    relation: AttributeId,
    child: RecordRef,
}

/// Record store kept in process memory.
///
/// Enforces the same constraints as the database schema: unique links,
/// links pointing at existing rows of the same type, `ON DELETE SET NULL`
/// on links and cascading translation and relation rows. Clones share the
/// same tables.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of versioned rows of a type, drafts and published alike.
    pub fn count_records(&self, record_type: &RecordTypeId) -> usize {
        self.read()
            .map(|tables| tables.records.keys().filter(|(rt, _)| rt == record_type).count())
            .unwrap_or_default()
    }

    pub fn count_children(&self, record_type: &RecordTypeId) -> usize {
        self.read()
            .map(|tables| tables.children.keys().filter(|(rt, _)| rt == record_type).count())
            .unwrap_or_default()
    }

    pub fn count_translations(&self, record_type: &RecordTypeId) -> usize {
        self.read()
            .map(|tables| {
                tables
                    .translations
                    .keys()
                    .filter(|(rt, _, _)| rt == record_type)
                    .count()
            })
            .unwrap_or_default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Tables>, StoreError> {
        self.tables
            .read()
            .map_err(|_| StoreError::DatabaseError("in-memory store is poisoned".into()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Tables>, StoreError> {
        self.tables
            .write()
            .map_err(|_| StoreError::DatabaseError("in-memory store is poisoned".into()))
    }
}

impl Tables {
    fn next_id(&mut self) -> RecordId {
        self.last_id += 1;
        RecordId(self.last_id)
    }

    fn check_link(&self, record_type: &RecordTypeId, id: Option<RecordId>, link: Option<RecordId>) -> Result<(), StoreError> {
        let Some(link) = link else {
            return Ok(());
        };
        if !self.records.contains_key(&(record_type.clone(), link)) {
            return Err(StoreError::DatabaseError(format!(
                "linked_id {} does not reference a {} row",
                link, record_type
            )));
        }
        let taken = self.records.values().any(|other| {
            &other.record_type == record_type && Some(other.id) != id && other.linked_id == Some(link)
        });
        if taken {
            return Err(StoreError::UniqueViolation(format!(
                "{} {} is already linked",
                record_type, link
            )));
        }
        Ok(())
    }

    fn remove_child(&mut self, child: &RecordRef) {
        self.children.remove(&(child.record_type.clone(), child.id));
        self.relations
            .retain(|row| &row.child != child && &row.owner != child);
    }
}

fn not_found(record: &RecordRef) -> StoreError {
    StoreError::NotFound(record.to_string())
}

impl RecordStore for InMemoryStore {
    async fn insert_record(&self, record: NewRecord) -> Result<StoredRecord, StoreError> {
        let mut tables = self.write()?;
        tables.check_link(&record.record_type, None, record.linked_id)?;

        let id = tables.next_id();
        let stored = record.into_stored(id);
        tables
            .records
            .insert((stored.record_type.clone(), id), stored.clone());
        Ok(stored)
    }

    async fn find_record(
        &self,
        record_type: &RecordTypeId,
        id: RecordId,
    ) -> Result<Option<StoredRecord>, StoreError> {
        Ok(self.read()?.records.get(&(record_type.clone(), id)).cloned())
    }

    async fn find_by_link(
        &self,
        record_type: &RecordTypeId,
        linked_id: RecordId,
    ) -> Result<Option<StoredRecord>, StoreError> {
        Ok(self
            .read()?
            .records
            .values()
            .find(|record| &record.record_type == record_type && record.linked_id == Some(linked_id))
            .cloned())
    }

    async fn list_records(
        &self,
        record_type: &RecordTypeId,
        is_draft: bool,
    ) -> Result<Vec<StoredRecord>, StoreError> {
        Ok(self
            .read()?
            .records
            .values()
            .filter(|record| &record.record_type == record_type && record.is_draft == is_draft)
            .cloned()
            .collect())
    }

    async fn update_record(
        &self,
        record: &StoredRecord,
        expected_link: Option<RecordId>,
    ) -> Result<(), StoreError> {
        let mut tables = self.write()?;
        let key = (record.record_type.clone(), record.id);
        let current = tables
            .records
            .get(&key)
            .ok_or_else(|| not_found(&RecordRef::new(record.record_type.clone(), record.id)))?;

        if current.linked_id != expected_link {
            return Err(StoreError::UniqueViolation(format!(
                "link of {} {} changed concurrently",
                record.record_type, record.id
            )));
        }
        tables.check_link(&record.record_type, Some(record.id), record.linked_id)?;

        let mut updated = record.clone();
        updated.created_at = current.created_at;
        tables.records.insert(key, updated);
        Ok(())
    }

    async fn delete_record(&self, record_type: &RecordTypeId, id: RecordId) -> Result<(), StoreError> {
        let mut tables = self.write()?;
        if tables.records.remove(&(record_type.clone(), id)).is_none() {
            return Err(not_found(&RecordRef::new(record_type.clone(), id)));
        }

        for record in tables.records.values_mut() {
            if &record.record_type == record_type && record.linked_id == Some(id) {
                record.linked_id = None;
            }
        }
        tables
            .translations
            .retain(|(rt, master, _), _| !(rt == record_type && *master == id));
        let owner = RecordRef::new(record_type.clone(), id);
        tables.relations.retain(|row| row.owner != owner);
        Ok(())
    }

    async fn related(
        &self,
        owner: &RecordRef,
        relation: &OwnedRelation,
    ) -> Result<Vec<ChildRecord>, StoreError> {
        let tables = self.read()?;
        let children = tables
            .relations
            .iter()
            .filter(|row| &row.owner == owner && row.relation == relation.id)
            .filter_map(|row| {
                tables
                    .children
                    .get(&(row.child.record_type.clone(), row.child.id))
                    .cloned()
            })
            .collect();
        Ok(children)
    }

    async fn find_child(&self, child: &RecordRef) -> Result<Option<ChildRecord>, StoreError> {
        Ok(self
            .read()?
            .children
            .get(&(child.record_type.clone(), child.id))
            .cloned())
    }

    async fn owner_of(&self, child: &RecordRef) -> Result<Option<RecordRef>, StoreError> {
        Ok(self
            .read()?
            .relations
            .iter()
            .find(|row| &row.child == child)
            .map(|row| row.owner.clone()))
    }

    async fn insert_child(
        &self,
        owner: &RecordRef,
        relation: &OwnedRelation,
        child: NewChild,
    ) -> Result<ChildRecord, StoreError> {
        let mut tables = self.write()?;
        let owner_exists = tables
            .records
            .contains_key(&(owner.record_type.clone(), owner.id))
            || tables
                .children
                .contains_key(&(owner.record_type.clone(), owner.id));
        if !owner_exists {
            return Err(not_found(owner));
        }

        let id = tables.next_id();
        let stored = child.into_stored(id);
        tables
            .children
            .insert((stored.record_type.clone(), id), stored.clone());
        tables.relations.push(RelationRow {
            owner: owner.clone(),
            relation: relation.id.clone(),
            child: stored.record_ref(),
        });
        Ok(stored)
    }

    async fn update_child(&self, child: &ChildRecord) -> Result<(), StoreError> {
        let mut tables = self.write()?;
        let current = tables
            .children
            .get_mut(&(child.record_type.clone(), child.id))
            .ok_or_else(|| not_found(&child.record_ref()))?;
        current.modified_at = child.modified_at;
        current.content = child.content.clone();
        Ok(())
    }

    async fn delete_child(
        &self,
        owner: &RecordRef,
        relation: &OwnedRelation,
        child: &RecordRef,
    ) -> Result<(), StoreError> {
        let mut tables = self.write()?;
        let attached = tables
            .relations
            .iter()
            .any(|row| &row.owner == owner && row.relation == relation.id && &row.child == child);
        if !attached {
            return Err(not_found(child));
        }
        tables.remove_child(child);
        Ok(())
    }

    async fn translations(&self, master: &RecordRef) -> Result<Vec<Translation>, StoreError> {
        let translations = self
            .read()?
            .translations
            .iter()
            .filter(|((rt, id, _), _)| rt == &master.record_type && *id == master.id)
            .map(|((_, id, locale), content)| Translation {
                master: *id,
                locale: locale.clone(),
                content: content.clone(),
            })
            .collect();
        Ok(translations)
    }

    async fn save_translation(
        &self,
        record_type: &RecordTypeId,
        translation: &Translation,
    ) -> Result<(), StoreError> {
        let mut tables = self.write()?;
        if !tables
            .records
            .contains_key(&(record_type.clone(), translation.master))
        {
            return Err(not_found(&RecordRef::new(record_type.clone(), translation.master)));
        }
        tables.translations.insert(
            (record_type.clone(), translation.master, translation.locale.clone()),
            translation.content.clone(),
        );
        Ok(())
    }
}
