use std::future::Future;

use publisher_common::{OwnedRelation, RecordTypeId};

use crate::domain::{
    error::StoreError,
    record::{ChildRecord, NewChild, NewRecord, RecordId, RecordRef, StoredRecord, Translation},
};

/// Persistence seam of the versioning engine.
///
/// A store keeps versioned rows, the children they own through declared
/// relations and their translations. It guarantees that no two rows share a
/// `linked_id`, and that deleting a row clears every link pointing at it.
pub trait RecordStore: Send + Sync + 'static {
    /// Insert a versioned row and return it with its new identity
    fn insert_record(
        &self,
        record: NewRecord,
    ) -> impl Future<Output = Result<StoredRecord, StoreError>> + Send;

    /// Find a versioned row by ID
    fn find_record(
        &self,
        record_type: &RecordTypeId,
        id: RecordId,
    ) -> impl Future<Output = Result<Option<StoredRecord>, StoreError>> + Send;

    /// Find the row whose `linked_id` points at `linked_id`
    fn find_by_link(
        &self,
        record_type: &RecordTypeId,
        linked_id: RecordId,
    ) -> impl Future<Output = Result<Option<StoredRecord>, StoreError>> + Send;

    /// All drafts or all published rows of a type, ordered by ID
    fn list_records(
        &self,
        record_type: &RecordTypeId,
        is_draft: bool,
    ) -> impl Future<Output = Result<Vec<StoredRecord>, StoreError>> + Send;

    /// Overwrite a versioned row, provided its stored link still equals
    /// `expected_link`. A mismatch is reported as a unique violation.
    fn update_record(
        &self,
        record: &StoredRecord,
        expected_link: Option<RecordId>,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Delete a versioned row together with its translations and relation rows.
    /// Links pointing at the row are cleared.
    fn delete_record(
        &self,
        record_type: &RecordTypeId,
        id: RecordId,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Children reachable from `owner` through `relation`, in insertion order
    fn related(
        &self,
        owner: &RecordRef,
        relation: &OwnedRelation,
    ) -> impl Future<Output = Result<Vec<ChildRecord>, StoreError>> + Send;

    /// Find a child row by ID
    fn find_child(
        &self,
        child: &RecordRef,
    ) -> impl Future<Output = Result<Option<ChildRecord>, StoreError>> + Send;

    /// The row `child` is attached to, if any
    fn owner_of(
        &self,
        child: &RecordRef,
    ) -> impl Future<Output = Result<Option<RecordRef>, StoreError>> + Send;

    /// Insert a child row and attach it to `owner`
    fn insert_child(
        &self,
        owner: &RecordRef,
        relation: &OwnedRelation,
        child: NewChild,
    ) -> impl Future<Output = Result<ChildRecord, StoreError>> + Send;

    /// Overwrite the content and modification time of a child row
    fn update_child(
        &self,
        child: &ChildRecord,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Detach `child` from `owner` and delete the child row
    fn delete_child(
        &self,
        owner: &RecordRef,
        relation: &OwnedRelation,
        child: &RecordRef,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Translations of a versioned row, ordered by locale
    fn translations(
        &self,
        master: &RecordRef,
    ) -> impl Future<Output = Result<Vec<Translation>, StoreError>> + Send;

    /// Insert or replace the translation for `(master, locale)`
    fn save_translation(
        &self,
        record_type: &RecordTypeId,
        translation: &Translation,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;
}
