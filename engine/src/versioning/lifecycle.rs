use publisher_common::{RecordType, RecordTypeId};

use crate::domain::{
    Clock, Draft, Duplicate, LifecycleObserver, LifecycleSignal, Published, RecordId, RecordRef,
    RecordStore, StoreError, VersionedRecord, VersioningError, VersioningResult,
};
use crate::versioning::Publisher;

impl<S, O, C> Publisher<S, O, C>
where
    S: RecordStore,
    O: LifecycleObserver,
    C: Clock,
{
    /// Publish a draft: snapshot it with all owned children and translations,
    /// link the snapshot and retire the one it replaces.
    ///
    /// Returns `None` when the draft has nothing new to publish.
    pub async fn publish(&self, draft: &mut Draft) -> VersioningResult<Option<Published>> {
        let record_type = self.versioned_type(&draft.record_type)?;
        if !self.is_dirty(draft).await? {
            tracing::debug!(record_type = %draft.record_type, id = %draft.id, "nothing to publish");
            return Ok(None);
        }

        let now = self.clock.now();
        let previous_link = draft.linked_id;

        let mut staged = draft.clone();
        if previous_link.is_none() || staged.published_at.is_none() {
            staged.published_at = Some(now);
        }

        let snapshot = self.store.insert_record(staged.duplicate(now)).await?;
        let published = match VersionedRecord::try_from(snapshot)? {
            VersionedRecord::Published(published) => published,
            VersionedRecord::Draft(copy) => {
                return Err(StoreError::InvalidRow(format!(
                    "snapshot {} of {} {} was stored as a draft",
                    copy.id, staged.record_type, staged.id
                ))
                .into());
            }
        };

        let cloner = self.cloner();
        let source = staged.record_ref();
        let destination = published.record_ref();
        cloner.clone_translations(record_type, &source, &destination).await?;
        let children = cloner.clone_relations(record_type, source, destination, now).await?;

        staged.linked_id = Some(published.id);
        self.emit(LifecycleSignal::PrePublish, &staged);

        // linking alone must not make the draft look edited
        if let Err(err) = self.update(&staged.to_stored(), previous_link).await {
            tracing::warn!(
                record_type = %staged.record_type,
                id = %staged.id,
                error = %err,
                "draft changed while publishing, discarding snapshot"
            );
            if let Err(cleanup) = self.retire_published(record_type, published.id).await {
                tracing::warn!(
                    record_type = %staged.record_type,
                    linked_id = %published.id,
                    error = %cleanup,
                    "failed to discard snapshot"
                );
            }
            return Err(err);
        }

        if let Some(previous) = previous_link {
            self.retire_published(record_type, previous).await?;
        }

        *draft = staged;
        tracing::info!(
            record_type = %draft.record_type,
            id = %draft.id,
            linked_id = %published.id,
            children,
            "draft published"
        );
        self.emit(LifecycleSignal::PostPublish, draft);

        Ok(Some(published))
    }

    /// Delete the published snapshot of a draft.
    ///
    /// Returns `false` when the draft was not published.
    pub async fn unpublish(&self, draft: &mut Draft) -> VersioningResult<bool> {
        let record_type = self.versioned_type(&draft.record_type)?;
        let Some(linked_id) = draft.linked_id else {
            return Ok(false);
        };

        let mut staged = draft.clone();
        staged.linked_id = None;
        staged.published_at = None;
        staged.modified_at = self.clock.now();
        self.update(&staged.to_stored(), Some(linked_id)).await?;

        // observers still see the link that is about to go away
        self.emit(LifecycleSignal::PreUnpublish, draft);

        self.retire_published(record_type, linked_id).await?;

        *draft = staged;
        tracing::info!(
            record_type = %draft.record_type,
            id = %draft.id,
            linked_id = %linked_id,
            "draft unpublished"
        );
        self.emit(LifecycleSignal::PostUnpublish, draft);

        Ok(true)
    }

    /// Throw the draft away and continue from its published snapshot.
    ///
    /// The snapshot becomes the draft and is published again, so the returned
    /// draft has a different ID than the one passed in. A draft that was never
    /// published is returned unchanged.
    pub async fn revert_to_public(&self, draft: Draft) -> VersioningResult<Draft> {
        let record_type = self.versioned_type(&draft.record_type)?;
        let Some(linked_id) = draft.linked_id else {
            return Ok(draft);
        };

        let published = self
            .published_of(&draft)
            .await?
            .ok_or_else(|| VersioningError::NotFound {
                record_type: draft.record_type.clone(),
                id: linked_id,
            })?;

        let mut detached = draft;
        detached.linked_id = None;
        self.update(&detached.to_stored(), Some(linked_id)).await?;
        self.delete_with_children(record_type, detached.id).await?;

        let mut promoted = published.into_draft();
        promoted.modified_at = self.clock.now();
        self.update(&promoted.to_stored(), None).await?;

        tracing::info!(
            record_type = %promoted.record_type,
            discarded = %detached.id,
            id = %promoted.id,
            "draft reverted to published"
        );

        self.publish(&mut promoted).await?;
        Ok(promoted)
    }

    /// Delete a draft together with its published snapshot.
    pub async fn delete(&self, draft: Draft) -> VersioningResult<()> {
        let record_type = self.versioned_type(&draft.record_type)?;
        if let Some(linked_id) = draft.linked_id {
            self.retire_published(record_type, linked_id).await?;
        }
        self.delete_with_children(record_type, draft.id).await?;

        tracing::info!(record_type = %draft.record_type, id = %draft.id, "draft deleted");
        Ok(())
    }

    pub async fn publish_by_id(
        &self,
        record_type: &RecordTypeId,
        id: RecordId,
    ) -> VersioningResult<Option<Published>> {
        let mut draft = self.load(record_type, id).await?.into_draft("publish")?;
        self.publish(&mut draft).await
    }

    pub async fn unpublish_by_id(&self, record_type: &RecordTypeId, id: RecordId) -> VersioningResult<bool> {
        let mut draft = self.load(record_type, id).await?.into_draft("unpublish")?;
        self.unpublish(&mut draft).await
    }

    pub async fn revert_to_public_by_id(
        &self,
        record_type: &RecordTypeId,
        id: RecordId,
    ) -> VersioningResult<Draft> {
        let draft = self.load(record_type, id).await?.into_draft("revert")?;
        self.revert_to_public(draft).await
    }

    // a snapshot that is already gone needs no retiring
    async fn retire_published(
        &self,
        record_type: &'static RecordType,
        id: RecordId,
    ) -> VersioningResult<()> {
        if self.store.find_record(&record_type.id, id).await?.is_none() {
            return Ok(());
        }
        self.delete_with_children(record_type, id).await
    }

    async fn delete_with_children(
        &self,
        record_type: &'static RecordType,
        id: RecordId,
    ) -> VersioningResult<()> {
        let owner = RecordRef::new(record_type.id.clone(), id);
        let removed = self.cloner().retire(record_type, owner).await?;
        self.store.delete_record(&record_type.id, id).await?;

        tracing::debug!(record_type = %record_type.id, id = %id, children = removed, "record deleted");
        Ok(())
    }
}
