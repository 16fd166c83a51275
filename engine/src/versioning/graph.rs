use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, FutureExt};
use publisher_common::{RecordType, RecordTypes};

use crate::domain::{Duplicate, RecordRef, RecordStore, VersioningResult};
use crate::versioning::registered_type;

/// Deep copy and deep removal of the rows a record owns.
pub(crate) struct GraphCloner<'a, S> {
    store: &'a S,
    registry: &'static dyn RecordTypes,
}

impl<'a, S: RecordStore> GraphCloner<'a, S> {
    pub(crate) fn new(store: &'a S, registry: &'static dyn RecordTypes) -> Self {
        Self { store, registry }
    }

    /// Copy every translation of `source` onto `destination`.
    /// Returns the number of copied translations.
    pub(crate) async fn clone_translations(
        &self,
        record_type: &RecordType,
        source: &RecordRef,
        destination: &RecordRef,
    ) -> VersioningResult<usize> {
        if !record_type.has_localization() {
            return Ok(0);
        }

        let translations = self.store.translations(source).await?;
        for translation in translations.iter() {
            self.store
                .save_translation(&record_type.id, &translation.reparented(destination.id))
                .await?;
        }

        tracing::debug!(
            source = %source,
            destination = %destination,
            count = translations.len(),
            "translations cloned"
        );
        Ok(translations.len())
    }

    /// Duplicate every child owned by `source` and attach the copies to
    /// `destination`, recursing into the children of each copy.
    /// `source` and its descendants are only read.
    pub(crate) fn clone_relations(
        &self,
        record_type: &'static RecordType,
        source: RecordRef,
        destination: RecordRef,
        now: DateTime<Utc>,
    ) -> BoxFuture<'_, VersioningResult<usize>> {
        async move {
            let mut cloned = 0;
            for relation in record_type.owned_relations() {
                let target = registered_type(self.registry, &relation.target)?;
                for child in self.store.related(&source, relation).await? {
                    let copy = self
                        .store
                        .insert_child(&destination, relation, child.duplicate(now))
                        .await?;
                    tracing::debug!(
                        relation = %relation.id,
                        source = %child.id,
                        copy = %copy.id,
                        "child cloned"
                    );
                    cloned += 1;
                    cloned += self
                        .clone_relations(target, child.record_ref(), copy.record_ref(), now)
                        .await?;
                }
            }
            Ok(cloned)
        }
        .boxed()
    }

    /// Delete every child owned by `owner`, deepest first.
    /// The owner row itself is left in place.
    pub(crate) fn retire(
        &self,
        record_type: &'static RecordType,
        owner: RecordRef,
    ) -> BoxFuture<'_, VersioningResult<usize>> {
        async move {
            let mut removed = 0;
            for relation in record_type.owned_relations() {
                let target = registered_type(self.registry, &relation.target)?;
                for child in self.store.related(&owner, relation).await? {
                    let child_ref = child.record_ref();
                    removed += self.retire(target, child_ref.clone()).await?;
                    self.store.delete_child(&owner, relation, &child_ref).await?;
                    removed += 1;
                }
            }
            Ok(removed)
        }
        .boxed()
    }
}
