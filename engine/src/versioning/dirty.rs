use chrono::TimeDelta;
use futures::future::{BoxFuture, FutureExt};
use publisher_common::{RecordType, RecordTypes};

use crate::domain::{ChildRecord, Draft, RecordRef, RecordStore, VersioningResult};
use crate::versioning::registered_type;

/// A child saved more than this long after its creation counts as edited.
pub const CHILD_EDIT_THRESHOLD_SECONDS: i64 = 5;

/// Decides whether a draft differs from its published snapshot.
pub(crate) struct DirtyEvaluator<'a, S> {
    store: &'a S,
    registry: &'static dyn RecordTypes,
}

impl<'a, S: RecordStore> DirtyEvaluator<'a, S> {
    pub(crate) fn new(store: &'a S, registry: &'static dyn RecordTypes) -> Self {
        Self { store, registry }
    }

    pub(crate) async fn is_dirty(&self, draft: &Draft) -> VersioningResult<bool> {
        let Some(linked_id) = draft.linked_id else {
            return Ok(true);
        };

        let Some(linked) = self.store.find_record(&draft.record_type, linked_id).await? else {
            tracing::warn!(
                record_type = %draft.record_type,
                id = %draft.id,
                linked_id = %linked_id,
                "draft links to a missing published record"
            );
            return Ok(true);
        };

        if draft.modified_at > linked.modified_at {
            tracing::debug!(record_type = %draft.record_type, id = %draft.id, "draft edited since last publish");
            return Ok(true);
        }

        let record_type = registered_type(self.registry, &draft.record_type)?;
        self.has_edited_children(record_type, draft.record_ref()).await
    }

    // short-circuits on the first edited descendant
    fn has_edited_children(
        &self,
        record_type: &'static RecordType,
        owner: RecordRef,
    ) -> BoxFuture<'_, VersioningResult<bool>> {
        async move {
            for relation in record_type.owned_relations() {
                let target = registered_type(self.registry, &relation.target)?;
                for child in self.store.related(&owner, relation).await? {
                    if is_edited(&child) {
                        tracing::debug!(
                            owner = %owner,
                            relation = %relation.id,
                            child = %child.id,
                            "child edited after creation"
                        );
                        return Ok(true);
                    }
                    if self.has_edited_children(target, child.record_ref()).await? {
                        return Ok(true);
                    }
                }
            }
            Ok(false)
        }
        .boxed()
    }
}

fn is_edited(child: &ChildRecord) -> bool {
    child.edit_age() > TimeDelta::seconds(CHILD_EDIT_THRESHOLD_SECONDS)
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use publisher_common::test_utils::type_id;

    use super::*;
    use crate::domain::{Content, RecordId};

    fn child(seconds_after_creation: i64) -> ChildRecord {
        let created_at = Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap();
        ChildRecord {
            id: RecordId(1),
            record_type: type_id("block"),
            created_at,
            modified_at: created_at + TimeDelta::seconds(seconds_after_creation),
            content: Content::new(),
        }
    }

    #[test]
    fn threshold_is_exclusive() {
        assert!(!is_edited(&child(0)));
        assert!(!is_edited(&child(5)));
        assert!(is_edited(&child(6)));
    }

    #[test]
    fn sub_second_edits_past_threshold_count() {
        let mut record = child(5);
        record.modified_at += TimeDelta::milliseconds(1);
        assert!(is_edited(&record));
    }
}
