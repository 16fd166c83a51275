use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, NaiveDate, TimeDelta, Utc};
use publisher_common::{AttributeId, AttributeType, LocalizationId, RecordType, RecordTypeId};
use serde::{Deserialize, Serialize};

use crate::domain::error::{ContentError, StoreError, VersioningError};

/// Wrapper to prevent ID confusion
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub i64);

impl From<i64> for RecordId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Address of any stored row: versioned record or owned child.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct RecordRef {
    pub record_type: RecordTypeId,
    pub id: RecordId,
}

impl RecordRef {
    pub fn new(record_type: RecordTypeId, id: RecordId) -> Self {
        Self { record_type, id }
    }
}

impl fmt::Display for RecordRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.record_type, self.id)
    }
}

/// The value types content fields can have.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum FieldValue {
    Text(String),
    Integer(i64),
    Decimal(f64),
    Boolean(bool),
    /// YYYY-MM-DD
    Date(NaiveDate),
    DateTime(DateTime<Utc>),
    Json(serde_json::Value),
    Null,
}

impl FieldValue {
    fn matches(&self, attribute_type: AttributeType) -> bool {
        matches!(
            (self, attribute_type),
            (FieldValue::Null, _)
                | (FieldValue::Text(_), AttributeType::Text)
                | (FieldValue::Integer(_), AttributeType::Integer)
                | (FieldValue::Decimal(_), AttributeType::Decimal)
                | (FieldValue::Boolean(_), AttributeType::Boolean)
                | (FieldValue::Date(_), AttributeType::Date)
                | (FieldValue::DateTime(_), AttributeType::DateTime)
                | (FieldValue::Json(_), AttributeType::Json)
        )
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_owned())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Integer(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Boolean(value)
    }
}

/// Field values of one row, keyed by attribute.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Content(BTreeMap<AttributeId, FieldValue>);

impl Content {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, attribute: AttributeId, value: impl Into<FieldValue>) -> Self {
        self.0.insert(attribute, value.into());
        self
    }

    pub fn get(&self, attribute: &AttributeId) -> Option<&FieldValue> {
        self.0.get(attribute)
    }

    pub fn set(&mut self, attribute: AttributeId, value: impl Into<FieldValue>) {
        self.0.insert(attribute, value.into());
    }

    pub fn remove(&mut self, attribute: &AttributeId) -> Option<FieldValue> {
        self.0.remove(attribute)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&AttributeId, &FieldValue)> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Check this content against the declared fields of `record_type`.
    ///
    /// Record content carries the non-localized fields, translation content
    /// the localized ones.
    pub fn validate(&self, record_type: &RecordType, localized: bool) -> Result<(), ContentError> {
        for (attribute, value) in self.0.iter() {
            let field = record_type
                .field(attribute)
                .filter(|field| field.localized == localized)
                .ok_or_else(|| ContentError::UnknownField(attribute.clone()))?;
            if !value.matches(field.attribute_type) {
                return Err(ContentError::TypeMismatch {
                    field: attribute.clone(),
                    expected: field.attribute_type,
                });
            }
        }

        let missing = record_type
            .fields
            .iter()
            .filter(|field| field.required && field.localized == localized)
            .find(|field| matches!(self.0.get(&field.id), None | Some(FieldValue::Null)));
        match missing {
            Some(field) => Err(ContentError::MissingRequiredField(field.id.clone())),
            None => Ok(()),
        }
    }
}

impl FromIterator<(AttributeId, FieldValue)> for Content {
    fn from_iter<T: IntoIterator<Item = (AttributeId, FieldValue)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// One persisted row of a versioned record type, exactly as storage keeps it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRecord {
    pub id: RecordId,
    pub record_type: RecordTypeId,
    pub is_draft: bool,
    pub linked_id: Option<RecordId>,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
    pub published_at: Option<DateTime<Utc>>,
    pub content: Content,
}

/// A versioned row that storage has not assigned an identity to yet.
#[derive(Debug, Clone, PartialEq)]
pub struct NewRecord {
    pub record_type: RecordTypeId,
    pub is_draft: bool,
    pub linked_id: Option<RecordId>,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
    pub published_at: Option<DateTime<Utc>>,
    pub content: Content,
}

impl NewRecord {
    /// A fresh draft: `is_draft` defaults to true and there is no link.
    pub fn draft(record_type: RecordTypeId, content: Content, now: DateTime<Utc>) -> Self {
        Self {
            record_type,
            is_draft: true,
            linked_id: None,
            created_at: now,
            modified_at: now,
            published_at: None,
            content,
        }
    }

    pub fn into_stored(self, id: RecordId) -> StoredRecord {
        StoredRecord {
            id,
            record_type: self.record_type,
            is_draft: self.is_draft,
            linked_id: self.linked_id,
            created_at: self.created_at,
            modified_at: self.modified_at,
            published_at: self.published_at,
            content: self.content,
        }
    }
}

/// The mutable variant of a versioned record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Draft {
    pub id: RecordId,
    pub record_type: RecordTypeId,
    /// current published snapshot, absent if never published
    pub linked_id: Option<RecordId>,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
    pub published_at: Option<DateTime<Utc>>,
    pub content: Content,
}

/// The public snapshot of a draft. It never links anywhere.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Published {
    pub id: RecordId,
    pub record_type: RecordTypeId,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
    pub published_at: DateTime<Utc>,
    pub content: Content,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum VersionedRecord {
    Draft(Draft),
    Published(Published),
}

impl Draft {
    pub fn record_ref(&self) -> RecordRef {
        RecordRef::new(self.record_type.clone(), self.id)
    }

    pub fn is_linked(&self) -> bool {
        self.linked_id.is_some()
    }

    pub(crate) fn to_stored(&self) -> StoredRecord {
        StoredRecord {
            id: self.id,
            record_type: self.record_type.clone(),
            is_draft: true,
            linked_id: self.linked_id,
            created_at: self.created_at,
            modified_at: self.modified_at,
            published_at: self.published_at,
            content: self.content.clone(),
        }
    }
}

impl Published {
    pub fn record_ref(&self) -> RecordRef {
        RecordRef::new(self.record_type.clone(), self.id)
    }

    /// Flip the snapshot into a draft of its own, keeping identity and content.
    pub(crate) fn into_draft(self) -> Draft {
        Draft {
            id: self.id,
            record_type: self.record_type,
            linked_id: None,
            created_at: self.created_at,
            modified_at: self.modified_at,
            published_at: Some(self.published_at),
            content: self.content,
        }
    }
}

impl VersionedRecord {
    pub fn id(&self) -> RecordId {
        match self {
            VersionedRecord::Draft(draft) => draft.id,
            VersionedRecord::Published(published) => published.id,
        }
    }

    pub fn record_type(&self) -> &RecordTypeId {
        match self {
            VersionedRecord::Draft(draft) => &draft.record_type,
            VersionedRecord::Published(published) => &published.record_type,
        }
    }

    pub fn content(&self) -> &Content {
        match self {
            VersionedRecord::Draft(draft) => &draft.content,
            VersionedRecord::Published(published) => &published.content,
        }
    }

    pub fn is_draft(&self) -> bool {
        matches!(self, VersionedRecord::Draft(_))
    }

    pub fn is_published(&self) -> bool {
        matches!(self, VersionedRecord::Published(_))
    }

    /// Guard for operations restricted to drafts.
    pub fn into_draft(self, operation: &'static str) -> Result<Draft, VersioningError> {
        match self {
            VersionedRecord::Draft(draft) => Ok(draft),
            VersionedRecord::Published(published) => Err(VersioningError::InvalidState {
                operation,
                record_type: published.record_type,
                id: published.id,
            }),
        }
    }
}

impl TryFrom<StoredRecord> for VersionedRecord {
    type Error = StoreError;

    fn try_from(value: StoredRecord) -> Result<Self, Self::Error> {
        if value.is_draft {
            return Ok(VersionedRecord::Draft(Draft {
                id: value.id,
                record_type: value.record_type,
                linked_id: value.linked_id,
                created_at: value.created_at,
                modified_at: value.modified_at,
                published_at: value.published_at,
                content: value.content,
            }));
        }

        if let Some(linked_id) = value.linked_id {
            return Err(StoreError::InvalidRow(format!(
                "published {} {} links to {}",
                value.record_type, value.id, linked_id
            )));
        }
        let published_at = value.published_at.ok_or_else(|| {
            StoreError::InvalidRow(format!(
                "published {} {} has no published_at",
                value.record_type, value.id
            ))
        })?;

        Ok(VersionedRecord::Published(Published {
            id: value.id,
            record_type: value.record_type,
            created_at: value.created_at,
            modified_at: value.modified_at,
            published_at,
            content: value.content,
        }))
    }
}

/// A row owned by another record through a declared relation.
/// Children are not versioned; they are duplicated whenever their owner is published.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChildRecord {
    pub id: RecordId,
    pub record_type: RecordTypeId,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
    pub content: Content,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewChild {
    pub record_type: RecordTypeId,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
    pub content: Content,
}

impl ChildRecord {
    pub fn record_ref(&self) -> RecordRef {
        RecordRef::new(self.record_type.clone(), self.id)
    }

    /// Time between creation and the last save.
    pub fn edit_age(&self) -> TimeDelta {
        self.modified_at - self.created_at
    }
}

impl NewChild {
    pub fn new(record_type: RecordTypeId, content: Content, now: DateTime<Utc>) -> Self {
        Self {
            record_type,
            created_at: now,
            modified_at: now,
            content,
        }
    }

    pub fn into_stored(self, id: RecordId) -> ChildRecord {
        ChildRecord {
            id,
            record_type: self.record_type,
            created_at: self.created_at,
            modified_at: self.modified_at,
            content: self.content,
        }
    }
}

/// A localized variant of a versioned record's text, keyed by master and locale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Translation {
    pub master: RecordId,
    pub locale: LocalizationId,
    pub content: Content,
}

impl Translation {
    pub fn reparented(&self, master: RecordId) -> Translation {
        Translation {
            master,
            locale: self.locale.clone(),
            content: self.content.clone(),
        }
    }
}

/// Fresh-identity copy of a persisted row.
///
/// The copy carries the content, drops the identity and gets new timestamps;
/// the caller attaches it to its new parent and persists it.
pub trait Duplicate {
    type Fresh;

    fn duplicate(&self, now: DateTime<Utc>) -> Self::Fresh;
}

impl Duplicate for Draft {
    type Fresh = NewRecord;

    fn duplicate(&self, now: DateTime<Utc>) -> NewRecord {
        NewRecord {
            record_type: self.record_type.clone(),
            is_draft: false,
            linked_id: None,
            created_at: now,
            modified_at: now,
            published_at: self.published_at,
            content: self.content.clone(),
        }
    }
}

impl Duplicate for ChildRecord {
    type Fresh = NewChild;

    fn duplicate(&self, now: DateTime<Utc>) -> NewChild {
        NewChild::new(self.record_type.clone(), self.content.clone(), now)
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use chrono::TimeZone;
    use publisher_common::test_utils::{attr, type_id, versioned_type};

    use super::*;

    fn stored(is_draft: bool, linked_id: Option<i64>, published: bool) -> StoredRecord {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        StoredRecord {
            id: RecordId(7),
            record_type: type_id("page"),
            is_draft,
            linked_id: linked_id.map(RecordId),
            created_at: now,
            modified_at: now,
            published_at: published.then_some(now),
            content: Content::new().with(attr("title"), "Hello"),
        }
    }

    #[test]
    fn draft_rows_become_drafts() {
        let record = VersionedRecord::try_from(stored(true, Some(9), true)).unwrap();
        assert_matches!(record, VersionedRecord::Draft(Draft { linked_id: Some(RecordId(9)), .. }));
    }

    #[test]
    fn published_rows_cannot_link_forward() {
        let err = VersionedRecord::try_from(stored(false, Some(9), true)).unwrap_err();
        assert_matches!(err, StoreError::InvalidRow(_));
    }

    #[test]
    fn published_rows_need_published_at() {
        assert!(VersionedRecord::try_from(stored(false, None, false)).is_err());
        let record = VersionedRecord::try_from(stored(false, None, true)).unwrap();
        assert!(record.is_published());
    }

    #[test]
    fn into_draft_rejects_published() {
        let record = VersionedRecord::try_from(stored(false, None, true)).unwrap();
        let err = record.into_draft("publish").unwrap_err();
        assert_matches!(err, VersioningError::InvalidState { operation: "publish", .. });
    }

    #[test]
    fn duplicate_drops_identity_and_link() {
        let VersionedRecord::Draft(draft) =
            VersionedRecord::try_from(stored(true, Some(9), true)).unwrap()
        else {
            panic!("expected a draft");
        };
        let later = draft.modified_at + TimeDelta::seconds(30);

        let copy = draft.duplicate(later);

        assert!(!copy.is_draft);
        assert_eq!(copy.linked_id, None);
        assert_eq!(copy.modified_at, later);
        assert_eq!(copy.published_at, draft.published_at);
        assert_eq!(copy.content, draft.content);
    }

    #[test]
    fn content_is_checked_against_fields() {
        let page = versioned_type("page", &["en"])
            .with_field(attr("slug"), AttributeType::Text, true, false)
            .with_field(attr("views"), AttributeType::Integer, false, false)
            .with_field(attr("title"), AttributeType::Text, true, true);

        let ok = Content::new().with(attr("slug"), "home");
        assert!(ok.validate(&page, false).is_ok());

        let wrong_type = Content::new().with(attr("slug"), "home").with(attr("views"), "many");
        assert_matches!(
            wrong_type.validate(&page, false),
            Err(ContentError::TypeMismatch { expected: AttributeType::Integer, .. })
        );

        let localized_in_record = Content::new().with(attr("slug"), "home").with(attr("title"), "Hi");
        assert_matches!(localized_in_record.validate(&page, false), Err(ContentError::UnknownField(_)));

        assert_matches!(Content::new().validate(&page, true), Err(ContentError::MissingRequiredField(_)));
        assert!(Content::new().with(attr("title"), "Hi").validate(&page, true).is_ok());
    }

    #[test]
    fn content_serializes_as_tagged_map() {
        let content = Content::new().with(attr("views"), 3i64);
        let json = serde_json::to_value(&content).unwrap();
        assert_eq!(json, serde_json::json!({ "views": { "type": "Integer", "value": 3 } }));
        let back: Content = serde_json::from_value(json).unwrap();
        assert_eq!(back, content);
    }
}
