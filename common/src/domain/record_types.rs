use std::{borrow::Borrow, hash::Hash, sync::LazyLock};

use nutype::nutype;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::domain::{AttributeId, RecordTypeId};

/// A RecordType defines the structure of one kind of record
/// and the child collections it owns.
#[derive(Debug, Serialize)]
pub struct RecordType {
    pub id: RecordTypeId,
    pub kind: RecordKind,
    pub info: RecordTypeInfo,
    pub options: Option<RecordTypeOptions>,
    pub fields: Vec<FieldDefinition>,
    pub relations: Vec<OwnedRelation>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum RecordKind {
    Versioned, // has a draft and at most one published snapshot
    Child,     // owned by another record, duplicated on publish
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordTypeInfo {
    pub title: RecordTitle,
    pub singular_name: RecordTypeId,
    pub plural_name: RecordTypeId,
    pub description: Option<String>,
}

#[nutype(
    sanitize(trim),
    validate(not_empty),
    derive(
        Clone,
        Debug,
        Display,
        FromStr,
        AsRef,
        PartialEq,
        Eq,
        PartialOrd,
        Ord,
        Hash,
        Serialize,
        Deserialize
    )
)]
pub struct RecordTitle(String);

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecordTypeOptions {
    pub localizations: Vec<LocalizationId>,
}

static VALID_LOCALIZATIONS_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("^[a-z]{2}$").unwrap());

#[nutype(
    sanitize(trim, lowercase),
    validate(not_empty, len_char_min = 2, len_char_max = 2, regex = VALID_LOCALIZATIONS_REGEX),
    derive(
        Clone,
        Debug,
        Display,
        FromStr,
        AsRef,
        PartialEq,
        Eq,
        PartialOrd,
        Ord,
        Hash,
        Serialize,
        Deserialize
    )
)]
pub struct LocalizationId(String);

/// A declared content field of a record type.
#[derive(Debug, Clone, Serialize)]
pub struct FieldDefinition {
    pub id: AttributeId,
    pub attribute_type: AttributeType,
    pub required: bool,
    /// localized fields live in translation rows, not in the record itself
    pub localized: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AttributeType {
    Text,
    Integer,
    Decimal,
    Boolean,
    Date,
    DateTime,
    Json,
}

/// A child collection owned by a record type.
#[derive(Debug, Clone, Serialize)]
pub struct OwnedRelation {
    pub id: AttributeId,
    pub relation_type: RelationType,
    pub target: RecordTypeId,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RelationType {
    /// one-to-many: every child row belongs to exactly one owner
    HasMany,
    /// many-to-many: owners reach their children through join rows
    ManyToMany,
}

// implementations

impl RecordType {
    pub fn is_versioned(&self) -> bool {
        self.kind == RecordKind::Versioned
    }

    pub fn has_localization(&self) -> bool {
        self.options
            .as_ref()
            .map_or(false, |options| !options.localizations.is_empty())
    }

    pub fn supports_locale(&self, locale: &LocalizationId) -> bool {
        self.options
            .as_ref()
            .map_or(false, |options| options.localizations.contains(locale))
    }

    pub fn field(&self, id: &AttributeId) -> Option<&FieldDefinition> {
        self.fields.iter().find(|field| &field.id == id)
    }

    pub fn relation(&self, id: &AttributeId) -> Option<&OwnedRelation> {
        self.relations.iter().find(|relation| &relation.id == id)
    }

    /// Owned relations in traversal order: one-to-many relations first,
    /// then many-to-many, each group in declaration order.
    pub fn owned_relations(&self) -> impl Iterator<Item = &OwnedRelation> {
        let has_many = self
            .relations
            .iter()
            .filter(|relation| relation.relation_type == RelationType::HasMany);
        let many_to_many = self
            .relations
            .iter()
            .filter(|relation| relation.relation_type == RelationType::ManyToMany);
        has_many.chain(many_to_many)
    }
}

impl RecordType {
    pub fn new(id: RecordTypeId, kind: RecordKind, info: RecordTypeInfo) -> Self {
        Self {
            id,
            kind,
            info,
            options: None,
            fields: Vec::new(),
            relations: Vec::new(),
        }
    }

    pub fn with_localizations(mut self, localizations: Vec<LocalizationId>) -> Self {
        self.options = Some(RecordTypeOptions { localizations });
        self
    }

    pub fn with_field(
        mut self,
        id: AttributeId,
        attribute_type: AttributeType,
        required: bool,
        localized: bool,
    ) -> Self {
        self.fields.push(FieldDefinition {
            id,
            attribute_type,
            required,
            localized,
        });
        self
    }

    pub fn with_relation(
        mut self,
        id: AttributeId,
        relation_type: RelationType,
        target: RecordTypeId,
    ) -> Self {
        self.relations.push(OwnedRelation {
            id,
            relation_type,
            target,
        });
        self
    }
}

impl PartialEq for RecordType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}
impl Eq for RecordType {}

impl PartialEq<RecordTypeId> for RecordType {
    fn eq(&self, other: &RecordTypeId) -> bool {
        self.id == *other
    }
}

impl Borrow<RecordTypeId> for &RecordType {
    fn borrow(&self) -> &RecordTypeId {
        &self.id
    }
}

impl Hash for RecordType {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl RelationType {
    /// Every child reachable through this relation has a single owner.
    pub fn is_exclusive(&self) -> bool {
        matches!(self, RelationType::HasMany)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{attr, child_type, type_id, versioned_type};

    #[test]
    fn owned_relations_put_has_many_first() {
        let page = versioned_type("page", &[])
            .with_relation(attr("tags"), RelationType::ManyToMany, type_id("tag"))
            .with_relation(attr("blocks"), RelationType::HasMany, type_id("block"));

        let order: Vec<&str> = page.owned_relations().map(|r| r.id.as_ref()).collect();
        assert_eq!(order, vec!["blocks", "tags"]);
    }

    #[test]
    fn localization_ids_are_two_letters() {
        assert!(LocalizationId::try_new("EN").is_ok());
        assert!(LocalizationId::try_new("eng").is_err());
        assert!(LocalizationId::try_new("e1").is_err());
    }

    #[test]
    fn supports_only_declared_locales() {
        let page = versioned_type("page", &["en", "ro"]);
        assert!(page.has_localization());
        assert!(page.supports_locale(&LocalizationId::try_new("ro").unwrap()));
        assert!(!page.supports_locale(&LocalizationId::try_new("ru").unwrap()));
        assert!(!child_type("block").has_localization());
    }
}
