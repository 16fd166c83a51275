use std::collections::{HashMap, HashSet};
use std::path::Path;

use anyhow::{Context, anyhow, bail};
use serde::Deserialize;

use crate::domain::{
    AttributeId, RecordTypeId, RecordTypes,
    record_types::{
        AttributeType, LocalizationId, LocalizationIdError, RecordKind, RecordTitle, RecordType,
        RecordTypeInfo, RelationType,
    },
};

/// Registry of record types loaded from the schema directory or built in code.
///
/// Types are leaked on construction: a registry lives for the whole process.
#[derive(Debug)]
pub struct RecordTypesAdapter {
    types: Vec<&'static RecordType>,
}

impl RecordTypes for RecordTypesAdapter {
    fn iterate(&self) -> Box<dyn Iterator<Item = &'static RecordType> + '_> {
        Box::new(self.types.iter().copied())
    }

    fn get(&self, id: &RecordTypeId) -> Option<&'static RecordType> {
        self.types.iter().copied().find(|record_type| &record_type.id == id)
    }
}

impl RecordTypesAdapter {
    /// Validate and register the given record types.
    pub fn new(mut types: Vec<RecordType>) -> Result<Self, anyhow::Error> {
        types.sort_by(|a, b| a.id.cmp(&b.id));
        validate(&types)?;
        let types = types
            .into_iter()
            .map(|record_type| &*Box::leak(Box::new(record_type)))
            .collect();
        Ok(Self { types })
    }
}

/// Load every `*.json` record type declaration found in `schema_config_path`.
pub fn load(schema_config_path: &str) -> Result<&'static RecordTypesAdapter, anyhow::Error> {
    use std::fs;

    let dir_path = Path::new(schema_config_path);

    tracing::debug!("Loading record types from {}", dir_path.to_string_lossy());

    let entries = fs::read_dir(dir_path).with_context(|| {
        format!(
            "failed to read schema config directory: {}",
            dir_path.to_string_lossy()
        )
    })?;

    let mut types = Vec::new();
    for entry_res in entries {
        let entry = entry_res.map_err(|e| anyhow!("failed to read a directory entry: {}", e))?;
        let path = entry.path();
        if path.is_file() && is_json(&path) {
            types.push(load_record_type(&path)?);
        }
    }

    tracing::info!(count = types.len(), "record types loaded");

    let adapter = RecordTypesAdapter::new(types)?;
    Ok(Box::leak(Box::new(adapter)))
}

fn load_record_type(path: &Path) -> Result<RecordType, anyhow::Error> {
    use std::fs;

    let path_str = path.to_string_lossy().into_owned();

    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read record type config file '{}'", path_str))?;

    let record = serde_json::from_str::<RecordTypeRecord>(&content)
        .with_context(|| format!("failed to parse JSON record type config '{}'", path_str))?;

    record
        .try_into()
        .with_context(|| format!("invalid record type config '{}'", path_str))
}

fn is_json(path: &Path) -> bool {
    path.extension().map(|ext| ext == "json").unwrap_or(false)
}

fn validate(types: &[RecordType]) -> Result<(), anyhow::Error> {
    let mut index: HashMap<&RecordTypeId, &RecordType> = HashMap::new();
    for record_type in types {
        if index.insert(&record_type.id, record_type).is_some() {
            bail!("record type '{}' is declared twice", record_type.id);
        }
    }

    for record_type in types {
        if record_type.has_localization() && !record_type.is_versioned() {
            bail!(
                "record type '{}': only versioned types can declare localizations",
                record_type.id
            );
        }

        let mut attribute_ids: HashSet<&AttributeId> = HashSet::new();
        for field in record_type.fields.iter() {
            if !attribute_ids.insert(&field.id) {
                bail!("record type '{}': attribute '{}' is declared twice", record_type.id, field.id);
            }
            if field.localized && !record_type.has_localization() {
                bail!(
                    "record type '{}': field '{}' is localized but the type has no localizations",
                    record_type.id,
                    field.id
                );
            }
        }

        for relation in record_type.relations.iter() {
            if !attribute_ids.insert(&relation.id) {
                bail!(
                    "record type '{}': attribute '{}' is declared twice",
                    record_type.id,
                    relation.id
                );
            }
            let target = index.get(&relation.target).ok_or_else(|| {
                anyhow!(
                    "record type '{}': relation '{}' targets unknown type '{}'",
                    record_type.id,
                    relation.id,
                    relation.target
                )
            })?;
            if target.kind != RecordKind::Child {
                bail!(
                    "record type '{}': relation '{}' must target a child type, '{}' is versioned",
                    record_type.id,
                    relation.id,
                    relation.target
                );
            }
            if target.id == record_type.id {
                bail!(
                    "record type '{}': relation '{}' cannot target its own type",
                    record_type.id,
                    relation.id
                );
            }
        }
    }

    for record_type in types {
        let mut path = Vec::new();
        check_acyclic(record_type, &index, &mut path)?;
    }

    Ok(())
}

// depth-first walk over owned relations; the owned graph must be a DAG
fn check_acyclic<'a>(
    record_type: &'a RecordType,
    index: &HashMap<&RecordTypeId, &'a RecordType>,
    path: &mut Vec<&'a RecordTypeId>,
) -> Result<(), anyhow::Error> {
    if path.contains(&&record_type.id) {
        let cycle: Vec<String> = path.iter().map(|id| id.to_string()).collect();
        bail!(
            "owned relations form a cycle: {} -> {}",
            cycle.join(" -> "),
            record_type.id
        );
    }
    path.push(&record_type.id);
    for relation in record_type.relations.iter() {
        if let Some(target) = index.get(&relation.target) {
            check_acyclic(*target, index, path)?;
        }
    }
    path.pop();
    Ok(())
}

// internal structs for Deserializing

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecordTypeRecord<'a> {
    id: &'a str,
    kind: RecordKind,
    #[serde(borrow)]
    info: RecordTypeInfoRecord<'a>,
    #[serde(borrow)]
    options: Option<RecordTypeOptionsRecord<'a>>,
    #[serde(default, borrow)]
    fields: Vec<FieldRecord<'a>>,
    #[serde(default, borrow)]
    relations: Vec<RelationRecord<'a>>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecordTypeInfoRecord<'a> {
    title: &'a str,
    singular_name: &'a str,
    plural_name: &'a str,
    description: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecordTypeOptionsRecord<'a> {
    #[serde(default, borrow)]
    localizations: Vec<&'a str>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FieldRecord<'a> {
    id: &'a str,
    #[serde(alias = "type")]
    attribute_type: AttributeType,
    #[serde(default)]
    required: bool,
    #[serde(default)]
    localized: bool,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RelationRecord<'a> {
    id: &'a str,
    relation: RelationType,
    target: &'a str,
}

// conversion into record type model

impl<'a> TryFrom<RecordTypeRecord<'a>> for RecordType {
    type Error = anyhow::Error;

    fn try_from(value: RecordTypeRecord<'a>) -> Result<Self, Self::Error> {
        let id = RecordTypeId::try_new(value.id)?;
        let info = RecordTypeInfo::try_from(value.info)?;
        let mut record_type = RecordType::new(id, value.kind, info);

        if let Some(options) = value.options {
            let localizations: Result<Vec<LocalizationId>, LocalizationIdError> = options
                .localizations
                .into_iter()
                .map(LocalizationId::try_new)
                .collect();
            record_type = record_type.with_localizations(localizations?);
        }

        for field in value.fields {
            record_type = record_type.with_field(
                AttributeId::try_new(field.id)?,
                field.attribute_type,
                field.required,
                field.localized,
            );
        }

        for relation in value.relations {
            record_type = record_type.with_relation(
                AttributeId::try_new(relation.id)?,
                relation.relation,
                RecordTypeId::try_new(relation.target)?,
            );
        }

        Ok(record_type)
    }
}

impl<'a> TryFrom<RecordTypeInfoRecord<'a>> for RecordTypeInfo {
    type Error = anyhow::Error;

    fn try_from(value: RecordTypeInfoRecord<'a>) -> Result<Self, Self::Error> {
        let title = RecordTitle::try_new(value.title)?;
        let singular_name = RecordTypeId::try_new(value.singular_name)?;
        let plural_name = RecordTypeId::try_new(value.plural_name)?;

        Ok(Self {
            title,
            singular_name,
            plural_name,
            description: value.description,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::test_utils::{attr, child_type, type_id, versioned_type};

    const PAGE: &str = r#"{
        "id": "page",
        "kind": "versioned",
        "info": { "title": "Page", "singularName": "page", "pluralName": "pages" },
        "options": { "localizations": ["en", "ro"] },
        "fields": [
            { "id": "title", "type": "Text", "required": true, "localized": true },
            { "id": "slug", "type": "Text", "required": true }
        ],
        "relations": [
            { "id": "blocks", "relation": "hasMany", "target": "block" },
            { "id": "tags", "relation": "manyToMany", "target": "tag" }
        ]
    }"#;

    const BLOCK: &str = r#"{
        "id": "block",
        "kind": "child",
        "info": { "title": "Block", "singularName": "block", "pluralName": "blocks" },
        "fields": [ { "id": "body", "type": "Text" } ]
    }"#;

    const TAG: &str = r#"{
        "id": "tag",
        "kind": "child",
        "info": { "title": "Tag", "singularName": "tag", "pluralName": "tags" }
    }"#;

    #[test]
    fn loads_schema_directory() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("page.json"), PAGE).unwrap();
        fs::write(dir.path().join("block.json"), BLOCK).unwrap();
        fs::write(dir.path().join("tag.json"), TAG).unwrap();
        fs::write(dir.path().join("README.md"), "ignored").unwrap();

        let registry = load(dir.path().to_str().unwrap()).unwrap();

        assert_eq!(registry.iterate().count(), 3);
        let page = registry.get(&type_id("page")).unwrap();
        assert!(page.is_versioned());
        assert_eq!(page.relations.len(), 2);
        assert_eq!(
            page.relation(&attr("tags")).unwrap().relation_type,
            RelationType::ManyToMany
        );
        assert!(page.field(&attr("title")).unwrap().localized);
    }

    #[test]
    fn rejects_unknown_relation_target() {
        let page = versioned_type("page", &[]).with_relation(
            attr("blocks"),
            RelationType::HasMany,
            type_id("block"),
        );
        let err = RecordTypesAdapter::new(vec![page]).unwrap_err();
        assert!(err.to_string().contains("unknown type 'block'"));
    }

    #[test]
    fn rejects_versioned_relation_target() {
        let page = versioned_type("page", &[]).with_relation(
            attr("other"),
            RelationType::HasMany,
            type_id("post"),
        );
        let post = versioned_type("post", &[]);
        assert!(RecordTypesAdapter::new(vec![page, post]).is_err());
    }

    #[test]
    fn rejects_cyclic_ownership() {
        let a = child_type("a").with_relation(attr("bs"), RelationType::HasMany, type_id("b"));
        let b = child_type("b").with_relation(attr("as"), RelationType::ManyToMany, type_id("a"));
        let page = versioned_type("page", &[]).with_relation(
            attr("items"),
            RelationType::HasMany,
            type_id("a"),
        );
        let err = RecordTypesAdapter::new(vec![page, a, b]).unwrap_err();
        assert!(err.to_string().contains("cycle"));
    }

    #[test]
    fn rejects_localized_child_types() {
        let mut block = child_type("block");
        block = block.with_localizations(vec![crate::test_utils::locale("en")]);
        assert!(RecordTypesAdapter::new(vec![block]).is_err());
    }
}
