use publisher_common::{
    CONTENT_FIELD_NAME, CREATED_FIELD_NAME, DOCUMENT_ID_FIELD_NAME, ID_FIELD_NAME,
    IS_DRAFT_FIELD_NAME, LINKED_ID_FIELD_NAME, LOCALE_FIELD_NAME, MODIFIED_FIELD_NAME,
    PUBLISHED_FIELD_NAME, RELATION_ID_FIELD_NAME, RecordType, RecordTypes,
    persistence::{RecordTables, RelationTable},
};

use crate::domain::tables::{Column, ColumnType, ForeignKeyConstraint, Index, OnDelete, Table};

pub mod migration;
pub mod persistence;
pub mod tables;

/// returns database tables for the registered record types, sorted conform dependency order:
/// main and localization tables first, relation tables last
pub fn record_types_into_tables(record_types: &dyn RecordTypes) -> Result<Vec<Table>, anyhow::Error> {
    let mut tables = Vec::new();
    let mut relation_tables = Vec::new();

    for record_type in record_types.iterate() {
        let record_tables = RecordTypeTables::new(record_type, record_types)?;
        tables.push(record_tables.main_table);
        if let Some(localization_table) = record_tables.localization_table {
            tables.push(localization_table);
        }
        relation_tables.extend(record_tables.relation_tables);
    }
    tables.extend(relation_tables);

    Ok(tables)
}

struct RecordTypeTables {
    pub main_table: Table,
    pub localization_table: Option<Table>,
    pub relation_tables: Vec<Table>,
}

impl RecordTypeTables {
    fn new(record_type: &RecordType, record_types: &dyn RecordTypes) -> Result<Self, anyhow::Error> {
        let names = RecordTables::from(record_type);

        let main_table = main_table(record_type, &names);
        let localization_table = record_type
            .has_localization()
            .then(|| localization_table(&names));

        let mut relation_tables = Vec::new();
        for relation in record_type.owned_relations() {
            let target = record_types.get(&relation.target).ok_or_else(|| {
                anyhow::anyhow!(
                    "relation '{}' of '{}' targets unknown type '{}'",
                    relation.id,
                    record_type.id,
                    relation.target
                )
            })?;
            relation_tables.push(relation_table(&RelationTable::new(record_type, relation, target)));
        }

        Ok(Self {
            main_table,
            localization_table,
            relation_tables,
        })
    }
}

fn main_table(record_type: &RecordType, names: &RecordTables) -> Table {
    let table_name = names.main_table_name.clone();
    let mut columns = vec![Column::primary_key(ID_FIELD_NAME, ColumnType::BigSerial, None)];
    let mut foreign_keys = Vec::new();
    let mut indexes = Vec::new();

    if record_type.is_versioned() {
        columns.push(Column::new(
            IS_DRAFT_FIELD_NAME,
            ColumnType::Boolean,
            None,
            true,
            false,
            Some("true"),
        ));
        // one published snapshot per draft
        columns.push(Column::new(
            LINKED_ID_FIELD_NAME,
            ColumnType::BigInt,
            None,
            false,
            true,
            None,
        ));
        foreign_keys.push(ForeignKeyConstraint::new(
            table_name.as_str(),
            LINKED_ID_FIELD_NAME,
            table_name.as_str(),
            ID_FIELD_NAME,
            OnDelete::SetNull,
        ));
        indexes.push(Index::new(table_name.as_str(), vec![IS_DRAFT_FIELD_NAME], false));
    }

    columns.push(Column::new(
        CREATED_FIELD_NAME,
        ColumnType::TimestampTZ,
        None,
        true,
        false,
        Some("now()"),
    ));
    columns.push(Column::new(
        MODIFIED_FIELD_NAME,
        ColumnType::TimestampTZ,
        None,
        true,
        false,
        Some("now()"),
    ));
    if record_type.is_versioned() {
        columns.push(Column::new(
            PUBLISHED_FIELD_NAME,
            ColumnType::TimestampTZ,
            None,
            false,
            false,
            None,
        ));
    }
    columns.push(content_column());

    Table::new(table_name, columns, foreign_keys, indexes)
}

fn localization_table(names: &RecordTables) -> Table {
    let table_name = names.localization_table_name.clone();
    let columns = vec![
        Column::primary_key(DOCUMENT_ID_FIELD_NAME, ColumnType::BigInt, None),
        Column::primary_key(LOCALE_FIELD_NAME, ColumnType::Varchar, Some(2)),
        content_column(),
    ];
    let fkey_constraint = ForeignKeyConstraint::new(
        table_name.as_str(),
        DOCUMENT_ID_FIELD_NAME,
        names.main_table_name.as_str(),
        ID_FIELD_NAME,
        OnDelete::Cascade,
    );
    let fkey_index = Index::new(table_name.as_str(), vec![DOCUMENT_ID_FIELD_NAME], false);

    Table::new(table_name, columns, vec![fkey_constraint], vec![fkey_index])
}

fn relation_table(relation: &RelationTable) -> Table {
    let table_name = relation.name.clone();
    let columns = vec![
        Column::primary_key(RELATION_ID_FIELD_NAME, ColumnType::BigSerial, None),
        Column::new(
            relation.owning_column_name.as_str(),
            ColumnType::BigInt,
            None,
            true,
            false,
            None,
        ),
        Column::new(
            relation.inverse_column_name.as_str(),
            ColumnType::BigInt,
            None,
            true,
            false,
            None,
        ),
    ];

    let foreign_keys = vec![
        ForeignKeyConstraint::new(
            table_name.as_str(),
            relation.owning_column_name.as_str(),
            relation.owner_table_name.as_str(),
            ID_FIELD_NAME,
            OnDelete::Cascade,
        ),
        ForeignKeyConstraint::new(
            table_name.as_str(),
            relation.inverse_column_name.as_str(),
            relation.target_table_name.as_str(),
            ID_FIELD_NAME,
            OnDelete::Cascade,
        ),
    ];

    // a one-to-many child belongs to a single owner
    let indexes = vec![
        Index::new(table_name.as_str(), vec![relation.owning_column_name.as_str()], false),
        Index::new(
            table_name.as_str(),
            vec![relation.inverse_column_name.as_str()],
            relation.exclusive,
        ),
    ];

    Table::new(table_name, columns, foreign_keys, indexes)
}

fn content_column() -> Column {
    Column::new(
        CONTENT_FIELD_NAME,
        ColumnType::Jsonb,
        None,
        true,
        false,
        Some("'{}'::jsonb"),
    )
}

#[cfg(test)]
mod tests {
    use publisher_common::RelationType;
    use publisher_common::test_utils::{SimpleRegistry, attr, child_type, type_id, versioned_type};

    use super::*;

    fn registry() -> &'static SimpleRegistry {
        let page = versioned_type("page", &["en"])
            .with_relation(attr("blocks"), RelationType::HasMany, type_id("block"))
            .with_relation(attr("tags"), RelationType::ManyToMany, type_id("tag"));
        SimpleRegistry::leak(vec![page, child_type("block"), child_type("tag")])
    }

    #[test]
    fn relation_tables_come_last() {
        let tables = record_types_into_tables(registry()).unwrap();
        let names: Vec<&str> = tables.iter().map(|table| table.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "page",
                "page_localization",
                "block",
                "tag",
                "page_blocks_relation",
                "page_tags_relation"
            ]
        );
    }

    #[test]
    fn versioned_tables_carry_a_unique_self_link() {
        let tables = record_types_into_tables(registry()).unwrap();
        let page = &tables[0];

        let linked = page
            .columns
            .iter()
            .find(|column| column.name == LINKED_ID_FIELD_NAME)
            .unwrap();
        assert!(linked.unique);
        assert!(!linked.not_null);

        let link_fk = &page.foreign_keys[0];
        assert_eq!(link_fk.referenced_table_name, "page");
        assert_eq!(link_fk.on_delete, OnDelete::SetNull);

        let is_draft = page
            .columns
            .iter()
            .find(|column| column.name == IS_DRAFT_FIELD_NAME)
            .unwrap();
        assert_eq!(is_draft.default_value.as_deref(), Some("true"));
    }

    #[test]
    fn child_tables_have_no_versioning_columns() {
        let tables = record_types_into_tables(registry()).unwrap();
        let block = tables.iter().find(|table| table.name == "block").unwrap();
        let names: Vec<&str> = block.columns.iter().map(|column| column.name.as_str()).collect();
        assert_eq!(names, vec!["id", "created_at", "modified_at", "content"]);
        assert!(block.foreign_keys.is_empty());
    }

    #[test]
    fn only_has_many_targets_are_unique() {
        let tables = record_types_into_tables(registry()).unwrap();
        let blocks = tables.iter().find(|table| table.name == "page_blocks_relation").unwrap();
        let tags = tables.iter().find(|table| table.name == "page_tags_relation").unwrap();
        assert!(blocks.indexes[1].unique);
        assert!(!tags.indexes[1].unique);
    }
}
