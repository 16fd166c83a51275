use crate::{OwnedRelation, RecordType};

/// Table names of one record type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordTables {
    pub main_table_name: String,
    pub localization_table_name: String,
    /// name of the column pointing at this record type from a relation table
    pub relation_column_name: String,
}

/// A relation table joining an owner record type with its owned children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationTable {
    pub name: String,
    pub owner_table_name: String,
    pub owning_column_name: String,
    pub target_table_name: String,
    pub inverse_column_name: String,
    /// one-to-many relation tables allow each target row only once
    pub exclusive: bool,
}

impl From<&RecordType> for RecordTables {
    fn from(value: &RecordType) -> Self {
        let main_table_name = value.id.normalized();
        let localization_table_name = format!("{}_localization", main_table_name);
        let relation_column_name = format!("{}_id", value.info.singular_name.normalized());
        Self {
            main_table_name,
            localization_table_name,
            relation_column_name,
        }
    }
}

impl RelationTable {
    pub fn new(owner: &RecordType, relation: &OwnedRelation, target: &RecordType) -> Self {
        let owner_tables = RecordTables::from(owner);
        let target_tables = RecordTables::from(target);
        let name = format!(
            "{}_{}_relation",
            owner_tables.main_table_name,
            relation.id.normalized()
        );
        Self {
            name,
            owner_table_name: owner_tables.main_table_name,
            owning_column_name: owner_tables.relation_column_name,
            target_table_name: target_tables.main_table_name,
            inverse_column_name: target_tables.relation_column_name,
            exclusive: relation.relation_type.is_exclusive(),
        }
    }
}

/// Quote a table name with the database schema, e.g. `"public"."page"`.
pub fn qualified(schema: &str, table_name: &str) -> String {
    format!("\"{}\".\"{}\"", schema, table_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RelationType;
    use crate::test_utils::{attr, child_type, type_id, versioned_type};

    #[test]
    fn relation_table_is_named_after_owner_and_relation() {
        let block = child_type("content-block");
        let page = versioned_type("page", &[]).with_relation(
            attr("blocks"),
            RelationType::HasMany,
            type_id("content-block"),
        );
        let relation = page.relation(&attr("blocks")).unwrap();

        let table = RelationTable::new(&page, relation, &block);

        assert_eq!(table.name, "page_blocks_relation");
        assert_eq!(table.owning_column_name, "page_id");
        assert_eq!(table.target_table_name, "content_block");
        assert_eq!(table.inverse_column_name, "content_block_id");
        assert!(table.exclusive);
    }

    #[test]
    fn localization_table_follows_main_table() {
        let tables = RecordTables::from(&versioned_type("news-item", &["en"]));
        assert_eq!(tables.main_table_name, "news_item");
        assert_eq!(tables.localization_table_name, "news_item_localization");
        assert_eq!(
            qualified("public", &tables.main_table_name),
            "\"public\".\"news_item\""
        );
    }
}
