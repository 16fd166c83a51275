use publisher_common::{
    CONTENT_FIELD_NAME, CREATED_FIELD_NAME, DOCUMENT_ID_FIELD_NAME, ID_FIELD_NAME,
    IS_DRAFT_FIELD_NAME, LINKED_ID_FIELD_NAME, LOCALE_FIELD_NAME, MODIFIED_FIELD_NAME,
    PUBLISHED_FIELD_NAME, RELATION_ID_FIELD_NAME,
    persistence::{RelationTable, qualified},
};

/// Statements over the main table of a versioned record type.
/// Table names are expected to be schema-qualified already.
pub(crate) struct RecordStatements<'a> {
    pub table: &'a str,
}

impl RecordStatements<'_> {
    fn columns() -> String {
        [
            ID_FIELD_NAME,
            IS_DRAFT_FIELD_NAME,
            LINKED_ID_FIELD_NAME,
            CREATED_FIELD_NAME,
            MODIFIED_FIELD_NAME,
            PUBLISHED_FIELD_NAME,
            CONTENT_FIELD_NAME,
        ]
        .join(", ")
    }

    pub fn insert(&self) -> String {
        format!(
            "INSERT INTO {} ({}, {}, {}, {}, {}, {}) VALUES ($1, $2, $3, $4, $5, $6) RETURNING {}",
            self.table,
            IS_DRAFT_FIELD_NAME,
            LINKED_ID_FIELD_NAME,
            CREATED_FIELD_NAME,
            MODIFIED_FIELD_NAME,
            PUBLISHED_FIELD_NAME,
            CONTENT_FIELD_NAME,
            Self::columns()
        )
    }

    pub fn select_by_id(&self) -> String {
        format!(
            "SELECT {} FROM {} WHERE {} = $1",
            Self::columns(),
            self.table,
            ID_FIELD_NAME
        )
    }

    pub fn select_by_link(&self) -> String {
        format!(
            "SELECT {} FROM {} WHERE {} = $1",
            Self::columns(),
            self.table,
            LINKED_ID_FIELD_NAME
        )
    }

    pub fn select_by_state(&self) -> String {
        format!(
            "SELECT {} FROM {} WHERE {} = $1 ORDER BY {}",
            Self::columns(),
            self.table,
            IS_DRAFT_FIELD_NAME,
            ID_FIELD_NAME
        )
    }

    /// `$7` is the link the row is expected to hold.
    pub fn update(&self) -> String {
        format!(
            "UPDATE {} SET {} = $2, {} = $3, {} = $4, {} = $5, {} = $6 \
             WHERE {} = $1 AND {} IS NOT DISTINCT FROM $7",
            self.table,
            IS_DRAFT_FIELD_NAME,
            LINKED_ID_FIELD_NAME,
            MODIFIED_FIELD_NAME,
            PUBLISHED_FIELD_NAME,
            CONTENT_FIELD_NAME,
            ID_FIELD_NAME,
            LINKED_ID_FIELD_NAME
        )
    }

    pub fn exists(&self) -> String {
        format!("SELECT 1 FROM {} WHERE {} = $1", self.table, ID_FIELD_NAME)
    }

    pub fn delete(&self) -> String {
        format!("DELETE FROM {} WHERE {} = $1", self.table, ID_FIELD_NAME)
    }
}

/// Statements over the table of a child record type.
pub(crate) struct ChildStatements<'a> {
    pub table: &'a str,
}

impl ChildStatements<'_> {
    fn columns() -> String {
        [
            ID_FIELD_NAME,
            CREATED_FIELD_NAME,
            MODIFIED_FIELD_NAME,
            CONTENT_FIELD_NAME,
        ]
        .join(", ")
    }

    pub fn insert(&self) -> String {
        format!(
            "INSERT INTO {} ({}, {}, {}) VALUES ($1, $2, $3) RETURNING {}",
            self.table,
            CREATED_FIELD_NAME,
            MODIFIED_FIELD_NAME,
            CONTENT_FIELD_NAME,
            ID_FIELD_NAME
        )
    }

    pub fn select_by_id(&self) -> String {
        format!(
            "SELECT {} FROM {} WHERE {} = $1",
            Self::columns(),
            self.table,
            ID_FIELD_NAME
        )
    }

    pub fn update(&self) -> String {
        format!(
            "UPDATE {} SET {} = $2, {} = $3 WHERE {} = $1",
            self.table, MODIFIED_FIELD_NAME, CONTENT_FIELD_NAME, ID_FIELD_NAME
        )
    }

    pub fn delete(&self) -> String {
        format!("DELETE FROM {} WHERE {} = $1", self.table, ID_FIELD_NAME)
    }
}

/// Statements over a relation table, joined with the child table it targets.
pub(crate) struct RelationStatements<'a> {
    pub schema: &'a str,
    pub relation: &'a RelationTable,
}

impl RelationStatements<'_> {
    fn table(&self) -> String {
        qualified(self.schema, &self.relation.name)
    }

    /// Children of one owner in attachment order.
    pub fn select_children(&self) -> String {
        format!(
            "SELECT c.{}, c.{}, c.{}, c.{} FROM {} c JOIN {} r ON r.{} = c.{} \
             WHERE r.{} = $1 ORDER BY r.{}",
            ID_FIELD_NAME,
            CREATED_FIELD_NAME,
            MODIFIED_FIELD_NAME,
            CONTENT_FIELD_NAME,
            qualified(self.schema, &self.relation.target_table_name),
            self.table(),
            self.relation.inverse_column_name,
            ID_FIELD_NAME,
            self.relation.owning_column_name,
            RELATION_ID_FIELD_NAME
        )
    }

    pub fn select_owner(&self) -> String {
        format!(
            "SELECT {} FROM {} WHERE {} = $1 ORDER BY {} LIMIT 1",
            self.relation.owning_column_name,
            self.table(),
            self.relation.inverse_column_name,
            RELATION_ID_FIELD_NAME
        )
    }

    pub fn attach(&self) -> String {
        format!(
            "INSERT INTO {} ({}, {}) VALUES ($1, $2)",
            self.table(),
            self.relation.owning_column_name,
            self.relation.inverse_column_name
        )
    }

    pub fn detach(&self) -> String {
        format!(
            "DELETE FROM {} WHERE {} = $1 AND {} = $2",
            self.table(),
            self.relation.owning_column_name,
            self.relation.inverse_column_name
        )
    }
}

/// Statements over the localization table of a versioned record type.
pub(crate) struct TranslationStatements<'a> {
    pub table: &'a str,
}

impl TranslationStatements<'_> {
    pub fn select_by_master(&self) -> String {
        format!(
            "SELECT {}, {}, {} FROM {} WHERE {} = $1 ORDER BY {}",
            DOCUMENT_ID_FIELD_NAME,
            LOCALE_FIELD_NAME,
            CONTENT_FIELD_NAME,
            self.table,
            DOCUMENT_ID_FIELD_NAME,
            LOCALE_FIELD_NAME
        )
    }

    pub fn upsert(&self) -> String {
        format!(
            "INSERT INTO {} ({}, {}, {}) VALUES ($1, $2, $3) \
             ON CONFLICT ({}, {}) DO UPDATE SET {} = EXCLUDED.{}",
            self.table,
            DOCUMENT_ID_FIELD_NAME,
            LOCALE_FIELD_NAME,
            CONTENT_FIELD_NAME,
            DOCUMENT_ID_FIELD_NAME,
            LOCALE_FIELD_NAME,
            CONTENT_FIELD_NAME,
            CONTENT_FIELD_NAME
        )
    }
}

#[cfg(test)]
mod tests {
    use publisher_common::RelationType;
    use publisher_common::test_utils::{attr, child_type, type_id, versioned_type};

    use super::*;

    #[test]
    fn record_update_compares_the_link() {
        let statements = RecordStatements {
            table: "\"public\".\"page\"",
        };
        assert_eq!(
            statements.update(),
            "UPDATE \"public\".\"page\" SET is_draft = $2, linked_id = $3, modified_at = $4, \
             published_at = $5, content = $6 WHERE id = $1 AND linked_id IS NOT DISTINCT FROM $7"
        );
    }

    #[test]
    fn record_insert_returns_the_row() {
        let statements = RecordStatements { table: "page" };
        assert_eq!(
            statements.insert(),
            "INSERT INTO page (is_draft, linked_id, created_at, modified_at, published_at, content) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING id, is_draft, linked_id, created_at, modified_at, published_at, content"
        );
    }

    #[test]
    fn children_are_selected_in_attachment_order() {
        let page = versioned_type("page", &[]).with_relation(
            attr("blocks"),
            RelationType::HasMany,
            type_id("block"),
        );
        let block = child_type("block");
        let relation = RelationTable::new(&page, page.relation(&attr("blocks")).unwrap(), &block);
        let statements = RelationStatements {
            schema: "public",
            relation: &relation,
        };

        assert_eq!(
            statements.select_children(),
            "SELECT c.id, c.created_at, c.modified_at, c.content FROM \"public\".\"block\" c \
             JOIN \"public\".\"page_blocks_relation\" r ON r.block_id = c.id \
             WHERE r.page_id = $1 ORDER BY r.relation_id"
        );
        assert_eq!(
            statements.select_owner(),
            "SELECT page_id FROM \"public\".\"page_blocks_relation\" WHERE block_id = $1 \
             ORDER BY relation_id LIMIT 1"
        );
        assert_eq!(
            statements.detach(),
            "DELETE FROM \"public\".\"page_blocks_relation\" WHERE page_id = $1 AND block_id = $2"
        );
    }

    #[test]
    fn translations_are_upserted_per_locale() {
        let statements = TranslationStatements {
            table: "page_localization",
        };
        assert_eq!(
            statements.upsert(),
            "INSERT INTO page_localization (document_id, locale, content) VALUES ($1, $2, $3) \
             ON CONFLICT (document_id, locale) DO UPDATE SET content = EXCLUDED.content"
        );
    }
}
