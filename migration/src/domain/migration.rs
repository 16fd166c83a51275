use publisher_common::RecordTypes;

use crate::domain::{
    persistence::Persistence,
    record_types_into_tables,
    tables::{Column, ForeignKeyConstraint, Index, Table},
};

/// Brings the database schema in line with the configured record types.
/// Only missing tables are created; existing ones are left untouched.
pub struct Migration<P: Persistence> {
    record_types: &'static dyn RecordTypes,
    persistence: P,
}

impl<P: Persistence> Migration<P> {
    pub fn new(record_types: &'static dyn RecordTypes, persistence: P) -> Self {
        Self {
            record_types,
            persistence,
        }
    }

    pub async fn migrate(&self) -> Result<usize, anyhow::Error> {
        let steps = self.migration_steps().await?;
        let count = steps.len();
        self.persistence.apply_migration_steps(steps).await?;
        Ok(count)
    }

    async fn migration_steps(&self) -> Result<Vec<CreateTableStep>, anyhow::Error> {
        let needed_schema = record_types_into_tables(self.record_types)?;
        let actual_schema = self.persistence.load().await?;
        let database_schema = self.persistence.database_schema();

        let steps = needed_schema
            .iter()
            .filter(|table| !actual_schema.contains(&table.name))
            .map(|table| CreateTableStep::new(database_schema, table))
            .collect();

        Ok(steps)
    }
}

pub trait MigrationStep: Send {
    fn ctx(&self) -> &'static str;
    fn ddls(self) -> Vec<String>;
}

pub struct CreateTableStep {
    ddls: Vec<String>,
}

impl CreateTableStep {
    pub fn new(database_schema: &str, table: &Table) -> Self {
        let ddls = create_table_ddl(database_schema, table);
        Self { ddls }
    }
}

impl MigrationStep for CreateTableStep {
    fn ctx(&self) -> &'static str {
        "CREATE TABLE"
    }

    fn ddls(self) -> Vec<String> {
        self.ddls
    }
}

fn create_table_ddl(schema: &str, table: &Table) -> Vec<String> {
    let mut columns = Vec::new();
    let mut pk_columns = Vec::new();

    for column in table.columns.iter() {
        columns.push(column_ddl(column));
        if column.primary_key {
            pk_columns.push(format!("\"{}\"", column.name));
        }
    }

    let columns_sql = columns.join(",\n    ");
    let pk_columns_sql = pk_columns.join(", ");

    let table_ddl = format!(
        "CREATE TABLE \"{}\".\"{}\" (\n    {},\n    PRIMARY KEY({})\n)",
        schema, table.name, columns_sql, pk_columns_sql
    );

    let mut ddls = vec![table_ddl];

    for fk in table.foreign_keys.iter() {
        ddls.push(create_fk_ddl(schema, fk));
    }

    for index in table.indexes.iter() {
        ddls.push(create_index_ddl(schema, index));
    }

    ddls
}

fn column_ddl(column: &Column) -> String {
    let mut sql = format!("\"{}\" {}", column.name, column.column_type);
    if let Some(size) = column.size {
        sql.push_str(&format!("({})", size));
    }
    if column.not_null {
        sql.push_str(" NOT NULL");
    }
    if let Some(default_value) = &column.default_value {
        sql.push_str(&format!(" DEFAULT {}", default_value));
    }
    if column.unique {
        sql.push_str(" UNIQUE");
    }
    sql
}

fn create_fk_ddl(schema: &str, fk: &ForeignKeyConstraint) -> String {
    format!(
        "ALTER TABLE \"{}\".\"{}\" ADD CONSTRAINT \"{}_{}_fkey\" FOREIGN KEY (\"{}\") REFERENCES \"{}\".\"{}\" (\"{}\") ON DELETE {}",
        schema,
        fk.table_name,
        fk.table_name,
        fk.column_name,
        fk.column_name,
        schema,
        fk.referenced_table_name,
        fk.referenced_column_name,
        fk.on_delete
    )
}

fn create_index_ddl(schema: &str, index: &Index) -> String {
    let columns_sql = index
        .columns
        .iter()
        .map(|column| format!("\"{}\"", column))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "CREATE {}INDEX \"{}_{}_idx\" ON \"{}\".\"{}\" ({})",
        if index.unique { "UNIQUE " } else { "" },
        index.table_name,
        index.columns.join("_"),
        schema,
        index.table_name,
        columns_sql
    )
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::{Arc, Mutex};

    use publisher_common::RelationType;
    use publisher_common::test_utils::{SimpleRegistry, attr, child_type, type_id, versioned_type};

    use super::*;

    #[derive(Clone, Default)]
    struct RecordingPersistence {
        existing: HashSet<String>,
        applied: Arc<Mutex<Vec<String>>>,
    }

    impl Persistence for RecordingPersistence {
        async fn load(&self) -> Result<HashSet<String>, anyhow::Error> {
            Ok(self.existing.clone())
        }

        async fn apply_migration_steps(
            &self,
            steps: Vec<impl MigrationStep>,
        ) -> Result<(), anyhow::Error> {
            let mut applied = self.applied.lock().unwrap();
            for step in steps {
                applied.extend(step.ddls());
            }
            Ok(())
        }

        fn database_schema(&self) -> &str {
            "public"
        }
    }

    fn registry() -> &'static SimpleRegistry {
        let page = versioned_type("page", &["en"]).with_relation(
            attr("blocks"),
            RelationType::HasMany,
            type_id("block"),
        );
        SimpleRegistry::leak(vec![page, child_type("block")])
    }

    #[test]
    fn versioned_table_ddl() {
        let tables = record_types_into_tables(registry()).unwrap();
        let ddls = create_table_ddl("public", &tables[0]);

        assert_eq!(
            ddls[0],
            "CREATE TABLE \"public\".\"page\" (\n    \
             \"id\" BIGSERIAL,\n    \
             \"is_draft\" BOOLEAN NOT NULL DEFAULT true,\n    \
             \"linked_id\" BIGINT UNIQUE,\n    \
             \"created_at\" TIMESTAMPTZ NOT NULL DEFAULT now(),\n    \
             \"modified_at\" TIMESTAMPTZ NOT NULL DEFAULT now(),\n    \
             \"published_at\" TIMESTAMPTZ,\n    \
             \"content\" JSONB NOT NULL DEFAULT '{}'::jsonb,\n    \
             PRIMARY KEY(\"id\")\n)"
        );
        assert_eq!(
            ddls[1],
            "ALTER TABLE \"public\".\"page\" ADD CONSTRAINT \"page_linked_id_fkey\" \
             FOREIGN KEY (\"linked_id\") REFERENCES \"public\".\"page\" (\"id\") ON DELETE SET NULL"
        );
        assert_eq!(
            ddls[2],
            "CREATE INDEX \"page_is_draft_idx\" ON \"public\".\"page\" (\"is_draft\")"
        );
    }

    #[test]
    fn localization_table_has_composite_key() {
        let tables = record_types_into_tables(registry()).unwrap();
        let ddls = create_table_ddl("public", &tables[1]);

        assert!(ddls[0].contains("\"locale\" VARCHAR(2),"));
        assert!(ddls[0].ends_with("PRIMARY KEY(\"document_id\", \"locale\")\n)"));
        assert!(ddls[1].ends_with("ON DELETE CASCADE"));
    }

    #[test]
    fn unique_index_ddl() {
        let index = Index::new("page_blocks_relation", vec!["block_id"], true);
        assert_eq!(
            create_index_ddl("cms", &index),
            "CREATE UNIQUE INDEX \"page_blocks_relation_block_id_idx\" \
             ON \"cms\".\"page_blocks_relation\" (\"block_id\")"
        );
    }

    #[tokio::test]
    async fn only_missing_tables_are_created() {
        let persistence = RecordingPersistence {
            existing: HashSet::from(["page".to_owned(), "block".to_owned()]),
            ..Default::default()
        };
        let migration = Migration::new(registry(), persistence.clone());

        let created = migration.migrate().await.unwrap();

        assert_eq!(created, 2);
        let applied = persistence.applied.lock().unwrap();
        assert!(applied[0].starts_with("CREATE TABLE \"public\".\"page_localization\""));
        assert!(
            applied
                .iter()
                .any(|ddl| ddl.starts_with("CREATE TABLE \"public\".\"page_blocks_relation\""))
        );
        assert!(!applied.iter().any(|ddl| ddl.starts_with("CREATE TABLE \"public\".\"page\" ")));
    }
}
