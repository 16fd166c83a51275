use chrono::{DateTime, Utc};
use publisher_common::{
    CONTENT_FIELD_NAME, CREATED_FIELD_NAME, DOCUMENT_ID_FIELD_NAME, ID_FIELD_NAME,
    IS_DRAFT_FIELD_NAME, LINKED_ID_FIELD_NAME, LOCALE_FIELD_NAME, LocalizationId,
    MODIFIED_FIELD_NAME, OwnedRelation, PUBLISHED_FIELD_NAME, RecordType, RecordTypeId,
    RecordTypes,
    database::Database,
    persistence::{RecordTables, RelationTable, qualified},
};
use sqlx::{Postgres, Row, Transaction, postgres::PgRow, types::Json};
use tokio::sync::Mutex;

use crate::domain::{
    ChildRecord, Content, NewChild, NewRecord, RecordId, RecordRef, RecordStore, StoreError,
    StoredRecord, Translation,
};

mod sql;

use sql::{ChildStatements, RecordStatements, RelationStatements, TranslationStatements};

/// Record store running every statement inside one PostgreSQL transaction.
///
/// Begin a store, hand it to a `Publisher`, run any number of operations,
/// then take it back and `commit`. Dropping the store rolls everything back.
pub struct PgRecordStore {
    transaction: Mutex<Transaction<'static, Postgres>>,
    registry: &'static dyn RecordTypes,
    schema: String,
}

impl PgRecordStore {
    pub async fn begin(
        database: &'static Database,
        registry: &'static dyn RecordTypes,
    ) -> Result<Self, StoreError> {
        let transaction = database.database_pool().begin().await?;
        Ok(Self {
            transaction: Mutex::new(transaction),
            registry,
            schema: database.database_schema().to_owned(),
        })
    }

    pub async fn commit(self) -> Result<(), StoreError> {
        self.transaction.into_inner().commit().await?;
        Ok(())
    }

    pub async fn rollback(self) -> Result<(), StoreError> {
        self.transaction.into_inner().rollback().await?;
        Ok(())
    }

    fn record_type(&self, id: &RecordTypeId) -> Result<&'static RecordType, StoreError> {
        self.registry
            .get(id)
            .ok_or_else(|| StoreError::DatabaseError(format!("no table for record type '{}'", id)))
    }

    fn main_table(&self, id: &RecordTypeId) -> Result<String, StoreError> {
        let tables = RecordTables::from(self.record_type(id)?);
        Ok(qualified(&self.schema, &tables.main_table_name))
    }

    fn localization_table(&self, id: &RecordTypeId) -> Result<String, StoreError> {
        let tables = RecordTables::from(self.record_type(id)?);
        Ok(qualified(&self.schema, &tables.localization_table_name))
    }

    fn relation_table(
        &self,
        owner: &RecordTypeId,
        relation: &OwnedRelation,
    ) -> Result<RelationTable, StoreError> {
        Ok(RelationTable::new(
            self.record_type(owner)?,
            relation,
            self.record_type(&relation.target)?,
        ))
    }
}

impl RecordStore for PgRecordStore {
    async fn insert_record(&self, record: NewRecord) -> Result<StoredRecord, StoreError> {
        let table = self.main_table(&record.record_type)?;
        let sql = RecordStatements { table: &table }.insert();

        let mut transaction = self.transaction.lock().await;
        let row = sqlx::query(&sql)
            .bind(record.is_draft)
            .bind(record.linked_id.map(|id| id.0))
            .bind(record.created_at)
            .bind(record.modified_at)
            .bind(record.published_at)
            .bind(Json(&record.content))
            .fetch_one(&mut **transaction)
            .await?;

        row_to_record(&row, &record.record_type)
    }

    async fn find_record(
        &self,
        record_type: &RecordTypeId,
        id: RecordId,
    ) -> Result<Option<StoredRecord>, StoreError> {
        let table = self.main_table(record_type)?;
        let sql = RecordStatements { table: &table }.select_by_id();

        let mut transaction = self.transaction.lock().await;
        let row = sqlx::query(&sql)
            .bind(id.0)
            .fetch_optional(&mut **transaction)
            .await?;

        row.map(|row| row_to_record(&row, record_type)).transpose()
    }

    async fn find_by_link(
        &self,
        record_type: &RecordTypeId,
        linked_id: RecordId,
    ) -> Result<Option<StoredRecord>, StoreError> {
        let table = self.main_table(record_type)?;
        let sql = RecordStatements { table: &table }.select_by_link();

        let mut transaction = self.transaction.lock().await;
        let row = sqlx::query(&sql)
            .bind(linked_id.0)
            .fetch_optional(&mut **transaction)
            .await?;

        row.map(|row| row_to_record(&row, record_type)).transpose()
    }

    async fn list_records(
        &self,
        record_type: &RecordTypeId,
        is_draft: bool,
    ) -> Result<Vec<StoredRecord>, StoreError> {
        let table = self.main_table(record_type)?;
        let sql = RecordStatements { table: &table }.select_by_state();

        let mut transaction = self.transaction.lock().await;
        let rows = sqlx::query(&sql)
            .bind(is_draft)
            .fetch_all(&mut **transaction)
            .await?;

        rows.iter()
            .map(|row| row_to_record(row, record_type))
            .collect()
    }

    async fn update_record(
        &self,
        record: &StoredRecord,
        expected_link: Option<RecordId>,
    ) -> Result<(), StoreError> {
        let table = self.main_table(&record.record_type)?;
        let statements = RecordStatements { table: &table };

        let mut transaction = self.transaction.lock().await;
        let result = sqlx::query(&statements.update())
            .bind(record.id.0)
            .bind(record.is_draft)
            .bind(record.linked_id.map(|id| id.0))
            .bind(record.modified_at)
            .bind(record.published_at)
            .bind(Json(&record.content))
            .bind(expected_link.map(|id| id.0))
            .execute(&mut **transaction)
            .await?;

        if result.rows_affected() == 1 {
            return Ok(());
        }

        let exists = sqlx::query(&statements.exists())
            .bind(record.id.0)
            .fetch_optional(&mut **transaction)
            .await?
            .is_some();
        if exists {
            Err(StoreError::UniqueViolation(format!(
                "link of {} {} changed concurrently",
                record.record_type, record.id
            )))
        } else {
            Err(StoreError::NotFound(format!("{} {}", record.record_type, record.id)))
        }
    }

    async fn delete_record(&self, record_type: &RecordTypeId, id: RecordId) -> Result<(), StoreError> {
        let table = self.main_table(record_type)?;
        let sql = RecordStatements { table: &table }.delete();

        let mut transaction = self.transaction.lock().await;
        let result = sqlx::query(&sql)
            .bind(id.0)
            .execute(&mut **transaction)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("{} {}", record_type, id)));
        }
        Ok(())
    }

    async fn related(
        &self,
        owner: &RecordRef,
        relation: &OwnedRelation,
    ) -> Result<Vec<ChildRecord>, StoreError> {
        let relation_table = self.relation_table(&owner.record_type, relation)?;
        let sql = RelationStatements {
            schema: &self.schema,
            relation: &relation_table,
        }
        .select_children();

        let mut transaction = self.transaction.lock().await;
        let rows = sqlx::query(&sql)
            .bind(owner.id.0)
            .fetch_all(&mut **transaction)
            .await?;

        rows.iter()
            .map(|row| row_to_child(row, &relation.target))
            .collect()
    }

    async fn find_child(&self, child: &RecordRef) -> Result<Option<ChildRecord>, StoreError> {
        let table = self.main_table(&child.record_type)?;
        let sql = ChildStatements { table: &table }.select_by_id();

        let mut transaction = self.transaction.lock().await;
        let row = sqlx::query(&sql)
            .bind(child.id.0)
            .fetch_optional(&mut **transaction)
            .await?;

        row.map(|row| row_to_child(&row, &child.record_type))
            .transpose()
    }

    async fn owner_of(&self, child: &RecordRef) -> Result<Option<RecordRef>, StoreError> {
        let child_type = self.record_type(&child.record_type)?;
        let mut candidates = Vec::new();
        for owner_type in self.registry.iterate() {
            for relation in owner_type.owned_relations() {
                if relation.target == child_type.id {
                    let relation_table = RelationTable::new(owner_type, relation, child_type);
                    let sql = RelationStatements {
                        schema: &self.schema,
                        relation: &relation_table,
                    }
                    .select_owner();
                    candidates.push((owner_type.id.clone(), sql));
                }
            }
        }

        let mut transaction = self.transaction.lock().await;
        for (owner_type, sql) in candidates {
            let owner: Option<i64> = sqlx::query_scalar(&sql)
                .bind(child.id.0)
                .fetch_optional(&mut **transaction)
                .await?;
            if let Some(owner) = owner {
                return Ok(Some(RecordRef::new(owner_type, RecordId(owner))));
            }
        }
        Ok(None)
    }

    async fn insert_child(
        &self,
        owner: &RecordRef,
        relation: &OwnedRelation,
        child: NewChild,
    ) -> Result<ChildRecord, StoreError> {
        let insert_table = self.main_table(&child.record_type)?;
        let insert = ChildStatements { table: &insert_table }.insert();
        let relation_table = self.relation_table(&owner.record_type, relation)?;
        let attach = RelationStatements {
            schema: &self.schema,
            relation: &relation_table,
        }
        .attach();

        let mut transaction = self.transaction.lock().await;
        let id: i64 = sqlx::query(&insert)
            .bind(child.created_at)
            .bind(child.modified_at)
            .bind(Json(&child.content))
            .fetch_one(&mut **transaction)
            .await?
            .try_get(ID_FIELD_NAME)?;

        sqlx::query(&attach)
            .bind(owner.id.0)
            .bind(id)
            .execute(&mut **transaction)
            .await?;

        Ok(child.into_stored(RecordId(id)))
    }

    async fn update_child(&self, child: &ChildRecord) -> Result<(), StoreError> {
        let table = self.main_table(&child.record_type)?;
        let sql = ChildStatements { table: &table }.update();

        let mut transaction = self.transaction.lock().await;
        let result = sqlx::query(&sql)
            .bind(child.id.0)
            .bind(child.modified_at)
            .bind(Json(&child.content))
            .execute(&mut **transaction)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(child.record_ref().to_string()));
        }
        Ok(())
    }

    async fn delete_child(
        &self,
        owner: &RecordRef,
        relation: &OwnedRelation,
        child: &RecordRef,
    ) -> Result<(), StoreError> {
        let relation_table = self.relation_table(&owner.record_type, relation)?;
        let detach = RelationStatements {
            schema: &self.schema,
            relation: &relation_table,
        }
        .detach();
        let delete_table = self.main_table(&child.record_type)?;
        let delete = ChildStatements { table: &delete_table }.delete();

        let mut transaction = self.transaction.lock().await;
        let detached = sqlx::query(&detach)
            .bind(owner.id.0)
            .bind(child.id.0)
            .execute(&mut **transaction)
            .await?;
        if detached.rows_affected() == 0 {
            return Err(StoreError::NotFound(child.to_string()));
        }

        sqlx::query(&delete)
            .bind(child.id.0)
            .execute(&mut **transaction)
            .await?;
        Ok(())
    }

    async fn translations(&self, master: &RecordRef) -> Result<Vec<Translation>, StoreError> {
        let table = self.localization_table(&master.record_type)?;
        let sql = TranslationStatements { table: &table }.select_by_master();

        let mut transaction = self.transaction.lock().await;
        let rows = sqlx::query(&sql)
            .bind(master.id.0)
            .fetch_all(&mut **transaction)
            .await?;

        rows.iter().map(row_to_translation).collect()
    }

    async fn save_translation(
        &self,
        record_type: &RecordTypeId,
        translation: &Translation,
    ) -> Result<(), StoreError> {
        let table = self.localization_table(record_type)?;
        let sql = TranslationStatements { table: &table }.upsert();

        let mut transaction = self.transaction.lock().await;
        sqlx::query(&sql)
            .bind(translation.master.0)
            .bind(translation.locale.as_ref())
            .bind(Json(&translation.content))
            .execute(&mut **transaction)
            .await?;
        Ok(())
    }
}

// row mapping

fn row_to_record(row: &PgRow, record_type: &RecordTypeId) -> Result<StoredRecord, StoreError> {
    let id: i64 = row.try_get(ID_FIELD_NAME)?;
    let is_draft: bool = row.try_get(IS_DRAFT_FIELD_NAME)?;
    let linked_id: Option<i64> = row.try_get(LINKED_ID_FIELD_NAME)?;
    let created_at: DateTime<Utc> = row.try_get(CREATED_FIELD_NAME)?;
    let modified_at: DateTime<Utc> = row.try_get(MODIFIED_FIELD_NAME)?;
    let published_at: Option<DateTime<Utc>> = row.try_get(PUBLISHED_FIELD_NAME)?;
    let Json(content): Json<Content> = row.try_get(CONTENT_FIELD_NAME)?;

    Ok(StoredRecord {
        id: RecordId(id),
        record_type: record_type.clone(),
        is_draft,
        linked_id: linked_id.map(RecordId),
        created_at,
        modified_at,
        published_at,
        content,
    })
}

fn row_to_child(row: &PgRow, record_type: &RecordTypeId) -> Result<ChildRecord, StoreError> {
    let id: i64 = row.try_get(ID_FIELD_NAME)?;
    let created_at: DateTime<Utc> = row.try_get(CREATED_FIELD_NAME)?;
    let modified_at: DateTime<Utc> = row.try_get(MODIFIED_FIELD_NAME)?;
    let Json(content): Json<Content> = row.try_get(CONTENT_FIELD_NAME)?;

    Ok(ChildRecord {
        id: RecordId(id),
        record_type: record_type.clone(),
        created_at,
        modified_at,
        content,
    })
}

fn row_to_translation(row: &PgRow) -> Result<Translation, StoreError> {
    let master: i64 = row.try_get(DOCUMENT_ID_FIELD_NAME)?;
    let locale: String = row.try_get(LOCALE_FIELD_NAME)?;
    let Json(content): Json<Content> = row.try_get(CONTENT_FIELD_NAME)?;

    let locale = LocalizationId::try_new(locale)
        .map_err(|e| StoreError::InvalidRow(format!("invalid locale: {}", e)))?;

    Ok(Translation {
        master: RecordId(master),
        locale,
        content,
    })
}
