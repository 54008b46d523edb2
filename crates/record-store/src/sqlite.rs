use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqliteConnection};

use crate::schema::{self, IndexSpec};
use crate::{
    Collection, RecordEnvelope, RecordStore, Result, SchemaVersion, StoreError, WriteBatch,
    WriteOp, validate_batch,
};

/// SQLite-backed record store.
///
/// Each collection is a table of `(id TEXT PRIMARY KEY, body TEXT)` rows with
/// the body stored as JSON. Secondary indexes are expression indexes over
/// `json_extract(body, '$.<field>')`, and the schema version lives in
/// `PRAGMA user_version`.
#[derive(Clone)]
pub struct SqliteRecordStore {
    pool: SqlitePool,
    version: Arc<AtomicU32>,
}

impl SqliteRecordStore {
    /// Connects to `url` (e.g. `sqlite://ledger.db` or `sqlite::memory:`),
    /// creating the database file if needed, and upgrades it to the current
    /// schema version.
    pub async fn open(url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);

        // A single long-lived connection: the ledger is single-user, and an
        // in-memory database only exists for as long as its connection does.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let store = Self::new(pool);
        store.migrate().await?;
        Ok(store)
    }

    /// Wraps an existing pool without touching its schema.
    ///
    /// Call [`SqliteRecordStore::migrate`] before use.
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            version: Arc::new(AtomicU32::new(0)),
        }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Upgrades the database to the current schema version.
    pub async fn migrate(&self) -> Result<SchemaVersion> {
        self.migrate_to(SchemaVersion::current()).await
    }

    /// Upgrades the database to `target`, applying each missing step in one
    /// SQL transaction.
    ///
    /// Every statement is `IF NOT EXISTS`, so a step whose tables already
    /// exist is skipped without touching their rows.
    #[tracing::instrument(skip(self))]
    pub async fn migrate_to(&self, target: SchemaVersion) -> Result<SchemaVersion> {
        let mut tx = self.pool.begin().await?;

        let found = SchemaVersion::new(
            sqlx::query_scalar::<_, i64>("PRAGMA user_version")
                .fetch_one(&mut *tx)
                .await?
                .try_into()
                .unwrap_or_default(),
        );

        if found > SchemaVersion::current() {
            return Err(StoreError::SchemaTooNew {
                found,
                supported: SchemaVersion::current(),
            });
        }

        let mut version = found;
        for step in schema::steps_between(found, target) {
            for collection in step.collections {
                sqlx::query(&create_table_sql(*collection))
                    .execute(&mut *tx)
                    .await?;
            }
            for index in step.indexes {
                sqlx::query(&create_index_sql(index))
                    .execute(&mut *tx)
                    .await?;
            }
            version = step.version;
            tracing::info!(version = %step.version, "schema step applied");
        }

        if version != found {
            // PRAGMA does not accept bound parameters.
            sqlx::query(&format!("PRAGMA user_version = {}", version.as_u32()))
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        self.version.store(version.as_u32(), Ordering::SeqCst);
        Ok(version)
    }

    fn current_version(&self) -> SchemaVersion {
        SchemaVersion::new(self.version.load(Ordering::SeqCst))
    }

    fn ensure_collection(&self, collection: Collection) -> Result<()> {
        if schema::collection_exists_at(self.current_version(), collection) {
            Ok(())
        } else {
            Err(StoreError::UnknownCollection(collection))
        }
    }

    fn row_to_record(collection: Collection, row: SqliteRow) -> Result<RecordEnvelope> {
        let id: String = row.try_get("id")?;
        let body: String = row.try_get("body")?;
        Ok(RecordEnvelope::new(collection, id, serde_json::from_str(&body)?))
    }
}

fn create_table_sql(collection: Collection) -> String {
    format!(
        r#"CREATE TABLE IF NOT EXISTS "{collection}" (id TEXT PRIMARY KEY NOT NULL, body TEXT NOT NULL)"#
    )
}

fn create_index_sql(index: &IndexSpec) -> String {
    format!(
        r#"CREATE INDEX IF NOT EXISTS "{collection}_{name}_idx" ON "{collection}" (json_extract(body, '$.{path}'))"#,
        collection = index.collection,
        name = index.name,
        path = index.key_path,
    )
}

/// Executes one write on an open connection or transaction.
async fn execute_op(conn: &mut SqliteConnection, op: &WriteOp) -> Result<()> {
    match op {
        WriteOp::Add(record) => {
            let body = serde_json::to_string(&record.body)?;
            sqlx::query(&format!(
                r#"INSERT INTO "{}" (id, body) VALUES (?1, ?2)"#,
                record.collection
            ))
            .bind(record.id.as_str())
            .bind(body)
            .execute(&mut *conn)
            .await
            .map_err(|e| {
                if let sqlx::Error::Database(ref db_err) = e
                    && db_err.is_unique_violation()
                {
                    return StoreError::DuplicateKey {
                        collection: record.collection,
                        id: record.id.clone(),
                    };
                }
                StoreError::Database(e)
            })?;
        }
        WriteOp::Put(record) => {
            let body = serde_json::to_string(&record.body)?;
            sqlx::query(&format!(
                r#"INSERT INTO "{}" (id, body) VALUES (?1, ?2)
                   ON CONFLICT(id) DO UPDATE SET body = excluded.body"#,
                record.collection
            ))
            .bind(record.id.as_str())
            .bind(body)
            .execute(&mut *conn)
            .await?;
        }
        WriteOp::Delete { collection, id } => {
            sqlx::query(&format!(r#"DELETE FROM "{collection}" WHERE id = ?1"#))
                .bind(id.as_str())
                .execute(&mut *conn)
                .await?;
        }
    }
    Ok(())
}

#[async_trait]
impl RecordStore for SqliteRecordStore {
    async fn schema_version(&self) -> Result<SchemaVersion> {
        Ok(self.current_version())
    }

    async fn get(&self, collection: Collection, id: &str) -> Result<Option<RecordEnvelope>> {
        self.ensure_collection(collection)?;
        let row = sqlx::query(&format!(
            r#"SELECT id, body FROM "{collection}" WHERE id = ?1"#
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| Self::row_to_record(collection, row))
            .transpose()
    }

    async fn get_all(&self, collection: Collection) -> Result<Vec<RecordEnvelope>> {
        self.ensure_collection(collection)?;
        let rows = sqlx::query(&format!(r#"SELECT id, body FROM "{collection}""#))
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter()
            .map(|row| Self::row_to_record(collection, row))
            .collect()
    }

    async fn get_all_by_index(
        &self,
        collection: Collection,
        index: &str,
        key: &str,
    ) -> Result<Vec<RecordEnvelope>> {
        self.ensure_collection(collection)?;
        let spec = schema::index_at(self.current_version(), collection, index).ok_or_else(|| {
            StoreError::UnknownIndex {
                collection,
                index: index.to_string(),
            }
        })?;

        let rows = sqlx::query(&format!(
            r#"SELECT id, body FROM "{collection}" WHERE json_extract(body, '$.{path}') = ?1"#,
            path = spec.key_path,
        ))
        .bind(key)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| Self::row_to_record(collection, row))
            .collect()
    }

    async fn add(&self, record: RecordEnvelope) -> Result<()> {
        self.ensure_collection(record.collection)?;
        let mut conn = self.pool.acquire().await?;
        execute_op(&mut conn, &WriteOp::Add(record)).await
    }

    async fn put(&self, record: RecordEnvelope) -> Result<()> {
        self.ensure_collection(record.collection)?;
        let mut conn = self.pool.acquire().await?;
        execute_op(&mut conn, &WriteOp::Put(record)).await
    }

    async fn delete(&self, collection: Collection, id: &str) -> Result<()> {
        self.ensure_collection(collection)?;
        let mut conn = self.pool.acquire().await?;
        let op = WriteOp::Delete {
            collection,
            id: id.to_string(),
        };
        execute_op(&mut conn, &op).await
    }

    #[tracing::instrument(skip(self, batch), fields(ops = batch.len()))]
    async fn commit(&self, batch: WriteBatch) -> Result<()> {
        validate_batch(&batch)?;
        for op in batch.ops() {
            self.ensure_collection(op.target().0)?;
        }

        // Dropping the transaction on error rolls it back.
        let mut tx = self.pool.begin().await?;
        for op in batch.ops() {
            execute_op(&mut tx, op).await?;
        }
        tx.commit().await?;

        metrics::counter!("record_store_batches_committed_total").increment(1);
        metrics::histogram!("record_store_batch_size").record(batch.len() as f64);
        Ok(())
    }
}
