use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::schema::{self, IndexSpec};
use crate::{
    Collection, RecordEnvelope, RecordStore, Result, SchemaVersion, StoreError, WriteBatch,
    WriteOp, validate_batch,
};

/// In-memory record store.
///
/// Holds every collection in memory behind a single lock, so batches are
/// applied atomically. Used for tests and ephemeral sessions.
#[derive(Clone)]
pub struct InMemoryRecordStore {
    inner: Arc<RwLock<Inner>>,
}

#[derive(Default)]
struct Inner {
    version: SchemaVersion,
    collections: HashMap<Collection, CollectionData>,
}

#[derive(Default)]
struct CollectionData {
    records: HashMap<String, serde_json::Value>,
    indexes: HashMap<&'static str, IndexData>,
}

struct IndexData {
    spec: IndexSpec,
    /// Index key -> ids of the records carrying it.
    entries: HashMap<String, HashSet<String>>,
}

impl InMemoryRecordStore {
    /// Creates an empty store at the current schema version.
    pub fn new() -> Self {
        Self::at_version(SchemaVersion::current())
    }

    /// Creates an empty store laid out as of `version`.
    pub fn at_version(version: SchemaVersion) -> Self {
        let mut inner = Inner::default();
        inner.upgrade_to(version);
        Self {
            inner: Arc::new(RwLock::new(inner)),
        }
    }

    /// Upgrades the layout to the current schema version.
    ///
    /// Returns the version the store is at afterwards. Existing records are
    /// untouched and running the upgrade twice is a no-op.
    pub async fn upgrade(&self) -> Result<SchemaVersion> {
        let mut inner = self.inner.write().await;
        if inner.version > SchemaVersion::current() {
            return Err(StoreError::SchemaTooNew {
                found: inner.version,
                supported: SchemaVersion::current(),
            });
        }
        inner.upgrade_to(SchemaVersion::current());
        Ok(inner.version)
    }

    /// Returns the number of records in a collection, zero if it does not exist.
    pub async fn record_count(&self, collection: Collection) -> usize {
        self.inner
            .read()
            .await
            .collections
            .get(&collection)
            .map_or(0, |data| data.records.len())
    }
}

impl Default for InMemoryRecordStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Inner {
    fn upgrade_to(&mut self, target: SchemaVersion) {
        for step in schema::steps_between(self.version, target) {
            for collection in step.collections {
                self.collections.entry(*collection).or_default();
            }
            for index in step.indexes {
                if let Some(data) = self.collections.get_mut(&index.collection) {
                    data.create_index(*index);
                }
            }
            self.version = step.version;
            tracing::debug!(version = %step.version, "in-memory schema step applied");
        }
    }

    fn collection(&self, collection: Collection) -> Result<&CollectionData> {
        self.collections
            .get(&collection)
            .ok_or(StoreError::UnknownCollection(collection))
    }

    fn collection_mut(&mut self, collection: Collection) -> Result<&mut CollectionData> {
        self.collections
            .get_mut(&collection)
            .ok_or(StoreError::UnknownCollection(collection))
    }

    /// Checks that `op` would succeed against the current state.
    fn check(&self, op: &WriteOp) -> Result<()> {
        let (collection, id) = op.target();
        let data = self.collection(collection)?;
        if matches!(op, WriteOp::Add(_)) && data.records.contains_key(id) {
            return Err(StoreError::DuplicateKey {
                collection,
                id: id.to_string(),
            });
        }
        Ok(())
    }

    /// Applies an op that has already passed [`Inner::check`].
    fn apply(&mut self, op: WriteOp) -> Result<()> {
        match op {
            WriteOp::Add(record) | WriteOp::Put(record) => {
                self.collection_mut(record.collection)?
                    .insert(record.id, record.body);
            }
            WriteOp::Delete { collection, id } => {
                self.collection_mut(collection)?.remove(&id);
            }
        }
        Ok(())
    }
}

impl CollectionData {
    fn create_index(&mut self, spec: IndexSpec) {
        if self.indexes.contains_key(spec.name) {
            return;
        }
        let mut index = IndexData {
            spec,
            entries: HashMap::new(),
        };
        for (id, body) in &self.records {
            index.insert(id, body);
        }
        self.indexes.insert(spec.name, index);
    }

    fn insert(&mut self, id: String, body: serde_json::Value) {
        self.remove(&id);
        for index in self.indexes.values_mut() {
            index.insert(&id, &body);
        }
        self.records.insert(id, body);
    }

    fn remove(&mut self, id: &str) {
        if let Some(old) = self.records.remove(id) {
            for index in self.indexes.values_mut() {
                index.remove(id, &old);
            }
        }
    }

    fn envelope(collection: Collection, id: &str, body: &serde_json::Value) -> RecordEnvelope {
        RecordEnvelope::new(collection, id, body.clone())
    }
}

impl IndexData {
    fn insert(&mut self, id: &str, body: &serde_json::Value) {
        if let Some(key) = self.spec.key_of(body) {
            self.entries
                .entry(key.to_string())
                .or_default()
                .insert(id.to_string());
        }
    }

    fn remove(&mut self, id: &str, body: &serde_json::Value) {
        if let Some(key) = self.spec.key_of(body)
            && let Some(ids) = self.entries.get_mut(key)
        {
            ids.remove(id);
            if ids.is_empty() {
                self.entries.remove(key);
            }
        }
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn schema_version(&self) -> Result<SchemaVersion> {
        Ok(self.inner.read().await.version)
    }

    async fn get(&self, collection: Collection, id: &str) -> Result<Option<RecordEnvelope>> {
        let inner = self.inner.read().await;
        let data = inner.collection(collection)?;
        Ok(data
            .records
            .get(id)
            .map(|body| CollectionData::envelope(collection, id, body)))
    }

    async fn get_all(&self, collection: Collection) -> Result<Vec<RecordEnvelope>> {
        let inner = self.inner.read().await;
        let data = inner.collection(collection)?;
        Ok(data
            .records
            .iter()
            .map(|(id, body)| CollectionData::envelope(collection, id, body))
            .collect())
    }

    async fn get_all_by_index(
        &self,
        collection: Collection,
        index: &str,
        key: &str,
    ) -> Result<Vec<RecordEnvelope>> {
        let inner = self.inner.read().await;
        let data = inner.collection(collection)?;
        let index_data = data
            .indexes
            .get(index)
            .ok_or_else(|| StoreError::UnknownIndex {
                collection,
                index: index.to_string(),
            })?;

        let Some(ids) = index_data.entries.get(key) else {
            return Ok(Vec::new());
        };
        Ok(ids
            .iter()
            .filter_map(|id| {
                data.records
                    .get(id)
                    .map(|body| CollectionData::envelope(collection, id, body))
            })
            .collect())
    }

    async fn add(&self, record: RecordEnvelope) -> Result<()> {
        let mut inner = self.inner.write().await;
        let op = WriteOp::Add(record);
        inner.check(&op)?;
        inner.apply(op)
    }

    async fn put(&self, record: RecordEnvelope) -> Result<()> {
        let mut inner = self.inner.write().await;
        let op = WriteOp::Put(record);
        inner.check(&op)?;
        inner.apply(op)
    }

    async fn delete(&self, collection: Collection, id: &str) -> Result<()> {
        let mut inner = self.inner.write().await;
        inner.collection_mut(collection)?.remove(id);
        Ok(())
    }

    async fn commit(&self, batch: WriteBatch) -> Result<()> {
        validate_batch(&batch)?;
        let size = batch.len();

        let mut inner = self.inner.write().await;

        // Targets are unique within a batch, so checking every op against the
        // pre-batch state is enough to guarantee the apply pass cannot fail.
        for op in batch.ops() {
            inner.check(op)?;
        }
        for op in batch.into_ops() {
            inner.apply(op)?;
        }

        metrics::counter!("record_store_batches_committed_total").increment(1);
        metrics::histogram!("record_store_batch_size").record(size as f64);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RecordStoreExt;

    fn transaction(id: &str, customer_id: &str) -> RecordEnvelope {
        RecordEnvelope::new(
            Collection::Transactions,
            id,
            serde_json::json!({"id": id, "customerId": customer_id, "totalAmount": 10.0}),
        )
    }

    fn customer(id: &str, balance: f64) -> RecordEnvelope {
        RecordEnvelope::new(
            Collection::Customers,
            id,
            serde_json::json!({"id": id, "balance": balance}),
        )
    }

    #[tokio::test]
    async fn add_then_get() {
        let store = InMemoryRecordStore::new();
        store.add(customer("c-1", 0.0)).await.unwrap();

        let fetched = store.get(Collection::Customers, "c-1").await.unwrap();
        assert_eq!(fetched, Some(customer("c-1", 0.0)));
    }

    #[tokio::test]
    async fn add_never_overwrites() {
        let store = InMemoryRecordStore::new();
        store.add(customer("c-1", 0.0)).await.unwrap();

        let result = store.add(customer("c-1", 50.0)).await;
        assert!(matches!(result, Err(StoreError::DuplicateKey { .. })));

        let fetched = store.get(Collection::Customers, "c-1").await.unwrap().unwrap();
        assert_eq!(fetched.body["balance"], 0.0);
    }

    #[tokio::test]
    async fn put_replaces() {
        let store = InMemoryRecordStore::new();
        store.put(customer("c-1", 0.0)).await.unwrap();
        store.put(customer("c-1", 25.0)).await.unwrap();

        let fetched = store.get(Collection::Customers, "c-1").await.unwrap().unwrap();
        assert_eq!(fetched.body["balance"], 25.0);
        assert_eq!(store.record_count(Collection::Customers).await, 1);
    }

    #[tokio::test]
    async fn delete_absent_is_noop() {
        let store = InMemoryRecordStore::new();
        store.put(customer("c-1", 0.0)).await.unwrap();

        store.delete(Collection::Customers, "missing").await.unwrap();
        assert_eq!(store.count(Collection::Customers).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn index_tracks_puts_and_deletes() {
        let store = InMemoryRecordStore::new();
        store.add(transaction("t-1", "c-1")).await.unwrap();
        store.add(transaction("t-2", "c-1")).await.unwrap();
        store.add(transaction("t-3", "c-2")).await.unwrap();

        let for_c1 = store
            .get_all_by_index(Collection::Transactions, "customerId", "c-1")
            .await
            .unwrap();
        assert_eq!(for_c1.len(), 2);

        // Re-pointing a record moves it between index keys.
        store.put(transaction("t-2", "c-2")).await.unwrap();
        store.delete(Collection::Transactions, "t-1").await.unwrap();

        let for_c1 = store
            .get_all_by_index(Collection::Transactions, "customerId", "c-1")
            .await
            .unwrap();
        assert!(for_c1.is_empty());
        let for_c2 = store
            .get_all_by_index(Collection::Transactions, "customerId", "c-2")
            .await
            .unwrap();
        assert_eq!(for_c2.len(), 2);
    }

    #[tokio::test]
    async fn unknown_index_is_an_error() {
        let store = InMemoryRecordStore::new();
        let result = store
            .get_all_by_index(Collection::Customers, "customerId", "c-1")
            .await;
        assert!(matches!(result, Err(StoreError::UnknownIndex { .. })));
    }

    #[tokio::test]
    async fn commit_is_all_or_nothing() {
        let store = InMemoryRecordStore::new();
        store.add(customer("c-1", 0.0)).await.unwrap();

        // The second op collides with an existing id, so the first must not land.
        let batch = WriteBatch::new()
            .add(transaction("t-1", "c-1"))
            .add(customer("c-1", 10.0));
        assert!(matches!(
            store.commit(batch).await,
            Err(StoreError::DuplicateKey { .. })
        ));

        assert_eq!(store.record_count(Collection::Transactions).await, 0);
        let fetched = store.get(Collection::Customers, "c-1").await.unwrap().unwrap();
        assert_eq!(fetched.body["balance"], 0.0);
    }

    #[tokio::test]
    async fn commit_applies_batch() {
        let store = InMemoryRecordStore::new();
        store.add(customer("c-1", 0.0)).await.unwrap();

        let batch = WriteBatch::new()
            .add(transaction("t-1", "c-1"))
            .put(customer("c-1", 10.0));
        store.commit(batch).await.unwrap();

        assert_eq!(store.record_count(Collection::Transactions).await, 1);
        let fetched = store.get(Collection::Customers, "c-1").await.unwrap().unwrap();
        assert_eq!(fetched.body["balance"], 10.0);
    }

    #[tokio::test]
    async fn older_layout_rejects_later_collections() {
        let store = InMemoryRecordStore::at_version(SchemaVersion::new(1));
        let result = store.get_all(Collection::Products).await;
        assert!(matches!(
            result,
            Err(StoreError::UnknownCollection(Collection::Products))
        ));
    }

    #[tokio::test]
    async fn upgrade_is_additive_and_idempotent() {
        let store = InMemoryRecordStore::at_version(SchemaVersion::new(1));
        store.add(customer("c-1", 5.0)).await.unwrap();
        store.add(transaction("t-1", "c-1")).await.unwrap();

        assert_eq!(store.upgrade().await.unwrap(), SchemaVersion::current());
        assert_eq!(store.upgrade().await.unwrap(), SchemaVersion::current());

        assert_eq!(store.record_count(Collection::Customers).await, 1);
        assert_eq!(store.record_count(Collection::Transactions).await, 1);
        assert!(store.get_all(Collection::Products).await.unwrap().is_empty());
        assert!(store.get_all(Collection::PaymentTerms).await.unwrap().is_empty());

        let indexed = store
            .get_all_by_index(Collection::Transactions, "customerId", "c-1")
            .await
            .unwrap();
        assert_eq!(indexed.len(), 1);
    }
}
