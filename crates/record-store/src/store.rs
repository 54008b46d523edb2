use std::sync::Arc;

use async_trait::async_trait;

use crate::batch::validate_batch;
use crate::{Collection, RecordEnvelope, Result, SchemaVersion, StoreError, WriteBatch, WriteOp};

/// Core trait for record store implementations.
///
/// A record store persists JSON records keyed by id inside named
/// collections. All implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Returns the schema version the store is currently at.
    async fn schema_version(&self) -> Result<SchemaVersion>;

    /// Fetches one record. Returns None if the id is absent.
    async fn get(&self, collection: Collection, id: &str) -> Result<Option<RecordEnvelope>>;

    /// Fetches every record of a collection. Ordering is store-defined.
    async fn get_all(&self, collection: Collection) -> Result<Vec<RecordEnvelope>>;

    /// Fetches every record whose indexed field equals `key`.
    async fn get_all_by_index(
        &self,
        collection: Collection,
        index: &str,
        key: &str,
    ) -> Result<Vec<RecordEnvelope>>;

    /// Inserts a record, failing with `DuplicateKey` if the id exists.
    async fn add(&self, record: RecordEnvelope) -> Result<()>;

    /// Inserts or replaces a record.
    async fn put(&self, record: RecordEnvelope) -> Result<()>;

    /// Removes a record. Removing an absent id is not an error.
    async fn delete(&self, collection: Collection, id: &str) -> Result<()>;

    /// Commits a batch of writes as one logical unit.
    ///
    /// Backends with native transactions override this to apply the batch
    /// atomically. The default applies ops one by one and undoes the applied
    /// prefix on failure; see [`commit_with_compensation`].
    async fn commit(&self, batch: WriteBatch) -> Result<()> {
        commit_with_compensation(self, batch).await
    }
}

/// Shared handles delegate to the store they point at, so a backend chosen at
/// runtime can be held as `Arc<dyn RecordStore>`.
#[async_trait]
impl<T: RecordStore + ?Sized> RecordStore for Arc<T> {
    async fn schema_version(&self) -> Result<SchemaVersion> {
        (**self).schema_version().await
    }

    async fn get(&self, collection: Collection, id: &str) -> Result<Option<RecordEnvelope>> {
        (**self).get(collection, id).await
    }

    async fn get_all(&self, collection: Collection) -> Result<Vec<RecordEnvelope>> {
        (**self).get_all(collection).await
    }

    async fn get_all_by_index(
        &self,
        collection: Collection,
        index: &str,
        key: &str,
    ) -> Result<Vec<RecordEnvelope>> {
        (**self).get_all_by_index(collection, index, key).await
    }

    async fn add(&self, record: RecordEnvelope) -> Result<()> {
        (**self).add(record).await
    }

    async fn put(&self, record: RecordEnvelope) -> Result<()> {
        (**self).put(record).await
    }

    async fn delete(&self, collection: Collection, id: &str) -> Result<()> {
        (**self).delete(collection, id).await
    }

    async fn commit(&self, batch: WriteBatch) -> Result<()> {
        (**self).commit(batch).await
    }
}

/// Extension trait providing convenience methods for record stores.
#[async_trait]
pub trait RecordStoreExt: RecordStore {
    /// Checks if a record exists.
    async fn contains(&self, collection: Collection, id: &str) -> Result<bool> {
        Ok(self.get(collection, id).await?.is_some())
    }

    /// Counts the records of a collection.
    async fn count(&self, collection: Collection) -> Result<usize> {
        Ok(self.get_all(collection).await?.len())
    }
}

impl<T: RecordStore + ?Sized> RecordStoreExt for T {}

/// Applies a batch op by op, keeping a compensation log.
///
/// Before each op the prior state of its target is read and the inverse write
/// recorded. If an op fails, the recorded inverses run newest first. When the
/// rollback succeeds the original error is returned and the store is as it
/// was; when a compensation fails too, [`StoreError::PartialCommit`] reports
/// how many ops remain applied.
#[tracing::instrument(skip(store, batch), fields(ops = batch.len()))]
pub async fn commit_with_compensation<S: RecordStore + ?Sized>(
    store: &S,
    batch: WriteBatch,
) -> Result<()> {
    validate_batch(&batch)?;

    let total = batch.len();
    let mut undo: Vec<Option<WriteOp>> = Vec::with_capacity(total);

    for op in batch.into_ops() {
        let outcome = match inverse_of(store, &op).await {
            Ok(inverse) => apply_op(store, op).await.map(|()| inverse),
            Err(e) => Err(e),
        };

        match outcome {
            Ok(inverse) => undo.push(inverse),
            Err(cause) => return Err(roll_back(store, undo, total, cause).await),
        }
    }

    Ok(())
}

async fn roll_back<S: RecordStore + ?Sized>(
    store: &S,
    undo: Vec<Option<WriteOp>>,
    total: usize,
    cause: StoreError,
) -> StoreError {
    let mut applied = undo.len();

    for inverse in undo.into_iter().rev() {
        if let Some(op) = inverse
            && let Err(rollback) = apply_op(store, op).await
        {
            tracing::error!(%cause, %rollback, applied, total, "batch rollback failed");
            return StoreError::PartialCommit {
                applied,
                total,
                cause: Box::new(cause),
                rollback: Box::new(rollback),
            };
        }
        applied -= 1;
    }

    tracing::warn!(%cause, total, "batch rolled back");
    cause
}

/// The write that restores `op`'s target to its current state.
async fn inverse_of<S: RecordStore + ?Sized>(store: &S, op: &WriteOp) -> Result<Option<WriteOp>> {
    let inverse = match op {
        WriteOp::Add(record) => Some(WriteOp::Delete {
            collection: record.collection,
            id: record.id.clone(),
        }),
        WriteOp::Put(record) => Some(match store.get(record.collection, &record.id).await? {
            Some(prior) => WriteOp::Put(prior),
            None => WriteOp::Delete {
                collection: record.collection,
                id: record.id.clone(),
            },
        }),
        WriteOp::Delete { collection, id } => store.get(*collection, id).await?.map(WriteOp::Put),
    };
    Ok(inverse)
}

async fn apply_op<S: RecordStore + ?Sized>(store: &S, op: WriteOp) -> Result<()> {
    match op {
        WriteOp::Add(record) => store.add(record).await,
        WriteOp::Put(record) => store.put(record).await,
        WriteOp::Delete { collection, id } => store.delete(collection, &id).await,
    }
}
