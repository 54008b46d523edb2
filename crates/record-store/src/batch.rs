//! Multi-record write batches.

use std::collections::HashSet;

use crate::{Collection, RecordEnvelope, StoreError};

/// A single write inside a [`WriteBatch`].
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    /// Insert a record; fails if the id already exists.
    Add(RecordEnvelope),
    /// Insert or replace a record.
    Put(RecordEnvelope),
    /// Remove a record; absent ids are ignored.
    Delete { collection: Collection, id: String },
}

impl WriteOp {
    /// The `(collection, id)` this op writes to.
    pub fn target(&self) -> (Collection, &str) {
        match self {
            WriteOp::Add(record) | WriteOp::Put(record) => (record.collection, &record.id),
            WriteOp::Delete { collection, id } => (*collection, id),
        }
    }

    /// Short name of the op, for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            WriteOp::Add(_) => "add",
            WriteOp::Put(_) => "put",
            WriteOp::Delete { .. } => "delete",
        }
    }
}

/// An ordered group of writes committed as one logical unit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    /// Creates an empty batch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an insert.
    pub fn add(mut self, record: RecordEnvelope) -> Self {
        self.ops.push(WriteOp::Add(record));
        self
    }

    /// Appends an insert-or-replace.
    pub fn put(mut self, record: RecordEnvelope) -> Self {
        self.ops.push(WriteOp::Put(record));
        self
    }

    /// Appends a delete.
    pub fn delete(mut self, collection: Collection, id: impl Into<String>) -> Self {
        self.ops.push(WriteOp::Delete {
            collection,
            id: id.into(),
        });
        self
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }

    pub fn into_ops(self) -> Vec<WriteOp> {
        self.ops
    }
}

impl FromIterator<WriteOp> for WriteBatch {
    fn from_iter<I: IntoIterator<Item = WriteOp>>(iter: I) -> Self {
        Self {
            ops: iter.into_iter().collect(),
        }
    }
}

/// Validates a batch before any of it is written.
///
/// A batch must be non-empty and must not write the same record twice, so
/// every op can be checked against the store's state before the batch.
pub fn validate_batch(batch: &WriteBatch) -> Result<(), StoreError> {
    if batch.is_empty() {
        return Err(StoreError::InvalidBatch(
            "Cannot commit an empty batch".to_string(),
        ));
    }

    let mut seen = HashSet::with_capacity(batch.len());
    for op in batch.ops() {
        let (collection, id) = op.target();
        if !seen.insert((collection, id)) {
            return Err(StoreError::InvalidBatch(format!(
                "Record {collection}/{id} is written more than once"
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(collection: Collection, id: &str) -> RecordEnvelope {
        RecordEnvelope::new(collection, id, serde_json::json!({"id": id}))
    }

    #[test]
    fn builder_keeps_op_order() {
        let batch = WriteBatch::new()
            .add(record(Collection::Transactions, "t-1"))
            .put(record(Collection::Customers, "c-1"))
            .delete(Collection::Products, "p-1");

        let kinds: Vec<_> = batch.ops().iter().map(WriteOp::kind).collect();
        assert_eq!(kinds, vec!["add", "put", "delete"]);
        assert_eq!(batch.ops()[2].target(), (Collection::Products, "p-1"));
    }

    #[test]
    fn empty_batch_is_rejected() {
        let result = validate_batch(&WriteBatch::new());
        assert!(matches!(result, Err(StoreError::InvalidBatch(_))));
    }

    #[test]
    fn duplicate_target_is_rejected() {
        let batch = WriteBatch::new()
            .put(record(Collection::Customers, "c-1"))
            .delete(Collection::Customers, "c-1");
        assert!(matches!(
            validate_batch(&batch),
            Err(StoreError::InvalidBatch(_))
        ));
    }

    #[test]
    fn same_id_in_different_collections_is_allowed() {
        let batch = WriteBatch::new()
            .put(record(Collection::Customers, "x"))
            .put(record(Collection::Products, "x"));
        assert!(validate_batch(&batch).is_ok());
    }
}
