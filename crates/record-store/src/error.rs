use thiserror::Error;

use crate::{Collection, SchemaVersion};

/// Errors that can occur when interacting with the record store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// An `add` targeted an id that already exists in the collection.
    #[error("Duplicate key in {collection}: {id}")]
    DuplicateKey { collection: Collection, id: String },

    /// The collection has not been created at the store's schema version.
    #[error("Collection {0} does not exist at this schema version")]
    UnknownCollection(Collection),

    /// The collection has no index with this name.
    #[error("Collection {collection} has no index named {index}")]
    UnknownIndex {
        collection: Collection,
        index: String,
    },

    /// The write batch was rejected before anything was written.
    #[error("Invalid write batch: {0}")]
    InvalidBatch(String),

    /// The persisted layout is newer than this build understands.
    #[error("Store schema version {found} is newer than supported version {supported}")]
    SchemaTooNew {
        found: SchemaVersion,
        supported: SchemaVersion,
    },

    /// A non-atomic batch failed midway and its compensations failed too.
    ///
    /// Some of the batch's writes remain applied; the caller must reconcile.
    #[error(
        "Partial commit: {applied} of {total} operations applied and could not be rolled back: {cause}"
    )]
    PartialCommit {
        applied: usize,
        total: usize,
        #[source]
        cause: Box<StoreError>,
        rollback: Box<StoreError>,
    },

    /// The storage backend failed for a reason it could only describe.
    #[error("Storage backend error: {0}")]
    Backend(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A record body could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for record store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
