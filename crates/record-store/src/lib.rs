//! Client-local keyed record storage.
//!
//! Records are JSON documents grouped into named collections and addressed by
//! a string id. The store knows nothing about the entities it holds beyond the
//! secondary indexes declared in [`schema`].

pub mod batch;
pub mod error;
pub mod memory;
pub mod record;
pub mod schema;
pub mod sqlite;
pub mod store;

pub use batch::{WriteBatch, WriteOp, validate_batch};
pub use error::{Result, StoreError};
pub use memory::InMemoryRecordStore;
pub use record::RecordEnvelope;
pub use schema::{Collection, IndexSpec, SchemaStep, SchemaVersion};
pub use sqlite::SqliteRecordStore;
pub use store::{RecordStore, RecordStoreExt, commit_with_compensation};
