//! Collections, secondary indexes and the additive schema history.
//!
//! The schema only ever grows. Each [`SchemaStep`] lists the collections and
//! indexes introduced at its version; upgrading a store from version N applies
//! every later step in order and skips anything that already exists.

use serde::{Deserialize, Serialize};

/// A named collection of records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Collection {
    Customers,
    Products,
    Transactions,
    PaymentTerms,
}

impl Collection {
    /// Every collection known to this build.
    pub const ALL: [Collection; 4] = [
        Collection::Customers,
        Collection::Products,
        Collection::Transactions,
        Collection::PaymentTerms,
    ];

    /// The persisted name of the collection.
    pub fn name(&self) -> &'static str {
        match self {
            Collection::Customers => "customers",
            Collection::Products => "products",
            Collection::Transactions => "transactions",
            Collection::PaymentTerms => "paymentTerms",
        }
    }
}

impl std::fmt::Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A secondary index over a top-level string field of a record body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IndexSpec {
    pub collection: Collection,
    pub name: &'static str,
    pub key_path: &'static str,
}

impl IndexSpec {
    /// Extracts the index key from a record body, if the field is a string.
    pub fn key_of<'a>(&self, body: &'a serde_json::Value) -> Option<&'a str> {
        body.get(self.key_path).and_then(serde_json::Value::as_str)
    }
}

/// Transactions indexed by owning customer.
pub const TRANSACTIONS_BY_CUSTOMER: IndexSpec = IndexSpec {
    collection: Collection::Transactions,
    name: "customerId",
    key_path: "customerId",
};

/// Monotonically increasing layout version of a store.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct SchemaVersion(u32);

impl SchemaVersion {
    pub fn new(value: u32) -> Self {
        Self(value)
    }

    /// Version of a store that has never been initialized.
    pub fn initial() -> Self {
        Self(0)
    }

    /// The newest version this build knows how to create.
    pub fn current() -> Self {
        SCHEMA_STEPS
            .last()
            .map(|step| step.version)
            .unwrap_or_default()
    }

    pub fn as_u32(&self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// What one schema version adds to the layout.
#[derive(Debug, Clone, Copy)]
pub struct SchemaStep {
    pub version: SchemaVersion,
    pub collections: &'static [Collection],
    pub indexes: &'static [IndexSpec],
}

/// The full schema history, oldest first.
pub const SCHEMA_STEPS: &[SchemaStep] = &[
    SchemaStep {
        version: SchemaVersion(1),
        collections: &[Collection::Customers, Collection::Transactions],
        indexes: &[TRANSACTIONS_BY_CUSTOMER],
    },
    SchemaStep {
        version: SchemaVersion(2),
        collections: &[Collection::PaymentTerms],
        indexes: &[],
    },
    SchemaStep {
        version: SchemaVersion(3),
        collections: &[Collection::Products],
        indexes: &[],
    },
];

/// Steps that take a store from `from` up to and including `to`.
pub fn steps_between(
    from: SchemaVersion,
    to: SchemaVersion,
) -> impl Iterator<Item = &'static SchemaStep> {
    SCHEMA_STEPS
        .iter()
        .filter(move |step| step.version > from && step.version <= to)
}

/// Returns true if `collection` has been introduced by `version`.
pub fn collection_exists_at(version: SchemaVersion, collection: Collection) -> bool {
    steps_between(SchemaVersion::initial(), version)
        .any(|step| step.collections.contains(&collection))
}

/// Looks up an index that has been introduced by `version`.
pub fn index_at(
    version: SchemaVersion,
    collection: Collection,
    name: &str,
) -> Option<&'static IndexSpec> {
    steps_between(SchemaVersion::initial(), version)
        .flat_map(|step| step.indexes.iter())
        .find(|index| index.collection == collection && index.name == name)
}
