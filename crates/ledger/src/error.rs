//! Ledger error types.

use record_store::StoreError;
use thiserror::Error;

/// Result type for ledger operations.
pub type Result<T> = std::result::Result<T, LedgerError>;

/// The kinds of entity the ledger manages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Customer,
    Product,
    Transaction,
    PaymentTerm,
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            EntityKind::Customer => "customer",
            EntityKind::Product => "product",
            EntityKind::Transaction => "transaction",
            EntityKind::PaymentTerm => "payment term",
        };
        f.write_str(name)
    }
}

/// A field constraint broken by caller input.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// A required text field is empty or whitespace.
    #[error("{field} is required")]
    MissingField { field: &'static str },

    /// Product prices must be positive.
    #[error("price must be greater than zero, got {price}")]
    NonPositivePrice { price: f64 },

    /// A transaction carries no line items.
    #[error("a transaction needs at least one item")]
    NoItems,

    /// Line item quantities must be finite and positive.
    #[error("item {item:?} has invalid quantity {quantity}")]
    InvalidQuantity { item: String, quantity: f64 },

    /// Line item prices must be finite and non-negative.
    #[error("item {item:?} has invalid price {price}")]
    InvalidItemPrice { item: String, price: f64 },

    /// A derived total or balance does not fit in a finite f64.
    #[error("{what} is out of range: {amount}")]
    NonFiniteAmount { what: &'static str, amount: f64 },
}

/// Fails with [`ValidationError::NonFiniteAmount`] unless `amount` is finite.
pub(crate) fn ensure_finite(what: &'static str, amount: f64) -> std::result::Result<f64, ValidationError> {
    if amount.is_finite() {
        Ok(amount)
    } else {
        Err(ValidationError::NonFiniteAmount { what, amount })
    }
}

/// Errors that can occur during ledger operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// A referenced entity does not exist.
    #[error("{kind} not found: {id}")]
    NotFound { kind: EntityKind, id: String },

    /// Caller input failed validation. Nothing was written.
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// The store could not complete a read or write. Nothing was written.
    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),

    /// A multi-step write stopped partway and could not be undone.
    ///
    /// Stored balances may disagree with stored transactions until
    /// reconciled; see [`crate::Ledger::audit_balances`].
    #[error("{operation} was partially committed: {source}")]
    PartialCommit {
        operation: &'static str,
        #[source]
        source: StoreError,
    },

    /// A stored record could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl LedgerError {
    pub(crate) fn not_found(kind: EntityKind, id: impl std::fmt::Display) -> Self {
        LedgerError::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    /// Returns true for [`LedgerError::PartialCommit`].
    pub fn is_partial_commit(&self) -> bool {
        matches!(self, LedgerError::PartialCommit { .. })
    }
}
