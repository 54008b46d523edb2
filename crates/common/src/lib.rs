//! Shared identifier types for the ledger workspace.

mod ids;

pub use ids::{CustomerId, PaymentTermId, ProductId, TransactionId, TransactionItemId};
