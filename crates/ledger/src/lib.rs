//! Ledger operations for a small business.
//!
//! This crate provides:
//! - Entity records (customers, products, transactions, payment terms)
//! - The [`Ledger`] service, which keeps every customer balance equal to the
//!   signed sum of that customer's transactions
//! - An in-memory projection of the persisted state for reads
//! - Dashboard and statement views plus a balance audit

pub mod catalog;
pub mod error;
pub mod model;
pub mod projection;
pub mod service;
pub mod views;

pub use catalog::{COMMON_PRODUCTS, CatalogProduct, DEFAULT_PAYMENT_TERMS, PRODUCT_CATEGORIES};
pub use common::{CustomerId, PaymentTermId, ProductId, TransactionId, TransactionItemId};
pub use error::{EntityKind, LedgerError, Result, ValidationError};
pub use model::{
    Customer, CustomerUpdate, NewCustomer, NewPaymentTerm, NewProduct, NewTransaction,
    NewTransactionItem, PaymentTerm, Product, ProductUpdate, Record, Transaction,
    TransactionItem, TransactionType,
};
pub use projection::LedgerState;
pub use service::Ledger;
pub use views::{BalanceDiscrepancy, CustomerStatement, LedgerSummary};
