//! Ledger entities and the inputs that create or change them.
//!
//! Entities serialize with camelCase field names; that JSON is the persisted
//! record body.

mod customer;
mod payment_term;
mod product;
mod transaction;

pub use customer::{Customer, CustomerUpdate, NewCustomer};
pub use payment_term::{NewPaymentTerm, PaymentTerm};
pub use product::{NewProduct, Product, ProductUpdate};
pub use transaction::{
    NewTransaction, NewTransactionItem, Transaction, TransactionItem, TransactionType,
};

use record_store::{Collection, RecordEnvelope};
use serde::{Serialize, de::DeserializeOwned};

use crate::error::ValidationError;

/// An entity persisted as one record of a store collection.
pub trait Record: Serialize + DeserializeOwned {
    /// The collection records of this type live in.
    const COLLECTION: Collection;

    /// The record's primary key.
    fn key(&self) -> String;

    /// Serializes the entity into a store envelope.
    fn to_envelope(&self) -> Result<RecordEnvelope, serde_json::Error> {
        RecordEnvelope::from_record(Self::COLLECTION, self.key(), self)
    }

    /// Decodes an entity from a store envelope.
    fn from_envelope(envelope: &RecordEnvelope) -> Result<Self, serde_json::Error> {
        envelope.decode()
    }
}

pub(crate) fn require(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        Err(ValidationError::MissingField { field })
    } else {
        Ok(())
    }
}
