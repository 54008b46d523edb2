use chrono::{DateTime, Utc};
use common::{CustomerId, PaymentTermId};
use record_store::Collection;
use serde::{Deserialize, Serialize};

use super::{Record, TransactionType, require};
use crate::error::ValidationError;

/// A customer account.
///
/// `balance` is positive when the customer owes the business and negative
/// when the business owes the customer. It only moves when one of the
/// customer's transactions is added or deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub id: CustomerId,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_term_id: Option<PaymentTermId>,
    pub balance: f64,
    pub created_at: DateTime<Utc>,
}

impl Customer {
    /// Returns a copy with `amount` of the given kind applied to the balance.
    pub(crate) fn with_contribution(&self, kind: TransactionType, amount: f64) -> Self {
        Self {
            balance: self.balance + kind.signed(amount),
            ..self.clone()
        }
    }

    /// Returns a copy with `amount` of the given kind taken back out of the
    /// balance.
    pub(crate) fn without_contribution(&self, kind: TransactionType, amount: f64) -> Self {
        Self {
            balance: self.balance - kind.signed(amount),
            ..self.clone()
        }
    }
}

impl Record for Customer {
    const COLLECTION: Collection = Collection::Customers;

    fn key(&self) -> String {
        self.id.to_string()
    }
}

/// Input for [`crate::Ledger::add_customer`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewCustomer {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub payment_term_id: Option<PaymentTermId>,
}

impl NewCustomer {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            ..Default::default()
        }
    }

    pub fn phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = phone.into();
        self
    }

    pub fn address(mut self, address: impl Into<String>) -> Self {
        self.address = address.into();
        self
    }

    pub fn payment_term(mut self, id: PaymentTermId) -> Self {
        self.payment_term_id = Some(id);
        self
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        require("customer name", &self.name)?;
        require("customer email", &self.email)
    }

    /// Builds the stored customer. Every customer starts at a zero balance.
    pub(crate) fn into_customer(self, created_at: DateTime<Utc>) -> Customer {
        Customer {
            id: CustomerId::new(),
            name: self.name.trim().to_string(),
            email: self.email.trim().to_string(),
            phone: self.phone,
            address: self.address,
            payment_term_id: self.payment_term_id,
            balance: 0.0,
            created_at,
        }
    }
}

/// A partial edit of a customer's contact details.
///
/// Fields left as `None` keep their current value. There is no balance
/// field: balances only change through transactions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CustomerUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    /// `Some(None)` clears the payment term.
    pub payment_term_id: Option<Option<PaymentTermId>>,
}

impl CustomerUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = Some(phone.into());
        self
    }

    pub fn address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    pub fn payment_term(mut self, id: Option<PaymentTermId>) -> Self {
        self.payment_term_id = Some(id);
        self
    }

    /// Merges the edit into `customer` and validates the result.
    pub(crate) fn apply_to(self, customer: &Customer) -> Result<Customer, ValidationError> {
        let mut updated = customer.clone();
        if let Some(name) = self.name {
            updated.name = name.trim().to_string();
        }
        if let Some(email) = self.email {
            updated.email = email.trim().to_string();
        }
        if let Some(phone) = self.phone {
            updated.phone = phone;
        }
        if let Some(address) = self.address {
            updated.address = address;
        }
        if let Some(term) = self.payment_term_id {
            updated.payment_term_id = term;
        }

        require("customer name", &updated.name)?;
        require("customer email", &updated.email)?;
        Ok(updated)
    }
}
