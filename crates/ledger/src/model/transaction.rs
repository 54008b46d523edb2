use chrono::{DateTime, NaiveDate, Utc};
use common::{CustomerId, TransactionId, TransactionItemId};
use record_store::Collection;
use serde::{Deserialize, Serialize};

use super::{Customer, Record, require};
use crate::error::{ValidationError, ensure_finite};

/// Direction of a transaction.
///
/// A debit is goods given on credit and raises what the customer owes; a
/// credit is a payment and lowers it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Debit,
    Credit,
}

impl TransactionType {
    /// The signed effect of `amount` on a customer balance.
    pub fn signed(&self, amount: f64) -> f64 {
        match self {
            TransactionType::Debit => amount,
            TransactionType::Credit => -amount,
        }
    }
}

impl std::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransactionType::Debit => f.write_str("debit"),
            TransactionType::Credit => f.write_str("credit"),
        }
    }
}

/// One line of a transaction. Line items are freeform and do not reference
/// catalog products.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionItem {
    pub id: TransactionItemId,
    pub name: String,
    pub quantity: f64,
    pub price: f64,
}

/// A recorded debit or credit against a customer.
///
/// `customer_name` and `total_amount` are captured when the transaction is
/// created and never updated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: TransactionId,
    pub customer_id: CustomerId,
    pub customer_name: String,
    pub items: Vec<TransactionItem>,
    pub total_amount: f64,
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub date: NaiveDate,
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    /// The signed amount this transaction adds to its customer's balance.
    pub fn contribution(&self) -> f64 {
        self.kind.signed(self.total_amount)
    }
}

impl Record for Transaction {
    const COLLECTION: Collection = Collection::Transactions;

    fn key(&self) -> String {
        self.id.to_string()
    }
}

/// A line item as entered by the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTransactionItem {
    pub name: String,
    pub quantity: f64,
    pub price: f64,
}

impl NewTransactionItem {
    pub fn new(name: impl Into<String>, quantity: f64, price: f64) -> Self {
        Self {
            name: name.into(),
            quantity,
            price,
        }
    }

    fn validate(&self) -> Result<(), ValidationError> {
        require("item name", &self.name)?;
        if !self.quantity.is_finite() || self.quantity <= 0.0 {
            return Err(ValidationError::InvalidQuantity {
                item: self.name.clone(),
                quantity: self.quantity,
            });
        }
        if !self.price.is_finite() || self.price < 0.0 {
            return Err(ValidationError::InvalidItemPrice {
                item: self.name.clone(),
                price: self.price,
            });
        }
        ensure_finite("line total", self.line_total())?;
        Ok(())
    }

    pub fn line_total(&self) -> f64 {
        self.quantity * self.price
    }
}

/// Input for [`crate::Ledger::add_transaction`].
#[derive(Debug, Clone, PartialEq)]
pub struct NewTransaction {
    pub customer_id: CustomerId,
    pub kind: TransactionType,
    pub date: NaiveDate,
    pub items: Vec<NewTransactionItem>,
}

impl NewTransaction {
    pub fn new(customer_id: CustomerId, kind: TransactionType, date: NaiveDate) -> Self {
        Self {
            customer_id,
            kind,
            date,
            items: Vec::new(),
        }
    }

    pub fn debit(customer_id: CustomerId, date: NaiveDate) -> Self {
        Self::new(customer_id, TransactionType::Debit, date)
    }

    pub fn credit(customer_id: CustomerId, date: NaiveDate) -> Self {
        Self::new(customer_id, TransactionType::Credit, date)
    }

    /// Appends a line item.
    pub fn item(mut self, name: impl Into<String>, quantity: f64, price: f64) -> Self {
        self.items.push(NewTransactionItem::new(name, quantity, price));
        self
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.items.is_empty() {
            return Err(ValidationError::NoItems);
        }
        self.items.iter().try_for_each(NewTransactionItem::validate)?;
        ensure_finite("transaction total", self.total())?;
        Ok(())
    }

    /// Sum of quantity times price over every line.
    pub fn total(&self) -> f64 {
        self.items.iter().map(NewTransactionItem::line_total).sum()
    }

    /// Builds the stored transaction for `customer`, snapshotting its name.
    pub(crate) fn into_transaction(
        self,
        customer: &Customer,
        created_at: DateTime<Utc>,
    ) -> Transaction {
        let total_amount = self.total();
        let items = self
            .items
            .into_iter()
            .map(|item| TransactionItem {
                id: TransactionItemId::new(),
                name: item.name.trim().to_string(),
                quantity: item.quantity,
                price: item.price,
            })
            .collect();

        Transaction {
            id: TransactionId::new(),
            customer_id: customer.id,
            customer_name: customer.name.clone(),
            items,
            total_amount,
            kind: self.kind,
            date: self.date,
            created_at,
        }
    }
}
