use common::PaymentTermId;
use record_store::Collection;
use serde::{Deserialize, Serialize};

use super::{Record, require};
use crate::error::ValidationError;

/// Net days a customer is given to settle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentTerm {
    pub id: PaymentTermId,
    pub name: String,
    pub days: u32,
}

impl Record for PaymentTerm {
    const COLLECTION: Collection = Collection::PaymentTerms;

    fn key(&self) -> String {
        self.id.to_string()
    }
}

/// Input for [`crate::Ledger::add_payment_term`].
#[derive(Debug, Clone, PartialEq)]
pub struct NewPaymentTerm {
    pub name: String,
    pub days: u32,
}

impl NewPaymentTerm {
    pub fn new(name: impl Into<String>, days: u32) -> Self {
        Self {
            name: name.into(),
            days,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        require("payment term name", &self.name)
    }

    pub(crate) fn into_term(self) -> PaymentTerm {
        PaymentTerm {
            id: PaymentTermId::new(),
            name: self.name.trim().to_string(),
            days: self.days,
        }
    }
}
