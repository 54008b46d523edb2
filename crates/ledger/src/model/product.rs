use chrono::{DateTime, Utc};
use common::ProductId;
use record_store::Collection;
use serde::{Deserialize, Serialize};

use super::{Record, require};
use crate::error::ValidationError;

/// A catalog entry. Products are not linked to transaction line items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub category: String,
    pub unit: String,
    /// Price per unit.
    pub price: f64,
    pub created_at: DateTime<Utc>,
}

impl Product {
    fn validate(&self) -> Result<(), ValidationError> {
        validate_fields(&self.name, &self.category, self.price)
    }
}

impl Record for Product {
    const COLLECTION: Collection = Collection::Products;

    fn key(&self) -> String {
        self.id.to_string()
    }
}

fn validate_fields(name: &str, category: &str, price: f64) -> Result<(), ValidationError> {
    require("product name", name)?;
    require("product category", category)?;
    if !price.is_finite() || price <= 0.0 {
        return Err(ValidationError::NonPositivePrice { price });
    }
    Ok(())
}

/// Input for [`crate::Ledger::add_product`].
#[derive(Debug, Clone, PartialEq)]
pub struct NewProduct {
    pub name: String,
    pub category: String,
    pub unit: String,
    pub price: f64,
}

impl NewProduct {
    pub fn new(
        name: impl Into<String>,
        category: impl Into<String>,
        unit: impl Into<String>,
        price: f64,
    ) -> Self {
        Self {
            name: name.into(),
            category: category.into(),
            unit: unit.into(),
            price,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_fields(&self.name, &self.category, self.price)
    }

    pub(crate) fn into_product(self, created_at: DateTime<Utc>) -> Product {
        Product {
            id: ProductId::new(),
            name: self.name.trim().to_string(),
            category: self.category.trim().to_string(),
            unit: self.unit,
            price: self.price,
            created_at,
        }
    }
}

/// A partial edit of a product. `None` fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProductUpdate {
    pub name: Option<String>,
    pub category: Option<String>,
    pub unit: Option<String>,
    pub price: Option<f64>,
}

impl ProductUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    pub fn price(mut self, price: f64) -> Self {
        self.price = Some(price);
        self
    }

    pub(crate) fn apply_to(self, product: &Product) -> Result<Product, ValidationError> {
        let mut updated = product.clone();
        if let Some(name) = self.name {
            updated.name = name.trim().to_string();
        }
        if let Some(category) = self.category {
            updated.category = category.trim().to_string();
        }
        if let Some(unit) = self.unit {
            updated.unit = unit;
        }
        if let Some(price) = self.price {
            updated.price = price;
        }
        updated.validate()?;
        Ok(updated)
    }
}
