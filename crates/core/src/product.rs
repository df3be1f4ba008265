use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entity::{Entity, NaturalKey};
use crate::error::{DomainError, DomainResult};
use crate::id::ProductId;

/// Persisted product row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    /// Units in stock.
    pub quantity: i64,
    /// Current unit cost. Reports always use this value, never a snapshot.
    pub cost_price: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for Product {
    type Id = ProductId;

    fn id(&self) -> ProductId {
        self.id
    }
}

impl NaturalKey for Product {
    fn natural_key(&self) -> &str {
        &self.name
    }
}

/// Insert/update payload for a product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductDraft {
    pub name: String,
    pub quantity: i64,
    pub cost_price: f64,
}

impl ProductDraft {
    pub fn new(name: impl Into<String>, quantity: i64, cost_price: f64) -> Self {
        Self {
            name: name.into(),
            quantity,
            cost_price,
        }
    }

    /// Name must be non-blank and cost must be a non-negative number.
    pub fn validate(&self) -> DomainResult<()> {
        if self.name.trim().is_empty() {
            return Err(DomainError::validation("product name is required"));
        }
        if !self.cost_price.is_finite() || self.cost_price < 0.0 {
            return Err(DomainError::validation(format!(
                "invalid cost price {} for product {:?}",
                self.cost_price, self.name
            )));
        }
        Ok(())
    }
}
