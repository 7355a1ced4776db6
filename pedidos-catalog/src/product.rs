use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A sellable product with a live stock counter.
///
/// `stock` is only ever written by the stock ledger (and by product
/// creation, which fixes the initial level).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub price_cents: i64,
    pub stock: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    pub fn new(name: String, description: String, price_cents: i64, stock: i32) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name,
            description,
            price_cents,
            stock,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn in_stock(&self) -> bool {
        self.stock > 0
    }
}

/// Fields accepted when registering a product.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewProduct {
    pub name: String,
    pub description: String,
    pub price_cents: i64,
    pub stock: i32,
}

/// Fields an administrator may change on an existing product.
///
/// Stock is deliberately absent: live stock moves through the ledger only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductUpdate {
    pub name: String,
    pub description: String,
    pub price_cents: i64,
}

/// Catalog listing filter.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProductFilter {
    pub name_contains: Option<String>,
    pub min_price_cents: Option<i64>,
    pub max_price_cents: Option<i64>,
    pub in_stock_only: bool,
}

impl ProductFilter {
    /// Matches name or description, case-insensitive.
    pub fn matches(&self, product: &Product) -> bool {
        if let Some(needle) = &self.name_contains {
            let needle = needle.to_lowercase();
            if !product.name.to_lowercase().contains(&needle)
                && !product.description.to_lowercase().contains(&needle)
            {
                return false;
            }
        }
        if let Some(min) = self.min_price_cents {
            if product.price_cents < min {
                return false;
            }
        }
        if let Some(max) = self.max_price_cents {
            if product.price_cents > max {
                return false;
            }
        }
        if self.in_stock_only && !product.in_stock() {
            return false;
        }
        true
    }
}
