use std::sync::Arc;

use pedidos_core::StoreError;
use tracing::info;
use uuid::Uuid;

use crate::product::{NewProduct, Product, ProductFilter, ProductUpdate};
use crate::repository::ProductStore;

/// Read queries and product administration.
///
/// Stock is read-only from here; the ledger owns every stock mutation
/// after the initial level set at creation.
#[derive(Clone)]
pub struct Catalog {
    products: Arc<dyn ProductStore>,
}

impl Catalog {
    pub fn new(products: Arc<dyn ProductStore>) -> Self {
        Self { products }
    }

    pub async fn get(&self, id: Uuid) -> Result<Product, CatalogError> {
        self.products
            .get(id)
            .await?
            .ok_or(CatalogError::NotFound(id))
    }

    pub async fn list(&self, filter: &ProductFilter) -> Result<Vec<Product>, CatalogError> {
        Ok(self.products.list(filter).await?)
    }

    pub async fn create(&self, new: NewProduct) -> Result<Product, CatalogError> {
        validate(&new.name, new.price_cents)?;
        if new.stock < 0 {
            return Err(CatalogError::Validation(
                "initial stock must not be negative".to_string(),
            ));
        }

        if self.products.find_by_name(&new.name).await?.is_some() {
            return Err(CatalogError::DuplicateName(new.name));
        }

        let product = Product::new(new.name, new.description, new.price_cents, new.stock);
        self.products.insert(&product).await?;
        info!(product_id = %product.id, name = %product.name, "product created");
        Ok(product)
    }

    pub async fn update(&self, id: Uuid, update: ProductUpdate) -> Result<Product, CatalogError> {
        validate(&update.name, update.price_cents)?;

        let mut product = self.get(id).await?;

        if let Some(clash) = self.products.find_by_name(&update.name).await? {
            if clash.id != id {
                return Err(CatalogError::DuplicateName(update.name));
            }
        }

        product.name = update.name;
        product.description = update.description;
        product.price_cents = update.price_cents;
        product.updated_at = chrono::Utc::now();
        self.products.update(&product).await?;
        Ok(product)
    }

    /// Rejected while any order line references the product; a product in
    /// someone's order history is never cascaded away.
    pub async fn delete(&self, id: Uuid) -> Result<(), CatalogError> {
        // Surface a missing product as NotFound rather than a silent no-op.
        self.get(id).await?;

        match self.products.delete(id).await {
            Ok(()) => {
                info!(product_id = %id, "product deleted");
                Ok(())
            }
            Err(StoreError::Constraint(_)) => Err(CatalogError::InUse(id)),
            Err(err) => Err(err.into()),
        }
    }
}

fn validate(name: &str, price_cents: i64) -> Result<(), CatalogError> {
    if name.trim().is_empty() {
        return Err(CatalogError::Validation("name must not be empty".to_string()));
    }
    if price_cents <= 0 {
        return Err(CatalogError::Validation(
            "price must be greater than zero".to_string(),
        ));
    }
    Ok(())
}

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("product not found: {0}")]
    NotFound(Uuid),

    #[error("a product named '{0}' already exists")]
    DuplicateName(String),

    #[error("product {0} is referenced by existing orders")]
    InUse(Uuid),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_rejects_blank_name() {
        assert!(matches!(
            validate("  ", 100),
            Err(CatalogError::Validation(_))
        ));
    }

    #[test]
    fn test_validate_rejects_nonpositive_price() {
        assert!(matches!(validate("Widget", 0), Err(CatalogError::Validation(_))));
        assert!(matches!(
            validate("Widget", -5),
            Err(CatalogError::Validation(_))
        ));
        assert!(validate("Widget", 1).is_ok());
    }
}
