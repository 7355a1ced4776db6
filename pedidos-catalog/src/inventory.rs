use std::sync::Arc;

use pedidos_core::StoreError;
use tracing::debug;
use uuid::Uuid;

use crate::repository::{ProductStore, StockDecrement};

/// Sole authority for moving `Product.stock`.
///
/// Reservations and releases are delegated to the store's atomic
/// primitives, so two concurrent reservations on the last unit can never
/// both pass the check.
#[derive(Clone)]
pub struct StockLedger {
    products: Arc<dyn ProductStore>,
}

impl StockLedger {
    pub fn new(products: Arc<dyn ProductStore>) -> Self {
        Self { products }
    }

    /// Checks `stock >= quantity` and decrements in one atomic step.
    ///
    /// Callers only reserve for products their order lines already
    /// reference; a vanished product row here means the reservation
    /// bookkeeping is corrupted, which is a bug and not a recoverable
    /// outcome.
    pub async fn reserve(&self, product_id: Uuid, quantity: i32) -> Result<(), InventoryError> {
        match self.products.decrement_stock(product_id, quantity).await? {
            StockDecrement::Applied => {
                debug!(%product_id, quantity, "stock reserved");
                Ok(())
            }
            StockDecrement::Insufficient { available } => Err(InventoryError::InsufficientStock {
                requested: quantity,
                available,
            }),
            StockDecrement::Missing => {
                panic!("reserve of {quantity} units against missing product {product_id}")
            }
        }
    }

    /// Reverses a prior reservation of the same quantity.
    ///
    /// The caller tracks how much was reserved per line; the ledger applies
    /// exactly what it is told. A missing product row is fatal for the same
    /// reason as in `reserve`: lines hold delete-restricted references, so
    /// the row cannot legitimately be gone while a reservation exists.
    pub async fn release(&self, product_id: Uuid, quantity: i32) -> Result<(), InventoryError> {
        let applied = self.products.increment_stock(product_id, quantity).await?;
        if !applied {
            panic!("release of {quantity} units for missing product {product_id}")
        }
        debug!(%product_id, quantity, "stock released");
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum InventoryError {
    #[error("insufficient stock: requested {requested}, available {available}")]
    InsufficientStock { requested: i32, available: i32 },

    #[error(transparent)]
    Store(#[from] StoreError),
}
