use async_trait::async_trait;
use pedidos_core::StoreResult;
use uuid::Uuid;

use crate::product::{Product, ProductFilter};

/// Outcome of the conditional stock decrement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StockDecrement {
    Applied,
    Insufficient { available: i32 },
    Missing,
}

/// Record-store contract for products.
///
/// `decrement_stock` must be atomic relative to concurrent calls on the
/// same product: the check and the write are one unit, never a read
/// followed by a separate save.
#[async_trait]
pub trait ProductStore: Send + Sync {
    async fn get(&self, id: Uuid) -> StoreResult<Option<Product>>;

    async fn list(&self, filter: &ProductFilter) -> StoreResult<Vec<Product>>;

    /// Case-insensitive name lookup, used for the uniqueness guard.
    async fn find_by_name(&self, name: &str) -> StoreResult<Option<Product>>;

    async fn insert(&self, product: &Product) -> StoreResult<()>;

    /// Writes the editable fields (name, description, price, updated_at).
    /// Never writes `stock`: a stale counter carried by the caller must
    /// not clobber a concurrent ledger movement.
    async fn update(&self, product: &Product) -> StoreResult<()>;

    /// Fails with a constraint error while any order line references the
    /// product.
    async fn delete(&self, id: Uuid) -> StoreResult<()>;

    /// Atomically runs `stock -= quantity` where `stock >= quantity`.
    async fn decrement_stock(&self, id: Uuid, quantity: i32) -> StoreResult<StockDecrement>;

    /// Atomically runs `stock += quantity`. Returns false when no such
    /// product row exists.
    async fn increment_stock(&self, id: Uuid, quantity: i32) -> StoreResult<bool>;
}
