use async_trait::async_trait;
use pedidos_core::StoreResult;
use uuid::Uuid;

use crate::models::Order;

/// Record-store contract for orders.
///
/// An order is stored and loaded as a whole aggregate: the order row plus
/// its lines in insertion order.
#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn get(&self, id: Uuid) -> StoreResult<Option<Order>>;

    async fn find_cart(&self, customer_id: &str) -> StoreResult<Option<Order>>;

    /// Returns the customer's open cart, creating it when absent. The
    /// lookup and the create are one atomic operation so a customer can
    /// never end up with two carts.
    async fn get_or_create_cart(&self, customer_id: &str) -> StoreResult<Order>;

    /// Upserts the order and replaces its line set.
    async fn save(&self, order: &Order) -> StoreResult<()>;

    /// Removes the order and its lines.
    async fn delete(&self, id: Uuid) -> StoreResult<()>;

    /// Order history for one customer: every non-cart order, newest first.
    async fn list_for_customer(&self, customer_id: &str) -> StoreResult<Vec<Order>>;

    async fn list_all(&self) -> StoreResult<Vec<Order>>;
}
