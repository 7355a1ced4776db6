use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use pedidos_catalog::product::{Product, ProductFilter};
use pedidos_catalog::repository::{ProductStore, StockDecrement};
use pedidos_core::{StoreError, StoreResult};
use pedidos_order::models::Order;
use pedidos_order::repository::OrderStore;
use uuid::Uuid;

#[derive(Default)]
struct State {
    products: HashMap<Uuid, Product>,
    orders: HashMap<Uuid, Order>,
}

/// In-process record store backing the test suite.
///
/// One mutex guards all state and every operation takes it exactly once,
/// which makes the conditional stock decrement and cart get-or-create
/// atomic the same way the Postgres primitives are. The lock is never held
/// across an await.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().expect("memory store mutex poisoned")
    }
}

#[async_trait]
impl ProductStore for MemoryStore {
    async fn get(&self, id: Uuid) -> StoreResult<Option<Product>> {
        Ok(self.lock().products.get(&id).cloned())
    }

    async fn list(&self, filter: &ProductFilter) -> StoreResult<Vec<Product>> {
        let state = self.lock();
        let mut products: Vec<Product> = state
            .products
            .values()
            .filter(|p| filter.matches(p))
            .cloned()
            .collect();
        products.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(products)
    }

    async fn find_by_name(&self, name: &str) -> StoreResult<Option<Product>> {
        let needle = name.to_lowercase();
        Ok(self
            .lock()
            .products
            .values()
            .find(|p| p.name.to_lowercase() == needle)
            .cloned())
    }

    async fn insert(&self, product: &Product) -> StoreResult<()> {
        let mut state = self.lock();
        let needle = product.name.to_lowercase();
        if state
            .products
            .values()
            .any(|p| p.id != product.id && p.name.to_lowercase() == needle)
        {
            return Err(StoreError::Constraint(format!(
                "duplicate product name: {}",
                product.name
            )));
        }
        state.products.insert(product.id, product.clone());
        Ok(())
    }

    async fn update(&self, product: &Product) -> StoreResult<()> {
        let mut state = self.lock();
        let needle = product.name.to_lowercase();
        if state
            .products
            .values()
            .any(|p| p.id != product.id && p.name.to_lowercase() == needle)
        {
            return Err(StoreError::Constraint(format!(
                "duplicate product name: {}",
                product.name
            )));
        }
        if let Some(existing) = state.products.get_mut(&product.id) {
            existing.name = product.name.clone();
            existing.description = product.description.clone();
            existing.price_cents = product.price_cents;
            existing.updated_at = product.updated_at;
            // stock deliberately untouched
        }
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> StoreResult<()> {
        let mut state = self.lock();
        let referenced = state
            .orders
            .values()
            .flat_map(|order| order.lines.iter())
            .any(|line| line.product_id == id);
        if referenced {
            return Err(StoreError::Constraint(format!(
                "product {id} is referenced by order lines"
            )));
        }
        state.products.remove(&id);
        Ok(())
    }

    async fn decrement_stock(&self, id: Uuid, quantity: i32) -> StoreResult<StockDecrement> {
        let mut state = self.lock();
        match state.products.get_mut(&id) {
            Some(product) if product.stock >= quantity => {
                product.stock -= quantity;
                product.updated_at = chrono::Utc::now();
                Ok(StockDecrement::Applied)
            }
            Some(product) => Ok(StockDecrement::Insufficient {
                available: product.stock,
            }),
            None => Ok(StockDecrement::Missing),
        }
    }

    async fn increment_stock(&self, id: Uuid, quantity: i32) -> StoreResult<bool> {
        let mut state = self.lock();
        match state.products.get_mut(&id) {
            Some(product) => {
                product.stock += quantity;
                product.updated_at = chrono::Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[async_trait]
impl OrderStore for MemoryStore {
    async fn get(&self, id: Uuid) -> StoreResult<Option<Order>> {
        Ok(self.lock().orders.get(&id).cloned())
    }

    async fn find_cart(&self, customer_id: &str) -> StoreResult<Option<Order>> {
        Ok(self
            .lock()
            .orders
            .values()
            .find(|o| o.customer_id == customer_id && o.state.is_cart())
            .cloned())
    }

    async fn get_or_create_cart(&self, customer_id: &str) -> StoreResult<Order> {
        let mut state = self.lock();
        if let Some(cart) = state
            .orders
            .values()
            .find(|o| o.customer_id == customer_id && o.state.is_cart())
        {
            return Ok(cart.clone());
        }
        let cart = Order::new_cart(customer_id.to_string());
        state.orders.insert(cart.id, cart.clone());
        Ok(cart)
    }

    async fn save(&self, order: &Order) -> StoreResult<()> {
        let mut state = self.lock();
        if order.state.is_cart() {
            let duplicate = state.orders.values().any(|o| {
                o.id != order.id && o.customer_id == order.customer_id && o.state.is_cart()
            });
            if duplicate {
                return Err(StoreError::Constraint(format!(
                    "customer {} already has an open cart",
                    order.customer_id
                )));
            }
        }
        state.orders.insert(order.id, order.clone());
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> StoreResult<()> {
        self.lock().orders.remove(&id);
        Ok(())
    }

    async fn list_for_customer(&self, customer_id: &str) -> StoreResult<Vec<Order>> {
        let state = self.lock();
        let mut orders: Vec<Order> = state
            .orders
            .values()
            .filter(|o| o.customer_id == customer_id && !o.state.is_cart())
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }

    async fn list_all(&self) -> StoreResult<Vec<Order>> {
        let state = self.lock();
        let mut orders: Vec<Order> = state.orders.values().cloned().collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pedidos_order::models::{OrderLine, OrderState};

    fn product(name: &str, stock: i32) -> Product {
        Product::new(name.to_string(), String::new(), 1000, stock)
    }

    #[tokio::test]
    async fn test_decrement_stops_at_the_floor() {
        let store = MemoryStore::new();
        let p = product("Widget", 3);
        store.insert(&p).await.unwrap();

        assert_eq!(
            store.decrement_stock(p.id, 2).await.unwrap(),
            StockDecrement::Applied
        );
        // 1 left; asking for 2 must not go negative
        assert_eq!(
            store.decrement_stock(p.id, 2).await.unwrap(),
            StockDecrement::Insufficient { available: 1 }
        );
        assert_eq!(ProductStore::get(&store, p.id).await.unwrap().unwrap().stock, 1);
    }

    #[tokio::test]
    async fn test_decrement_missing_product() {
        let store = MemoryStore::new();
        assert_eq!(
            store.decrement_stock(Uuid::new_v4(), 1).await.unwrap(),
            StockDecrement::Missing
        );
        assert!(!store.increment_stock(Uuid::new_v4(), 1).await.unwrap());
    }

    #[tokio::test]
    async fn test_one_cart_per_customer() {
        let store = MemoryStore::new();
        let a = store.get_or_create_cart("customer-1").await.unwrap();
        let b = store.get_or_create_cart("customer-1").await.unwrap();
        assert_eq!(a.id, b.id);

        let other = store.get_or_create_cart("customer-2").await.unwrap();
        assert_ne!(a.id, other.id);
    }

    #[tokio::test]
    async fn test_saving_second_cart_is_a_constraint_violation() {
        let store = MemoryStore::new();
        store.get_or_create_cart("customer-1").await.unwrap();

        let rogue = Order::new_cart("customer-1".to_string());
        assert!(matches!(
            store.save(&rogue).await,
            Err(StoreError::Constraint(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_referenced_product_rejected() {
        let store = MemoryStore::new();
        let p = product("Widget", 5);
        store.insert(&p).await.unwrap();

        let mut cart = store.get_or_create_cart("customer-1").await.unwrap();
        cart.push_line(OrderLine::new(cart.id, p.id, 1, p.price_cents));
        store.save(&cart).await.unwrap();

        assert!(matches!(
            ProductStore::delete(&store, p.id).await,
            Err(StoreError::Constraint(_))
        ));

        OrderStore::delete(&store, cart.id).await.unwrap();
        ProductStore::delete(&store, p.id).await.unwrap();
    }

    #[tokio::test]
    async fn test_duplicate_name_rejected_case_insensitive() {
        let store = MemoryStore::new();
        store.insert(&product("Widget", 1)).await.unwrap();
        assert!(matches!(
            store.insert(&product("WIDGET", 1)).await,
            Err(StoreError::Constraint(_))
        ));
    }

    #[tokio::test]
    async fn test_update_never_writes_stock() {
        let store = MemoryStore::new();
        let mut p = product("Widget", 5);
        store.insert(&p).await.unwrap();

        store.decrement_stock(p.id, 3).await.unwrap();

        // Carries the stale stock value read before the decrement
        p.price_cents = 2000;
        store.update(&p).await.unwrap();

        let current = ProductStore::get(&store, p.id).await.unwrap().unwrap();
        assert_eq!(current.price_cents, 2000);
        assert_eq!(current.stock, 2);
    }

    #[tokio::test]
    async fn test_history_excludes_cart_and_sorts_newest_first() {
        let store = MemoryStore::new();
        store.get_or_create_cart("customer-1").await.unwrap();

        let mut first = Order::new("customer-1".to_string(), OrderState::Pending);
        first.created_at = chrono::Utc::now() - chrono::Duration::minutes(5);
        store.save(&first).await.unwrap();

        let second = Order::new("customer-1".to_string(), OrderState::Shipped);
        store.save(&second).await.unwrap();

        let history = store.list_for_customer("customer-1").await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].id, second.id);
        assert_eq!(history[1].id, first.id);
    }
}
