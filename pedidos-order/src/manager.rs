use std::sync::Arc;

use chrono::Utc;
use pedidos_core::StoreError;
use pedidos_catalog::inventory::{InventoryError, StockLedger};
use pedidos_catalog::repository::ProductStore;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::models::{Order, OrderLine, OrderState};
use crate::policy::TransitionPolicy;
use crate::repository::OrderStore;

/// Drives the order lifecycle and keeps stock consistent with it.
///
/// Cart mutations hold no stock; confirmation converts the cart's soft
/// holds into per-line reservations, all-or-nothing. Edits to a confirmed
/// order move the quantity delta through the ledger, and deletion reverses
/// exactly what the order's state says it holds.
#[derive(Clone)]
pub struct OrderManager {
    orders: Arc<dyn OrderStore>,
    products: Arc<dyn ProductStore>,
    ledger: StockLedger,
    policy: TransitionPolicy,
}

impl OrderManager {
    pub fn new(orders: Arc<dyn OrderStore>, products: Arc<dyn ProductStore>) -> Self {
        Self {
            ledger: StockLedger::new(products.clone()),
            orders,
            products,
            policy: TransitionPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: TransitionPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// The customer's open cart, created lazily on first interaction.
    pub async fn get_cart(&self, customer_id: &str) -> Result<Order, OrderError> {
        Ok(self.orders.get_or_create_cart(customer_id).await?)
    }

    /// Adds units of a product to the customer's cart.
    ///
    /// This is a soft hold: availability is checked against live stock
    /// (counting what the cart already holds of the product) but nothing
    /// is reserved until confirmation.
    pub async fn add_to_cart(
        &self,
        customer_id: &str,
        product_id: Uuid,
        quantity: i32,
    ) -> Result<Order, OrderError> {
        if quantity <= 0 {
            return Err(OrderError::InvalidQuantity(quantity));
        }

        let mut cart = self.orders.get_or_create_cart(customer_id).await?;

        let product = self
            .products
            .get(product_id)
            .await?
            .ok_or(OrderError::ProductNotFound(product_id))?;

        let already = cart
            .line_for_product(product_id)
            .map(|line| line.quantity)
            .unwrap_or(0);
        if product.stock < already + quantity {
            return Err(OrderError::InsufficientStock {
                product_id,
                requested: quantity,
                available: product.stock,
            });
        }

        match cart.line_for_product(product_id).map(|line| line.id) {
            Some(line_id) => {
                cart.set_line_quantity(line_id, already + quantity, product.price_cents);
            }
            None => {
                let line = OrderLine::new(cart.id, product_id, quantity, product.price_cents);
                cart.push_line(line);
            }
        }
        cart.recompute_total();
        self.orders.save(&cart).await?;

        debug!(order_id = %cart.id, %product_id, quantity, "added to cart");
        Ok(cart)
    }

    /// Sets a line's quantity. Zero removes the line.
    ///
    /// On a cart this is another soft check. On a confirmed order the
    /// delta moves through the ledger: an increase is reserved before the
    /// write so it can still fail cleanly, a decrease is released after
    /// the write so a failed write cannot over-credit stock.
    pub async fn update_quantity(
        &self,
        order_id: Uuid,
        line_id: Uuid,
        quantity: i32,
    ) -> Result<Order, OrderError> {
        if quantity < 0 {
            return Err(OrderError::InvalidQuantity(quantity));
        }
        if quantity == 0 {
            return self.remove_line(order_id, line_id).await;
        }

        let mut order = self.get_order(order_id).await?;
        let line = order
            .line(line_id)
            .cloned()
            .ok_or(OrderError::LineNotFound(line_id))?;
        let product = self
            .products
            .get(line.product_id)
            .await?
            .ok_or(OrderError::ProductNotFound(line.product_id))?;

        if !order.state.holds_reservation() {
            if product.stock < quantity {
                return Err(OrderError::InsufficientStock {
                    product_id: product.id,
                    requested: quantity,
                    available: product.stock,
                });
            }
            order.set_line_quantity(line_id, quantity, product.price_cents);
            order.recompute_total();
            self.orders.save(&order).await?;
            return Ok(order);
        }

        let delta = quantity - line.quantity;
        if delta > 0 {
            self.ledger
                .reserve(line.product_id, delta)
                .await
                .map_err(|err| stock_error(line.product_id, err))?;
        }

        order.set_line_quantity(line_id, quantity, product.price_cents);
        order.recompute_total();
        if let Err(err) = self.orders.save(&order).await {
            if delta > 0 {
                self.rollback(&[(line.product_id, delta)]).await;
            }
            return Err(err.into());
        }

        if delta < 0 {
            self.ledger
                .release(line.product_id, -delta)
                .await
                .map_err(|err| stock_error(line.product_id, err))?;
        }

        debug!(%order_id, %line_id, quantity, delta, "line quantity updated");
        Ok(order)
    }

    /// Removes a line; releases its reservation when the order holds one.
    pub async fn remove_line(&self, order_id: Uuid, line_id: Uuid) -> Result<Order, OrderError> {
        let mut order = self.get_order(order_id).await?;
        let line = order
            .remove_line(line_id)
            .ok_or(OrderError::LineNotFound(line_id))?;
        order.recompute_total();
        self.orders.save(&order).await?;

        if order.state.holds_reservation() {
            self.ledger
                .release(line.product_id, line.quantity)
                .await
                .map_err(|err| stock_error(line.product_id, err))?;
        }

        debug!(%order_id, %line_id, product_id = %line.product_id, "line removed");
        Ok(order)
    }

    /// Promotes the customer's cart to `Pending`, reserving stock for
    /// every line.
    ///
    /// All-or-nothing: the first failed reservation releases everything
    /// reserved so far and leaves the cart untouched. The order row is
    /// only written after every reservation succeeded, so a partially
    /// confirmed order is never observable.
    pub async fn confirm(&self, customer_id: &str) -> Result<Order, OrderError> {
        let mut cart = match self.orders.find_cart(customer_id).await? {
            Some(cart) => cart,
            None => return Err(OrderError::EmptyCart),
        };
        if cart.lines.is_empty() {
            return Err(OrderError::EmptyCart);
        }

        let mut reserved: Vec<(Uuid, i32)> = Vec::with_capacity(cart.lines.len());
        for line in &cart.lines {
            match self.ledger.reserve(line.product_id, line.quantity).await {
                Ok(()) => reserved.push((line.product_id, line.quantity)),
                Err(err) => {
                    self.rollback(&reserved).await;
                    return Err(stock_error(line.product_id, err));
                }
            }
        }

        cart.update_state(OrderState::Pending);
        cart.confirmed_at = Some(Utc::now());
        cart.recompute_total();
        if let Err(err) = self.orders.save(&cart).await {
            self.rollback(&reserved).await;
            return Err(err.into());
        }

        info!(
            order_id = %cart.id,
            customer_id,
            total_cents = cart.total_cents,
            "cart confirmed"
        );
        Ok(cart)
    }

    /// Adds units of a product to an arbitrary order (the employee path).
    ///
    /// On a cart this behaves like the customer's add-to-cart. On a
    /// confirmed order the reservation is taken first; line creation or
    /// update happens only once the stock is held, or not at all.
    pub async fn add_line(
        &self,
        order_id: Uuid,
        product_id: Uuid,
        quantity: i32,
    ) -> Result<Order, OrderError> {
        if quantity <= 0 {
            return Err(OrderError::InvalidQuantity(quantity));
        }

        let mut order = self.get_order(order_id).await?;
        if !order.state.holds_reservation() {
            let customer_id = order.customer_id.clone();
            return self.add_to_cart(&customer_id, product_id, quantity).await;
        }

        let product = self
            .products
            .get(product_id)
            .await?
            .ok_or(OrderError::ProductNotFound(product_id))?;

        self.ledger
            .reserve(product_id, quantity)
            .await
            .map_err(|err| stock_error(product_id, err))?;

        match order.line_for_product(product_id).map(|line| line.id) {
            Some(line_id) => {
                let total = order.line(line_id).map(|l| l.quantity).unwrap_or(0) + quantity;
                order.set_line_quantity(line_id, total, product.price_cents);
            }
            None => {
                let line = OrderLine::new(order.id, product_id, quantity, product.price_cents);
                order.push_line(line);
            }
        }
        order.recompute_total();
        if let Err(err) = self.orders.save(&order).await {
            self.rollback(&[(product_id, quantity)]).await;
            return Err(err.into());
        }

        debug!(%order_id, %product_id, quantity, "line added by employee");
        Ok(order)
    }

    /// Moves an order between fulfilment states. No stock effect.
    pub async fn change_state(
        &self,
        order_id: Uuid,
        new_state: OrderState,
    ) -> Result<Order, OrderError> {
        let mut order = self.get_order(order_id).await?;
        if !self.policy.allows(order.state, new_state) {
            return Err(OrderError::InvalidStateTransition {
                from: order.state,
                to: new_state,
            });
        }

        let from = order.state;
        order.update_state(new_state);
        self.orders.save(&order).await?;

        info!(%order_id, %from, to = %new_state, "order state changed");
        Ok(order)
    }

    /// Creates an empty `Pending` order for a customer (employee path);
    /// lines arrive through `add_line`, each reserving as it lands.
    pub async fn open_order(&self, customer_id: &str) -> Result<Order, OrderError> {
        let order = Order::new(customer_id.to_string(), OrderState::Pending);
        self.orders.save(&order).await?;
        info!(order_id = %order.id, customer_id, "order opened");
        Ok(order)
    }

    /// Removes an order and restores whatever stock its state holds.
    ///
    /// Carts were never reserved, so deleting one releases nothing. The
    /// order is removed first; releases follow, so a failed removal leaves
    /// stock untouched.
    pub async fn delete_order(&self, order_id: Uuid) -> Result<(), OrderError> {
        let order = self.get_order(order_id).await?;
        self.orders.delete(order_id).await?;

        if order.state.holds_reservation() {
            for line in &order.lines {
                self.ledger
                    .release(line.product_id, line.quantity)
                    .await
                    .map_err(|err| stock_error(line.product_id, err))?;
            }
        }

        info!(%order_id, state = %order.state, "order deleted");
        Ok(())
    }

    pub async fn get_order(&self, order_id: Uuid) -> Result<Order, OrderError> {
        self.orders
            .get(order_id)
            .await?
            .ok_or(OrderError::OrderNotFound(order_id))
    }

    /// The customer's order history (carts excluded), newest first.
    pub async fn list_for_customer(&self, customer_id: &str) -> Result<Vec<Order>, OrderError> {
        Ok(self.orders.list_for_customer(customer_id).await?)
    }

    pub async fn list_all(&self) -> Result<Vec<Order>, OrderError> {
        Ok(self.orders.list_all().await?)
    }

    /// Recomputes and persists the derived total, returning it.
    pub async fn recompute_total(&self, order_id: Uuid) -> Result<i64, OrderError> {
        let mut order = self.get_order(order_id).await?;
        order.recompute_total();
        self.orders.save(&order).await?;
        Ok(order.total_cents)
    }

    /// Best-effort release of reservations taken earlier in a failed
    /// multi-step operation.
    async fn rollback(&self, reserved: &[(Uuid, i32)]) {
        for (product_id, quantity) in reserved {
            if let Err(err) = self.ledger.release(*product_id, *quantity).await {
                warn!(%product_id, quantity, %err, "failed to release reservation during rollback");
            }
        }
    }
}

fn stock_error(product_id: Uuid, err: InventoryError) -> OrderError {
    match err {
        InventoryError::InsufficientStock {
            requested,
            available,
        } => OrderError::InsufficientStock {
            product_id,
            requested,
            available,
        },
        InventoryError::Store(err) => OrderError::Store(err),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum OrderError {
    #[error("product not found: {0}")]
    ProductNotFound(Uuid),

    #[error("insufficient stock for product {product_id}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: Uuid,
        requested: i32,
        available: i32,
    },

    #[error("cart is empty")]
    EmptyCart,

    #[error("order not found: {0}")]
    OrderNotFound(Uuid),

    #[error("order line not found: {0}")]
    LineNotFound(Uuid),

    #[error("quantity must be positive, got {0}")]
    InvalidQuantity(i32),

    #[error("invalid state transition from {from} to {to}")]
    InvalidStateTransition { from: OrderState, to: OrderState },

    #[error(transparent)]
    Store(#[from] StoreError),
}
