use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::totals;

/// Order lifecycle state.
///
/// `Cart` is the mutable, unreserved state: adding a line only checks
/// availability. Every other state holds one live stock reservation per
/// line, of that line's current quantity.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderState {
    Cart,
    Pending,
    Processing,
    Shipped,
    Delivered,
}

impl OrderState {
    pub fn is_cart(&self) -> bool {
        matches!(self, OrderState::Cart)
    }

    /// True for every state whose lines are backed by reserved stock.
    pub fn holds_reservation(&self) -> bool {
        !self.is_cart()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderState::Cart => "CART",
            OrderState::Pending => "PENDING",
            OrderState::Processing => "PROCESSING",
            OrderState::Shipped => "SHIPPED",
            OrderState::Delivered => "DELIVERED",
        }
    }
}

impl std::fmt::Display for OrderState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OrderState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CART" => Ok(OrderState::Cart),
            "PENDING" => Ok(OrderState::Pending),
            "PROCESSING" => Ok(OrderState::Processing),
            "SHIPPED" => Ok(OrderState::Shipped),
            "DELIVERED" => Ok(OrderState::Delivered),
            other => Err(format!("unknown order state: {other}")),
        }
    }
}

/// One product-quantity-subtotal record within an order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderLine {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    pub unit_price_cents: i64,
    pub subtotal_cents: i64,
    pub created_at: DateTime<Utc>,
}

impl OrderLine {
    pub fn new(order_id: Uuid, product_id: Uuid, quantity: i32, unit_price_cents: i64) -> Self {
        Self {
            id: Uuid::new_v4(),
            order_id,
            product_id,
            quantity,
            unit_price_cents,
            subtotal_cents: i64::from(quantity) * unit_price_cents,
            created_at: Utc::now(),
        }
    }

    /// Re-prices the line at the current unit price; the subtotal always
    /// reflects the price at the line's last mutation.
    pub fn set_quantity(&mut self, quantity: i32, unit_price_cents: i64) {
        self.quantity = quantity;
        self.unit_price_cents = unit_price_cents;
        self.subtotal_cents = i64::from(quantity) * unit_price_cents;
    }
}

/// A customer's order: the cart while in `Cart`, history afterwards.
///
/// Lines keep insertion order. The total is derived and recomputed after
/// every structural mutation, never authoritative on its own.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub customer_id: String,
    pub state: OrderState,
    pub total_cents: i64,
    pub created_at: DateTime<Utc>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
    pub lines: Vec<OrderLine>,
}

impl Order {
    pub fn new(customer_id: String, state: OrderState) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            customer_id,
            state,
            total_cents: 0,
            created_at: now,
            confirmed_at: None,
            updated_at: now,
            lines: Vec::new(),
        }
    }

    pub fn new_cart(customer_id: String) -> Self {
        Self::new(customer_id, OrderState::Cart)
    }

    pub fn line(&self, line_id: Uuid) -> Option<&OrderLine> {
        self.lines.iter().find(|l| l.id == line_id)
    }

    pub fn line_for_product(&self, product_id: Uuid) -> Option<&OrderLine> {
        self.lines.iter().find(|l| l.product_id == product_id)
    }

    pub fn push_line(&mut self, line: OrderLine) {
        self.lines.push(line);
        self.updated_at = Utc::now();
    }

    /// Mutates an existing line in place. Returns false when no line with
    /// that id exists.
    pub fn set_line_quantity(&mut self, line_id: Uuid, quantity: i32, unit_price_cents: i64) -> bool {
        match self.lines.iter_mut().find(|l| l.id == line_id) {
            Some(line) => {
                line.set_quantity(quantity, unit_price_cents);
                self.updated_at = Utc::now();
                true
            }
            None => false,
        }
    }

    pub fn remove_line(&mut self, line_id: Uuid) -> Option<OrderLine> {
        let idx = self.lines.iter().position(|l| l.id == line_id)?;
        self.updated_at = Utc::now();
        Some(self.lines.remove(idx))
    }

    pub fn update_state(&mut self, new_state: OrderState) {
        self.state = new_state;
        self.updated_at = Utc::now();
    }

    pub fn recompute_total(&mut self) {
        self.total_cents = totals::order_total(&self.lines);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_cart_is_unreserved() {
        assert!(!OrderState::Cart.holds_reservation());
        for state in [
            OrderState::Pending,
            OrderState::Processing,
            OrderState::Shipped,
            OrderState::Delivered,
        ] {
            assert!(state.holds_reservation());
        }
    }

    #[test]
    fn test_state_round_trips_through_str() {
        for state in [
            OrderState::Cart,
            OrderState::Pending,
            OrderState::Processing,
            OrderState::Shipped,
            OrderState::Delivered,
        ] {
            assert_eq!(state.as_str().parse::<OrderState>().unwrap(), state);
        }
        assert!("CANCELLED".parse::<OrderState>().is_err());
    }

    #[test]
    fn test_line_subtotal_follows_mutation() {
        let mut line = OrderLine::new(Uuid::new_v4(), Uuid::new_v4(), 2, 1500);
        assert_eq!(line.subtotal_cents, 3000);

        // Re-pricing at mutation time, not retroactively
        line.set_quantity(3, 1200);
        assert_eq!(line.subtotal_cents, 3600);
    }

    #[test]
    fn test_order_line_mutations_update_total() {
        let mut order = Order::new_cart("customer-1".to_string());
        let p1 = Uuid::new_v4();
        let p2 = Uuid::new_v4();

        order.push_line(OrderLine::new(order.id, p1, 2, 1000));
        order.push_line(OrderLine::new(order.id, p2, 1, 500));
        order.recompute_total();
        assert_eq!(order.total_cents, 2500);

        let line_id = order.line_for_product(p2).unwrap().id;
        order.remove_line(line_id).unwrap();
        order.recompute_total();
        assert_eq!(order.total_cents, 2000);

        // Recomputation is idempotent
        order.recompute_total();
        assert_eq!(order.total_cents, 2000);
    }

    #[test]
    fn test_lines_keep_insertion_order() {
        let mut order = Order::new_cart("customer-1".to_string());
        let ids: Vec<Uuid> = (0..4).map(|_| Uuid::new_v4()).collect();
        for product_id in &ids {
            order.push_line(OrderLine::new(order.id, *product_id, 1, 100));
        }
        let seen: Vec<Uuid> = order.lines.iter().map(|l| l.product_id).collect();
        assert_eq!(seen, ids);
    }

    #[test]
    fn test_remove_missing_line_is_none() {
        let mut order = Order::new_cart("customer-1".to_string());
        assert!(order.remove_line(Uuid::new_v4()).is_none());
    }
}
