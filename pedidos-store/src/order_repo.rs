use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pedidos_core::{StoreError, StoreResult};
use pedidos_order::models::{Order, OrderLine, OrderState};
use pedidos_order::repository::OrderStore;
use sqlx::PgPool;
use uuid::Uuid;

use crate::database::map_sqlx;

pub struct PgOrderStore {
    pool: PgPool,
}

impl PgOrderStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn load_lines(&self, order_id: Uuid) -> StoreResult<Vec<OrderLine>> {
        let rows = sqlx::query_as::<_, OrderLineRow>(
            "SELECT id, order_id, product_id, quantity, unit_price_cents, subtotal_cents, created_at \
             FROM order_lines WHERE order_id = $1 ORDER BY position",
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx)?;

        Ok(rows.into_iter().map(OrderLine::from).collect())
    }

    async fn hydrate(&self, row: OrderRow) -> StoreResult<Order> {
        let lines = self.load_lines(row.id).await?;
        order_from_row(row, lines)
    }
}

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: Uuid,
    customer_id: String,
    state: String,
    total_cents: i64,
    created_at: DateTime<Utc>,
    confirmed_at: Option<DateTime<Utc>>,
    updated_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct OrderLineRow {
    id: Uuid,
    order_id: Uuid,
    product_id: Uuid,
    quantity: i32,
    unit_price_cents: i64,
    subtotal_cents: i64,
    created_at: DateTime<Utc>,
}

impl From<OrderLineRow> for OrderLine {
    fn from(row: OrderLineRow) -> Self {
        OrderLine {
            id: row.id,
            order_id: row.order_id,
            product_id: row.product_id,
            quantity: row.quantity,
            unit_price_cents: row.unit_price_cents,
            subtotal_cents: row.subtotal_cents,
            created_at: row.created_at,
        }
    }
}

fn order_from_row(row: OrderRow, lines: Vec<OrderLine>) -> StoreResult<Order> {
    let state = row
        .state
        .parse::<OrderState>()
        .map_err(StoreError::Query)?;

    Ok(Order {
        id: row.id,
        customer_id: row.customer_id,
        state,
        total_cents: row.total_cents,
        created_at: row.created_at,
        confirmed_at: row.confirmed_at,
        updated_at: row.updated_at,
        lines,
    })
}

const ORDER_COLUMNS: &str =
    "id, customer_id, state, total_cents, created_at, confirmed_at, updated_at";

#[async_trait]
impl OrderStore for PgOrderStore {
    async fn get(&self, id: Uuid) -> StoreResult<Option<Order>> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx)?;

        match row {
            Some(row) => Ok(Some(self.hydrate(row).await?)),
            None => Ok(None),
        }
    }

    async fn find_cart(&self, customer_id: &str) -> StoreResult<Option<Order>> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE customer_id = $1 AND state = 'CART'"
        ))
        .bind(customer_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx)?;

        match row {
            Some(row) => Ok(Some(self.hydrate(row).await?)),
            None => Ok(None),
        }
    }

    async fn get_or_create_cart(&self, customer_id: &str) -> StoreResult<Order> {
        // The partial unique index on (customer_id) WHERE state = 'CART'
        // makes this a single atomic get-or-create: a concurrent insert
        // loses the conflict and both callers read the same row.
        let cart = Order::new_cart(customer_id.to_string());
        sqlx::query(
            r#"
            INSERT INTO orders (id, customer_id, state, total_cents, created_at, updated_at)
            VALUES ($1, $2, 'CART', 0, $3, $4)
            ON CONFLICT (customer_id) WHERE state = 'CART' DO NOTHING
            "#,
        )
        .bind(cart.id)
        .bind(customer_id)
        .bind(cart.created_at)
        .bind(cart.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;

        self.find_cart(customer_id)
            .await?
            .ok_or_else(|| StoreError::Query(format!("cart for {customer_id} vanished after upsert")))
    }

    async fn save(&self, order: &Order) -> StoreResult<()> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx)?;

        sqlx::query(
            r#"
            INSERT INTO orders (id, customer_id, state, total_cents, created_at, confirmed_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (id) DO UPDATE
            SET customer_id = $2, state = $3, total_cents = $4,
                confirmed_at = $6, updated_at = $7
            "#,
        )
        .bind(order.id)
        .bind(&order.customer_id)
        .bind(order.state.as_str())
        .bind(order.total_cents)
        .bind(order.created_at)
        .bind(order.confirmed_at)
        .bind(order.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx)?;

        sqlx::query("DELETE FROM order_lines WHERE order_id = $1")
            .bind(order.id)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx)?;

        for (position, line) in order.lines.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO order_lines
                    (id, order_id, product_id, quantity, unit_price_cents, subtotal_cents, position, created_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
            .bind(line.id)
            .bind(line.order_id)
            .bind(line.product_id)
            .bind(line.quantity)
            .bind(line.unit_price_cents)
            .bind(line.subtotal_cents)
            .bind(position as i32)
            .bind(line.created_at)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx)?;
        }

        tx.commit().await.map_err(map_sqlx)?;
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> StoreResult<()> {
        // Lines go with the order via ON DELETE CASCADE
        sqlx::query("DELETE FROM orders WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx)?;

        Ok(())
    }

    async fn list_for_customer(&self, customer_id: &str) -> StoreResult<Vec<Order>> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders \
             WHERE customer_id = $1 AND state <> 'CART' ORDER BY created_at DESC"
        ))
        .bind(customer_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx)?;

        let mut orders = Vec::with_capacity(rows.len());
        for row in rows {
            orders.push(self.hydrate(row).await?);
        }
        Ok(orders)
    }

    async fn list_all(&self) -> StoreResult<Vec<Order>> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders ORDER BY created_at DESC"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx)?;

        let mut orders = Vec::with_capacity(rows.len());
        for row in rows {
            orders.push(self.hydrate(row).await?);
        }
        Ok(orders)
    }
}
