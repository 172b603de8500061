//! PostgreSQL-backed store implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{LineId, OrderId};
use domain::{
    Color, ColorId, DeliveryInfo, GatewayTxn, Money, Order, OrderLine, OrderStatus, PaymentMethod,
    Product, ProductId, Size, SizeId, StockCell, User, UserId,
};
use sqlx::{PgPool, Postgres, Row, Transaction, postgres::PgRow};

use crate::cart::{CartAddOutcome, CartItem, CartStore};
use crate::catalog::CatalogStore;
use crate::error::{Result, StoreError};
use crate::ledger::StockLedger;
use crate::orders::{
    CheckoutPlan, FinalizeOutcome, OrderStore, PlaceOutcome, RollbackOutcome, StockIssue,
};

/// PostgreSQL store implementing all four store seams.
///
/// Each composite order operation runs inside one transaction; stock
/// reservations use a conditional `UPDATE … WHERE available >= $n`, so the
/// row's affected-count is the compare-and-swap confirmation and two
/// concurrent reservations on one cell serialize on the row lock.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Creates a new PostgreSQL store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }

    fn row_to_order(row: &PgRow) -> Result<Order> {
        let status_raw: String = row.try_get("status")?;
        let status = OrderStatus::parse(&status_raw)
            .ok_or_else(|| StoreError::CorruptRow(format!("unknown order status {status_raw:?}")))?;
        let method_raw: String = row.try_get("payment_method")?;
        let payment_method = PaymentMethod::parse(&method_raw).ok_or_else(|| {
            StoreError::CorruptRow(format!("unknown payment method {method_raw:?}"))
        })?;

        let txn_no: Option<String> = row.try_get("gateway_txn_no")?;
        let gateway_txn = match txn_no {
            Some(txn_no) => Some(GatewayTxn {
                bank_code: row
                    .try_get::<Option<String>, _>("gateway_bank_code")?
                    .unwrap_or_default(),
                txn_no,
                response_code: row
                    .try_get::<Option<String>, _>("gateway_response_code")?
                    .unwrap_or_default(),
                txn_status: row
                    .try_get::<Option<String>, _>("gateway_txn_status")?
                    .unwrap_or_default(),
            }),
            None => None,
        };

        Ok(Order {
            id: OrderId::from_raw(row.try_get::<String, _>("order_id")?),
            user: UserId::new(row.try_get::<String, _>("user_id")?),
            status,
            total_price: Money::from_cents(row.try_get("total_price_cents")?),
            payment_method,
            gateway_txn,
            delivery: DeliveryInfo {
                full_name: row.try_get("delivery_full_name")?,
                phone: row.try_get("delivery_phone")?,
                address: row.try_get("delivery_address")?,
            },
            created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
            updated_at: row.try_get::<DateTime<Utc>, _>("updated_at")?,
        })
    }

    fn row_to_line(row: &PgRow) -> Result<OrderLine> {
        Ok(OrderLine {
            id: LineId::from_raw(row.try_get::<String, _>("line_id")?),
            order: OrderId::from_raw(row.try_get::<String, _>("order_id")?),
            product: ProductId::new(row.try_get::<String, _>("product_id")?),
            color: ColorId::new(row.try_get::<String, _>("color_id")?),
            size: SizeId::new(row.try_get::<String, _>("size_id")?),
            quantity: db_qty(row.try_get("quantity")?)?,
            unit_price: Money::from_cents(row.try_get("unit_price_cents")?),
        })
    }

    /// Attempts the conditional decrement for one cell inside `tx`.
    /// Returns the stock issue if the cell is missing or short.
    async fn try_reserve_in_tx(
        tx: &mut Transaction<'_, Postgres>,
        cell: &StockCell,
        qty: u32,
    ) -> Result<Option<StockIssue>> {
        let updated = sqlx::query(
            r#"
            UPDATE stock SET available = available - $1
            WHERE product_id = $2 AND color_id = $3 AND size_id = $4 AND available >= $1
            "#,
        )
        .bind(i64::from(qty))
        .bind(cell.product.as_str())
        .bind(cell.color.as_str())
        .bind(cell.size.as_str())
        .execute(&mut **tx)
        .await?;

        if updated.rows_affected() > 0 {
            return Ok(None);
        }

        let available: Option<i64> = sqlx::query_scalar(
            "SELECT available FROM stock WHERE product_id = $1 AND color_id = $2 AND size_id = $3",
        )
        .bind(cell.product.as_str())
        .bind(cell.color.as_str())
        .bind(cell.size.as_str())
        .fetch_optional(&mut **tx)
        .await?;

        Ok(Some(match available {
            None => StockIssue::Missing { cell: cell.clone() },
            Some(available) => StockIssue::Insufficient {
                cell: cell.clone(),
                requested: qty,
                available: db_qty(available)?,
            },
        }))
    }
}

fn db_qty(raw: i64) -> Result<u32> {
    u32::try_from(raw).map_err(|_| StoreError::CorruptRow(format!("quantity out of range: {raw}")))
}

#[async_trait]
impl CatalogStore for PgStore {
    async fn product(&self, id: &ProductId) -> Result<Option<Product>> {
        let row = sqlx::query(
            "SELECT product_id, name, sell_price_cents FROM products WHERE product_id = $1",
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let colors: Vec<String> = sqlx::query_scalar(
            "SELECT color_id FROM product_colors WHERE product_id = $1 ORDER BY color_id",
        )
        .bind(id.as_str())
        .fetch_all(&self.pool)
        .await?;
        let sizes: Vec<String> = sqlx::query_scalar(
            "SELECT size_id FROM product_sizes WHERE product_id = $1 ORDER BY size_id",
        )
        .bind(id.as_str())
        .fetch_all(&self.pool)
        .await?;

        Ok(Some(Product {
            id: ProductId::new(row.try_get::<String, _>("product_id")?),
            name: row.try_get("name")?,
            sell_price: Money::from_cents(row.try_get("sell_price_cents")?),
            colors: colors.into_iter().map(ColorId::new).collect(),
            sizes: sizes.into_iter().map(SizeId::new).collect(),
        }))
    }

    async fn color(&self, id: &ColorId) -> Result<Option<Color>> {
        let row = sqlx::query("SELECT color_id, name FROM colors WHERE color_id = $1")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await?;
        Ok(match row {
            Some(row) => Some(Color {
                id: ColorId::new(row.try_get::<String, _>("color_id")?),
                name: row.try_get("name")?,
            }),
            None => None,
        })
    }

    async fn size(&self, id: &SizeId) -> Result<Option<Size>> {
        let row = sqlx::query("SELECT size_id, name FROM sizes WHERE size_id = $1")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await?;
        Ok(match row {
            Some(row) => Some(Size {
                id: SizeId::new(row.try_get::<String, _>("size_id")?),
                name: row.try_get("name")?,
            }),
            None => None,
        })
    }

    async fn user(&self, id: &UserId) -> Result<Option<User>> {
        let row = sqlx::query(
            "SELECT user_id, email, full_name, phone, address FROM users WHERE user_id = $1",
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await?;
        Ok(match row {
            Some(row) => Some(User {
                id: UserId::new(row.try_get::<String, _>("user_id")?),
                email: row.try_get("email")?,
                full_name: row.try_get("full_name")?,
                phone: row.try_get("phone")?,
                address: row.try_get("address")?,
            }),
            None => None,
        })
    }

    async fn update_delivery(&self, id: &UserId, delivery: &DeliveryInfo) -> Result<()> {
        let updated =
            sqlx::query("UPDATE users SET full_name = $1, phone = $2, address = $3 WHERE user_id = $4")
                .bind(&delivery.full_name)
                .bind(&delivery.phone)
                .bind(&delivery.address)
                .bind(id.as_str())
                .execute(&self.pool)
                .await?;
        if updated.rows_affected() == 0 {
            return Err(StoreError::UserNotFound(id.clone()));
        }
        Ok(())
    }
}

#[async_trait]
impl StockLedger for PgStore {
    async fn available(&self, cell: &StockCell) -> Result<Option<u32>> {
        let available: Option<i64> = sqlx::query_scalar(
            "SELECT available FROM stock WHERE product_id = $1 AND color_id = $2 AND size_id = $3",
        )
        .bind(cell.product.as_str())
        .bind(cell.color.as_str())
        .bind(cell.size.as_str())
        .fetch_optional(&self.pool)
        .await?;
        available.map(db_qty).transpose()
    }

    async fn reserve(&self, cell: &StockCell, qty: u32) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        let issue = Self::try_reserve_in_tx(&mut tx, cell, qty).await?;
        match issue {
            None => {
                tx.commit().await?;
                Ok(())
            }
            Some(StockIssue::Missing { cell }) => {
                tx.rollback().await?;
                Err(StoreError::UnknownCell(cell))
            }
            Some(StockIssue::Insufficient {
                cell,
                requested,
                available,
            }) => {
                tx.rollback().await?;
                Err(StoreError::Insufficient {
                    cell,
                    requested,
                    available,
                })
            }
        }
    }

    async fn release(&self, cell: &StockCell, qty: u32) -> Result<()> {
        let updated = sqlx::query(
            r#"
            UPDATE stock SET available = available + $1
            WHERE product_id = $2 AND color_id = $3 AND size_id = $4
            "#,
        )
        .bind(i64::from(qty))
        .bind(cell.product.as_str())
        .bind(cell.color.as_str())
        .bind(cell.size.as_str())
        .execute(&self.pool)
        .await?;
        if updated.rows_affected() == 0 {
            return Err(StoreError::UnknownCell(cell.clone()));
        }
        Ok(())
    }
}

#[async_trait]
impl OrderStore for PgStore {
    #[tracing::instrument(skip(self, plan), fields(order_id = %plan.order.id))]
    async fn place_order(&self, plan: CheckoutPlan) -> Result<PlaceOutcome> {
        let mut tx = self.pool.begin().await?;

        // Attempt every decrement first; collect one issue per failing cell.
        // Issues roll the whole transaction back, decrements included.
        let mut wanted: Vec<(StockCell, u32)> = Vec::new();
        for line in &plan.lines {
            let cell = line.stock_cell();
            match wanted.iter_mut().find(|(c, _)| c == &cell) {
                Some((_, qty)) => *qty += line.quantity,
                None => wanted.push((cell, line.quantity)),
            }
        }

        let mut issues = Vec::new();
        for (cell, qty) in &wanted {
            if let Some(issue) = Self::try_reserve_in_tx(&mut tx, cell, *qty).await? {
                issues.push(issue);
            }
        }
        if !issues.is_empty() {
            tx.rollback().await?;
            return Ok(PlaceOutcome::Rejected(issues));
        }

        let mut order = plan.order;
        order.total_price = plan.lines.iter().map(OrderLine::subtotal).sum();
        order.updated_at = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO orders (order_id, user_id, status, total_price_cents, payment_method,
                                delivery_full_name, delivery_phone, delivery_address,
                                created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(order.id.as_str())
        .bind(order.user.as_str())
        .bind(order.status.as_str())
        .bind(order.total_price.cents())
        .bind(order.payment_method.as_str())
        .bind(&order.delivery.full_name)
        .bind(&order.delivery.phone)
        .bind(&order.delivery.address)
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&mut *tx)
        .await?;

        for (position, line) in plan.lines.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO order_lines (line_id, order_id, product_id, color_id, size_id,
                                         quantity, unit_price_cents, position)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
            .bind(line.id.as_str())
            .bind(line.order.as_str())
            .bind(line.product.as_str())
            .bind(line.color.as_str())
            .bind(line.size.as_str())
            .bind(i64::from(line.quantity))
            .bind(line.unit_price.cents())
            .bind(position as i64)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        Ok(PlaceOutcome::Placed {
            order,
            lines: plan.lines,
        })
    }

    #[tracing::instrument(skip(self, txn), fields(order_id = %id))]
    async fn finalize_payment(&self, id: &OrderId, txn: GatewayTxn) -> Result<FinalizeOutcome> {
        // Single-statement check-and-set: only an order still awaiting
        // payment is mutated; a replay loses the WHERE clause.
        let row = sqlx::query(
            r#"
            UPDATE orders
            SET status = 'confirmed',
                gateway_bank_code = $2,
                gateway_txn_no = $3,
                gateway_response_code = $4,
                gateway_txn_status = $5,
                updated_at = now()
            WHERE order_id = $1 AND status = 'pending'
            RETURNING order_id, user_id, status, total_price_cents, payment_method,
                      gateway_bank_code, gateway_txn_no, gateway_response_code,
                      gateway_txn_status, delivery_full_name, delivery_phone,
                      delivery_address, created_at, updated_at
            "#,
        )
        .bind(id.as_str())
        .bind(&txn.bank_code)
        .bind(&txn.txn_no)
        .bind(&txn.response_code)
        .bind(&txn.txn_status)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = row {
            return Ok(FinalizeOutcome::Finalized(Self::row_to_order(&row)?));
        }

        let exists: Option<i64> = sqlx::query_scalar("SELECT 1 FROM orders WHERE order_id = $1")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await?;
        Ok(match exists {
            Some(_) => FinalizeOutcome::AlreadyFinalized,
            None => FinalizeOutcome::NotFound,
        })
    }

    #[tracing::instrument(skip(self), fields(order_id = %id))]
    async fn rollback_order(&self, id: &OrderId) -> Result<RollbackOutcome> {
        let mut tx = self.pool.begin().await?;

        // Lock the order row so a concurrent rollback or finalize waits
        // behind us; a missing row means someone else already handled it.
        let locked: Option<i64> =
            sqlx::query_scalar("SELECT 1 FROM orders WHERE order_id = $1 FOR UPDATE")
                .bind(id.as_str())
                .fetch_optional(&mut *tx)
                .await?;
        if locked.is_none() {
            tx.rollback().await?;
            return Ok(RollbackOutcome::NotFound);
        }

        let lines = sqlx::query(
            r#"
            SELECT line_id, order_id, product_id, color_id, size_id, quantity,
                   unit_price_cents, position
            FROM order_lines WHERE order_id = $1 ORDER BY position
            "#,
        )
        .bind(id.as_str())
        .fetch_all(&mut *tx)
        .await?;

        for row in &lines {
            let line = Self::row_to_line(row)?;
            let cell = line.stock_cell();
            sqlx::query(
                r#"
                UPDATE stock SET available = available + $1
                WHERE product_id = $2 AND color_id = $3 AND size_id = $4
                "#,
            )
            .bind(i64::from(line.quantity))
            .bind(cell.product.as_str())
            .bind(cell.color.as_str())
            .bind(cell.size.as_str())
            .execute(&mut *tx)
            .await?;
        }

        // Lines go with the order via ON DELETE CASCADE.
        sqlx::query("DELETE FROM orders WHERE order_id = $1")
            .bind(id.as_str())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(RollbackOutcome::RolledBack)
    }

    async fn order(&self, id: &OrderId) -> Result<Option<Order>> {
        let row = sqlx::query("SELECT * FROM orders WHERE order_id = $1")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::row_to_order).transpose()
    }

    async fn order_for_user(&self, user: &UserId, id: &OrderId) -> Result<Option<Order>> {
        let row = sqlx::query("SELECT * FROM orders WHERE order_id = $1 AND user_id = $2")
            .bind(id.as_str())
            .bind(user.as_str())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::row_to_order).transpose()
    }

    async fn orders_for_user(&self, user: &UserId) -> Result<Vec<Order>> {
        let rows = sqlx::query("SELECT * FROM orders WHERE user_id = $1 ORDER BY created_at DESC")
            .bind(user.as_str())
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(Self::row_to_order).collect()
    }

    async fn lines(&self, id: &OrderId) -> Result<Vec<OrderLine>> {
        let rows = sqlx::query(
            r#"
            SELECT line_id, order_id, product_id, color_id, size_id, quantity,
                   unit_price_cents, position
            FROM order_lines WHERE order_id = $1 ORDER BY position
            "#,
        )
        .bind(id.as_str())
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(Self::row_to_line).collect()
    }
}

#[async_trait]
impl CartStore for PgStore {
    async fn cart_items(&self, user: &UserId) -> Result<Vec<CartItem>> {
        let rows = sqlx::query(
            r#"
            SELECT product_id, color_id, size_id, quantity, updated_at
            FROM cart_items WHERE user_id = $1 ORDER BY updated_at
            "#,
        )
        .bind(user.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(CartItem {
                    cell: StockCell::new(
                        ProductId::new(row.try_get::<String, _>("product_id")?),
                        ColorId::new(row.try_get::<String, _>("color_id")?),
                        SizeId::new(row.try_get::<String, _>("size_id")?),
                    ),
                    quantity: db_qty(row.try_get("quantity")?)?,
                    updated_at: row.try_get::<DateTime<Utc>, _>("updated_at")?,
                })
            })
            .collect()
    }

    async fn add_item(&self, user: &UserId, cell: &StockCell, qty: u32) -> Result<CartAddOutcome> {
        let mut tx = self.pool.begin().await?;

        let available: Option<i64> = sqlx::query_scalar(
            "SELECT available FROM stock WHERE product_id = $1 AND color_id = $2 AND size_id = $3",
        )
        .bind(cell.product.as_str())
        .bind(cell.color.as_str())
        .bind(cell.size.as_str())
        .fetch_optional(&mut *tx)
        .await?;
        let Some(available) = available else {
            tx.rollback().await?;
            return Err(StoreError::UnknownCell(cell.clone()));
        };
        let available = db_qty(available)?;

        let in_cart: Option<i64> = sqlx::query_scalar(
            r#"
            SELECT quantity FROM cart_items
            WHERE user_id = $1 AND product_id = $2 AND color_id = $3 AND size_id = $4
            "#,
        )
        .bind(user.as_str())
        .bind(cell.product.as_str())
        .bind(cell.color.as_str())
        .bind(cell.size.as_str())
        .fetch_optional(&mut *tx)
        .await?;
        let in_cart = in_cart.map(db_qty).transpose()?.unwrap_or(0);

        if in_cart + qty > available {
            tx.rollback().await?;
            return Ok(CartAddOutcome::Shortfall { available, in_cart });
        }

        let row = sqlx::query(
            r#"
            INSERT INTO cart_items (user_id, product_id, color_id, size_id, quantity, updated_at)
            VALUES ($1, $2, $3, $4, $5, now())
            ON CONFLICT (user_id, product_id, color_id, size_id)
            DO UPDATE SET quantity = cart_items.quantity + EXCLUDED.quantity, updated_at = now()
            RETURNING quantity, updated_at
            "#,
        )
        .bind(user.as_str())
        .bind(cell.product.as_str())
        .bind(cell.color.as_str())
        .bind(cell.size.as_str())
        .bind(i64::from(qty))
        .fetch_one(&mut *tx)
        .await?;

        let item = CartItem {
            cell: cell.clone(),
            quantity: db_qty(row.try_get("quantity")?)?,
            updated_at: row.try_get::<DateTime<Utc>, _>("updated_at")?,
        };

        tx.commit().await?;
        Ok(CartAddOutcome::Added(item))
    }

    async fn set_item(&self, user: &UserId, cell: &StockCell, qty: u32) -> Result<bool> {
        let updated = sqlx::query(
            r#"
            UPDATE cart_items SET quantity = $5, updated_at = now()
            WHERE user_id = $1 AND product_id = $2 AND color_id = $3 AND size_id = $4
            "#,
        )
        .bind(user.as_str())
        .bind(cell.product.as_str())
        .bind(cell.color.as_str())
        .bind(cell.size.as_str())
        .bind(i64::from(qty))
        .execute(&self.pool)
        .await?;
        Ok(updated.rows_affected() > 0)
    }

    async fn remove_item(&self, user: &UserId, cell: &StockCell) -> Result<bool> {
        let deleted = sqlx::query(
            r#"
            DELETE FROM cart_items
            WHERE user_id = $1 AND product_id = $2 AND color_id = $3 AND size_id = $4
            "#,
        )
        .bind(user.as_str())
        .bind(cell.product.as_str())
        .bind(cell.color.as_str())
        .bind(cell.size.as_str())
        .execute(&self.pool)
        .await?;
        Ok(deleted.rows_affected() > 0)
    }

    async fn clear(&self, user: &UserId) -> Result<()> {
        sqlx::query("DELETE FROM cart_items WHERE user_id = $1")
            .bind(user.as_str())
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
