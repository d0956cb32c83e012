//! PostgreSQL order store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{CouponId, Money, ProductId, SkuId, UserId};
use sqlx::{PgPool, Row, postgres::PgRow};

use super::{
    AddressSnapshot, Order, OrderError, OrderHeader, OrderId, OrderLine, OrderStatus, OrderStore,
    PageRequest, Pricing,
};
use crate::{DomainError, Result};

const HEADER_COLUMNS: &str = "order_id, user_id, total_amount, discount_amount, freight_amount, \
     pay_amount, coupon_id, status, address_snapshot, remark, cancel_reason, expire_time, \
     create_time, update_time";

/// PostgreSQL-backed order store.
///
/// Header and lines are inserted in one transaction. Status changes are a
/// single `UPDATE ... WHERE status = $from`.
#[derive(Clone)]
pub struct PostgresOrderStore {
    pool: PgPool,
}

impl PostgresOrderStore {
    /// Creates a new PostgreSQL order store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    fn row_to_header(row: &PgRow) -> Result<OrderHeader> {
        let order_id = OrderId::new(row.try_get::<String, _>("order_id")?);
        let code: i16 = row.try_get("status")?;
        let status = OrderStatus::from_code(code).ok_or_else(|| {
            DomainError::CorruptRecord(format!("order {order_id} has unknown status {code}"))
        })?;

        Ok(OrderHeader {
            user_id: UserId::new(row.try_get("user_id")?),
            pricing: Pricing {
                total_amount: Money::from_cents(row.try_get("total_amount")?),
                discount_amount: Money::from_cents(row.try_get("discount_amount")?),
                freight_amount: Money::from_cents(row.try_get("freight_amount")?),
                pay_amount: Money::from_cents(row.try_get("pay_amount")?),
            },
            coupon_id: row
                .try_get::<Option<i64>, _>("coupon_id")?
                .map(CouponId::new),
            status,
            address_snapshot: AddressSnapshot::from_json(row.try_get("address_snapshot")?),
            remark: row.try_get("remark")?,
            cancel_reason: row.try_get("cancel_reason")?,
            expire_time: row.try_get("expire_time")?,
            create_time: row.try_get("create_time")?,
            update_time: row.try_get("update_time")?,
            order_id,
        })
    }

    fn row_to_line(row: &PgRow) -> Result<OrderLine> {
        let quantity: i32 = row.try_get("quantity")?;
        Ok(OrderLine {
            sku_id: SkuId::new(row.try_get("sku_id")?),
            product_id: ProductId::new(row.try_get("product_id")?),
            product_name: row.try_get("product_name")?,
            sku_specs: row.try_get("sku_specs")?,
            price: Money::from_cents(row.try_get("price")?),
            quantity: u32::try_from(quantity).map_err(|_| {
                DomainError::CorruptRecord(format!("negative line quantity {quantity}"))
            })?,
        })
    }
}

fn bind_quantity(quantity: u32) -> Result<i32> {
    i32::try_from(quantity).map_err(|_| OrderError::InvalidQuantity { quantity }.into())
}

fn bind_line_no(line_no: usize) -> Result<i32> {
    i32::try_from(line_no).map_err(|_| OrderError::TooManyLines(line_no).into())
}

#[async_trait]
impl OrderStore for PostgresOrderStore {
    async fn insert(&self, order: &Order) -> Result<()> {
        let header = &order.header;
        let mut tx = self.pool.begin().await?;

        sqlx::query(&format!(
            "INSERT INTO order_header ({HEADER_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)"
        ))
        .bind(header.order_id.as_str())
        .bind(header.user_id.as_i64())
        .bind(header.pricing.total_amount.cents())
        .bind(header.pricing.discount_amount.cents())
        .bind(header.pricing.freight_amount.cents())
        .bind(header.pricing.pay_amount.cents())
        .bind(header.coupon_id.map(|c| c.as_i64()))
        .bind(header.status.code())
        .bind(header.address_snapshot.as_json())
        .bind(header.remark.as_deref())
        .bind(header.cancel_reason.as_deref())
        .bind(header.expire_time)
        .bind(header.create_time)
        .bind(header.update_time)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.constraint() == Some("order_header_pkey")
            {
                return OrderError::DuplicateOrderId(header.order_id.clone()).into();
            }
            DomainError::Database(e)
        })?;

        for (line_no, line) in order.lines.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO order_line
                    (order_id, line_no, sku_id, product_id, product_name, sku_specs, price, quantity)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
            .bind(header.order_id.as_str())
            .bind(bind_line_no(line_no)?)
            .bind(line.sku_id.as_i64())
            .bind(line.product_id.as_i64())
            .bind(&line.product_name)
            .bind(&line.sku_specs)
            .bind(line.price.cents())
            .bind(bind_quantity(line.quantity)?)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn get(&self, order_id: &OrderId) -> Result<Option<Order>> {
        let row: Option<PgRow> = sqlx::query(&format!(
            "SELECT {HEADER_COLUMNS} FROM order_header WHERE order_id = $1"
        ))
        .bind(order_id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let header = Self::row_to_header(&row)?;

        let rows: Vec<PgRow> = sqlx::query(
            r#"
            SELECT sku_id, product_id, product_name, sku_specs, price, quantity
            FROM order_line
            WHERE order_id = $1
            ORDER BY line_no ASC
            "#,
        )
        .bind(order_id.as_str())
        .fetch_all(&self.pool)
        .await?;

        let lines = rows
            .iter()
            .map(Self::row_to_line)
            .collect::<Result<Vec<_>>>()?;

        Ok(Some(Order { header, lines }))
    }

    async fn transition_status(
        &self,
        order_id: &OrderId,
        from: OrderStatus,
        to: OrderStatus,
        reason: Option<&str>,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE order_header
            SET status = $1,
                cancel_reason = COALESCE($2, cancel_reason),
                update_time = NOW()
            WHERE order_id = $3 AND status = $4
            "#,
        )
        .bind(to.code())
        .bind(reason)
        .bind(order_id.as_str())
        .bind(from.code())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn find_expired(&self, now: DateTime<Utc>, limit: usize) -> Result<Vec<OrderHeader>> {
        let rows: Vec<PgRow> = sqlx::query(&format!(
            "SELECT {HEADER_COLUMNS} FROM order_header \
             WHERE status = $1 AND expire_time <= $2 \
             ORDER BY expire_time ASC, order_id ASC \
             LIMIT $3"
        ))
        .bind(OrderStatus::Pending.code())
        .bind(now)
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_header).collect()
    }

    async fn list_for_user(
        &self,
        user_id: UserId,
        status: Option<OrderStatus>,
        page: PageRequest,
    ) -> Result<Vec<OrderHeader>> {
        let rows: Vec<PgRow> = sqlx::query(&format!(
            "SELECT {HEADER_COLUMNS} FROM order_header \
             WHERE user_id = $1 AND ($2::SMALLINT IS NULL OR status = $2) \
             ORDER BY create_time DESC, order_id DESC \
             LIMIT $3 OFFSET $4"
        ))
        .bind(user_id.as_i64())
        .bind(status.map(|s| s.code()))
        .bind(i64::from(page.size))
        .bind(i64::try_from(page.offset()).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_header).collect()
    }
}
