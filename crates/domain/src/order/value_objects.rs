//! Value objects for the order domain.

use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};
use common::{AddressId, CouponId, Money, ProductId, SkuId, UserId};
use serde::{Deserialize, Serialize};

use super::{OrderError, OrderId, OrderStatus};

/// Default time an unpaid order stays open before it expires.
pub const DEFAULT_ORDER_TTL_MINUTES: i64 = 30;

/// Delivery address captured when the order is placed.
///
/// Stored as opaque JSON and never re-read from the live address book.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AddressSnapshot(serde_json::Value);

impl AddressSnapshot {
    /// Snapshot that only references the address book entry by id.
    pub fn from_address_id(address_id: AddressId) -> Self {
        Self(serde_json::json!({ "address_id": address_id.as_i64() }))
    }

    /// Wraps an arbitrary JSON snapshot.
    pub fn from_json(value: serde_json::Value) -> Self {
        Self(value)
    }

    /// Returns the raw JSON.
    pub fn as_json(&self) -> &serde_json::Value {
        &self.0
    }

    /// Returns the JSON value, consuming the snapshot.
    pub fn into_json(self) -> serde_json::Value {
        self.0
    }
}

/// Amounts charged for an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Pricing {
    pub total_amount: Money,
    pub discount_amount: Money,
    pub freight_amount: Money,
    pub pay_amount: Money,
}

impl Pricing {
    /// Computes `pay = total - discount + freight`, clamped at zero.
    pub fn new(total_amount: Money, discount_amount: Money, freight_amount: Money) -> Self {
        Self {
            total_amount,
            discount_amount,
            freight_amount,
            pay_amount: (total_amount - discount_amount + freight_amount).clamp_non_negative(),
        }
    }

    /// Pricing with no discount and no freight.
    pub fn undiscounted(total_amount: Money) -> Self {
        Self::new(total_amount, Money::zero(), Money::zero())
    }
}

/// One line item of an order. Immutable once persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub sku_id: SkuId,
    pub product_id: ProductId,
    pub product_name: String,
    pub sku_specs: String,
    /// Unit price captured at placement time.
    pub price: Money,
    pub quantity: u32,
}

impl OrderLine {
    /// Returns `price * quantity`.
    pub fn subtotal(&self) -> Money {
        self.price.multiply(self.quantity)
    }

    fn validate(&self) -> Result<(), OrderError> {
        if self.quantity == 0 {
            return Err(OrderError::InvalidQuantity {
                quantity: self.quantity,
            });
        }
        if self.price.is_negative() {
            return Err(OrderError::InvalidPrice {
                price: self.price.cents(),
            });
        }
        Ok(())
    }
}

/// Order header. Status (and the update time that follows it) is the only
/// thing that changes after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderHeader {
    pub order_id: OrderId,
    pub user_id: UserId,
    pub pricing: Pricing,
    pub coupon_id: Option<CouponId>,
    pub status: OrderStatus,
    pub address_snapshot: AddressSnapshot,
    pub remark: Option<String>,
    pub cancel_reason: Option<String>,
    pub expire_time: DateTime<Utc>,
    pub create_time: DateTime<Utc>,
    pub update_time: DateTime<Utc>,
}

impl OrderHeader {
    /// Returns true if the order is still unpaid at `now` past its expiry.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.status == OrderStatus::Pending && self.expire_time <= now
    }
}

/// Order aggregate: header plus lines, persisted as one unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub header: OrderHeader,
    pub lines: Vec<OrderLine>,
}

impl Order {
    /// Starts building a new Pending order.
    pub fn builder() -> OrderBuilder {
        OrderBuilder::default()
    }

    /// Returns the order id.
    pub fn id(&self) -> &OrderId {
        &self.header.order_id
    }

    /// Returns the current status.
    pub fn status(&self) -> OrderStatus {
        self.header.status
    }

    /// Returns the owning user.
    pub fn user_id(&self) -> UserId {
        self.header.user_id
    }

    /// Returns the amount to pay.
    pub fn pay_amount(&self) -> Money {
        self.header.pricing.pay_amount
    }

    /// Returns the number of lines.
    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    /// Returns the SKUs on this order, in line order.
    pub fn sku_ids(&self) -> Vec<SkuId> {
        self.lines.iter().map(|l| l.sku_id).collect()
    }
}

/// Builder for a new Pending order.
#[derive(Debug, Default)]
pub struct OrderBuilder {
    order_id: Option<OrderId>,
    user_id: Option<UserId>,
    pricing: Option<Pricing>,
    coupon_id: Option<CouponId>,
    address_snapshot: Option<AddressSnapshot>,
    remark: Option<String>,
    lines: Vec<OrderLine>,
    created_at: Option<DateTime<Utc>>,
    ttl: Option<Duration>,
}

impl OrderBuilder {
    pub fn order_id(mut self, order_id: OrderId) -> Self {
        self.order_id = Some(order_id);
        self
    }

    pub fn user_id(mut self, user_id: UserId) -> Self {
        self.user_id = Some(user_id);
        self
    }

    /// Sets the amounts. Defaults to the undiscounted sum of the lines.
    pub fn pricing(mut self, pricing: Pricing) -> Self {
        self.pricing = Some(pricing);
        self
    }

    /// Sets the coupon. Ids `<= 0` mean "no coupon".
    pub fn coupon_id(mut self, coupon_id: CouponId) -> Self {
        self.coupon_id = coupon_id.is_present().then_some(coupon_id);
        self
    }

    pub fn address_snapshot(mut self, snapshot: AddressSnapshot) -> Self {
        self.address_snapshot = Some(snapshot);
        self
    }

    pub fn remark(mut self, remark: impl Into<String>) -> Self {
        self.remark = Some(remark.into());
        self
    }

    pub fn line(mut self, line: OrderLine) -> Self {
        self.lines.push(line);
        self
    }

    pub fn lines(mut self, lines: impl IntoIterator<Item = OrderLine>) -> Self {
        self.lines.extend(lines);
        self
    }

    /// Sets the creation time. Defaults to now.
    pub fn created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }

    /// Sets how long the order may stay unpaid. Defaults to 30 minutes.
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Validates the lines and builds a Pending order.
    pub fn build(self) -> Result<Order, OrderError> {
        let order_id = self.order_id.ok_or(OrderError::MissingField("order_id"))?;
        let user_id = self.user_id.ok_or(OrderError::MissingField("user_id"))?;

        if self.lines.is_empty() {
            return Err(OrderError::NoLines);
        }
        let mut seen = HashSet::with_capacity(self.lines.len());
        for line in &self.lines {
            line.validate()?;
            if !seen.insert(line.sku_id) {
                return Err(OrderError::DuplicateLine {
                    sku_id: line.sku_id,
                });
            }
        }

        let pricing = self.pricing.unwrap_or_else(|| {
            Pricing::undiscounted(self.lines.iter().map(OrderLine::subtotal).sum())
        });
        let created_at = self.created_at.unwrap_or_else(Utc::now);
        let ttl = self
            .ttl
            .unwrap_or_else(|| Duration::minutes(DEFAULT_ORDER_TTL_MINUTES));

        Ok(Order {
            header: OrderHeader {
                order_id,
                user_id,
                pricing,
                coupon_id: self.coupon_id,
                status: OrderStatus::Pending,
                address_snapshot: self
                    .address_snapshot
                    .unwrap_or_else(|| AddressSnapshot::from_json(serde_json::Value::Null)),
                remark: self.remark,
                cancel_reason: None,
                expire_time: created_at + ttl,
                create_time: created_at,
                update_time: created_at,
            },
            lines: self.lines,
        })
    }
}
