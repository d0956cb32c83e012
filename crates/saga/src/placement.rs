//! Order placement orchestrator.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Duration, Utc};
use common::{AddressId, CouponId, Money, UserId};
use domain::{
    AddressSnapshot, DomainError, Order, OrderError, OrderId, OrderLine, OrderService, OrderStore,
    Pricing,
};
use rand::Rng;
use serde::Serialize;
use stock_ledger::{StockError, StockLedger, StockStore};
use tracing::{error, info, warn};

use crate::compensation::ReservedLines;
use crate::error::{Result, SagaError};
use crate::order_placement::{self, ORDER_ID_ATTEMPTS};
use crate::services::{CartCleanup, CartLine, CartSnapshotProvider, CouponLedger, DiscountCalculator};

/// What the client gets back from a successful placement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderResult {
    pub order_id: OrderId,
    pub pay_amount: Money,
    pub expire_time: DateTime<Utc>,
}

/// Tunables for placement.
#[derive(Debug, Clone, Copy)]
pub struct PlacementConfig {
    /// How long an unpaid order is held.
    pub order_ttl: Duration,
    /// Shipping charged on every order.
    pub freight_amount: Money,
}

impl Default for PlacementConfig {
    fn default() -> Self {
        Self {
            order_ttl: Duration::minutes(order_placement::DEFAULT_ORDER_TTL_MINUTES),
            freight_amount: Money::zero(),
        }
    }
}

/// Places orders by running the placement saga over the collaborators.
///
/// The saga steps are:
/// 1. Fetch the selected cart lines
/// 2. Sum the lines
/// 3. Ask for a coupon discount (failure degrades to no discount)
/// 4. Reserve stock line by line
/// 5. Persist the order
/// 6. Redeem the coupon (best-effort)
/// 7. Clear the ordered lines from the cart (best-effort)
///
/// Only steps 4 and 5 are compensated, by releasing the stock reserved so far.
/// The orchestrator keeps no state between calls.
pub struct OrderPlacementOrchestrator<S, O, C, P>
where
    S: StockStore,
    O: OrderStore,
    C: CartSnapshotProvider + CartCleanup,
    P: DiscountCalculator + CouponLedger,
{
    ledger: Arc<StockLedger<S>>,
    orders: Arc<OrderService<O>>,
    cart: C,
    promotions: P,
    config: PlacementConfig,
}

impl<S, O, C, P> OrderPlacementOrchestrator<S, O, C, P>
where
    S: StockStore,
    O: OrderStore,
    C: CartSnapshotProvider + CartCleanup,
    P: DiscountCalculator + CouponLedger,
{
    /// Creates a new orchestrator with the default configuration.
    pub fn new(
        ledger: Arc<StockLedger<S>>,
        orders: Arc<OrderService<O>>,
        cart: C,
        promotions: P,
    ) -> Self {
        Self::with_config(ledger, orders, cart, promotions, PlacementConfig::default())
    }

    /// Creates a new orchestrator with a custom configuration.
    pub fn with_config(
        ledger: Arc<StockLedger<S>>,
        orders: Arc<OrderService<O>>,
        cart: C,
        promotions: P,
        config: PlacementConfig,
    ) -> Self {
        Self {
            ledger,
            orders,
            cart,
            promotions,
            config,
        }
    }

    /// Returns the configuration in use.
    pub fn config(&self) -> PlacementConfig {
        self.config
    }

    /// Places an order for everything `user_id` has selected in their cart.
    #[tracing::instrument(skip(self), fields(saga_type = order_placement::SAGA_TYPE))]
    pub async fn place_order(
        &self,
        user_id: UserId,
        coupon_id: CouponId,
        address_id: AddressId,
    ) -> Result<OrderResult> {
        let started = Instant::now();
        let result = self.run(user_id, coupon_id, address_id).await;
        metrics::histogram!("order_placement_duration_seconds")
            .record(started.elapsed().as_secs_f64());

        match &result {
            Ok(placed) => {
                metrics::counter!("order_placements_total").increment(1);
                info!(
                    %user_id,
                    order_id = %placed.order_id,
                    pay_amount = %placed.pay_amount,
                    "Order placed"
                );
            }
            Err(e) => {
                metrics::counter!("order_placement_failed", "reason" => e.kind().as_str())
                    .increment(1);
                warn!(%user_id, error = %e, "Order placement failed");
            }
        }
        result
    }

    async fn run(
        &self,
        user_id: UserId,
        coupon_id: CouponId,
        address_id: AddressId,
    ) -> Result<OrderResult> {
        // 1. Cart snapshot
        let lines = self.cart.selected_lines(user_id).await?;
        if lines.is_empty() {
            return Err(SagaError::EmptyCart);
        }

        // 2. Amounts
        let total_amount = order_total(&lines, self.config.freight_amount)?;

        // 3. Discount
        let discount_amount = self.discount_for(coupon_id, total_amount).await;
        let pricing = Pricing::new(total_amount, discount_amount, self.config.freight_amount);

        // 4. Stock
        let reserved = self.reserve_lines(&lines).await?;

        // 5. Persist
        let order = match self
            .persist(user_id, coupon_id, address_id, pricing, &lines)
            .await
        {
            Ok(order) => order,
            Err(e) => {
                error!(
                    %user_id,
                    step = order_placement::STEP_PERSIST_ORDER,
                    error = %e,
                    "Order persistence failed, releasing stock"
                );
                reserved
                    .release_all(&self.ledger, order_placement::STEP_PERSIST_ORDER)
                    .await;
                return Err(SagaError::ServerError {
                    step: order_placement::STEP_PERSIST_ORDER,
                    reason: e.to_string(),
                });
            }
        };

        // 6. Coupon
        if let Some(coupon_id) = order.header.coupon_id
            && discount_amount.is_positive()
            && let Err(e) = self
                .promotions
                .redeem(user_id, coupon_id, order.id())
                .await
        {
            warn!(
                %user_id,
                %coupon_id,
                order_id = %order.id(),
                step = order_placement::STEP_REDEEM_COUPON,
                error = %e,
                "Coupon redemption failed"
            );
        }

        // 7. Cart
        if let Err(e) = self.cart.clear_lines(user_id, &order.sku_ids()).await {
            warn!(
                %user_id,
                order_id = %order.id(),
                step = order_placement::STEP_CLEAR_CART,
                error = %e,
                "Cart cleanup failed"
            );
        }

        Ok(OrderResult {
            pay_amount: order.pay_amount(),
            expire_time: order.header.expire_time,
            order_id: order.header.order_id,
        })
    }

    /// Returns the discount to apply. Any problem means no discount.
    async fn discount_for(&self, coupon_id: CouponId, total_amount: Money) -> Money {
        if !coupon_id.is_present() {
            return Money::zero();
        }

        match self.promotions.calculate(coupon_id, total_amount).await {
            Ok(discount) if discount.valid => discount.discount_amount,
            Ok(_) => {
                info!(
                    %coupon_id,
                    %total_amount,
                    step = order_placement::STEP_CALCULATE_DISCOUNT,
                    "Coupon not applicable, continuing without discount"
                );
                Money::zero()
            }
            Err(e) => {
                warn!(
                    %coupon_id,
                    step = order_placement::STEP_CALCULATE_DISCOUNT,
                    error = %e,
                    "Discount calculation failed, continuing without discount"
                );
                Money::zero()
            }
        }
    }

    /// Reserves every line in cart order. On the first failure releases what
    /// was reserved and reports the line that could not be reserved.
    async fn reserve_lines(&self, lines: &[CartLine]) -> Result<ReservedLines> {
        let mut reserved = ReservedLines::new();
        for line in lines {
            match self.ledger.reserve(line.sku_id, line.quantity).await {
                Ok(_) => reserved.push(line.sku_id, line.quantity),
                Err(e) => {
                    warn!(
                        sku_id = %line.sku_id,
                        quantity = line.quantity,
                        reserved = reserved.len(),
                        step = order_placement::STEP_RESERVE_STOCK,
                        error = %e,
                        "Reservation failed, releasing reserved lines"
                    );
                    if !reserved.is_empty() {
                        reserved
                            .release_all(&self.ledger, order_placement::STEP_RESERVE_STOCK)
                            .await;
                    }
                    return Err(reservation_error(line, e));
                }
            }
        }
        Ok(reserved)
    }

    /// Builds and inserts the order, regenerating the id on collisions.
    async fn persist(
        &self,
        user_id: UserId,
        coupon_id: CouponId,
        address_id: AddressId,
        pricing: Pricing,
        lines: &[CartLine],
    ) -> std::result::Result<Order, DomainError> {
        let now = Utc::now();
        let base_id = OrderId::generate(now, user_id);
        let mut order_id = base_id.clone();

        for attempt in 1..=ORDER_ID_ATTEMPTS {
            let order = Order::builder()
                .order_id(order_id.clone())
                .user_id(user_id)
                .coupon_id(coupon_id)
                .pricing(pricing)
                .address_snapshot(AddressSnapshot::from_address_id(address_id))
                .lines(lines.iter().map(to_order_line))
                .created_at(now)
                .ttl(self.config.order_ttl)
                .build()?;

            match self.orders.create_order(&order).await {
                Ok(()) => return Ok(order),
                Err(DomainError::Order(OrderError::DuplicateOrderId(_)))
                    if attempt < ORDER_ID_ATTEMPTS =>
                {
                    warn!(%order_id, attempt, "Order id collision, regenerating");
                    order_id = base_id.with_nonce(rand::thread_rng().gen_range(0..10_000));
                }
                Err(e) => return Err(e),
            }
        }

        Err(OrderError::DuplicateOrderId(order_id).into())
    }
}

/// Classifies a failed reservation. Shortage, lost races and unknown SKUs
/// read as insufficient stock for the line; storage failures are server errors.
fn reservation_error(line: &CartLine, e: StockError) -> SagaError {
    match e {
        StockError::Database(_) | StockError::Migration(_) | StockError::InvalidRecord { .. } => {
            SagaError::ServerError {
                step: order_placement::STEP_RESERVE_STOCK,
                reason: e.to_string(),
            }
        }
        StockError::InvalidQuantity(_) => SagaError::Stock(e),
        StockError::InsufficientStock { .. }
        | StockError::Conflict { .. }
        | StockError::NotFound(_)
        | StockError::AlreadyExists(_)
        | StockError::ReleaseRejected { .. } => SagaError::InsufficientStock {
            sku_id: line.sku_id,
            product_name: line.product_name.clone(),
            source: e,
        },
    }
}

/// Sums the line subtotals, rejecting carts whose amounts overflow even
/// once freight is added.
fn order_total(lines: &[CartLine], freight_amount: Money) -> Result<Money> {
    let total_amount = lines
        .iter()
        .map(CartLine::checked_subtotal)
        .collect::<Option<Vec<_>>>()
        .and_then(Money::checked_sum)
        .ok_or(SagaError::AmountOverflow)?;
    total_amount
        .checked_add(freight_amount)
        .ok_or(SagaError::AmountOverflow)?;
    Ok(total_amount)
}

fn to_order_line(line: &CartLine) -> OrderLine {
    OrderLine {
        sku_id: line.sku_id,
        product_id: line.product_id,
        product_name: line.product_name.clone(),
        sku_specs: line.sku_specs.clone(),
        price: line.price,
        quantity: line.quantity,
    }
}
