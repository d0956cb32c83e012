//! Promotion service traits and in-memory implementation.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use common::{CouponId, Money, UserId};
use domain::OrderId;
use serde::{Deserialize, Serialize};

use crate::error::SagaError;

/// Verdict of a discount calculation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Discount {
    pub discount_amount: Money,
    pub pay_amount: Money,
    /// False when the coupon exists but does not apply (e.g. threshold not met).
    pub valid: bool,
}

impl Discount {
    /// A valid verdict that takes nothing off.
    pub fn none(total_amount: Money) -> Self {
        Self {
            discount_amount: Money::zero(),
            pay_amount: total_amount,
            valid: true,
        }
    }

    /// An invalid verdict; the total is charged in full.
    pub fn invalid(total_amount: Money) -> Self {
        Self {
            valid: false,
            ..Self::none(total_amount)
        }
    }
}

/// Computes the discount a coupon gives on a subtotal.
#[async_trait]
pub trait DiscountCalculator: Send + Sync {
    async fn calculate(
        &self,
        coupon_id: CouponId,
        total_amount: Money,
    ) -> Result<Discount, SagaError>;
}

/// Records coupon redemptions.
#[async_trait]
pub trait CouponLedger: Send + Sync {
    /// Marks `coupon_id` as used by `user_id` for `order_id`.
    async fn redeem(
        &self,
        user_id: UserId,
        coupon_id: CouponId,
        order_id: &OrderId,
    ) -> Result<(), SagaError>;
}

/// A fixed-amount coupon with a minimum spend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coupon {
    pub threshold: Money,
    pub discount: Money,
}

#[derive(Debug, Default)]
struct InMemoryPromotionState {
    coupons: HashMap<CouponId, Coupon>,
    redemptions: HashMap<(UserId, CouponId), OrderId>,
    fail_on_calculate: bool,
    fail_on_redeem: bool,
}

/// In-memory promotion service for testing and development.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPromotionService {
    state: Arc<Mutex<InMemoryPromotionState>>,
}

impl InMemoryPromotionService {
    /// Creates a new in-memory promotion service.
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, InMemoryPromotionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers a coupon.
    pub fn add_coupon(&self, coupon_id: CouponId, coupon: Coupon) {
        self.state().coupons.insert(coupon_id, coupon);
    }

    /// Returns the order a user redeemed a coupon against, if any.
    pub fn redemption(&self, user_id: UserId, coupon_id: CouponId) -> Option<OrderId> {
        self.state()
            .redemptions
            .get(&(user_id, coupon_id))
            .cloned()
    }

    /// Returns the number of recorded redemptions.
    pub fn redemption_count(&self) -> usize {
        self.state().redemptions.len()
    }

    /// Configures the service to fail discount calculations.
    pub fn set_fail_on_calculate(&self, fail: bool) {
        self.state().fail_on_calculate = fail;
    }

    /// Configures the service to fail redemptions.
    pub fn set_fail_on_redeem(&self, fail: bool) {
        self.state().fail_on_redeem = fail;
    }
}

#[async_trait]
impl DiscountCalculator for InMemoryPromotionService {
    async fn calculate(
        &self,
        coupon_id: CouponId,
        total_amount: Money,
    ) -> Result<Discount, SagaError> {
        let state = self.state();
        if state.fail_on_calculate {
            return Err(SagaError::PromotionService(
                "Promotion service unavailable".to_string(),
            ));
        }

        if !coupon_id.is_present() {
            return Ok(Discount::none(total_amount));
        }

        let coupon = state.coupons.get(&coupon_id).ok_or_else(|| {
            SagaError::PromotionService(format!("Coupon {coupon_id} not found"))
        })?;

        if total_amount < coupon.threshold {
            return Ok(Discount::invalid(total_amount));
        }

        Ok(Discount {
            discount_amount: coupon.discount,
            pay_amount: (total_amount - coupon.discount).clamp_non_negative(),
            valid: true,
        })
    }
}

#[async_trait]
impl CouponLedger for InMemoryPromotionService {
    async fn redeem(
        &self,
        user_id: UserId,
        coupon_id: CouponId,
        order_id: &OrderId,
    ) -> Result<(), SagaError> {
        let mut state = self.state();
        if state.fail_on_redeem {
            return Err(SagaError::PromotionService(
                "Coupon redemption failed".to_string(),
            ));
        }
        if !state.coupons.contains_key(&coupon_id) {
            return Err(SagaError::PromotionService(format!(
                "Coupon {coupon_id} not found"
            )));
        }
        if let Some(existing) = state.redemptions.get(&(user_id, coupon_id)) {
            return Err(SagaError::PromotionService(format!(
                "Coupon {coupon_id} already redeemed for order {existing}"
            )));
        }

        state
            .redemptions
            .insert((user_id, coupon_id), order_id.clone());
        Ok(())
    }
}
