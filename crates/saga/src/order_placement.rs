//! Order placement saga constants.

/// The saga type identifier for order placement.
pub const SAGA_TYPE: &str = "OrderPlacement";

/// Step name: Read the selected cart lines.
pub const STEP_FETCH_CART: &str = "fetch_cart";

/// Step name: Ask the promotion service for a discount.
pub const STEP_CALCULATE_DISCOUNT: &str = "calculate_discount";

/// Step name: Reserve stock for every line.
pub const STEP_RESERVE_STOCK: &str = "reserve_stock";

/// Step name: Persist the order header and lines.
pub const STEP_PERSIST_ORDER: &str = "persist_order";

/// Step name: Mark the coupon as used.
pub const STEP_REDEEM_COUPON: &str = "redeem_coupon";

/// Step name: Remove ordered lines from the cart.
pub const STEP_CLEAR_CART: &str = "clear_cart";

/// Number of ids tried before giving up on order id collisions.
pub const ORDER_ID_ATTEMPTS: u32 = 3;

/// Default time an unpaid order is held before it expires.
pub const DEFAULT_ORDER_TTL_MINUTES: i64 = domain::DEFAULT_ORDER_TTL_MINUTES;
