//! Engine error taxonomy.
//!
//! Business-rule violations are expected, user-facing outcomes: they pass
//! through to the caller unmodified and carry a stable [`code`] the caller
//! can branch on. Storage failures are wrapped in [`EngineError::Internal`]
//! with the name of the failing operation, trigger a full rollback of the
//! enclosing transaction, and should be surfaced generically.
//!
//! [`code`]: EngineError::code

use rust_decimal::Decimal;
use thiserror::Error;

use sugarcane_core::{OrderStatus, ProductItemId};

use crate::store::StoreError;

/// All failure modes of the engine's public operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The product item has less stock than requested.
    #[error("product item is out of stock")]
    OutOfStock,

    /// A cart line in a placed order has less stock than its quantity.
    #[error("insufficient stock for product item {product_item_id} in cart")]
    OutOfStockInCart { product_item_id: ProductItemId },

    /// The product item is already in the cart.
    #[error("product item is already in the cart")]
    CartItemAlreadyExists,

    /// The product item is not in the cart.
    #[error("product item is not in the cart")]
    CartItemNotExists,

    /// The cart has no items.
    #[error("cart is empty")]
    EmptyCart,

    /// Requested quantity is outside the allowed range.
    #[error("invalid quantity {qty} (must be between 1 and {max})")]
    InvalidQuantity { qty: u32, max: u32 },

    /// No coupon exists with the given code.
    #[error("invalid coupon code")]
    InvalidCouponCode,

    /// The cart already has a coupon applied.
    #[error("a coupon is already applied to the cart")]
    CouponAlreadyApplied,

    /// The coupon's expiry timestamp has passed.
    #[error("coupon has expired")]
    CouponExpired,

    /// Cart total is below the coupon's minimum.
    #[error("cart total {total} is below the coupon minimum {minimum}")]
    MinimumCartPriceNotMet { minimum: Decimal, total: Decimal },

    /// Discount rate is outside the open interval (0, 100).
    #[error("invalid discount rate {rate} (must be above 0 and below 100)")]
    InvalidDiscountRate { rate: Decimal },

    /// The offer's end date has passed.
    #[error("offer has already ended")]
    OfferAlreadyEnded,

    /// The category already has an active offer attachment.
    #[error("category already has an active offer")]
    CategoryOfferAlreadyExists,

    /// The product already has an active offer attachment.
    #[error("product already has an active offer")]
    ProductOfferAlreadyExists,

    /// The requested order status change is not a legal edge of the state
    /// machine.
    #[error("cannot transition order from {from} to {to}")]
    InvalidStatusTransition { from: OrderStatus, to: OrderStatus },

    /// Debit amount exceeds the wallet balance.
    #[error("insufficient wallet balance")]
    InsufficientBalance,

    /// A referenced entity does not exist.
    #[error("{0} not found")]
    NotFound(&'static str),

    /// Storage or transport failure inside the named operation.
    #[error("{op}: {source}")]
    Internal {
        op: &'static str,
        #[source]
        source: StoreError,
    },
}

impl EngineError {
    /// Wrap a store failure with the name of the operation it occurred in.
    ///
    /// Intended for `map_err`:
    ///
    /// ```rust,ignore
    /// store.begin().await.map_err(EngineError::internal("place_order"))?;
    /// ```
    pub fn internal(op: &'static str) -> impl FnOnce(StoreError) -> Self {
        move |source| Self::Internal { op, source }
    }

    /// Like [`EngineError::internal`], but maps [`StoreError::NotFound`] to
    /// [`EngineError::NotFound`] for the named entity. A missing referent is
    /// an expected caller error, not a storage failure.
    pub fn not_found_or_internal(
        entity: &'static str,
        op: &'static str,
    ) -> impl FnOnce(StoreError) -> Self {
        move |source| match source {
            StoreError::NotFound => Self::NotFound(entity),
            source => Self::Internal { op, source },
        }
    }

    /// Stable machine-readable code for this error.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::OutOfStock => "OUT_OF_STOCK",
            Self::OutOfStockInCart { .. } => "OUT_OF_STOCK_IN_CART",
            Self::CartItemAlreadyExists => "CART_ITEM_ALREADY_EXISTS",
            Self::CartItemNotExists => "CART_ITEM_NOT_EXISTS",
            Self::EmptyCart => "EMPTY_CART",
            Self::InvalidQuantity { .. } => "INVALID_QUANTITY",
            Self::InvalidCouponCode => "INVALID_COUPON_CODE",
            Self::CouponAlreadyApplied => "COUPON_ALREADY_APPLIED",
            Self::CouponExpired => "COUPON_EXPIRED",
            Self::MinimumCartPriceNotMet { .. } => "MINIMUM_CART_PRICE_NOT_MET",
            Self::InvalidDiscountRate { .. } => "INVALID_DISCOUNT_RATE",
            Self::OfferAlreadyEnded => "OFFER_ALREADY_ENDED",
            Self::CategoryOfferAlreadyExists => "CATEGORY_OFFER_ALREADY_EXISTS",
            Self::ProductOfferAlreadyExists => "PRODUCT_OFFER_ALREADY_EXISTS",
            Self::InvalidStatusTransition { .. } => "INVALID_STATUS_TRANSITION",
            Self::InsufficientBalance => "INSUFFICIENT_BALANCE",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Internal { .. } => "INTERNAL",
        }
    }

    /// Whether this is an expected business outcome rather than a storage
    /// failure.
    #[must_use]
    pub const fn is_business(&self) -> bool {
        !matches!(self, Self::Internal { .. })
    }
}

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn business_errors_carry_stable_codes() {
        assert_eq!(EngineError::OutOfStock.code(), "OUT_OF_STOCK");
        assert_eq!(EngineError::EmptyCart.code(), "EMPTY_CART");
        assert!(EngineError::EmptyCart.is_business());
    }

    #[test]
    fn internal_errors_name_the_failed_operation() {
        let err = EngineError::internal("place_order")(StoreError::NotFound);
        assert!(!err.is_business());
        assert!(err.to_string().starts_with("place_order:"));
    }
}
