//! Coupon service: code generation, validation, application.

use std::sync::Arc;

use chrono::Utc;
use rand::Rng;
use rust_decimal::Decimal;
use tracing::{debug, instrument, warn};

use sugarcane_core::UserId;

use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::models::{Coupon, NewCoupon};
use crate::store::{Store, StoreError};

/// How many times coupon creation retries on a generated-code collision
/// before giving up. With 62^10 possible codes a second collision in a row
/// is effectively impossible.
const CODE_RETRIES: usize = 3;

/// Creates coupons and applies them to carts.
#[derive(Debug, Clone)]
pub struct CouponService<S> {
    store: Arc<S>,
    config: EngineConfig,
}

impl<S: Store> CouponService<S> {
    /// Create a coupon service over the given store.
    pub const fn new(store: Arc<S>, config: EngineConfig) -> Self {
        Self { store, config }
    }

    /// Create a coupon with a freshly generated alphanumeric code.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidDiscountRate`] unless the rate is
    /// strictly between 0 and 100, [`EngineError::Internal`] on storage
    /// failure or if code generation keeps colliding.
    #[instrument(skip(self, params), fields(name = %params.name))]
    pub async fn create(&self, params: CouponParams) -> Result<Coupon> {
        const OP: &str = "coupon.create";
        if params.discount_rate <= Decimal::ZERO || params.discount_rate >= Decimal::ONE_HUNDRED {
            return Err(EngineError::InvalidDiscountRate {
                rate: params.discount_rate,
            });
        }
        // A unique violation aborts the enclosing transaction, so each
        // attempt gets its own.
        let mut last_err = StoreError::Conflict("coupon code generation exhausted retries".to_owned());
        for _ in 0..CODE_RETRIES {
            let mut tx = self.store.begin().await.map_err(EngineError::internal(OP))?;
            let code = generate_code(self.config.coupon_code_len);
            let insert = self
                .store
                .insert_coupon(
                    &mut tx,
                    NewCoupon {
                        name: params.name.clone(),
                        code,
                        discount_rate: params.discount_rate,
                        min_cart_price: params.min_cart_price,
                        expires_at: params.expires_at,
                    },
                )
                .await;
            match insert {
                Ok(coupon) => {
                    self.store
                        .commit(tx)
                        .await
                        .map_err(EngineError::internal(OP))?;
                    debug!(coupon_id = %coupon.id, "created coupon");
                    return Ok(coupon);
                }
                Err(StoreError::Conflict(msg)) => {
                    let _ = self.store.rollback(tx).await;
                    warn!(%msg, "generated coupon code collided, retrying");
                    last_err = StoreError::Conflict(msg);
                }
                Err(err) => {
                    let _ = self.store.rollback(tx).await;
                    return Err(EngineError::internal(OP)(err));
                }
            }
        }
        Err(EngineError::internal(OP)(last_err))
    }

    /// Apply a coupon code to a user's cart and return the discount granted.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidCouponCode`] for an unknown code,
    /// [`EngineError::EmptyCart`] if the user has no cart or a zero total,
    /// [`EngineError::CouponAlreadyApplied`] if a coupon is already on the
    /// cart or this coupon is active on another cart,
    /// [`EngineError::CouponExpired`] past expiry, and
    /// [`EngineError::MinimumCartPriceNotMet`] below the minimum spend.
    #[instrument(skip(self, code))]
    pub async fn apply(&self, user_id: UserId, code: &str) -> Result<Decimal> {
        const OP: &str = "coupon.apply";
        let mut tx = self.store.begin().await.map_err(EngineError::internal(OP))?;
        match self.apply_tx(&mut tx, user_id, code).await {
            Ok(discount) => {
                self.store
                    .commit(tx)
                    .await
                    .map_err(EngineError::internal(OP))?;
                Ok(discount)
            }
            Err(err) => {
                let _ = self.store.rollback(tx).await;
                Err(err)
            }
        }
    }

    /// [`apply`](Self::apply) inside a caller-supplied transaction.
    pub async fn apply_tx(&self, tx: &mut S::Tx, user_id: UserId, code: &str) -> Result<Decimal> {
        const OP: &str = "coupon.apply";
        let coupon = self
            .store
            .find_coupon_by_code(tx, code)
            .await
            .map_err(EngineError::internal(OP))?
            .ok_or(EngineError::InvalidCouponCode)?;

        let mut cart = self
            .store
            .find_cart_by_user(tx, user_id)
            .await
            .map_err(EngineError::internal(OP))?
            .ok_or(EngineError::EmptyCart)?;
        if cart.total_price <= Decimal::ZERO {
            return Err(EngineError::EmptyCart);
        }
        if cart.applied_coupon.is_some() {
            return Err(EngineError::CouponAlreadyApplied);
        }
        // A coupon is active on at most one cart at a time.
        if self
            .store
            .coupon_in_use(tx, coupon.id)
            .await
            .map_err(EngineError::internal(OP))?
        {
            return Err(EngineError::CouponAlreadyApplied);
        }
        if coupon.is_expired(Utc::now()) {
            return Err(EngineError::CouponExpired);
        }
        if cart.total_price < coupon.min_cart_price {
            return Err(EngineError::MinimumCartPriceNotMet {
                minimum: coupon.min_cart_price,
                total: cart.total_price,
            });
        }

        let discount = coupon.discount_on(cart.total_price);
        cart.applied_coupon = Some(coupon.id);
        cart.discount_amount = discount;
        self.store
            .save_cart(tx, &cart)
            .await
            .map_err(EngineError::internal(OP))?;
        debug!(cart_id = %cart.id, coupon_id = %coupon.id, %discount, "applied coupon");
        Ok(discount)
    }
}

/// Parameters for creating a coupon. The code is not part of these: it is
/// always generated.
#[derive(Debug, Clone)]
pub struct CouponParams {
    /// Human-readable name.
    pub name: String,
    /// Discount rate as a percentage.
    pub discount_rate: Decimal,
    /// Minimum cart total required to apply.
    pub min_cart_price: Decimal,
    /// Expiry timestamp.
    pub expires_at: chrono::DateTime<Utc>,
}

/// Random alphanumeric code of the given length.
fn generate_code(len: usize) -> String {
    rand::rng()
        .sample_iter(&rand::distr::Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::CartPricingEngine;
    use crate::store::MemoryStore;
    use chrono::Duration;
    use sugarcane_core::CategoryId;

    fn params(rate: i64, min: i64, days: i64) -> CouponParams {
        CouponParams {
            name: "spring sale".to_owned(),
            discount_rate: Decimal::from(rate),
            min_cart_price: Decimal::from(min),
            expires_at: Utc::now() + Duration::days(days),
        }
    }

    async fn store_with_cart(total: i64) -> (Arc<MemoryStore>, UserId) {
        let store = Arc::new(MemoryStore::new());
        let product = store
            .seed_product(CategoryId::new(1), "tea", Decimal::from(total))
            .await;
        let item = store
            .seed_product_item(product, Decimal::from(total), 10)
            .await;
        let carts = CartPricingEngine::new(Arc::clone(&store), EngineConfig::default());
        let user = UserId::new(1);
        carts.add_item(user, item).await.expect("add");
        (store, user)
    }

    #[test]
    fn generated_codes_are_alphanumeric_with_requested_length() {
        let code = generate_code(10);
        assert_eq!(code.len(), 10);
        assert!(code.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[tokio::test]
    async fn apply_grants_floored_percentage_discount() {
        let (store, user) = store_with_cart(1005).await;
        let service = CouponService::new(Arc::clone(&store), EngineConfig::default());
        let coupon = service.create(params(10, 500, 1)).await.expect("create");

        let discount = service.apply(user, &coupon.code).await.expect("apply");
        assert_eq!(discount, Decimal::from(100));
    }

    #[tokio::test]
    async fn second_coupon_is_rejected() {
        let (store, user) = store_with_cart(1000).await;
        let service = CouponService::new(Arc::clone(&store), EngineConfig::default());
        let first = service.create(params(10, 500, 1)).await.expect("create");
        let second = service.create(params(20, 500, 1)).await.expect("create");

        service.apply(user, &first.code).await.expect("apply");
        let err = service.apply(user, &second.code).await.expect_err("double");
        assert!(matches!(err, EngineError::CouponAlreadyApplied));
    }

    #[tokio::test]
    async fn coupon_active_on_another_cart_is_rejected() {
        let store = Arc::new(MemoryStore::new());
        let product = store
            .seed_product(CategoryId::new(1), "tea", Decimal::from(1000))
            .await;
        let item = store
            .seed_product_item(product, Decimal::from(1000), 10)
            .await;
        let carts = CartPricingEngine::new(Arc::clone(&store), EngineConfig::default());
        let (first_user, second_user) = (UserId::new(1), UserId::new(2));
        carts.add_item(first_user, item).await.expect("add");
        carts.add_item(second_user, item).await.expect("add");
        let service = CouponService::new(Arc::clone(&store), EngineConfig::default());
        let coupon = service.create(params(10, 500, 1)).await.expect("create");

        service.apply(first_user, &coupon.code).await.expect("first cart");
        let err = service
            .apply(second_user, &coupon.code)
            .await
            .expect_err("active elsewhere");
        assert!(matches!(err, EngineError::CouponAlreadyApplied));

        // Once the first cart lets go of the coupon it is free again.
        carts.remove_item(first_user, item).await.expect("remove");
        service.apply(second_user, &coupon.code).await.expect("freed");
    }

    #[tokio::test]
    async fn out_of_range_discount_rate_is_rejected() {
        let store = Arc::new(MemoryStore::new());
        let service = CouponService::new(store, EngineConfig::default());

        let err = service.create(params(0, 500, 1)).await.expect_err("zero");
        assert!(matches!(err, EngineError::InvalidDiscountRate { .. }));
        let err = service.create(params(100, 500, 1)).await.expect_err("full");
        assert!(matches!(err, EngineError::InvalidDiscountRate { .. }));
    }

    #[tokio::test]
    async fn unknown_code_is_invalid() {
        let (store, user) = store_with_cart(1000).await;
        let service = CouponService::new(store, EngineConfig::default());
        let err = service.apply(user, "NOSUCHCODE").await.expect_err("bad code");
        assert!(matches!(err, EngineError::InvalidCouponCode));
    }

    #[tokio::test]
    async fn expired_coupon_is_rejected() {
        let (store, user) = store_with_cart(1000).await;
        let service = CouponService::new(Arc::clone(&store), EngineConfig::default());
        let coupon = service.create(params(10, 500, -1)).await.expect("create");

        let err = service.apply(user, &coupon.code).await.expect_err("expired");
        assert!(matches!(err, EngineError::CouponExpired));
    }

    #[tokio::test]
    async fn minimum_spend_is_enforced() {
        let (store, user) = store_with_cart(400).await;
        let service = CouponService::new(Arc::clone(&store), EngineConfig::default());
        let coupon = service.create(params(10, 500, 1)).await.expect("create");

        let err = service.apply(user, &coupon.code).await.expect_err("too cheap");
        assert!(matches!(
            err,
            EngineError::MinimumCartPriceNotMet { minimum, total }
                if minimum == Decimal::from(500) && total == Decimal::from(400)
        ));
    }

    #[tokio::test]
    async fn coupon_on_missing_cart_is_empty_cart() {
        let store = Arc::new(MemoryStore::new());
        let service = CouponService::new(Arc::clone(&store), EngineConfig::default());
        let coupon = service.create(params(10, 0, 1)).await.expect("create");
        let err = service
            .apply(UserId::new(42), &coupon.code)
            .await
            .expect_err("no cart");
        assert!(matches!(err, EngineError::EmptyCart));
    }
}
