//! Cart pricing invariants and coupon application scenarios.

use chrono::{Duration, Utc};
use rust_decimal::Decimal;

use sugarcane_core::{CategoryId, UserId};
use sugarcane_engine::error::EngineError;
use sugarcane_engine::services::CouponParams;
use sugarcane_integration_tests::TestShop;

fn coupon(rate: i64, min: i64, days: i64) -> CouponParams {
    CouponParams {
        name: "test coupon".to_owned(),
        discount_rate: Decimal::from(rate),
        min_cart_price: Decimal::from(min),
        expires_at: Utc::now() + Duration::days(days),
    }
}

/// For every reachable cart state, the stored total equals the sum of each
/// line's effective unit price times quantity.
#[tokio::test]
async fn cart_total_always_equals_sum_of_lines() {
    let shop = TestShop::new();
    let user = UserId::new(1);
    let (_, tea) = shop.seed_item(CategoryId::new(1), 500, 10).await;
    let (_, mug) = shop.seed_item(CategoryId::new(1), 250, 10).await;

    let check = |view: &sugarcane_engine::models::CartView| {
        let expected: Decimal = view
            .items
            .iter()
            .map(|i| {
                let unit = if i.product_item_id == tea { 500 } else { 250 };
                Decimal::from(unit) * Decimal::from(i.qty)
            })
            .sum();
        assert_eq!(view.cart.total_price, expected);
        assert!(view.cart.discount_amount >= Decimal::ZERO);
    };

    let view = shop.carts.add_item(user, tea).await.expect("add tea");
    check(&view);
    let view = shop.carts.add_item(user, mug).await.expect("add mug");
    check(&view);
    let view = shop.carts.update_qty(user, tea, 4).await.expect("qty tea");
    check(&view);
    let view = shop.carts.update_qty(user, mug, 2).await.expect("qty mug");
    check(&view);
    let view = shop.carts.remove_item(user, tea).await.expect("remove tea");
    check(&view);
    let view = shop.carts.remove_item(user, mug).await.expect("remove mug");
    check(&view);
    assert_eq!(view.cart.total_price, Decimal::ZERO);
}

/// Unit price 500 at qty 2 totals 1000; a 10% coupon with a 500 minimum
/// grants a discount of 100 tracked separately from the total, and a second
/// coupon is rejected.
#[tokio::test]
async fn coupon_discount_is_tracked_separately_from_total() {
    let shop = TestShop::new();
    let user = UserId::new(1);
    let (_, item) = shop.seed_item(CategoryId::new(1), 500, 10).await;
    shop.carts.add_item(user, item).await.expect("add");
    shop.carts.update_qty(user, item, 2).await.expect("qty");

    let first = shop.coupons.create(coupon(10, 500, 1)).await.expect("create");
    let discount = shop.coupons.apply(user, &first.code).await.expect("apply");
    assert_eq!(discount, Decimal::from(100));

    let view = shop.carts.get_user_cart(user).await.expect("cart");
    assert_eq!(view.cart.total_price, Decimal::from(1000));
    assert_eq!(view.cart.discount_amount, Decimal::from(100));
    assert_eq!(view.cart.payable_total(), Decimal::from(900));

    let second = shop.coupons.create(coupon(20, 500, 1)).await.expect("create");
    let err = shop
        .coupons
        .apply(user, &second.code)
        .await
        .expect_err("second coupon");
    assert!(matches!(err, EngineError::CouponAlreadyApplied));
}

/// An expired coupon fails and leaves the cart untouched.
#[tokio::test]
async fn expired_coupon_leaves_cart_unchanged() {
    let shop = TestShop::new();
    let user = UserId::new(1);
    let (_, item) = shop.seed_item(CategoryId::new(1), 500, 10).await;
    shop.carts.add_item(user, item).await.expect("add");

    let expired = shop.coupons.create(coupon(10, 0, -1)).await.expect("create");
    let err = shop
        .coupons
        .apply(user, &expired.code)
        .await
        .expect_err("expired");
    assert!(matches!(err, EngineError::CouponExpired));

    let view = shop.carts.get_user_cart(user).await.expect("cart");
    assert_eq!(view.cart.total_price, Decimal::from(500));
    assert_eq!(view.cart.discount_amount, Decimal::ZERO);
    assert!(view.cart.applied_coupon.is_none());
}

/// Shrinking the cart below the coupon minimum drops the coupon on
/// recompute instead of keeping a stale discount.
#[tokio::test]
async fn coupon_is_dropped_when_cart_falls_below_minimum() {
    let shop = TestShop::new();
    let user = UserId::new(1);
    let (_, item) = shop.seed_item(CategoryId::new(1), 500, 10).await;
    shop.carts.add_item(user, item).await.expect("add");
    shop.carts.update_qty(user, item, 2).await.expect("qty");

    let c = shop.coupons.create(coupon(10, 1000, 1)).await.expect("create");
    shop.coupons.apply(user, &c.code).await.expect("apply");

    let view = shop.carts.update_qty(user, item, 1).await.expect("shrink");
    assert_eq!(view.cart.total_price, Decimal::from(500));
    assert_eq!(view.cart.discount_amount, Decimal::ZERO);
    assert!(view.cart.applied_coupon.is_none());
}
