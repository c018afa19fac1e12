//! Checkout atomicity, stock safety under concurrency, and the
//! place/return round trip.

use rust_decimal::Decimal;

use sugarcane_core::{CategoryId, OrderStatus, UserId};
use sugarcane_engine::error::EngineError;
use sugarcane_integration_tests::TestShop;

/// A failure on the last order line must leave stock and cart exactly as
/// they were.
#[tokio::test]
async fn failed_checkout_decrements_nothing() {
    let shop = TestShop::new();
    let user = UserId::new(1);
    let (_, tea) = shop.seed_item(CategoryId::new(1), 500, 10).await;
    let (_, mug) = shop.seed_item(CategoryId::new(1), 250, 10).await;
    shop.carts.add_item(user, tea).await.expect("add tea");
    shop.carts.add_item(user, mug).await.expect("add mug");
    shop.carts.update_qty(user, mug, 3).await.expect("qty mug");

    // Drain the second line's stock after the cart was built.
    shop.store.set_stock(mug, 2).await;

    let err = shop.orders.place_order(user).await.expect_err("oversell");
    assert!(matches!(
        err,
        EngineError::OutOfStockInCart { product_item_id } if product_item_id == mug
    ));

    // The first line's reservation was rolled back with everything else.
    let tea_stock = shop.store.product_item(tea).await.expect("tea").qty_in_stock;
    assert_eq!(tea_stock, 10);
    let mug_stock = shop.store.product_item(mug).await.expect("mug").qty_in_stock;
    assert_eq!(mug_stock, 2);

    let view = shop.carts.get_user_cart(user).await.expect("cart");
    assert_eq!(view.items.len(), 2);
    assert_eq!(view.cart.total_price, Decimal::from(1250));
}

/// Two carts each hold the last unit of an item; both check out
/// concurrently. Exactly one order is placed and stock ends at zero,
/// never below.
#[tokio::test]
async fn concurrent_checkouts_cannot_oversell() {
    let shop = TestShop::new();
    let (_, item) = shop.seed_item(CategoryId::new(1), 500, 1).await;

    let alice = UserId::new(1);
    let bob = UserId::new(2);
    shop.carts.add_item(alice, item).await.expect("alice add");
    shop.carts.add_item(bob, item).await.expect("bob add");

    let orders_a = shop.orders.clone();
    let orders_b = shop.orders.clone();
    let a = tokio::spawn(async move { orders_a.place_order(alice).await });
    let b = tokio::spawn(async move { orders_b.place_order(bob).await });
    let a = a.await.expect("join a");
    let b = b.await.expect("join b");

    let successes = [&a, &b].iter().filter(|r| r.is_ok()).count();
    assert_eq!(successes, 1);
    let failure = if a.is_err() { a } else { b };
    assert!(matches!(
        failure,
        Err(EngineError::OutOfStockInCart { product_item_id }) if product_item_id == item
    ));

    let stock = shop.store.product_item(item).await.expect("item").qty_in_stock;
    assert_eq!(stock, 0);
}

/// Placing an order and approving its return restores stock to the
/// pre-order level and credits the wallet by exactly the order total.
#[tokio::test]
async fn place_and_return_round_trip() {
    let shop = TestShop::new();
    let user = UserId::new(1);
    let (_, item) = shop.seed_item(CategoryId::new(1), 500, 7).await;
    shop.carts.add_item(user, item).await.expect("add");
    shop.carts.update_qty(user, item, 3).await.expect("qty");

    let order = shop.orders.place_order(user).await.expect("place");
    assert_eq!(order.total, Decimal::from(1500));
    let stock = shop.store.product_item(item).await.expect("item").qty_in_stock;
    assert_eq!(stock, 4);

    shop.orders.mark_delivered(order.id).await.expect("deliver");
    shop.orders.request_return(order.id).await.expect("request");
    shop.orders.approve_return(order.id).await.expect("approve");

    let stock = shop.store.product_item(item).await.expect("item").qty_in_stock;
    assert_eq!(stock, 7);

    let wallet = shop.store.wallet_by_user(user).await.expect("wallet");
    assert_eq!(wallet.balance, Decimal::from(1500));
    let entries = shop.wallets.transactions(wallet.id).await.expect("log");
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].amount, Decimal::from(1500));

    let (order, _) = shop.orders.find_order(order.id).await.expect("find");
    assert_eq!(order.status, OrderStatus::Returned);
}

/// A coupon discount carries into the order total, and the cart is left
/// empty with no dangling coupon.
#[tokio::test]
async fn order_total_is_the_discounted_payable_amount() {
    use chrono::{Duration, Utc};
    use sugarcane_engine::services::CouponParams;

    let shop = TestShop::new();
    let user = UserId::new(1);
    let (_, item) = shop.seed_item(CategoryId::new(1), 500, 10).await;
    shop.carts.add_item(user, item).await.expect("add");
    shop.carts.update_qty(user, item, 2).await.expect("qty");

    let coupon = shop
        .coupons
        .create(CouponParams {
            name: "welcome".to_owned(),
            discount_rate: Decimal::from(10),
            min_cart_price: Decimal::from(500),
            expires_at: Utc::now() + Duration::days(1),
        })
        .await
        .expect("create");
    shop.coupons.apply(user, &coupon.code).await.expect("apply");

    let order = shop.orders.place_order(user).await.expect("place");
    assert_eq!(order.total, Decimal::from(900));

    let view = shop.carts.get_user_cart(user).await.expect("cart");
    assert!(view.items.is_empty());
    assert_eq!(view.cart.total_price, Decimal::ZERO);
    assert_eq!(view.cart.discount_amount, Decimal::ZERO);
    assert!(view.cart.applied_coupon.is_none());
}

/// Cancelling a placed order puts every reserved unit back.
#[tokio::test]
async fn cancellation_releases_stock() {
    let shop = TestShop::new();
    let user = UserId::new(1);
    let (_, item) = shop.seed_item(CategoryId::new(1), 500, 5).await;
    shop.carts.add_item(user, item).await.expect("add");
    shop.carts.update_qty(user, item, 5).await.expect("qty");

    let order = shop.orders.place_order(user).await.expect("place");
    let stock = shop.store.product_item(item).await.expect("item").qty_in_stock;
    assert_eq!(stock, 0);

    shop.orders.cancel_order(order.id).await.expect("cancel");
    let stock = shop.store.product_item(item).await.expect("item").qty_in_stock;
    assert_eq!(stock, 5);
}
