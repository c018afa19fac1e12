//! Offer attachment cascades and their interaction with cart pricing.

use chrono::{Duration, Utc};
use rust_decimal::Decimal;

use sugarcane_core::{CategoryId, UserId};
use sugarcane_engine::models::NewOffer;
use sugarcane_integration_tests::TestShop;

fn offer(name: &str, rate: i64) -> NewOffer {
    NewOffer {
        name: name.to_owned(),
        discount_rate: Decimal::from(rate),
        ends_at: Utc::now() + Duration::days(7),
    }
}

/// A 20% category offer over a product priced 1000 yields a discount price
/// of 800; detaching restores 0.
#[tokio::test]
async fn category_offer_attach_and_detach() {
    let shop = TestShop::new();
    let category = CategoryId::new(1);
    let (product, item) = shop.seed_item(category, 1000, 10).await;

    let o = shop.offers.create_offer(offer("sale", 20)).await.expect("create");
    shop.offers
        .attach_category_offer(category, o.id)
        .await
        .expect("attach");

    let p = shop.store.product(product).await.expect("product");
    assert_eq!(p.discount_price, Decimal::from(800));
    let i = shop.store.product_item(item).await.expect("item");
    assert_eq!(i.discount_price, Decimal::from(800));

    shop.offers.detach_category_offer(category).await.expect("detach");
    let p = shop.store.product(product).await.expect("product");
    assert_eq!(p.discount_price, Decimal::ZERO);
    let i = shop.store.product_item(item).await.expect("item");
    assert_eq!(i.discount_price, Decimal::ZERO);
}

/// Re-running the same cascade produces the same prices: the discount is
/// always derived from the base price.
#[tokio::test]
async fn reattaching_the_same_offer_is_idempotent() {
    let shop = TestShop::new();
    let category = CategoryId::new(1);
    let (product, item) = shop.seed_item(category, 999, 10).await;

    let o = shop.offers.create_offer(offer("sale", 15)).await.expect("create");
    shop.offers
        .attach_category_offer(category, o.id)
        .await
        .expect("attach");
    let once_product = shop.store.product(product).await.expect("product").discount_price;
    let once_item = shop.store.product_item(item).await.expect("item").discount_price;

    // Re-pointing to the same offer re-runs the cascade over the already
    // discounted catalog.
    shop.offers
        .change_category_offer(category, o.id)
        .await
        .expect("change");
    let again_product = shop.store.product(product).await.expect("product").discount_price;
    let again_item = shop.store.product_item(item).await.expect("item").discount_price;

    assert_eq!(once_product, again_product);
    assert_eq!(once_item, again_item);

    shop.offers.detach_category_offer(category).await.expect("detach");
    shop.offers
        .attach_category_offer(category, o.id)
        .await
        .expect("re-attach");
    let third = shop.store.product(product).await.expect("product").discount_price;
    assert_eq!(once_product, third);
}

/// Cart pricing picks up the discounted unit price for items under an
/// active offer.
#[tokio::test]
async fn discounted_items_price_into_the_cart() {
    let shop = TestShop::new();
    let category = CategoryId::new(1);
    let (product, item) = shop.seed_item(category, 1000, 10).await;
    let user = UserId::new(1);

    let o = shop.offers.create_offer(offer("flash", 25)).await.expect("create");
    shop.offers
        .attach_product_offer(product, o.id)
        .await
        .expect("attach");

    let view = shop.carts.add_item(user, item).await.expect("add");
    assert_eq!(view.cart.total_price, Decimal::from(750));

    // Detaching and touching the cart reprices it at the base price.
    shop.offers.detach_product_offer(product).await.expect("detach");
    let view = shop.carts.update_qty(user, item, 2).await.expect("qty");
    assert_eq!(view.cart.total_price, Decimal::from(2000));
}
