//! Contract tests for the `PostgreSQL` backend.
//!
//! These tests require a running `PostgreSQL` database reachable through
//! `SUGARCANE_DATABASE_URL` (or `DATABASE_URL`), so they are ignored by
//! default:
//!
//! ```bash
//! cargo test -p sugarcane-integration-tests -- --ignored
//! ```

use std::sync::Arc;

use rust_decimal::Decimal;

use sugarcane_core::{CategoryId, OrderStatus, UserId};
use sugarcane_engine::config::EngineConfig;
use sugarcane_engine::services::{CartPricingEngine, OrderOrchestrator};
use sugarcane_engine::store::Store;
use sugarcane_postgres::{MIGRATOR, PgStore, PostgresConfig, create_pool};

async fn pg_store() -> Arc<PgStore> {
    let config = PostgresConfig::from_env().expect("database URL must be set");
    let pool = create_pool(&config.database_url).await.expect("connect");
    MIGRATOR.run(&pool).await.expect("migrate");
    Arc::new(PgStore::new(pool))
}

/// Seed a product with one item directly through the store contract.
async fn seed_item(store: &Arc<PgStore>, price: i64, stock: u32) -> sugarcane_core::ProductItemId {
    let mut tx = store.begin().await.expect("begin");
    let row: (i32,) = sqlx::query_as(
        "INSERT INTO products (category_id, name, price) VALUES ($1, $2, $3) RETURNING id",
    )
    .bind(CategoryId::new(1))
    .bind("contract test product")
    .bind(Decimal::from(price))
    .fetch_one(&mut *tx)
    .await
    .expect("insert product");
    let item: (i32,) = sqlx::query_as(
        "INSERT INTO product_items (product_id, price, qty_in_stock) VALUES ($1, $2, $3) RETURNING id",
    )
    .bind(row.0)
    .bind(Decimal::from(price))
    .bind(i32::try_from(stock).expect("stock fits"))
    .fetch_one(&mut *tx)
    .await
    .expect("insert item");
    store.commit(tx).await.expect("commit");
    sugarcane_core::ProductItemId::new(item.0)
}

fn unique_user() -> UserId {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("clock")
        .subsec_nanos();
    UserId::new(i32::try_from(nanos % 1_000_000_000).expect("fits"))
}

#[tokio::test]
#[ignore = "requires a running PostgreSQL database"]
async fn checkout_flow_against_postgres() {
    let store = pg_store().await;
    let item = seed_item(&store, 500, 5).await;
    let user = unique_user();

    let carts = CartPricingEngine::new(Arc::clone(&store), EngineConfig::default());
    let orders = OrderOrchestrator::new(Arc::clone(&store));

    let view = carts.add_item(user, item).await.expect("add");
    assert_eq!(view.cart.total_price, Decimal::from(500));
    carts.update_qty(user, item, 2).await.expect("qty");

    let order = orders.place_order(user).await.expect("place");
    assert_eq!(order.status, OrderStatus::Placed);
    assert_eq!(order.total, Decimal::from(1000));

    let view = carts.get_user_cart(user).await.expect("cart");
    assert!(view.items.is_empty());
}

#[tokio::test]
#[ignore = "requires a running PostgreSQL database"]
async fn conditional_decrement_refuses_oversell_in_postgres() {
    let store = pg_store().await;
    let item = seed_item(&store, 500, 1).await;

    let mut tx = store.begin().await.expect("begin");
    assert!(store.try_decrement_stock(&mut tx, item, 1).await.expect("first"));
    assert!(!store.try_decrement_stock(&mut tx, item, 1).await.expect("second"));
    store.rollback(tx).await.expect("rollback");
}
