//! Shared fixtures for the scenario tests in `tests/`.

use std::sync::Arc;

use rust_decimal::Decimal;

use sugarcane_core::{CategoryId, ProductId, ProductItemId};
use sugarcane_engine::config::EngineConfig;
use sugarcane_engine::services::{
    CartPricingEngine, CouponService, InventoryLedger, OfferCascadeEngine, OrderOrchestrator,
    WalletLedger,
};
use sugarcane_engine::store::MemoryStore;

/// The full engine stack over one shared in-memory store.
pub struct TestShop {
    pub store: Arc<MemoryStore>,
    pub carts: CartPricingEngine<MemoryStore>,
    pub coupons: CouponService<MemoryStore>,
    pub offers: OfferCascadeEngine<MemoryStore>,
    pub orders: OrderOrchestrator<MemoryStore>,
    pub inventory: InventoryLedger<MemoryStore>,
    pub wallets: WalletLedger<MemoryStore>,
}

/// Install a test tracing subscriber honoring `RUST_LOG`. Safe to call
/// from every test; only the first call installs.
pub fn init_tracing() {
    static INIT: std::sync::Once = std::sync::Once::new();
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .init();
    });
}

impl TestShop {
    #[must_use]
    pub fn new() -> Self {
        init_tracing();
        let store = Arc::new(MemoryStore::new());
        let config = EngineConfig::default();
        Self {
            carts: CartPricingEngine::new(Arc::clone(&store), config),
            coupons: CouponService::new(Arc::clone(&store), config),
            offers: OfferCascadeEngine::new(Arc::clone(&store)),
            orders: OrderOrchestrator::new(Arc::clone(&store)),
            inventory: InventoryLedger::new(Arc::clone(&store)),
            wallets: WalletLedger::new(Arc::clone(&store)),
            store,
        }
    }

    /// Seed one product with one sellable item and return both IDs.
    pub async fn seed_item(
        &self,
        category: CategoryId,
        price: i64,
        stock: u32,
    ) -> (ProductId, ProductItemId) {
        let product = self
            .store
            .seed_product(category, "fixture product", Decimal::from(price))
            .await;
        let item = self
            .store
            .seed_product_item(product, Decimal::from(price), stock)
            .await;
        (product, item)
    }
}

impl Default for TestShop {
    fn default() -> Self {
        Self::new()
    }
}
