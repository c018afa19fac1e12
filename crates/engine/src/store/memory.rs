//! In-memory implementation of the [`Store`] contract.
//!
//! Intended for tests/dev. A transaction takes the single state lock for
//! its whole lifetime and works on a clone of the state; commit writes the
//! clone back, rollback drops it. Transactions are therefore fully
//! serialized and strictly all-or-nothing, which is exactly what the
//! engine's atomicity and concurrency guarantees require an observer to
//! see.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use tokio::sync::{Mutex, OwnedMutexGuard};

use sugarcane_core::{
    CartId, CartItemId, CategoryId, CategoryOfferId, CouponId, OfferId, OrderId, OrderLineId,
    OrderStatus, ProductId, ProductItemId, ProductOfferId, UserId, WalletId, WalletTransactionId,
};

use crate::models::{
    Cart, CartItem, CategoryOffer, Coupon, NewCoupon, NewOffer, NewOrder, Offer, OrderLine,
    Product, ProductItem, ProductOffer, ShopOrder, Wallet, WalletTransaction,
    discounted_unit_price,
};

use super::{Store, StoreError};

#[derive(Debug, Clone, Default)]
struct State {
    next_id: i32,
    carts: BTreeMap<CartId, Cart>,
    cart_items: BTreeMap<CartItemId, CartItem>,
    products: BTreeMap<ProductId, Product>,
    product_items: BTreeMap<ProductItemId, ProductItem>,
    coupons: BTreeMap<CouponId, Coupon>,
    offers: BTreeMap<OfferId, Offer>,
    category_offers: BTreeMap<CategoryOfferId, CategoryOffer>,
    product_offers: BTreeMap<ProductOfferId, ProductOffer>,
    orders: BTreeMap<OrderId, ShopOrder>,
    order_lines: BTreeMap<OrderLineId, OrderLine>,
    wallets: BTreeMap<WalletId, Wallet>,
    wallet_transactions: BTreeMap<WalletTransactionId, WalletTransaction>,
}

impl State {
    fn alloc_id(&mut self) -> i32 {
        self.next_id += 1;
        self.next_id
    }
}

/// In-memory store backed by a single mutex-guarded state.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
}

/// An open [`MemoryStore`] transaction: a working copy of the state plus
/// the lock guard that serializes it against every other transaction.
pub struct MemoryTx {
    working: State,
    guard: OwnedMutexGuard<State>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // ------------------------------------------------------------------
    // Seeding and inspection helpers for tests/dev
    // ------------------------------------------------------------------

    /// Seed a product.
    pub async fn seed_product(
        &self,
        category_id: CategoryId,
        name: &str,
        price: Decimal,
    ) -> ProductId {
        let mut state = self.state.lock().await;
        let id = ProductId::new(state.alloc_id());
        state.products.insert(
            id,
            Product {
                id,
                category_id,
                name: name.to_owned(),
                price,
                discount_price: Decimal::ZERO,
            },
        );
        id
    }

    /// Seed a product item.
    pub async fn seed_product_item(
        &self,
        product_id: ProductId,
        price: Decimal,
        qty_in_stock: u32,
    ) -> ProductItemId {
        let mut state = self.state.lock().await;
        let id = ProductItemId::new(state.alloc_id());
        state.product_items.insert(
            id,
            ProductItem {
                id,
                product_id,
                price,
                discount_price: Decimal::ZERO,
                qty_in_stock,
            },
        );
        id
    }

    /// Seed a coupon with an explicit code.
    pub async fn seed_coupon(&self, coupon: NewCoupon) -> CouponId {
        let mut state = self.state.lock().await;
        let id = CouponId::new(state.alloc_id());
        state.coupons.insert(
            id,
            Coupon {
                id,
                name: coupon.name,
                code: coupon.code,
                discount_rate: coupon.discount_rate,
                min_cart_price: coupon.min_cart_price,
                expires_at: coupon.expires_at,
            },
        );
        id
    }

    /// Seed an offer.
    pub async fn seed_offer(&self, offer: NewOffer) -> OfferId {
        let mut state = self.state.lock().await;
        let id = OfferId::new(state.alloc_id());
        state.offers.insert(
            id,
            Offer {
                id,
                name: offer.name,
                discount_rate: offer.discount_rate,
                ends_at: offer.ends_at,
            },
        );
        id
    }

    /// Overwrite a product item's stock outside any transaction.
    pub async fn set_stock(&self, id: ProductItemId, qty_in_stock: u32) {
        if let Some(item) = self.state.lock().await.product_items.get_mut(&id) {
            item.qty_in_stock = qty_in_stock;
        }
    }

    /// Snapshot a product outside any transaction.
    pub async fn product(&self, id: ProductId) -> Option<Product> {
        self.state.lock().await.products.get(&id).cloned()
    }

    /// Snapshot a product item outside any transaction.
    pub async fn product_item(&self, id: ProductItemId) -> Option<ProductItem> {
        self.state.lock().await.product_items.get(&id).cloned()
    }

    /// Snapshot a wallet outside any transaction.
    pub async fn wallet_by_user(&self, user_id: UserId) -> Option<Wallet> {
        self.state
            .lock()
            .await
            .wallets
            .values()
            .find(|w| w.user_id == user_id)
            .cloned()
    }
}

#[async_trait]
impl Store for MemoryStore {
    type Tx = MemoryTx;

    async fn begin(&self) -> Result<Self::Tx, StoreError> {
        let guard = Arc::clone(&self.state).lock_owned().await;
        let working = guard.clone();
        Ok(MemoryTx { working, guard })
    }

    async fn commit(&self, tx: Self::Tx) -> Result<(), StoreError> {
        let MemoryTx { working, mut guard } = tx;
        *guard = working;
        Ok(())
    }

    async fn rollback(&self, tx: Self::Tx) -> Result<(), StoreError> {
        drop(tx);
        Ok(())
    }

    async fn find_cart_by_user(
        &self,
        tx: &mut Self::Tx,
        user_id: UserId,
    ) -> Result<Option<Cart>, StoreError> {
        Ok(tx
            .working
            .carts
            .values()
            .find(|c| c.user_id == user_id)
            .cloned())
    }

    async fn create_cart(&self, tx: &mut Self::Tx, user_id: UserId) -> Result<Cart, StoreError> {
        let now = Utc::now();
        let id = CartId::new(tx.working.alloc_id());
        let cart = Cart {
            id,
            user_id,
            total_price: Decimal::ZERO,
            discount_amount: Decimal::ZERO,
            applied_coupon: None,
            created_at: now,
            updated_at: now,
        };
        tx.working.carts.insert(id, cart.clone());
        Ok(cart)
    }

    async fn save_cart(&self, tx: &mut Self::Tx, cart: &Cart) -> Result<(), StoreError> {
        let slot = tx
            .working
            .carts
            .get_mut(&cart.id)
            .ok_or(StoreError::NotFound)?;
        *slot = cart.clone();
        slot.updated_at = Utc::now();
        Ok(())
    }

    async fn list_cart_items(
        &self,
        tx: &mut Self::Tx,
        cart_id: CartId,
    ) -> Result<Vec<CartItem>, StoreError> {
        Ok(tx
            .working
            .cart_items
            .values()
            .filter(|i| i.cart_id == cart_id)
            .cloned()
            .collect())
    }

    async fn find_cart_item(
        &self,
        tx: &mut Self::Tx,
        cart_id: CartId,
        product_item_id: ProductItemId,
    ) -> Result<Option<CartItem>, StoreError> {
        Ok(tx
            .working
            .cart_items
            .values()
            .find(|i| i.cart_id == cart_id && i.product_item_id == product_item_id)
            .cloned())
    }

    async fn insert_cart_item(
        &self,
        tx: &mut Self::Tx,
        cart_id: CartId,
        product_item_id: ProductItemId,
        qty: u32,
    ) -> Result<CartItem, StoreError> {
        let duplicate = tx
            .working
            .cart_items
            .values()
            .any(|i| i.cart_id == cart_id && i.product_item_id == product_item_id);
        if duplicate {
            return Err(StoreError::Conflict(
                "cart item already exists".to_owned(),
            ));
        }
        let id = CartItemId::new(tx.working.alloc_id());
        let item = CartItem {
            id,
            cart_id,
            product_item_id,
            qty,
        };
        tx.working.cart_items.insert(id, item.clone());
        Ok(item)
    }

    async fn update_cart_item_qty(
        &self,
        tx: &mut Self::Tx,
        id: CartItemId,
        qty: u32,
    ) -> Result<(), StoreError> {
        let item = tx
            .working
            .cart_items
            .get_mut(&id)
            .ok_or(StoreError::NotFound)?;
        item.qty = qty;
        Ok(())
    }

    async fn delete_cart_item(&self, tx: &mut Self::Tx, id: CartItemId) -> Result<(), StoreError> {
        tx.working
            .cart_items
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::NotFound)
    }

    async fn clear_cart_items(
        &self,
        tx: &mut Self::Tx,
        cart_id: CartId,
    ) -> Result<(), StoreError> {
        tx.working.cart_items.retain(|_, i| i.cart_id != cart_id);
        Ok(())
    }

    async fn find_product(
        &self,
        tx: &mut Self::Tx,
        id: ProductId,
    ) -> Result<Option<Product>, StoreError> {
        Ok(tx.working.products.get(&id).cloned())
    }

    async fn find_product_item(
        &self,
        tx: &mut Self::Tx,
        id: ProductItemId,
    ) -> Result<Option<ProductItem>, StoreError> {
        Ok(tx.working.product_items.get(&id).cloned())
    }

    async fn try_decrement_stock(
        &self,
        tx: &mut Self::Tx,
        id: ProductItemId,
        qty: u32,
    ) -> Result<bool, StoreError> {
        let item = tx
            .working
            .product_items
            .get_mut(&id)
            .ok_or(StoreError::NotFound)?;
        if item.qty_in_stock < qty {
            return Ok(false);
        }
        item.qty_in_stock -= qty;
        Ok(true)
    }

    async fn increment_stock(
        &self,
        tx: &mut Self::Tx,
        id: ProductItemId,
        qty: u32,
    ) -> Result<(), StoreError> {
        let item = tx
            .working
            .product_items
            .get_mut(&id)
            .ok_or(StoreError::NotFound)?;
        item.qty_in_stock += qty;
        Ok(())
    }

    async fn find_coupon(
        &self,
        tx: &mut Self::Tx,
        id: CouponId,
    ) -> Result<Option<Coupon>, StoreError> {
        Ok(tx.working.coupons.get(&id).cloned())
    }

    async fn find_coupon_by_code(
        &self,
        tx: &mut Self::Tx,
        code: &str,
    ) -> Result<Option<Coupon>, StoreError> {
        Ok(tx
            .working
            .coupons
            .values()
            .find(|c| c.code == code)
            .cloned())
    }

    async fn insert_coupon(
        &self,
        tx: &mut Self::Tx,
        coupon: NewCoupon,
    ) -> Result<Coupon, StoreError> {
        if tx.working.coupons.values().any(|c| c.code == coupon.code) {
            return Err(StoreError::Conflict("coupon code already exists".to_owned()));
        }
        let id = CouponId::new(tx.working.alloc_id());
        let coupon = Coupon {
            id,
            name: coupon.name,
            code: coupon.code,
            discount_rate: coupon.discount_rate,
            min_cart_price: coupon.min_cart_price,
            expires_at: coupon.expires_at,
        };
        tx.working.coupons.insert(id, coupon.clone());
        Ok(coupon)
    }

    async fn coupon_in_use(&self, tx: &mut Self::Tx, id: CouponId) -> Result<bool, StoreError> {
        Ok(tx
            .working
            .carts
            .values()
            .any(|c| c.applied_coupon == Some(id)))
    }

    async fn find_offer(
        &self,
        tx: &mut Self::Tx,
        id: OfferId,
    ) -> Result<Option<Offer>, StoreError> {
        Ok(tx.working.offers.get(&id).cloned())
    }

    async fn insert_offer(&self, tx: &mut Self::Tx, offer: NewOffer) -> Result<Offer, StoreError> {
        if tx.working.offers.values().any(|o| o.name == offer.name) {
            return Err(StoreError::Conflict("offer name already exists".to_owned()));
        }
        let id = OfferId::new(tx.working.alloc_id());
        let offer = Offer {
            id,
            name: offer.name,
            discount_rate: offer.discount_rate,
            ends_at: offer.ends_at,
        };
        tx.working.offers.insert(id, offer.clone());
        Ok(offer)
    }

    async fn find_category_offer(
        &self,
        tx: &mut Self::Tx,
        category_id: CategoryId,
    ) -> Result<Option<CategoryOffer>, StoreError> {
        Ok(tx
            .working
            .category_offers
            .values()
            .find(|a| a.category_id == category_id)
            .cloned())
    }

    async fn insert_category_offer(
        &self,
        tx: &mut Self::Tx,
        category_id: CategoryId,
        offer_id: OfferId,
    ) -> Result<CategoryOffer, StoreError> {
        let duplicate = tx
            .working
            .category_offers
            .values()
            .any(|a| a.category_id == category_id);
        if duplicate {
            return Err(StoreError::Conflict(
                "category already has an offer".to_owned(),
            ));
        }
        let id = CategoryOfferId::new(tx.working.alloc_id());
        let attachment = CategoryOffer {
            id,
            category_id,
            offer_id,
        };
        tx.working.category_offers.insert(id, attachment.clone());
        Ok(attachment)
    }

    async fn repoint_category_offer(
        &self,
        tx: &mut Self::Tx,
        id: CategoryOfferId,
        offer_id: OfferId,
    ) -> Result<(), StoreError> {
        let attachment = tx
            .working
            .category_offers
            .get_mut(&id)
            .ok_or(StoreError::NotFound)?;
        attachment.offer_id = offer_id;
        Ok(())
    }

    async fn delete_category_offer(
        &self,
        tx: &mut Self::Tx,
        id: CategoryOfferId,
    ) -> Result<(), StoreError> {
        tx.working
            .category_offers
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::NotFound)
    }

    async fn find_product_offer(
        &self,
        tx: &mut Self::Tx,
        product_id: ProductId,
    ) -> Result<Option<ProductOffer>, StoreError> {
        Ok(tx
            .working
            .product_offers
            .values()
            .find(|a| a.product_id == product_id)
            .cloned())
    }

    async fn insert_product_offer(
        &self,
        tx: &mut Self::Tx,
        product_id: ProductId,
        offer_id: OfferId,
    ) -> Result<ProductOffer, StoreError> {
        let duplicate = tx
            .working
            .product_offers
            .values()
            .any(|a| a.product_id == product_id);
        if duplicate {
            return Err(StoreError::Conflict(
                "product already has an offer".to_owned(),
            ));
        }
        let id = ProductOfferId::new(tx.working.alloc_id());
        let attachment = ProductOffer {
            id,
            product_id,
            offer_id,
        };
        tx.working.product_offers.insert(id, attachment.clone());
        Ok(attachment)
    }

    async fn repoint_product_offer(
        &self,
        tx: &mut Self::Tx,
        id: ProductOfferId,
        offer_id: OfferId,
    ) -> Result<(), StoreError> {
        let attachment = tx
            .working
            .product_offers
            .get_mut(&id)
            .ok_or(StoreError::NotFound)?;
        attachment.offer_id = offer_id;
        Ok(())
    }

    async fn delete_product_offer(
        &self,
        tx: &mut Self::Tx,
        id: ProductOfferId,
    ) -> Result<(), StoreError> {
        tx.working
            .product_offers
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::NotFound)
    }

    async fn update_products_discount_for_category(
        &self,
        tx: &mut Self::Tx,
        category_id: CategoryId,
        rate: Decimal,
    ) -> Result<u64, StoreError> {
        let mut touched = 0;
        for product in tx
            .working
            .products
            .values_mut()
            .filter(|p| p.category_id == category_id)
        {
            product.discount_price = discounted_unit_price(product.price, rate);
            touched += 1;
        }
        Ok(touched)
    }

    async fn update_product_items_discount_for_category(
        &self,
        tx: &mut Self::Tx,
        category_id: CategoryId,
        rate: Decimal,
    ) -> Result<u64, StoreError> {
        let product_ids: Vec<ProductId> = tx
            .working
            .products
            .values()
            .filter(|p| p.category_id == category_id)
            .map(|p| p.id)
            .collect();
        let mut touched = 0;
        for item in tx
            .working
            .product_items
            .values_mut()
            .filter(|i| product_ids.contains(&i.product_id))
        {
            item.discount_price = discounted_unit_price(item.price, rate);
            touched += 1;
        }
        Ok(touched)
    }

    async fn clear_products_discount_for_category(
        &self,
        tx: &mut Self::Tx,
        category_id: CategoryId,
    ) -> Result<u64, StoreError> {
        let mut touched = 0;
        for product in tx
            .working
            .products
            .values_mut()
            .filter(|p| p.category_id == category_id)
        {
            product.discount_price = Decimal::ZERO;
            touched += 1;
        }
        Ok(touched)
    }

    async fn clear_product_items_discount_for_category(
        &self,
        tx: &mut Self::Tx,
        category_id: CategoryId,
    ) -> Result<u64, StoreError> {
        let product_ids: Vec<ProductId> = tx
            .working
            .products
            .values()
            .filter(|p| p.category_id == category_id)
            .map(|p| p.id)
            .collect();
        let mut touched = 0;
        for item in tx
            .working
            .product_items
            .values_mut()
            .filter(|i| product_ids.contains(&i.product_id))
        {
            item.discount_price = Decimal::ZERO;
            touched += 1;
        }
        Ok(touched)
    }

    async fn update_product_discount(
        &self,
        tx: &mut Self::Tx,
        product_id: ProductId,
        rate: Decimal,
    ) -> Result<u64, StoreError> {
        match tx.working.products.get_mut(&product_id) {
            Some(product) => {
                product.discount_price = discounted_unit_price(product.price, rate);
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn update_product_items_discount_for_product(
        &self,
        tx: &mut Self::Tx,
        product_id: ProductId,
        rate: Decimal,
    ) -> Result<u64, StoreError> {
        let mut touched = 0;
        for item in tx
            .working
            .product_items
            .values_mut()
            .filter(|i| i.product_id == product_id)
        {
            item.discount_price = discounted_unit_price(item.price, rate);
            touched += 1;
        }
        Ok(touched)
    }

    async fn clear_product_discount(
        &self,
        tx: &mut Self::Tx,
        product_id: ProductId,
    ) -> Result<u64, StoreError> {
        match tx.working.products.get_mut(&product_id) {
            Some(product) => {
                product.discount_price = Decimal::ZERO;
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn clear_product_items_discount_for_product(
        &self,
        tx: &mut Self::Tx,
        product_id: ProductId,
    ) -> Result<u64, StoreError> {
        let mut touched = 0;
        for item in tx
            .working
            .product_items
            .values_mut()
            .filter(|i| i.product_id == product_id)
        {
            item.discount_price = Decimal::ZERO;
            touched += 1;
        }
        Ok(touched)
    }

    async fn insert_order(
        &self,
        tx: &mut Self::Tx,
        order: NewOrder,
    ) -> Result<ShopOrder, StoreError> {
        let id = OrderId::new(tx.working.alloc_id());
        let placed = ShopOrder {
            id,
            user_id: order.user_id,
            status: order.status,
            total: order.total,
            placed_at: Utc::now(),
        };
        tx.working.orders.insert(id, placed.clone());
        for line in order.lines {
            let line_id = OrderLineId::new(tx.working.alloc_id());
            tx.working.order_lines.insert(
                line_id,
                OrderLine {
                    id: line_id,
                    order_id: id,
                    product_item_id: line.product_item_id,
                    qty: line.qty,
                    unit_price: line.unit_price,
                },
            );
        }
        Ok(placed)
    }

    async fn find_order(
        &self,
        tx: &mut Self::Tx,
        id: OrderId,
    ) -> Result<Option<ShopOrder>, StoreError> {
        Ok(tx.working.orders.get(&id).cloned())
    }

    async fn list_order_lines(
        &self,
        tx: &mut Self::Tx,
        order_id: OrderId,
    ) -> Result<Vec<OrderLine>, StoreError> {
        Ok(tx
            .working
            .order_lines
            .values()
            .filter(|l| l.order_id == order_id)
            .cloned()
            .collect())
    }

    async fn update_order_status(
        &self,
        tx: &mut Self::Tx,
        id: OrderId,
        status: OrderStatus,
    ) -> Result<(), StoreError> {
        let order = tx.working.orders.get_mut(&id).ok_or(StoreError::NotFound)?;
        order.status = status;
        Ok(())
    }

    async fn find_wallet_by_user(
        &self,
        tx: &mut Self::Tx,
        user_id: UserId,
    ) -> Result<Option<Wallet>, StoreError> {
        Ok(tx
            .working
            .wallets
            .values()
            .find(|w| w.user_id == user_id)
            .cloned())
    }

    async fn find_wallet(
        &self,
        tx: &mut Self::Tx,
        id: WalletId,
    ) -> Result<Option<Wallet>, StoreError> {
        Ok(tx.working.wallets.get(&id).cloned())
    }

    async fn create_wallet(
        &self,
        tx: &mut Self::Tx,
        user_id: UserId,
    ) -> Result<Wallet, StoreError> {
        if tx.working.wallets.values().any(|w| w.user_id == user_id) {
            return Err(StoreError::Conflict("user already has a wallet".to_owned()));
        }
        let id = WalletId::new(tx.working.alloc_id());
        let wallet = Wallet {
            id,
            user_id,
            balance: Decimal::ZERO,
        };
        tx.working.wallets.insert(id, wallet.clone());
        Ok(wallet)
    }

    async fn update_wallet_balance(
        &self,
        tx: &mut Self::Tx,
        id: WalletId,
        balance: Decimal,
    ) -> Result<(), StoreError> {
        let wallet = tx
            .working
            .wallets
            .get_mut(&id)
            .ok_or(StoreError::NotFound)?;
        wallet.balance = balance;
        Ok(())
    }

    async fn append_wallet_transaction(
        &self,
        tx: &mut Self::Tx,
        wallet_id: WalletId,
        amount: Decimal,
        reason: &str,
    ) -> Result<WalletTransaction, StoreError> {
        let id = WalletTransactionId::new(tx.working.alloc_id());
        let entry = WalletTransaction {
            id,
            wallet_id,
            amount,
            reason: reason.to_owned(),
            created_at: Utc::now(),
        };
        tx.working.wallet_transactions.insert(id, entry.clone());
        Ok(entry)
    }

    async fn list_wallet_transactions(
        &self,
        tx: &mut Self::Tx,
        wallet_id: WalletId,
    ) -> Result<Vec<WalletTransaction>, StoreError> {
        Ok(tx
            .working
            .wallet_transactions
            .values()
            .filter(|t| t.wallet_id == wallet_id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rollback_discards_writes() {
        let store = MemoryStore::new();
        let product = store
            .seed_product(CategoryId::new(1), "tea", Decimal::from(100))
            .await;
        let item = store.seed_product_item(product, Decimal::from(100), 5).await;

        let mut tx = store.begin().await.expect("begin");
        assert!(store.try_decrement_stock(&mut tx, item, 3).await.expect("cas"));
        store.rollback(tx).await.expect("rollback");

        let snapshot = store.product_item(item).await.expect("item");
        assert_eq!(snapshot.qty_in_stock, 5);
    }

    #[tokio::test]
    async fn commit_publishes_writes_atomically() {
        let store = MemoryStore::new();
        let product = store
            .seed_product(CategoryId::new(1), "tea", Decimal::from(100))
            .await;
        let item = store.seed_product_item(product, Decimal::from(100), 5).await;

        let mut tx = store.begin().await.expect("begin");
        assert!(store.try_decrement_stock(&mut tx, item, 2).await.expect("cas"));
        store.commit(tx).await.expect("commit");

        let snapshot = store.product_item(item).await.expect("item");
        assert_eq!(snapshot.qty_in_stock, 3);
    }

    #[tokio::test]
    async fn stock_cas_refuses_oversell() {
        let store = MemoryStore::new();
        let product = store
            .seed_product(CategoryId::new(1), "tea", Decimal::from(100))
            .await;
        let item = store.seed_product_item(product, Decimal::from(100), 1).await;

        let mut tx = store.begin().await.expect("begin");
        assert!(store.try_decrement_stock(&mut tx, item, 1).await.expect("cas"));
        assert!(!store.try_decrement_stock(&mut tx, item, 1).await.expect("cas"));
        store.commit(tx).await.expect("commit");

        let snapshot = store.product_item(item).await.expect("item");
        assert_eq!(snapshot.qty_in_stock, 0);
    }

    #[tokio::test]
    async fn duplicate_cart_line_is_a_conflict() {
        let store = MemoryStore::new();
        let product = store
            .seed_product(CategoryId::new(1), "tea", Decimal::from(100))
            .await;
        let item = store.seed_product_item(product, Decimal::from(100), 5).await;

        let mut tx = store.begin().await.expect("begin");
        let cart = store.create_cart(&mut tx, UserId::new(1)).await.expect("cart");
        store
            .insert_cart_item(&mut tx, cart.id, item, 1)
            .await
            .expect("first insert");
        let err = store
            .insert_cart_item(&mut tx, cart.id, item, 1)
            .await
            .expect_err("duplicate insert");
        assert!(matches!(err, StoreError::Conflict(_)));
    }
}
