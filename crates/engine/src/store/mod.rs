//! Storage contract consumed by the engine services.
//!
//! [`Store`] is a behavioral contract, not an implementation: it names the
//! repository operations the services need and requires that any
//! composition of them can run inside one ambient transaction (`begin`, run
//! nested operations against the transaction handle, `commit`/`rollback` as
//! one unit). How a backend stores rows is its own business, as long as the
//! data-model invariants hold.
//!
//! Backends:
//! - [`MemoryStore`] (this crate) - serialized in-memory state for tests
//!   and development
//! - `PgStore` (`sugarcane-postgres`) - the production `PostgreSQL` backend

pub mod memory;

pub use memory::MemoryStore;

use async_trait::async_trait;
use rust_decimal::Decimal;
use thiserror::Error;

use sugarcane_core::{
    CartId, CartItemId, CategoryId, CategoryOfferId, CouponId, OfferId, OrderId, OrderStatus,
    ProductId, ProductItemId, ProductOfferId, UserId, WalletId,
};

use crate::models::{
    Cart, CartItem, CategoryOffer, Coupon, NewCoupon, NewOffer, NewOrder, Offer, OrderLine,
    Product, ProductItem, ProductOffer, ShopOrder, Wallet, WalletTransaction,
};

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Backend failure (connection, query, serialization).
    #[error("database error: {0}")]
    Database(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Data in the store is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g. duplicate cart line, duplicate coupon
    /// code).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

impl StoreError {
    /// Wrap a backend error as [`StoreError::Database`].
    pub fn database(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Database(Box::new(err))
    }
}

/// Scoped-transaction repository contract.
///
/// Every operation takes `&mut Self::Tx`, so the orchestrating component
/// decides the transaction boundary: a public engine operation begins one
/// transaction, runs any number of operations against it (possibly through
/// several services), and commits or rolls back the whole unit.
#[async_trait]
pub trait Store: Send + Sync + 'static {
    /// Transaction handle. Dropping it without commit must discard all
    /// writes made through it.
    type Tx: Send;

    /// Begin a transaction.
    async fn begin(&self) -> Result<Self::Tx, StoreError>;
    /// Commit a transaction, making all its writes visible atomically.
    async fn commit(&self, tx: Self::Tx) -> Result<(), StoreError>;
    /// Roll a transaction back, discarding all its writes.
    async fn rollback(&self, tx: Self::Tx) -> Result<(), StoreError>;

    // ------------------------------------------------------------------
    // Carts
    // ------------------------------------------------------------------

    /// Find a user's cart. Inside a transaction this also serializes
    /// concurrent mutations of the same cart (row lock or equivalent).
    async fn find_cart_by_user(
        &self,
        tx: &mut Self::Tx,
        user_id: UserId,
    ) -> Result<Option<Cart>, StoreError>;

    /// Create an empty cart for a user.
    async fn create_cart(&self, tx: &mut Self::Tx, user_id: UserId) -> Result<Cart, StoreError>;

    /// Persist a cart's derived fields (`total_price`, `discount_amount`,
    /// `applied_coupon`, `updated_at`).
    async fn save_cart(&self, tx: &mut Self::Tx, cart: &Cart) -> Result<(), StoreError>;

    /// List a cart's lines in insertion order.
    async fn list_cart_items(
        &self,
        tx: &mut Self::Tx,
        cart_id: CartId,
    ) -> Result<Vec<CartItem>, StoreError>;

    /// Find the line for a given product item in a cart.
    async fn find_cart_item(
        &self,
        tx: &mut Self::Tx,
        cart_id: CartId,
        product_item_id: ProductItemId,
    ) -> Result<Option<CartItem>, StoreError>;

    /// Insert a cart line. Fails with [`StoreError::Conflict`] if the
    /// (cart, product item) pair already exists.
    async fn insert_cart_item(
        &self,
        tx: &mut Self::Tx,
        cart_id: CartId,
        product_item_id: ProductItemId,
        qty: u32,
    ) -> Result<CartItem, StoreError>;

    /// Update a cart line's quantity.
    async fn update_cart_item_qty(
        &self,
        tx: &mut Self::Tx,
        id: CartItemId,
        qty: u32,
    ) -> Result<(), StoreError>;

    /// Delete a cart line.
    async fn delete_cart_item(&self, tx: &mut Self::Tx, id: CartItemId) -> Result<(), StoreError>;

    /// Delete all lines of a cart.
    async fn clear_cart_items(&self, tx: &mut Self::Tx, cart_id: CartId)
    -> Result<(), StoreError>;

    // ------------------------------------------------------------------
    // Catalog
    // ------------------------------------------------------------------

    /// Find a product by ID.
    async fn find_product(
        &self,
        tx: &mut Self::Tx,
        id: ProductId,
    ) -> Result<Option<Product>, StoreError>;

    /// Find a product item by ID.
    async fn find_product_item(
        &self,
        tx: &mut Self::Tx,
        id: ProductItemId,
    ) -> Result<Option<ProductItem>, StoreError>;

    /// Atomically decrement a product item's stock by `qty` if and only if
    /// at least `qty` units are in stock. Returns `false` when stock is
    /// insufficient; two concurrent decrements that would jointly oversell
    /// must not both return `true`.
    async fn try_decrement_stock(
        &self,
        tx: &mut Self::Tx,
        id: ProductItemId,
        qty: u32,
    ) -> Result<bool, StoreError>;

    /// Increment a product item's stock by `qty`. No upper bound; releases
    /// restore exactly what was decremented.
    async fn increment_stock(
        &self,
        tx: &mut Self::Tx,
        id: ProductItemId,
        qty: u32,
    ) -> Result<(), StoreError>;

    // ------------------------------------------------------------------
    // Coupons
    // ------------------------------------------------------------------

    /// Find a coupon by ID.
    async fn find_coupon(
        &self,
        tx: &mut Self::Tx,
        id: CouponId,
    ) -> Result<Option<Coupon>, StoreError>;

    /// Find a coupon by its opaque code.
    async fn find_coupon_by_code(
        &self,
        tx: &mut Self::Tx,
        code: &str,
    ) -> Result<Option<Coupon>, StoreError>;

    /// Insert a coupon. Fails with [`StoreError::Conflict`] on a duplicate
    /// code.
    async fn insert_coupon(
        &self,
        tx: &mut Self::Tx,
        coupon: NewCoupon,
    ) -> Result<Coupon, StoreError>;

    /// Whether any cart currently has this coupon applied.
    async fn coupon_in_use(&self, tx: &mut Self::Tx, id: CouponId) -> Result<bool, StoreError>;

    // ------------------------------------------------------------------
    // Offers and attachments
    // ------------------------------------------------------------------

    /// Find an offer by ID.
    async fn find_offer(&self, tx: &mut Self::Tx, id: OfferId)
    -> Result<Option<Offer>, StoreError>;

    /// Insert an offer. Fails with [`StoreError::Conflict`] on a duplicate
    /// name.
    async fn insert_offer(&self, tx: &mut Self::Tx, offer: NewOffer) -> Result<Offer, StoreError>;

    /// Find the active offer attachment for a category, if any.
    async fn find_category_offer(
        &self,
        tx: &mut Self::Tx,
        category_id: CategoryId,
    ) -> Result<Option<CategoryOffer>, StoreError>;

    /// Attach an offer to a category.
    async fn insert_category_offer(
        &self,
        tx: &mut Self::Tx,
        category_id: CategoryId,
        offer_id: OfferId,
    ) -> Result<CategoryOffer, StoreError>;

    /// Re-point an existing category attachment to a different offer.
    async fn repoint_category_offer(
        &self,
        tx: &mut Self::Tx,
        id: CategoryOfferId,
        offer_id: OfferId,
    ) -> Result<(), StoreError>;

    /// Delete a category attachment.
    async fn delete_category_offer(
        &self,
        tx: &mut Self::Tx,
        id: CategoryOfferId,
    ) -> Result<(), StoreError>;

    /// Find the active offer attachment for a product, if any.
    async fn find_product_offer(
        &self,
        tx: &mut Self::Tx,
        product_id: ProductId,
    ) -> Result<Option<ProductOffer>, StoreError>;

    /// Attach an offer to a product.
    async fn insert_product_offer(
        &self,
        tx: &mut Self::Tx,
        product_id: ProductId,
        offer_id: OfferId,
    ) -> Result<ProductOffer, StoreError>;

    /// Re-point an existing product attachment to a different offer.
    async fn repoint_product_offer(
        &self,
        tx: &mut Self::Tx,
        id: ProductOfferId,
        offer_id: OfferId,
    ) -> Result<(), StoreError>;

    /// Delete a product attachment.
    async fn delete_product_offer(
        &self,
        tx: &mut Self::Tx,
        id: ProductOfferId,
    ) -> Result<(), StoreError>;

    // ------------------------------------------------------------------
    // Discount cascade
    //
    // Phase 1 (products) runs before phase 2 (product items); the cascade
    // engine is responsible for the ordering, the store for the bulk
    // writes. `discount_price` is always derived from the undiscounted
    // `price`.
    // ------------------------------------------------------------------

    /// Set `discount_price` for every product in a category. Returns the
    /// number of rows touched.
    async fn update_products_discount_for_category(
        &self,
        tx: &mut Self::Tx,
        category_id: CategoryId,
        rate: Decimal,
    ) -> Result<u64, StoreError>;

    /// Set `discount_price` for every product item of every product in a
    /// category.
    async fn update_product_items_discount_for_category(
        &self,
        tx: &mut Self::Tx,
        category_id: CategoryId,
        rate: Decimal,
    ) -> Result<u64, StoreError>;

    /// Zero `discount_price` for every product in a category.
    async fn clear_products_discount_for_category(
        &self,
        tx: &mut Self::Tx,
        category_id: CategoryId,
    ) -> Result<u64, StoreError>;

    /// Zero `discount_price` for every product item of every product in a
    /// category.
    async fn clear_product_items_discount_for_category(
        &self,
        tx: &mut Self::Tx,
        category_id: CategoryId,
    ) -> Result<u64, StoreError>;

    /// Set `discount_price` for one product.
    async fn update_product_discount(
        &self,
        tx: &mut Self::Tx,
        product_id: ProductId,
        rate: Decimal,
    ) -> Result<u64, StoreError>;

    /// Set `discount_price` for every product item of one product.
    async fn update_product_items_discount_for_product(
        &self,
        tx: &mut Self::Tx,
        product_id: ProductId,
        rate: Decimal,
    ) -> Result<u64, StoreError>;

    /// Zero `discount_price` for one product.
    async fn clear_product_discount(
        &self,
        tx: &mut Self::Tx,
        product_id: ProductId,
    ) -> Result<u64, StoreError>;

    /// Zero `discount_price` for every product item of one product.
    async fn clear_product_items_discount_for_product(
        &self,
        tx: &mut Self::Tx,
        product_id: ProductId,
    ) -> Result<u64, StoreError>;

    // ------------------------------------------------------------------
    // Orders
    // ------------------------------------------------------------------

    /// Insert an order together with all its lines.
    async fn insert_order(&self, tx: &mut Self::Tx, order: NewOrder)
    -> Result<ShopOrder, StoreError>;

    /// Find an order by ID.
    async fn find_order(
        &self,
        tx: &mut Self::Tx,
        id: OrderId,
    ) -> Result<Option<ShopOrder>, StoreError>;

    /// List an order's lines in insertion order.
    async fn list_order_lines(
        &self,
        tx: &mut Self::Tx,
        order_id: OrderId,
    ) -> Result<Vec<OrderLine>, StoreError>;

    /// Update an order's status.
    async fn update_order_status(
        &self,
        tx: &mut Self::Tx,
        id: OrderId,
        status: OrderStatus,
    ) -> Result<(), StoreError>;

    // ------------------------------------------------------------------
    // Wallets
    // ------------------------------------------------------------------

    /// Find a user's wallet, if it exists.
    async fn find_wallet_by_user(
        &self,
        tx: &mut Self::Tx,
        user_id: UserId,
    ) -> Result<Option<Wallet>, StoreError>;

    /// Find a wallet by ID.
    async fn find_wallet(
        &self,
        tx: &mut Self::Tx,
        id: WalletId,
    ) -> Result<Option<Wallet>, StoreError>;

    /// Create a wallet with zero balance.
    async fn create_wallet(&self, tx: &mut Self::Tx, user_id: UserId)
    -> Result<Wallet, StoreError>;

    /// Overwrite a wallet's balance.
    async fn update_wallet_balance(
        &self,
        tx: &mut Self::Tx,
        id: WalletId,
        balance: Decimal,
    ) -> Result<(), StoreError>;

    /// Append one entry to a wallet's transaction log.
    async fn append_wallet_transaction(
        &self,
        tx: &mut Self::Tx,
        wallet_id: WalletId,
        amount: Decimal,
        reason: &str,
    ) -> Result<WalletTransaction, StoreError>;

    /// List a wallet's transaction log in append order.
    async fn list_wallet_transactions(
        &self,
        tx: &mut Self::Tx,
        wallet_id: WalletId,
    ) -> Result<Vec<WalletTransaction>, StoreError>;
}
