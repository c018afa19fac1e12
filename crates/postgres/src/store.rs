//! [`Store`] implementation over `sqlx` `PostgreSQL` transactions.
//!
//! Every query is runtime-checked, so the crate builds without a live
//! database. Concurrency-sensitive operations rely on the database rather
//! than process-local locks: cart lookups take a row lock (`FOR UPDATE`)
//! and stock decrements are conditional updates guarded by the
//! `qty_in_stock >= 0` check constraint.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::Postgres;
use sqlx::{FromRow, PgPool};

use sugarcane_core::{
    CartId, CartItemId, CategoryId, CategoryOfferId, CouponId, OfferId, OrderId, OrderLineId,
    OrderStatus, ProductId, ProductItemId, ProductOfferId, UserId, WalletId, WalletTransactionId,
};
use sugarcane_engine::models::{
    Cart, CartItem, CategoryOffer, Coupon, NewCoupon, NewOffer, NewOrder, Offer, OrderLine,
    Product, ProductItem, ProductOffer, ShopOrder, Wallet, WalletTransaction,
};
use sugarcane_engine::store::{Store, StoreError};

/// `PostgreSQL` store backed by a connection pool.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Create a store over an existing pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn map_sqlx(err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::RowNotFound => StoreError::NotFound,
        err => {
            if let sqlx::Error::Database(db) = &err
                && db.is_unique_violation()
            {
                return StoreError::Conflict(db.message().to_owned());
            }
            StoreError::database(err)
        }
    }
}

fn db_qty(qty: u32) -> Result<i32, StoreError> {
    i32::try_from(qty)
        .map_err(|_| StoreError::DataCorruption(format!("quantity {qty} exceeds storage range")))
}

fn app_qty(qty: i32) -> Result<u32, StoreError> {
    u32::try_from(qty)
        .map_err(|_| StoreError::DataCorruption(format!("negative quantity {qty} in storage")))
}

// ----------------------------------------------------------------------
// Row types
// ----------------------------------------------------------------------

#[derive(FromRow)]
struct CartRow {
    id: CartId,
    user_id: UserId,
    total_price: Decimal,
    discount_amount: Decimal,
    applied_coupon: Option<CouponId>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<CartRow> for Cart {
    fn from(row: CartRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            total_price: row.total_price,
            discount_amount: row.discount_amount,
            applied_coupon: row.applied_coupon,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(FromRow)]
struct CartItemRow {
    id: CartItemId,
    cart_id: CartId,
    product_item_id: ProductItemId,
    qty: i32,
}

impl TryFrom<CartItemRow> for CartItem {
    type Error = StoreError;

    fn try_from(row: CartItemRow) -> Result<Self, StoreError> {
        Ok(Self {
            id: row.id,
            cart_id: row.cart_id,
            product_item_id: row.product_item_id,
            qty: app_qty(row.qty)?,
        })
    }
}

#[derive(FromRow)]
struct ProductRow {
    id: ProductId,
    category_id: CategoryId,
    name: String,
    price: Decimal,
    discount_price: Decimal,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Self {
            id: row.id,
            category_id: row.category_id,
            name: row.name,
            price: row.price,
            discount_price: row.discount_price,
        }
    }
}

#[derive(FromRow)]
struct ProductItemRow {
    id: ProductItemId,
    product_id: ProductId,
    price: Decimal,
    discount_price: Decimal,
    qty_in_stock: i32,
}

impl TryFrom<ProductItemRow> for ProductItem {
    type Error = StoreError;

    fn try_from(row: ProductItemRow) -> Result<Self, StoreError> {
        Ok(Self {
            id: row.id,
            product_id: row.product_id,
            price: row.price,
            discount_price: row.discount_price,
            qty_in_stock: app_qty(row.qty_in_stock)?,
        })
    }
}

#[derive(FromRow)]
struct CouponRow {
    id: CouponId,
    name: String,
    code: String,
    discount_rate: Decimal,
    min_cart_price: Decimal,
    expires_at: DateTime<Utc>,
}

impl From<CouponRow> for Coupon {
    fn from(row: CouponRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            code: row.code,
            discount_rate: row.discount_rate,
            min_cart_price: row.min_cart_price,
            expires_at: row.expires_at,
        }
    }
}

#[derive(FromRow)]
struct OfferRow {
    id: OfferId,
    name: String,
    discount_rate: Decimal,
    ends_at: DateTime<Utc>,
}

impl From<OfferRow> for Offer {
    fn from(row: OfferRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            discount_rate: row.discount_rate,
            ends_at: row.ends_at,
        }
    }
}

#[derive(FromRow)]
struct CategoryOfferRow {
    id: CategoryOfferId,
    category_id: CategoryId,
    offer_id: OfferId,
}

impl From<CategoryOfferRow> for CategoryOffer {
    fn from(row: CategoryOfferRow) -> Self {
        Self {
            id: row.id,
            category_id: row.category_id,
            offer_id: row.offer_id,
        }
    }
}

#[derive(FromRow)]
struct ProductOfferRow {
    id: ProductOfferId,
    product_id: ProductId,
    offer_id: OfferId,
}

impl From<ProductOfferRow> for ProductOffer {
    fn from(row: ProductOfferRow) -> Self {
        Self {
            id: row.id,
            product_id: row.product_id,
            offer_id: row.offer_id,
        }
    }
}

#[derive(FromRow)]
struct OrderRow {
    id: OrderId,
    user_id: UserId,
    status: OrderStatus,
    total: Decimal,
    placed_at: DateTime<Utc>,
}

impl From<OrderRow> for ShopOrder {
    fn from(row: OrderRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            status: row.status,
            total: row.total,
            placed_at: row.placed_at,
        }
    }
}

#[derive(FromRow)]
struct OrderLineRow {
    id: OrderLineId,
    order_id: OrderId,
    product_item_id: ProductItemId,
    qty: i32,
    unit_price: Decimal,
}

impl TryFrom<OrderLineRow> for OrderLine {
    type Error = StoreError;

    fn try_from(row: OrderLineRow) -> Result<Self, StoreError> {
        Ok(Self {
            id: row.id,
            order_id: row.order_id,
            product_item_id: row.product_item_id,
            qty: app_qty(row.qty)?,
            unit_price: row.unit_price,
        })
    }
}

#[derive(FromRow)]
struct WalletRow {
    id: WalletId,
    user_id: UserId,
    balance: Decimal,
}

impl From<WalletRow> for Wallet {
    fn from(row: WalletRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            balance: row.balance,
        }
    }
}

#[derive(FromRow)]
struct WalletTransactionRow {
    id: WalletTransactionId,
    wallet_id: WalletId,
    amount: Decimal,
    reason: String,
    created_at: DateTime<Utc>,
}

impl From<WalletTransactionRow> for WalletTransaction {
    fn from(row: WalletTransactionRow) -> Self {
        Self {
            id: row.id,
            wallet_id: row.wallet_id,
            amount: row.amount,
            reason: row.reason,
            created_at: row.created_at,
        }
    }
}

// ----------------------------------------------------------------------
// Store implementation
// ----------------------------------------------------------------------

#[async_trait]
impl Store for PgStore {
    type Tx = sqlx::Transaction<'static, Postgres>;

    async fn begin(&self) -> Result<Self::Tx, StoreError> {
        self.pool.begin().await.map_err(map_sqlx)
    }

    async fn commit(&self, tx: Self::Tx) -> Result<(), StoreError> {
        tx.commit().await.map_err(map_sqlx)
    }

    async fn rollback(&self, tx: Self::Tx) -> Result<(), StoreError> {
        tx.rollback().await.map_err(map_sqlx)
    }

    async fn find_cart_by_user(
        &self,
        tx: &mut Self::Tx,
        user_id: UserId,
    ) -> Result<Option<Cart>, StoreError> {
        let row: Option<CartRow> = sqlx::query_as(
            r"
            SELECT id, user_id, total_price, discount_amount, applied_coupon,
                   created_at, updated_at
            FROM carts
            WHERE user_id = $1
            FOR UPDATE
            ",
        )
        .bind(user_id)
        .fetch_optional(&mut **tx)
        .await
        .map_err(map_sqlx)?;
        Ok(row.map(Cart::from))
    }

    async fn create_cart(&self, tx: &mut Self::Tx, user_id: UserId) -> Result<Cart, StoreError> {
        let row: CartRow = sqlx::query_as(
            r"
            INSERT INTO carts (user_id)
            VALUES ($1)
            RETURNING id, user_id, total_price, discount_amount, applied_coupon,
                      created_at, updated_at
            ",
        )
        .bind(user_id)
        .fetch_one(&mut **tx)
        .await
        .map_err(map_sqlx)?;
        Ok(row.into())
    }

    async fn save_cart(&self, tx: &mut Self::Tx, cart: &Cart) -> Result<(), StoreError> {
        let result = sqlx::query(
            r"
            UPDATE carts
            SET total_price = $2, discount_amount = $3, applied_coupon = $4,
                updated_at = now()
            WHERE id = $1
            ",
        )
        .bind(cart.id)
        .bind(cart.total_price)
        .bind(cart.discount_amount)
        .bind(cart.applied_coupon)
        .execute(&mut **tx)
        .await
        .map_err(map_sqlx)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn list_cart_items(
        &self,
        tx: &mut Self::Tx,
        cart_id: CartId,
    ) -> Result<Vec<CartItem>, StoreError> {
        let rows: Vec<CartItemRow> = sqlx::query_as(
            r"
            SELECT id, cart_id, product_item_id, qty
            FROM cart_items
            WHERE cart_id = $1
            ORDER BY id
            ",
        )
        .bind(cart_id)
        .fetch_all(&mut **tx)
        .await
        .map_err(map_sqlx)?;
        rows.into_iter().map(CartItem::try_from).collect()
    }

    async fn find_cart_item(
        &self,
        tx: &mut Self::Tx,
        cart_id: CartId,
        product_item_id: ProductItemId,
    ) -> Result<Option<CartItem>, StoreError> {
        let row: Option<CartItemRow> = sqlx::query_as(
            r"
            SELECT id, cart_id, product_item_id, qty
            FROM cart_items
            WHERE cart_id = $1 AND product_item_id = $2
            ",
        )
        .bind(cart_id)
        .bind(product_item_id)
        .fetch_optional(&mut **tx)
        .await
        .map_err(map_sqlx)?;
        row.map(CartItem::try_from).transpose()
    }

    async fn insert_cart_item(
        &self,
        tx: &mut Self::Tx,
        cart_id: CartId,
        product_item_id: ProductItemId,
        qty: u32,
    ) -> Result<CartItem, StoreError> {
        let row: CartItemRow = sqlx::query_as(
            r"
            INSERT INTO cart_items (cart_id, product_item_id, qty)
            VALUES ($1, $2, $3)
            RETURNING id, cart_id, product_item_id, qty
            ",
        )
        .bind(cart_id)
        .bind(product_item_id)
        .bind(db_qty(qty)?)
        .fetch_one(&mut **tx)
        .await
        .map_err(map_sqlx)?;
        row.try_into()
    }

    async fn update_cart_item_qty(
        &self,
        tx: &mut Self::Tx,
        id: CartItemId,
        qty: u32,
    ) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE cart_items SET qty = $2 WHERE id = $1")
            .bind(id)
            .bind(db_qty(qty)?)
            .execute(&mut **tx)
            .await
            .map_err(map_sqlx)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn delete_cart_item(&self, tx: &mut Self::Tx, id: CartItemId) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM cart_items WHERE id = $1")
            .bind(id)
            .execute(&mut **tx)
            .await
            .map_err(map_sqlx)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn clear_cart_items(
        &self,
        tx: &mut Self::Tx,
        cart_id: CartId,
    ) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM cart_items WHERE cart_id = $1")
            .bind(cart_id)
            .execute(&mut **tx)
            .await
            .map_err(map_sqlx)?;
        Ok(())
    }

    async fn find_product(
        &self,
        tx: &mut Self::Tx,
        id: ProductId,
    ) -> Result<Option<Product>, StoreError> {
        let row: Option<ProductRow> = sqlx::query_as(
            r"
            SELECT id, category_id, name, price, discount_price
            FROM products
            WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(&mut **tx)
        .await
        .map_err(map_sqlx)?;
        Ok(row.map(Product::from))
    }

    async fn find_product_item(
        &self,
        tx: &mut Self::Tx,
        id: ProductItemId,
    ) -> Result<Option<ProductItem>, StoreError> {
        let row: Option<ProductItemRow> = sqlx::query_as(
            r"
            SELECT id, product_id, price, discount_price, qty_in_stock
            FROM product_items
            WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(&mut **tx)
        .await
        .map_err(map_sqlx)?;
        row.map(ProductItem::try_from).transpose()
    }

    async fn try_decrement_stock(
        &self,
        tx: &mut Self::Tx,
        id: ProductItemId,
        qty: u32,
    ) -> Result<bool, StoreError> {
        let qty = db_qty(qty)?;
        let result = sqlx::query(
            r"
            UPDATE product_items
            SET qty_in_stock = qty_in_stock - $2
            WHERE id = $1 AND qty_in_stock >= $2
            ",
        )
        .bind(id)
        .bind(qty)
        .execute(&mut **tx)
        .await
        .map_err(map_sqlx)?;
        if result.rows_affected() == 1 {
            return Ok(true);
        }

        // Distinguish "not enough stock" from "no such item".
        let exists: Option<(i32,)> = sqlx::query_as("SELECT 1 FROM product_items WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut **tx)
            .await
            .map_err(map_sqlx)?;
        if exists.is_none() {
            return Err(StoreError::NotFound);
        }
        Ok(false)
    }

    async fn increment_stock(
        &self,
        tx: &mut Self::Tx,
        id: ProductItemId,
        qty: u32,
    ) -> Result<(), StoreError> {
        let result =
            sqlx::query("UPDATE product_items SET qty_in_stock = qty_in_stock + $2 WHERE id = $1")
                .bind(id)
                .bind(db_qty(qty)?)
                .execute(&mut **tx)
                .await
                .map_err(map_sqlx)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn find_coupon(
        &self,
        tx: &mut Self::Tx,
        id: CouponId,
    ) -> Result<Option<Coupon>, StoreError> {
        let row: Option<CouponRow> = sqlx::query_as(
            r"
            SELECT id, name, code, discount_rate, min_cart_price, expires_at
            FROM coupons
            WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(&mut **tx)
        .await
        .map_err(map_sqlx)?;
        Ok(row.map(Coupon::from))
    }

    async fn find_coupon_by_code(
        &self,
        tx: &mut Self::Tx,
        code: &str,
    ) -> Result<Option<Coupon>, StoreError> {
        let row: Option<CouponRow> = sqlx::query_as(
            r"
            SELECT id, name, code, discount_rate, min_cart_price, expires_at
            FROM coupons
            WHERE code = $1
            ",
        )
        .bind(code)
        .fetch_optional(&mut **tx)
        .await
        .map_err(map_sqlx)?;
        Ok(row.map(Coupon::from))
    }

    async fn insert_coupon(
        &self,
        tx: &mut Self::Tx,
        coupon: NewCoupon,
    ) -> Result<Coupon, StoreError> {
        let row: CouponRow = sqlx::query_as(
            r"
            INSERT INTO coupons (name, code, discount_rate, min_cart_price, expires_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, name, code, discount_rate, min_cart_price, expires_at
            ",
        )
        .bind(&coupon.name)
        .bind(&coupon.code)
        .bind(coupon.discount_rate)
        .bind(coupon.min_cart_price)
        .bind(coupon.expires_at)
        .fetch_one(&mut **tx)
        .await
        .map_err(map_sqlx)?;
        Ok(row.into())
    }

    async fn coupon_in_use(&self, tx: &mut Self::Tx, id: CouponId) -> Result<bool, StoreError> {
        let (in_use,): (bool,) =
            sqlx::query_as("SELECT EXISTS(SELECT 1 FROM carts WHERE applied_coupon = $1)")
                .bind(id)
                .fetch_one(&mut **tx)
                .await
                .map_err(map_sqlx)?;
        Ok(in_use)
    }

    async fn find_offer(
        &self,
        tx: &mut Self::Tx,
        id: OfferId,
    ) -> Result<Option<Offer>, StoreError> {
        let row: Option<OfferRow> = sqlx::query_as(
            "SELECT id, name, discount_rate, ends_at FROM offers WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&mut **tx)
        .await
        .map_err(map_sqlx)?;
        Ok(row.map(Offer::from))
    }

    async fn insert_offer(&self, tx: &mut Self::Tx, offer: NewOffer) -> Result<Offer, StoreError> {
        let row: OfferRow = sqlx::query_as(
            r"
            INSERT INTO offers (name, discount_rate, ends_at)
            VALUES ($1, $2, $3)
            RETURNING id, name, discount_rate, ends_at
            ",
        )
        .bind(&offer.name)
        .bind(offer.discount_rate)
        .bind(offer.ends_at)
        .fetch_one(&mut **tx)
        .await
        .map_err(map_sqlx)?;
        Ok(row.into())
    }

    async fn find_category_offer(
        &self,
        tx: &mut Self::Tx,
        category_id: CategoryId,
    ) -> Result<Option<CategoryOffer>, StoreError> {
        let row: Option<CategoryOfferRow> = sqlx::query_as(
            "SELECT id, category_id, offer_id FROM category_offers WHERE category_id = $1",
        )
        .bind(category_id)
        .fetch_optional(&mut **tx)
        .await
        .map_err(map_sqlx)?;
        Ok(row.map(CategoryOffer::from))
    }

    async fn insert_category_offer(
        &self,
        tx: &mut Self::Tx,
        category_id: CategoryId,
        offer_id: OfferId,
    ) -> Result<CategoryOffer, StoreError> {
        let row: CategoryOfferRow = sqlx::query_as(
            r"
            INSERT INTO category_offers (category_id, offer_id)
            VALUES ($1, $2)
            RETURNING id, category_id, offer_id
            ",
        )
        .bind(category_id)
        .bind(offer_id)
        .fetch_one(&mut **tx)
        .await
        .map_err(map_sqlx)?;
        Ok(row.into())
    }

    async fn repoint_category_offer(
        &self,
        tx: &mut Self::Tx,
        id: CategoryOfferId,
        offer_id: OfferId,
    ) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE category_offers SET offer_id = $2 WHERE id = $1")
            .bind(id)
            .bind(offer_id)
            .execute(&mut **tx)
            .await
            .map_err(map_sqlx)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn delete_category_offer(
        &self,
        tx: &mut Self::Tx,
        id: CategoryOfferId,
    ) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM category_offers WHERE id = $1")
            .bind(id)
            .execute(&mut **tx)
            .await
            .map_err(map_sqlx)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn find_product_offer(
        &self,
        tx: &mut Self::Tx,
        product_id: ProductId,
    ) -> Result<Option<ProductOffer>, StoreError> {
        let row: Option<ProductOfferRow> = sqlx::query_as(
            "SELECT id, product_id, offer_id FROM product_offers WHERE product_id = $1",
        )
        .bind(product_id)
        .fetch_optional(&mut **tx)
        .await
        .map_err(map_sqlx)?;
        Ok(row.map(ProductOffer::from))
    }

    async fn insert_product_offer(
        &self,
        tx: &mut Self::Tx,
        product_id: ProductId,
        offer_id: OfferId,
    ) -> Result<ProductOffer, StoreError> {
        let row: ProductOfferRow = sqlx::query_as(
            r"
            INSERT INTO product_offers (product_id, offer_id)
            VALUES ($1, $2)
            RETURNING id, product_id, offer_id
            ",
        )
        .bind(product_id)
        .bind(offer_id)
        .fetch_one(&mut **tx)
        .await
        .map_err(map_sqlx)?;
        Ok(row.into())
    }

    async fn repoint_product_offer(
        &self,
        tx: &mut Self::Tx,
        id: ProductOfferId,
        offer_id: OfferId,
    ) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE product_offers SET offer_id = $2 WHERE id = $1")
            .bind(id)
            .bind(offer_id)
            .execute(&mut **tx)
            .await
            .map_err(map_sqlx)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn delete_product_offer(
        &self,
        tx: &mut Self::Tx,
        id: ProductOfferId,
    ) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM product_offers WHERE id = $1")
            .bind(id)
            .execute(&mut **tx)
            .await
            .map_err(map_sqlx)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn update_products_discount_for_category(
        &self,
        tx: &mut Self::Tx,
        category_id: CategoryId,
        rate: Decimal,
    ) -> Result<u64, StoreError> {
        let result = sqlx::query(
            r"
            UPDATE products
            SET discount_price = trunc(price * (100 - $2) / 100, 2)
            WHERE category_id = $1
            ",
        )
        .bind(category_id)
        .bind(rate)
        .execute(&mut **tx)
        .await
        .map_err(map_sqlx)?;
        Ok(result.rows_affected())
    }

    async fn update_product_items_discount_for_category(
        &self,
        tx: &mut Self::Tx,
        category_id: CategoryId,
        rate: Decimal,
    ) -> Result<u64, StoreError> {
        let result = sqlx::query(
            r"
            UPDATE product_items
            SET discount_price = trunc(price * (100 - $2) / 100, 2)
            WHERE product_id IN (SELECT id FROM products WHERE category_id = $1)
            ",
        )
        .bind(category_id)
        .bind(rate)
        .execute(&mut **tx)
        .await
        .map_err(map_sqlx)?;
        Ok(result.rows_affected())
    }

    async fn clear_products_discount_for_category(
        &self,
        tx: &mut Self::Tx,
        category_id: CategoryId,
    ) -> Result<u64, StoreError> {
        let result = sqlx::query("UPDATE products SET discount_price = 0 WHERE category_id = $1")
            .bind(category_id)
            .execute(&mut **tx)
            .await
            .map_err(map_sqlx)?;
        Ok(result.rows_affected())
    }

    async fn clear_product_items_discount_for_category(
        &self,
        tx: &mut Self::Tx,
        category_id: CategoryId,
    ) -> Result<u64, StoreError> {
        let result = sqlx::query(
            r"
            UPDATE product_items
            SET discount_price = 0
            WHERE product_id IN (SELECT id FROM products WHERE category_id = $1)
            ",
        )
        .bind(category_id)
        .execute(&mut **tx)
        .await
        .map_err(map_sqlx)?;
        Ok(result.rows_affected())
    }

    async fn update_product_discount(
        &self,
        tx: &mut Self::Tx,
        product_id: ProductId,
        rate: Decimal,
    ) -> Result<u64, StoreError> {
        let result = sqlx::query(
            r"
            UPDATE products
            SET discount_price = trunc(price * (100 - $2) / 100, 2)
            WHERE id = $1
            ",
        )
        .bind(product_id)
        .bind(rate)
        .execute(&mut **tx)
        .await
        .map_err(map_sqlx)?;
        Ok(result.rows_affected())
    }

    async fn update_product_items_discount_for_product(
        &self,
        tx: &mut Self::Tx,
        product_id: ProductId,
        rate: Decimal,
    ) -> Result<u64, StoreError> {
        let result = sqlx::query(
            r"
            UPDATE product_items
            SET discount_price = trunc(price * (100 - $2) / 100, 2)
            WHERE product_id = $1
            ",
        )
        .bind(product_id)
        .bind(rate)
        .execute(&mut **tx)
        .await
        .map_err(map_sqlx)?;
        Ok(result.rows_affected())
    }

    async fn clear_product_discount(
        &self,
        tx: &mut Self::Tx,
        product_id: ProductId,
    ) -> Result<u64, StoreError> {
        let result = sqlx::query("UPDATE products SET discount_price = 0 WHERE id = $1")
            .bind(product_id)
            .execute(&mut **tx)
            .await
            .map_err(map_sqlx)?;
        Ok(result.rows_affected())
    }

    async fn clear_product_items_discount_for_product(
        &self,
        tx: &mut Self::Tx,
        product_id: ProductId,
    ) -> Result<u64, StoreError> {
        let result = sqlx::query("UPDATE product_items SET discount_price = 0 WHERE product_id = $1")
            .bind(product_id)
            .execute(&mut **tx)
            .await
            .map_err(map_sqlx)?;
        Ok(result.rows_affected())
    }

    async fn insert_order(
        &self,
        tx: &mut Self::Tx,
        order: NewOrder,
    ) -> Result<ShopOrder, StoreError> {
        let row: OrderRow = sqlx::query_as(
            r"
            INSERT INTO orders (user_id, status, total)
            VALUES ($1, $2, $3)
            RETURNING id, user_id, status, total, placed_at
            ",
        )
        .bind(order.user_id)
        .bind(order.status)
        .bind(order.total)
        .fetch_one(&mut **tx)
        .await
        .map_err(map_sqlx)?;

        for line in order.lines {
            sqlx::query(
                r"
                INSERT INTO order_lines (order_id, product_item_id, qty, unit_price)
                VALUES ($1, $2, $3, $4)
                ",
            )
            .bind(row.id)
            .bind(line.product_item_id)
            .bind(db_qty(line.qty)?)
            .bind(line.unit_price)
            .execute(&mut **tx)
            .await
            .map_err(map_sqlx)?;
        }
        Ok(row.into())
    }

    async fn find_order(
        &self,
        tx: &mut Self::Tx,
        id: OrderId,
    ) -> Result<Option<ShopOrder>, StoreError> {
        let row: Option<OrderRow> = sqlx::query_as(
            "SELECT id, user_id, status, total, placed_at FROM orders WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut **tx)
        .await
        .map_err(map_sqlx)?;
        Ok(row.map(ShopOrder::from))
    }

    async fn list_order_lines(
        &self,
        tx: &mut Self::Tx,
        order_id: OrderId,
    ) -> Result<Vec<OrderLine>, StoreError> {
        let rows: Vec<OrderLineRow> = sqlx::query_as(
            r"
            SELECT id, order_id, product_item_id, qty, unit_price
            FROM order_lines
            WHERE order_id = $1
            ORDER BY id
            ",
        )
        .bind(order_id)
        .fetch_all(&mut **tx)
        .await
        .map_err(map_sqlx)?;
        rows.into_iter().map(OrderLine::try_from).collect()
    }

    async fn update_order_status(
        &self,
        tx: &mut Self::Tx,
        id: OrderId,
        status: OrderStatus,
    ) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE orders SET status = $2 WHERE id = $1")
            .bind(id)
            .bind(status)
            .execute(&mut **tx)
            .await
            .map_err(map_sqlx)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn find_wallet_by_user(
        &self,
        tx: &mut Self::Tx,
        user_id: UserId,
    ) -> Result<Option<Wallet>, StoreError> {
        let row: Option<WalletRow> = sqlx::query_as(
            "SELECT id, user_id, balance FROM wallets WHERE user_id = $1 FOR UPDATE",
        )
        .bind(user_id)
        .fetch_optional(&mut **tx)
        .await
        .map_err(map_sqlx)?;
        Ok(row.map(Wallet::from))
    }

    async fn find_wallet(
        &self,
        tx: &mut Self::Tx,
        id: WalletId,
    ) -> Result<Option<Wallet>, StoreError> {
        let row: Option<WalletRow> = sqlx::query_as(
            "SELECT id, user_id, balance FROM wallets WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut **tx)
        .await
        .map_err(map_sqlx)?;
        Ok(row.map(Wallet::from))
    }

    async fn create_wallet(
        &self,
        tx: &mut Self::Tx,
        user_id: UserId,
    ) -> Result<Wallet, StoreError> {
        let row: WalletRow = sqlx::query_as(
            r"
            INSERT INTO wallets (user_id)
            VALUES ($1)
            RETURNING id, user_id, balance
            ",
        )
        .bind(user_id)
        .fetch_one(&mut **tx)
        .await
        .map_err(map_sqlx)?;
        Ok(row.into())
    }

    async fn update_wallet_balance(
        &self,
        tx: &mut Self::Tx,
        id: WalletId,
        balance: Decimal,
    ) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE wallets SET balance = $2 WHERE id = $1")
            .bind(id)
            .bind(balance)
            .execute(&mut **tx)
            .await
            .map_err(map_sqlx)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn append_wallet_transaction(
        &self,
        tx: &mut Self::Tx,
        wallet_id: WalletId,
        amount: Decimal,
        reason: &str,
    ) -> Result<WalletTransaction, StoreError> {
        let row: WalletTransactionRow = sqlx::query_as(
            r"
            INSERT INTO wallet_transactions (wallet_id, amount, reason)
            VALUES ($1, $2, $3)
            RETURNING id, wallet_id, amount, reason, created_at
            ",
        )
        .bind(wallet_id)
        .bind(amount)
        .bind(reason)
        .fetch_one(&mut **tx)
        .await
        .map_err(map_sqlx)?;
        Ok(row.into())
    }

    async fn list_wallet_transactions(
        &self,
        tx: &mut Self::Tx,
        wallet_id: WalletId,
    ) -> Result<Vec<WalletTransaction>, StoreError> {
        let rows: Vec<WalletTransactionRow> = sqlx::query_as(
            r"
            SELECT id, wallet_id, amount, reason, created_at
            FROM wallet_transactions
            WHERE wallet_id = $1
            ORDER BY id
            ",
        )
        .bind(wallet_id)
        .fetch_all(&mut **tx)
        .await
        .map_err(map_sqlx)?;
        Ok(rows.into_iter().map(WalletTransaction::from).collect())
    }
}
