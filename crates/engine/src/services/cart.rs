//! Cart pricing engine: derives and persists cart totals.
//!
//! No other component writes `total_price`. Every cart-line mutation goes
//! through this service and ends in a recompute, so the invariant
//! `total_price == Σ(effective unit price × qty)` holds at every commit
//! point.

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{debug, instrument, warn};

use sugarcane_core::{ProductItemId, UserId};

use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::models::{Cart, CartView, ProductItem};
use crate::store::{Store, StoreError};

/// Computes and persists a cart's total price from its line items and any
/// applied coupon.
#[derive(Debug, Clone)]
pub struct CartPricingEngine<S> {
    store: Arc<S>,
    config: EngineConfig,
}

impl<S: Store> CartPricingEngine<S> {
    /// Create a pricing engine over the given store.
    pub const fn new(store: Arc<S>, config: EngineConfig) -> Self {
        Self { store, config }
    }

    /// A user's cart with its lines, created lazily on first access.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Internal`] on storage failure.
    #[instrument(skip(self))]
    pub async fn get_user_cart(&self, user_id: UserId) -> Result<CartView> {
        const OP: &str = "cart.get";
        let mut tx = self.store.begin().await.map_err(EngineError::internal(OP))?;
        let result = self.view_tx(&mut tx, user_id, OP).await;
        self.finish(tx, result).await
    }

    /// Add a product item to a user's cart with quantity 1, then recompute.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::OutOfStock`] if the item has no stock,
    /// [`EngineError::CartItemAlreadyExists`] if it is already in the cart,
    /// [`EngineError::NotFound`] if the product item does not exist.
    #[instrument(skip(self))]
    pub async fn add_item(&self, user_id: UserId, product_item_id: ProductItemId) -> Result<CartView> {
        const OP: &str = "cart.add_item";
        let mut tx = self.store.begin().await.map_err(EngineError::internal(OP))?;
        let result = self.add_item_tx(&mut tx, user_id, product_item_id).await;
        self.finish(tx, result).await
    }

    /// Set the quantity of a cart line, then recompute.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidQuantity`] unless
    /// `1 <= qty <= min(stock, max_qty_per_item)`,
    /// [`EngineError::CartItemNotExists`] if the line is absent.
    #[instrument(skip(self))]
    pub async fn update_qty(
        &self,
        user_id: UserId,
        product_item_id: ProductItemId,
        qty: u32,
    ) -> Result<CartView> {
        const OP: &str = "cart.update_qty";
        let mut tx = self.store.begin().await.map_err(EngineError::internal(OP))?;
        let result = self.update_qty_tx(&mut tx, user_id, product_item_id, qty).await;
        self.finish(tx, result).await
    }

    /// Remove a cart line, then recompute. Removing the last line keeps the
    /// cart row but resets its coupon and discount.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::CartItemNotExists`] if the line is absent.
    #[instrument(skip(self))]
    pub async fn remove_item(
        &self,
        user_id: UserId,
        product_item_id: ProductItemId,
    ) -> Result<CartView> {
        const OP: &str = "cart.remove_item";
        let mut tx = self.store.begin().await.map_err(EngineError::internal(OP))?;
        let result = self.remove_item_tx(&mut tx, user_id, product_item_id).await;
        self.finish(tx, result).await
    }

    // ------------------------------------------------------------------
    // Transaction-scoped internals
    // ------------------------------------------------------------------

    /// Find or lazily create the user's cart.
    pub async fn get_or_create_cart_tx(&self, tx: &mut S::Tx, user_id: UserId) -> Result<Cart> {
        const OP: &str = "cart.get_or_create";
        if let Some(cart) = self
            .store
            .find_cart_by_user(tx, user_id)
            .await
            .map_err(EngineError::internal(OP))?
        {
            return Ok(cart);
        }
        let cart = self
            .store
            .create_cart(tx, user_id)
            .await
            .map_err(EngineError::internal(OP))?;
        debug!(%user_id, cart_id = %cart.id, "created cart");
        Ok(cart)
    }

    /// Re-derive `total_price` (and re-validate any applied coupon) from
    /// the cart's current lines, and persist the result.
    pub async fn recompute_tx(&self, tx: &mut S::Tx, cart: &mut Cart) -> Result<()> {
        const OP: &str = "cart.recompute";
        let items = self
            .store
            .list_cart_items(tx, cart.id)
            .await
            .map_err(EngineError::internal(OP))?;

        let mut total = Decimal::ZERO;
        for item in &items {
            let product_item = self.product_item_tx(tx, item.product_item_id, OP).await?;
            total += product_item.effective_price() * Decimal::from(item.qty);
        }
        cart.total_price = total;

        // A coupon applied earlier only survives the mutation if it still
        // validates against the new total; otherwise it is cleared along
        // with its discount.
        if let Some(coupon_id) = cart.applied_coupon {
            let coupon = self
                .store
                .find_coupon(tx, coupon_id)
                .await
                .map_err(EngineError::internal(OP))?;
            match coupon {
                Some(coupon)
                    if !coupon.is_expired(Utc::now()) && total >= coupon.min_cart_price =>
                {
                    cart.discount_amount = coupon.discount_on(total);
                }
                _ => {
                    warn!(cart_id = %cart.id, %coupon_id, "applied coupon no longer valid, clearing");
                    cart.clear_coupon();
                }
            }
        }

        self.store
            .save_cart(tx, cart)
            .await
            .map_err(EngineError::internal(OP))?;
        debug!(cart_id = %cart.id, total = %cart.total_price, discount = %cart.discount_amount, "recomputed cart");
        Ok(())
    }

    async fn add_item_tx(
        &self,
        tx: &mut S::Tx,
        user_id: UserId,
        product_item_id: ProductItemId,
    ) -> Result<CartView> {
        const OP: &str = "cart.add_item";
        let mut cart = self.get_or_create_cart_tx(tx, user_id).await?;

        let product_item = self
            .store
            .find_product_item(tx, product_item_id)
            .await
            .map_err(EngineError::internal(OP))?
            .ok_or(EngineError::NotFound("product item"))?;
        if product_item.qty_in_stock == 0 {
            return Err(EngineError::OutOfStock);
        }

        let existing = self
            .store
            .find_cart_item(tx, cart.id, product_item_id)
            .await
            .map_err(EngineError::internal(OP))?;
        if existing.is_some() {
            return Err(EngineError::CartItemAlreadyExists);
        }

        self.store
            .insert_cart_item(tx, cart.id, product_item_id, 1)
            .await
            .map_err(|e| match e {
                StoreError::Conflict(_) => EngineError::CartItemAlreadyExists,
                e => EngineError::Internal { op: OP, source: e },
            })?;

        self.recompute_tx(tx, &mut cart).await?;
        self.assemble_view_tx(tx, cart, OP).await
    }

    async fn update_qty_tx(
        &self,
        tx: &mut S::Tx,
        user_id: UserId,
        product_item_id: ProductItemId,
        qty: u32,
    ) -> Result<CartView> {
        const OP: &str = "cart.update_qty";
        if qty < 1 {
            return Err(EngineError::InvalidQuantity {
                qty,
                max: self.config.max_qty_per_item,
            });
        }

        let mut cart = self
            .store
            .find_cart_by_user(tx, user_id)
            .await
            .map_err(EngineError::internal(OP))?
            .ok_or(EngineError::CartItemNotExists)?;

        let product_item = self
            .store
            .find_product_item(tx, product_item_id)
            .await
            .map_err(EngineError::internal(OP))?
            .ok_or(EngineError::NotFound("product item"))?;
        let max = product_item.qty_in_stock.min(self.config.max_qty_per_item);
        if qty > max {
            return Err(EngineError::InvalidQuantity { qty, max });
        }

        let line = self
            .store
            .find_cart_item(tx, cart.id, product_item_id)
            .await
            .map_err(EngineError::internal(OP))?
            .ok_or(EngineError::CartItemNotExists)?;
        self.store
            .update_cart_item_qty(tx, line.id, qty)
            .await
            .map_err(EngineError::internal(OP))?;

        self.recompute_tx(tx, &mut cart).await?;
        self.assemble_view_tx(tx, cart, OP).await
    }

    async fn remove_item_tx(
        &self,
        tx: &mut S::Tx,
        user_id: UserId,
        product_item_id: ProductItemId,
    ) -> Result<CartView> {
        const OP: &str = "cart.remove_item";
        let mut cart = self
            .store
            .find_cart_by_user(tx, user_id)
            .await
            .map_err(EngineError::internal(OP))?
            .ok_or(EngineError::CartItemNotExists)?;

        let line = self
            .store
            .find_cart_item(tx, cart.id, product_item_id)
            .await
            .map_err(EngineError::internal(OP))?
            .ok_or(EngineError::CartItemNotExists)?;
        self.store
            .delete_cart_item(tx, line.id)
            .await
            .map_err(EngineError::internal(OP))?;

        let remaining = self
            .store
            .list_cart_items(tx, cart.id)
            .await
            .map_err(EngineError::internal(OP))?;
        if remaining.is_empty() {
            cart.clear_coupon();
        }

        self.recompute_tx(tx, &mut cart).await?;
        self.assemble_view_tx(tx, cart, OP).await
    }

    async fn view_tx(&self, tx: &mut S::Tx, user_id: UserId, op: &'static str) -> Result<CartView> {
        let cart = self.get_or_create_cart_tx(tx, user_id).await?;
        self.assemble_view_tx(tx, cart, op).await
    }

    async fn assemble_view_tx(
        &self,
        tx: &mut S::Tx,
        cart: Cart,
        op: &'static str,
    ) -> Result<CartView> {
        let items = self
            .store
            .list_cart_items(tx, cart.id)
            .await
            .map_err(EngineError::internal(op))?;
        Ok(CartView { cart, items })
    }

    /// A cart line referencing a missing product item is corrupted state,
    /// not a caller error.
    async fn product_item_tx(
        &self,
        tx: &mut S::Tx,
        product_item_id: ProductItemId,
        op: &'static str,
    ) -> Result<ProductItem> {
        self.store
            .find_product_item(tx, product_item_id)
            .await
            .map_err(EngineError::internal(op))?
            .ok_or_else(|| EngineError::Internal {
                op,
                source: StoreError::DataCorruption(format!(
                    "cart references missing product item {product_item_id}"
                )),
            })
    }

    async fn finish(&self, tx: S::Tx, result: Result<CartView>) -> Result<CartView> {
        match result {
            Ok(view) => {
                self.store
                    .commit(tx)
                    .await
                    .map_err(EngineError::internal("cart.commit"))?;
                Ok(view)
            }
            Err(err) => {
                let _ = self.store.rollback(tx).await;
                Err(err)
            }
        }
    }
}
