//! Inventory ledger: the only component allowed to mutate stock.

use std::sync::Arc;

use tracing::{debug, instrument};

use sugarcane_core::ProductItemId;

use crate::error::{EngineError, Result};
use crate::store::Store;

/// Owns product-item stock quantities.
///
/// `reserve` is conflict-serialized per product item: two concurrent
/// reservations that would jointly exceed available stock cannot both
/// succeed, because the store-level decrement is a compare-and-swap on
/// `qty_in_stock`.
#[derive(Debug, Clone)]
pub struct InventoryLedger<S> {
    store: Arc<S>,
}

impl<S: Store> InventoryLedger<S> {
    /// Create a ledger over the given store.
    pub const fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Reserve `qty` units of a product item, decrementing stock.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::OutOfStock`] if fewer than `qty` units are in
    /// stock, [`EngineError::NotFound`] if the product item does not exist.
    #[instrument(skip(self))]
    pub async fn reserve(&self, product_item_id: ProductItemId, qty: u32) -> Result<()> {
        let mut tx = self
            .store
            .begin()
            .await
            .map_err(EngineError::internal("inventory.reserve"))?;
        match self.reserve_tx(&mut tx, product_item_id, qty).await {
            Ok(()) => {
                self.store
                    .commit(tx)
                    .await
                    .map_err(EngineError::internal("inventory.reserve"))?;
                Ok(())
            }
            Err(err) => {
                let _ = self.store.rollback(tx).await;
                Err(err)
            }
        }
    }

    /// Release `qty` units back into stock (used on return and
    /// cancellation). Never validates an upper bound.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NotFound`] if the product item does not exist.
    #[instrument(skip(self))]
    pub async fn release(&self, product_item_id: ProductItemId, qty: u32) -> Result<()> {
        let mut tx = self
            .store
            .begin()
            .await
            .map_err(EngineError::internal("inventory.release"))?;
        match self.release_tx(&mut tx, product_item_id, qty).await {
            Ok(()) => {
                self.store
                    .commit(tx)
                    .await
                    .map_err(EngineError::internal("inventory.release"))?;
                Ok(())
            }
            Err(err) => {
                let _ = self.store.rollback(tx).await;
                Err(err)
            }
        }
    }

    /// [`reserve`](Self::reserve) inside a caller-supplied transaction.
    pub async fn reserve_tx(
        &self,
        tx: &mut S::Tx,
        product_item_id: ProductItemId,
        qty: u32,
    ) -> Result<()> {
        let reserved = self
            .store
            .try_decrement_stock(tx, product_item_id, qty)
            .await
            .map_err(EngineError::not_found_or_internal(
                "product item",
                "inventory.reserve",
            ))?;
        if !reserved {
            return Err(EngineError::OutOfStock);
        }
        debug!(%product_item_id, qty, "reserved stock");
        Ok(())
    }

    /// [`release`](Self::release) inside a caller-supplied transaction.
    pub async fn release_tx(
        &self,
        tx: &mut S::Tx,
        product_item_id: ProductItemId,
        qty: u32,
    ) -> Result<()> {
        self.store
            .increment_stock(tx, product_item_id, qty)
            .await
            .map_err(EngineError::not_found_or_internal(
                "product item",
                "inventory.release",
            ))?;
        debug!(%product_item_id, qty, "released stock");
        Ok(())
    }
}
