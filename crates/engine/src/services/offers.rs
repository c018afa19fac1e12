//! Offer cascade engine: attaches offers to categories and products and
//! materializes the resulting discount prices into the catalog.
//!
//! The cascade always runs in two phases inside one transaction: products
//! first, then product items. Discount prices are derived from the
//! undiscounted `price` column, so attaching, re-pointing and detaching in
//! any sequence cannot compound discounts.

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{debug, instrument};

use sugarcane_core::{CategoryId, OfferId, ProductId};

use crate::error::{EngineError, Result};
use crate::models::{CategoryOffer, NewOffer, Offer, ProductOffer};
use crate::store::{Store, StoreError};

/// Manages promotional offers and their attachments.
#[derive(Debug, Clone)]
pub struct OfferCascadeEngine<S> {
    store: Arc<S>,
}

impl<S: Store> OfferCascadeEngine<S> {
    /// Create a cascade engine over the given store.
    pub const fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Create an offer.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidDiscountRate`] unless the rate is
    /// strictly between 0 and 100, [`EngineError::Internal`] on a duplicate
    /// name or storage failure.
    #[instrument(skip(self, offer), fields(name = %offer.name))]
    pub async fn create_offer(&self, offer: NewOffer) -> Result<Offer> {
        const OP: &str = "offer.create";
        if offer.discount_rate <= Decimal::ZERO || offer.discount_rate >= Decimal::ONE_HUNDRED {
            return Err(EngineError::InvalidDiscountRate {
                rate: offer.discount_rate,
            });
        }
        let mut tx = self.store.begin().await.map_err(EngineError::internal(OP))?;
        match self.store.insert_offer(&mut tx, offer).await {
            Ok(offer) => {
                self.store
                    .commit(tx)
                    .await
                    .map_err(EngineError::internal(OP))?;
                debug!(offer_id = %offer.id, "created offer");
                Ok(offer)
            }
            Err(err) => {
                let _ = self.store.rollback(tx).await;
                Err(EngineError::internal(OP)(err))
            }
        }
    }

    /// Attach an offer to a category and cascade its discount over the
    /// category's products and their items.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NotFound`] for an unknown offer,
    /// [`EngineError::OfferAlreadyEnded`] past the offer's end date, and
    /// [`EngineError::CategoryOfferAlreadyExists`] if the category already
    /// has an attachment.
    #[instrument(skip(self))]
    pub async fn attach_category_offer(
        &self,
        category_id: CategoryId,
        offer_id: OfferId,
    ) -> Result<CategoryOffer> {
        const OP: &str = "offer.attach_category";
        let mut tx = self.store.begin().await.map_err(EngineError::internal(OP))?;
        let result = self
            .attach_category_offer_tx(&mut tx, category_id, offer_id)
            .await;
        self.finish(tx, result, OP).await
    }

    /// Re-point a category's existing attachment to a different offer and
    /// re-cascade at the new rate.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NotFound`] if the category has no attachment
    /// or the new offer does not exist, [`EngineError::OfferAlreadyEnded`]
    /// if the new offer has ended.
    #[instrument(skip(self))]
    pub async fn change_category_offer(
        &self,
        category_id: CategoryId,
        offer_id: OfferId,
    ) -> Result<()> {
        const OP: &str = "offer.change_category";
        let mut tx = self.store.begin().await.map_err(EngineError::internal(OP))?;
        let result = self
            .change_category_offer_tx(&mut tx, category_id, offer_id)
            .await;
        self.finish(tx, result, OP).await
    }

    /// Detach a category's offer and zero the discounts it cascaded.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NotFound`] if the category has no attachment.
    #[instrument(skip(self))]
    pub async fn detach_category_offer(&self, category_id: CategoryId) -> Result<()> {
        const OP: &str = "offer.detach_category";
        let mut tx = self.store.begin().await.map_err(EngineError::internal(OP))?;
        let result = self.detach_category_offer_tx(&mut tx, category_id).await;
        self.finish(tx, result, OP).await
    }

    /// Attach an offer to a single product and cascade over the product and
    /// its items.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NotFound`] for an unknown offer or product,
    /// [`EngineError::OfferAlreadyEnded`] past the offer's end date, and
    /// [`EngineError::ProductOfferAlreadyExists`] if the product already has
    /// an attachment.
    #[instrument(skip(self))]
    pub async fn attach_product_offer(
        &self,
        product_id: ProductId,
        offer_id: OfferId,
    ) -> Result<ProductOffer> {
        const OP: &str = "offer.attach_product";
        let mut tx = self.store.begin().await.map_err(EngineError::internal(OP))?;
        let result = self
            .attach_product_offer_tx(&mut tx, product_id, offer_id)
            .await;
        self.finish(tx, result, OP).await
    }

    /// Re-point a product's existing attachment to a different offer and
    /// re-cascade at the new rate.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NotFound`] if the product has no attachment or
    /// the new offer does not exist, [`EngineError::OfferAlreadyEnded`] if
    /// the new offer has ended.
    #[instrument(skip(self))]
    pub async fn change_product_offer(
        &self,
        product_id: ProductId,
        offer_id: OfferId,
    ) -> Result<()> {
        const OP: &str = "offer.change_product";
        let mut tx = self.store.begin().await.map_err(EngineError::internal(OP))?;
        let result = self
            .change_product_offer_tx(&mut tx, product_id, offer_id)
            .await;
        self.finish(tx, result, OP).await
    }

    /// Detach a product's offer and zero the discounts it cascaded.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NotFound`] if the product has no attachment.
    #[instrument(skip(self))]
    pub async fn detach_product_offer(&self, product_id: ProductId) -> Result<()> {
        const OP: &str = "offer.detach_product";
        let mut tx = self.store.begin().await.map_err(EngineError::internal(OP))?;
        let result = self.detach_product_offer_tx(&mut tx, product_id).await;
        self.finish(tx, result, OP).await
    }

    // ------------------------------------------------------------------
    // Transaction-scoped internals
    // ------------------------------------------------------------------

    async fn attach_category_offer_tx(
        &self,
        tx: &mut S::Tx,
        category_id: CategoryId,
        offer_id: OfferId,
    ) -> Result<CategoryOffer> {
        const OP: &str = "offer.attach_category";
        let offer = self.live_offer_tx(tx, offer_id, OP).await?;

        let existing = self
            .store
            .find_category_offer(tx, category_id)
            .await
            .map_err(EngineError::internal(OP))?;
        if existing.is_some() {
            return Err(EngineError::CategoryOfferAlreadyExists);
        }

        let attachment = self
            .store
            .insert_category_offer(tx, category_id, offer_id)
            .await
            .map_err(|e| match e {
                StoreError::Conflict(_) => EngineError::CategoryOfferAlreadyExists,
                e => EngineError::Internal { op: OP, source: e },
            })?;

        self.cascade_category_tx(tx, category_id, &offer, OP).await?;
        Ok(attachment)
    }

    async fn change_category_offer_tx(
        &self,
        tx: &mut S::Tx,
        category_id: CategoryId,
        offer_id: OfferId,
    ) -> Result<()> {
        const OP: &str = "offer.change_category";
        let attachment = self
            .store
            .find_category_offer(tx, category_id)
            .await
            .map_err(EngineError::internal(OP))?
            .ok_or(EngineError::NotFound("category offer"))?;
        let offer = self.live_offer_tx(tx, offer_id, OP).await?;

        self.store
            .repoint_category_offer(tx, attachment.id, offer_id)
            .await
            .map_err(EngineError::internal(OP))?;
        self.cascade_category_tx(tx, category_id, &offer, OP).await
    }

    async fn detach_category_offer_tx(
        &self,
        tx: &mut S::Tx,
        category_id: CategoryId,
    ) -> Result<()> {
        const OP: &str = "offer.detach_category";
        let attachment = self
            .store
            .find_category_offer(tx, category_id)
            .await
            .map_err(EngineError::internal(OP))?
            .ok_or(EngineError::NotFound("category offer"))?;

        let products = self
            .store
            .clear_products_discount_for_category(tx, category_id)
            .await
            .map_err(EngineError::internal(OP))?;
        let items = self
            .store
            .clear_product_items_discount_for_category(tx, category_id)
            .await
            .map_err(EngineError::internal(OP))?;
        self.store
            .delete_category_offer(tx, attachment.id)
            .await
            .map_err(EngineError::internal(OP))?;
        debug!(%category_id, products, items, "detached category offer");
        Ok(())
    }

    async fn attach_product_offer_tx(
        &self,
        tx: &mut S::Tx,
        product_id: ProductId,
        offer_id: OfferId,
    ) -> Result<ProductOffer> {
        const OP: &str = "offer.attach_product";
        let offer = self.live_offer_tx(tx, offer_id, OP).await?;

        self.store
            .find_product(tx, product_id)
            .await
            .map_err(EngineError::internal(OP))?
            .ok_or(EngineError::NotFound("product"))?;

        let existing = self
            .store
            .find_product_offer(tx, product_id)
            .await
            .map_err(EngineError::internal(OP))?;
        if existing.is_some() {
            return Err(EngineError::ProductOfferAlreadyExists);
        }

        let attachment = self
            .store
            .insert_product_offer(tx, product_id, offer_id)
            .await
            .map_err(|e| match e {
                StoreError::Conflict(_) => EngineError::ProductOfferAlreadyExists,
                e => EngineError::Internal { op: OP, source: e },
            })?;

        self.cascade_product_tx(tx, product_id, &offer, OP).await?;
        Ok(attachment)
    }

    async fn change_product_offer_tx(
        &self,
        tx: &mut S::Tx,
        product_id: ProductId,
        offer_id: OfferId,
    ) -> Result<()> {
        const OP: &str = "offer.change_product";
        let attachment = self
            .store
            .find_product_offer(tx, product_id)
            .await
            .map_err(EngineError::internal(OP))?
            .ok_or(EngineError::NotFound("product offer"))?;
        let offer = self.live_offer_tx(tx, offer_id, OP).await?;

        self.store
            .repoint_product_offer(tx, attachment.id, offer_id)
            .await
            .map_err(EngineError::internal(OP))?;
        self.cascade_product_tx(tx, product_id, &offer, OP).await
    }

    async fn detach_product_offer_tx(&self, tx: &mut S::Tx, product_id: ProductId) -> Result<()> {
        const OP: &str = "offer.detach_product";
        let attachment = self
            .store
            .find_product_offer(tx, product_id)
            .await
            .map_err(EngineError::internal(OP))?
            .ok_or(EngineError::NotFound("product offer"))?;

        let products = self
            .store
            .clear_product_discount(tx, product_id)
            .await
            .map_err(EngineError::internal(OP))?;
        let items = self
            .store
            .clear_product_items_discount_for_product(tx, product_id)
            .await
            .map_err(EngineError::internal(OP))?;
        self.store
            .delete_product_offer(tx, attachment.id)
            .await
            .map_err(EngineError::internal(OP))?;
        debug!(%product_id, products, items, "detached product offer");
        Ok(())
    }

    /// Fetch an offer, rejecting missing or ended ones.
    async fn live_offer_tx(
        &self,
        tx: &mut S::Tx,
        offer_id: OfferId,
        op: &'static str,
    ) -> Result<Offer> {
        let offer = self
            .store
            .find_offer(tx, offer_id)
            .await
            .map_err(EngineError::internal(op))?
            .ok_or(EngineError::NotFound("offer"))?;
        if offer.has_ended(Utc::now()) {
            return Err(EngineError::OfferAlreadyEnded);
        }
        Ok(offer)
    }

    /// Phase 1 (products) then phase 2 (product items) for a category.
    async fn cascade_category_tx(
        &self,
        tx: &mut S::Tx,
        category_id: CategoryId,
        offer: &Offer,
        op: &'static str,
    ) -> Result<()> {
        let products = self
            .store
            .update_products_discount_for_category(tx, category_id, offer.discount_rate)
            .await
            .map_err(EngineError::internal(op))?;
        let items = self
            .store
            .update_product_items_discount_for_category(tx, category_id, offer.discount_rate)
            .await
            .map_err(EngineError::internal(op))?;
        debug!(%category_id, offer_id = %offer.id, products, items, "cascaded category offer");
        Ok(())
    }

    /// Phase 1 (the product) then phase 2 (its items) for one product.
    async fn cascade_product_tx(
        &self,
        tx: &mut S::Tx,
        product_id: ProductId,
        offer: &Offer,
        op: &'static str,
    ) -> Result<()> {
        let products = self
            .store
            .update_product_discount(tx, product_id, offer.discount_rate)
            .await
            .map_err(EngineError::internal(op))?;
        let items = self
            .store
            .update_product_items_discount_for_product(tx, product_id, offer.discount_rate)
            .await
            .map_err(EngineError::internal(op))?;
        debug!(%product_id, offer_id = %offer.id, products, items, "cascaded product offer");
        Ok(())
    }

    async fn finish<T>(&self, tx: S::Tx, result: Result<T>, op: &'static str) -> Result<T> {
        match result {
            Ok(value) => {
                self.store
                    .commit(tx)
                    .await
                    .map_err(EngineError::internal(op))?;
                Ok(value)
            }
            Err(err) => {
                let _ = self.store.rollback(tx).await;
                Err(err)
            }
        }
    }
}
