//! Catalog domain types: products and their purchasable variants.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use sugarcane_core::{CategoryId, ProductId, ProductItemId};

/// A product in the catalog.
///
/// `discount_price` is derived state owned by the offer cascade engine; it
/// is zero when no offer is attached to the product or its category.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    /// Unique product ID.
    pub id: ProductId,
    /// Category the product belongs to.
    pub category_id: CategoryId,
    /// Display name.
    pub name: String,
    /// Undiscounted list price.
    pub price: Decimal,
    /// Offer-derived discounted price; zero when no offer applies.
    pub discount_price: Decimal,
}

/// A specific purchasable variant of a product (e.g. a size/colour
/// combination) with its own stock and price.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductItem {
    /// Unique product item ID.
    pub id: ProductItemId,
    /// Parent product.
    pub product_id: ProductId,
    /// Undiscounted unit price.
    pub price: Decimal,
    /// Offer-derived discounted price; zero when no offer applies.
    pub discount_price: Decimal,
    /// Units in stock, never negative.
    pub qty_in_stock: u32,
}

impl ProductItem {
    /// The unit price a cart line pays: the discounted price when an offer
    /// applies, the list price otherwise.
    #[must_use]
    pub fn effective_price(&self) -> Decimal {
        if self.discount_price > Decimal::ZERO {
            self.discount_price
        } else {
            self.price
        }
    }
}
