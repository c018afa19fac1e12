//! Promotional offer domain types.

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use sugarcane_core::{CategoryId, CategoryOfferId, OfferId, ProductId, ProductOfferId};

/// A time-bounded promotional discount attachable to a category or a
/// product.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Offer {
    /// Unique offer ID.
    pub id: OfferId,
    /// Unique human-readable name.
    pub name: String,
    /// Discount rate as a percentage (e.g. 20 for 20%).
    pub discount_rate: Decimal,
    /// End of the offer's validity window.
    pub ends_at: DateTime<Utc>,
}

impl Offer {
    /// Whether the offer's end date has passed as of `now`.
    #[must_use]
    pub fn has_ended(&self, now: DateTime<Utc>) -> bool {
        now > self.ends_at
    }
}

/// Parameters for creating a new offer.
#[derive(Debug, Clone)]
pub struct NewOffer {
    /// Unique human-readable name.
    pub name: String,
    /// Discount rate as a percentage.
    pub discount_rate: Decimal,
    /// End of the offer's validity window.
    pub ends_at: DateTime<Utc>,
}

/// Attachment of an offer to a category. At most one active attachment per
/// category.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryOffer {
    /// Unique attachment ID.
    pub id: CategoryOfferId,
    /// The category the offer applies to.
    pub category_id: CategoryId,
    /// The attached offer.
    pub offer_id: OfferId,
}

/// Attachment of an offer to a single product. At most one active
/// attachment per product.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductOffer {
    /// Unique attachment ID.
    pub id: ProductOfferId,
    /// The product the offer applies to.
    pub product_id: ProductId,
    /// The attached offer.
    pub offer_id: OfferId,
}

/// Discounted unit price under a percentage offer:
/// `price * (100 - rate) / 100`, truncated to 2 decimal places.
///
/// Always derived from the undiscounted `price`, never from a previous
/// discount price, so repeated recomputation cannot drift.
#[must_use]
pub fn discounted_unit_price(price: Decimal, rate: Decimal) -> Decimal {
    (price * (Decimal::ONE_HUNDRED - rate) / Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(2, RoundingStrategy::ToZero)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn twenty_percent_off_1000_is_800() {
        assert_eq!(
            discounted_unit_price(Decimal::from(1000), Decimal::from(20)),
            Decimal::from(800)
        );
    }

    #[test]
    fn discount_truncates_to_cents() {
        // 15% off 9.99 = 8.4915 -> 8.49
        assert_eq!(
            discounted_unit_price(Decimal::new(999, 2), Decimal::from(15)),
            Decimal::new(849, 2)
        );
    }

    #[test]
    fn recomputation_is_idempotent() {
        let price = Decimal::new(123_456, 2);
        let rate = Decimal::from(30);
        let once = discounted_unit_price(price, rate);
        let again = discounted_unit_price(price, rate);
        assert_eq!(once, again);
    }
}
