//! Coupon domain types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use sugarcane_core::CouponId;

/// A one-time code applying a percentage discount to a cart, subject to
/// minimum spend and expiry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Coupon {
    /// Unique coupon ID.
    pub id: CouponId,
    /// Human-readable name.
    pub name: String,
    /// Opaque unique code, generated at creation.
    pub code: String,
    /// Discount rate as a percentage (e.g. 10 for 10%).
    pub discount_rate: Decimal,
    /// Minimum cart total required to apply the coupon.
    pub min_cart_price: Decimal,
    /// Expiry timestamp.
    pub expires_at: DateTime<Utc>,
}

impl Coupon {
    /// Whether the coupon has expired as of `now`.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// Discount granted on a cart total: `floor(total * rate / 100)`.
    #[must_use]
    pub fn discount_on(&self, total: Decimal) -> Decimal {
        (total * self.discount_rate / Decimal::ONE_HUNDRED).floor()
    }
}

/// Parameters for creating a new coupon. The code is generated by the
/// coupon service, not supplied by the caller.
#[derive(Debug, Clone)]
pub struct NewCoupon {
    /// Human-readable name.
    pub name: String,
    /// Generated opaque code.
    pub code: String,
    /// Discount rate as a percentage.
    pub discount_rate: Decimal,
    /// Minimum cart total required.
    pub min_cart_price: Decimal,
    /// Expiry timestamp.
    pub expires_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn coupon(rate: i64) -> Coupon {
        Coupon {
            id: CouponId::new(1),
            name: "test".to_owned(),
            code: "ABCDEFGHIJ".to_owned(),
            discount_rate: Decimal::from(rate),
            min_cart_price: Decimal::from(500),
            expires_at: Utc::now() + Duration::days(1),
        }
    }

    #[test]
    fn discount_is_floored() {
        // 10% of 1005 is 100.5, floored to 100.
        assert_eq!(coupon(10).discount_on(Decimal::from(1005)), Decimal::from(100));
    }

    #[test]
    fn ten_percent_of_1000_is_100() {
        assert_eq!(coupon(10).discount_on(Decimal::from(1000)), Decimal::from(100));
    }

    #[test]
    fn expiry_is_strict() {
        let c = coupon(10);
        assert!(!c.is_expired(c.expires_at));
        assert!(c.is_expired(c.expires_at + Duration::seconds(1)));
    }
}
