//! Cart domain types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use sugarcane_core::{CartId, CartItemId, CouponId, ProductItemId, UserId};

/// A user's in-progress collection of product items.
///
/// `total_price` is derived state owned by the cart pricing engine: it always
/// equals the sum of each line's effective unit price times quantity.
/// `discount_amount` is tracked separately and never folded into
/// `total_price`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cart {
    /// Unique cart ID.
    pub id: CartId,
    /// Owning user.
    pub user_id: UserId,
    /// Sum of effective unit price x quantity over all lines.
    pub total_price: Decimal,
    /// Coupon discount currently applied to the cart.
    pub discount_amount: Decimal,
    /// The applied coupon, if any.
    pub applied_coupon: Option<CouponId>,
    /// When the cart was created.
    pub created_at: DateTime<Utc>,
    /// When the cart was last recomputed.
    pub updated_at: DateTime<Utc>,
}

impl Cart {
    /// The amount the user would actually pay: `total_price` minus the
    /// discount, floored at zero.
    #[must_use]
    pub fn payable_total(&self) -> Decimal {
        let payable = self.total_price - self.discount_amount;
        if payable < Decimal::ZERO {
            Decimal::ZERO
        } else {
            payable
        }
    }

    /// Drop any applied coupon and its discount.
    pub fn clear_coupon(&mut self) {
        self.applied_coupon = None;
        self.discount_amount = Decimal::ZERO;
    }
}

/// One line of a cart.
///
/// Unique per (cart, product item); quantity is at least 1.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartItem {
    /// Unique cart item ID.
    pub id: CartItemId,
    /// Cart this line belongs to.
    pub cart_id: CartId,
    /// The product item in the line.
    pub product_item_id: ProductItemId,
    /// Quantity, >= 1.
    pub qty: u32,
}

/// A cart together with its lines, as returned to callers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartView {
    /// The cart itself.
    pub cart: Cart,
    /// Lines in insertion order.
    pub items: Vec<CartItem>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn cart(total: i64, discount: i64) -> Cart {
        Cart {
            id: CartId::new(1),
            user_id: UserId::new(1),
            total_price: Decimal::from(total),
            discount_amount: Decimal::from(discount),
            applied_coupon: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn payable_total_subtracts_discount() {
        assert_eq!(cart(1000, 100).payable_total(), Decimal::from(900));
    }

    #[test]
    fn payable_total_never_negative() {
        assert_eq!(cart(50, 100).payable_total(), Decimal::ZERO);
    }
}
