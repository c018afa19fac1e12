//! Order domain types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use sugarcane_core::{OrderId, OrderLineId, OrderStatus, ProductItemId, UserId};

/// A placed order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShopOrder {
    /// Unique order ID.
    pub id: OrderId,
    /// User who placed the order.
    pub user_id: UserId,
    /// Current lifecycle status.
    pub status: OrderStatus,
    /// Amount payable at placement (cart total minus discount).
    pub total: Decimal,
    /// When the order was placed.
    pub placed_at: DateTime<Utc>,
}

/// One line of an order, snapshotting the unit price at order time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderLine {
    /// Unique order line ID.
    pub id: OrderLineId,
    /// Order this line belongs to.
    pub order_id: OrderId,
    /// The product item ordered.
    pub product_item_id: ProductItemId,
    /// Quantity ordered.
    pub qty: u32,
    /// Effective unit price at the moment of placement.
    pub unit_price: Decimal,
}

/// Parameters for creating a new order with its lines in one write.
#[derive(Debug, Clone)]
pub struct NewOrder {
    /// User placing the order.
    pub user_id: UserId,
    /// Initial status.
    pub status: OrderStatus,
    /// Amount payable.
    pub total: Decimal,
    /// Lines, in cart order.
    pub lines: Vec<NewOrderLine>,
}

/// One line of a [`NewOrder`].
#[derive(Debug, Clone)]
pub struct NewOrderLine {
    /// The product item ordered.
    pub product_item_id: ProductItemId,
    /// Quantity ordered.
    pub qty: u32,
    /// Effective unit price at placement.
    pub unit_price: Decimal,
}
