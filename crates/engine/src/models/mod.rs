//! Domain models for the engine.
//!
//! These are validated domain objects, separate from whatever row types a
//! store backend uses internally.

pub mod cart;
pub mod catalog;
pub mod coupon;
pub mod offer;
pub mod order;
pub mod wallet;

pub use cart::{Cart, CartItem, CartView};
pub use catalog::{Product, ProductItem};
pub use coupon::{Coupon, NewCoupon};
pub use offer::{CategoryOffer, NewOffer, Offer, ProductOffer, discounted_unit_price};
pub use order::{NewOrder, NewOrderLine, OrderLine, ShopOrder};
pub use wallet::{Wallet, WalletTransaction};
