//! Engine service components.
//!
//! Each service owns a shared store handle and exposes two forms of its
//! operations: public methods that open, commit and roll back their own
//! transaction, and `*_tx` methods that run against a caller-supplied
//! transaction handle so a coordinating service (the order orchestrator)
//! can compose several components into one atomic unit.

pub mod cart;
pub mod coupon;
pub mod inventory;
pub mod offers;
pub mod orders;
pub mod wallet;

pub use cart::CartPricingEngine;
pub use coupon::{CouponParams, CouponService};
pub use inventory::InventoryLedger;
pub use offers::OfferCascadeEngine;
pub use orders::OrderOrchestrator;
pub use wallet::WalletLedger;
