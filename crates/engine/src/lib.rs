//! Sugarcane Engine - the transactional core of the Sugarcane e-commerce
//! backend.
//!
//! This crate owns the logic that keeps a shopping cart's price correct as
//! items, coupons and promotional offers change, that atomically converts a
//! cart into a placed order while decrementing stock, and that reverses
//! those effects on returns while crediting a wallet.
//!
//! # Components
//!
//! - [`services::InventoryLedger`] - the only component allowed to mutate
//!   product-item stock
//! - [`services::WalletLedger`] - per-user balance plus append-only
//!   transaction log
//! - [`services::CartPricingEngine`] - derives and persists cart totals
//! - [`services::CouponService`] - validates and applies a coupon to a cart
//! - [`services::OfferCascadeEngine`] - cascades offer discounts over
//!   products and product items
//! - [`services::OrderOrchestrator`] - cart-to-order placement and returns
//!
//! # Storage
//!
//! All services are generic over the [`store::Store`] contract: a
//! scoped-transaction repository trait. [`store::MemoryStore`] is the
//! in-memory implementation used by tests and development; the
//! `sugarcane-postgres` crate provides the production backend.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod error;
pub mod models;
pub mod services;
pub mod store;

pub use config::EngineConfig;
pub use error::EngineError;
