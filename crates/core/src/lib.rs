//! Sugarcane Core - Shared types library.
//!
//! This crate provides common types used across all Sugarcane components:
//! - `engine` - Cart-pricing, inventory, and order orchestration services
//! - `postgres` - `PostgreSQL` implementation of the engine's store contract
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no database access, no
//! service logic. This keeps it lightweight and allows it to be used
//! anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for type-safe IDs and the order status enum

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
