//! RocketShoes Core - Shared cart and catalog types.
//!
//! This crate provides the domain types used across all RocketShoes components:
//! - `storefront` - Cart store, catalog client, and durable storage
//! - `cli` - Command-line front end that owns the cart store
//!
//! # Architecture
//!
//! The core crate contains only types and pure cart logic - no I/O, no HTTP
//! clients, no storage access. Stock checks and persistence live in the
//! storefront crate, which decides *whether* a mutation may happen; this crate
//! only knows *how* to apply it while keeping the cart invariants.
//!
//! # Modules
//!
//! - [`types`] - Product IDs, prices, catalog products, stock, and the cart

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
