//! RocketShoes Storefront library.
//!
//! Client-side cart state for the RocketShoes store: a [`CartStore`] that
//! validates quantity changes against live stock, persists the cart to
//! durable key-value storage, and reports failures to the user.
//!
//! # Modules
//!
//! - [`cart`] - The cart store and its three operations
//! - [`api`] - Catalog/stock REST client
//! - [`storage`] - Durable key-value storage
//! - [`notify`] - User-visible notifications
//! - [`config`] - Environment configuration
//! - [`state`] - Application state wiring it all together

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod api;
pub mod cart;
pub mod config;
pub mod error;
pub mod notify;
pub mod state;
pub mod storage;

pub use cart::{CartStore, UpdateProductAmount};
pub use error::{CartError, CartOperation};
