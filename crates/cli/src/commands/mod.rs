//! CLI command implementations.

pub mod cart;

use rocketshoes_storefront::CartError;
use rocketshoes_storefront::config::StorefrontConfig;
use rocketshoes_storefront::state::{AppState, StateError};
use thiserror::Error;

/// Errors that can occur while running a command.
#[derive(Debug, Error)]
pub enum CommandError {
    /// Application state could not be built.
    #[error("Startup error: {0}")]
    State(#[from] StateError),

    /// Cart operation failed.
    #[error("Cart error: {0}")]
    Cart(#[from] CartError),
}

/// Build the application state for a command run.
pub fn build_state(config: StorefrontConfig) -> Result<AppState, StateError> {
    tracing::debug!(storage_dir = %config.storage_dir.display(), api = %config.api.base_url, "Opening cart");
    AppState::new(config)
}
