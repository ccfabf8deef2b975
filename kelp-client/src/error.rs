//! Client error types

use shared::models::order::OrderStatus;
use thiserror::Error;

/// Persistence call error
#[derive(Debug, Error)]
pub enum StoreError {
    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Invalid response format
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Authentication required
    #[error("Authentication required")]
    Unauthorized,

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for persistence calls
pub type ClientResult<T> = Result<T, StoreError>;

/// Engine command error
///
/// Returned as a value to the caller; expected conditions (an illegal
/// drag target, an unknown id) are frequent and never panic.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Move not present in the kitchen-board transition table
    #[error("Illegal move: {from} -> {to}")]
    IllegalMove { from: OrderStatus, to: OrderStatus },

    /// Order id not present in the local cache
    #[error("Unknown order: {0}")]
    UnknownOrder(String),

    /// Persistence call failed; the optimistic mutation was rolled back
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Engine task is gone (unmounted or shut down)
    #[error("Engine stopped")]
    Stopped,
}
