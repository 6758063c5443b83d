//! Error types for the coordination primitives
//!
//! Provides unified error handling using thiserror. Validation failures,
//! failed transaction commands and store failures are distinct variants;
//! expected non-error outcomes (lock held elsewhere, debounce race lost)
//! are modelled as return values instead.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

// == Store Error Enum ==
/// Transport and protocol failures reported by a [`crate::store::Store`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The store could not be reached
    #[error("Connection error: {0}")]
    Connection(String),

    /// The store answered with something the client did not expect
    #[error("Protocol error: {0}")]
    Protocol(String),
}

// == Coordination Error Enum ==
/// Unified error type for the coordination primitives.
#[derive(Error, Debug)]
pub enum CoordError {
    /// Malformed input, raised before any store interaction
    #[error("Invalid argument: {0}")]
    Validation(String),

    /// One command inside an atomic transaction failed
    #[error("error during multi: command {index} failed: {message}")]
    TransactionCommand { index: usize, message: String },

    /// Transport/protocol failure from the underlying store
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Requested item does not exist
    #[error("Not found: {0}")]
    NotFound(String),
}

impl CoordError {
    /// Shorthand for building a validation error.
    pub fn validation(msg: impl Into<String>) -> Self {
        CoordError::Validation(msg.into())
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for CoordError {
    fn into_response(self) -> Response {
        let status = match &self {
            CoordError::Validation(_) => StatusCode::BAD_REQUEST,
            CoordError::NotFound(_) => StatusCode::NOT_FOUND,
            CoordError::TransactionCommand { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            CoordError::Store(_) => StatusCode::SERVICE_UNAVAILABLE,
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}

// == Result Type Aliases ==
/// Convenience Result type for the coordination primitives.
pub type Result<T> = std::result::Result<T, CoordError>;

/// Result type returned by [`crate::store::Store`] implementations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;
