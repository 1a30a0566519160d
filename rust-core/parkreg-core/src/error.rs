//! # Error Handling
//!
//! Infrastructure error types for the registry runtime.
//! Rule violations live in [`crate::registry::AdmissionError`]; this enum covers
//! everything underneath them (sockets, routing, decoding, storage, config).

use thiserror::Error;

/// Result type alias for infrastructure operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for the registry runtime
#[derive(Error, Debug)]
pub enum Error {
    /// Server failed to bind to the specified address
    #[error("Failed to bind server to {address}: {source}")]
    BindError {
        /// The address we tried to bind to
        address: String,
        /// The underlying IO error
        #[source]
        source: std::io::Error,
    },

    /// No route is registered for the path
    #[error("No route found for path: {path}")]
    RouteNotFound {
        /// The path that wasn't matched
        path: String,
    },

    /// The path exists, but not for this method
    #[error("Method {method} not allowed for path: {path}")]
    MethodNotAllowed {
        /// The request method
        method: String,
        /// The matched path
        path: String,
    },

    /// Invalid route pattern provided
    #[error("Invalid route pattern: {pattern}: {reason}")]
    InvalidRoutePattern {
        /// The invalid pattern
        pattern: String,
        /// Reason for invalidity
        reason: String,
    },

    /// A path parameter could not be converted to its declared type
    #[error("Invalid value '{value}' for {expected} parameter")]
    InvalidParam {
        /// Raw segment value
        value: String,
        /// Declared parameter type
        expected: &'static str,
    },

    /// HTTP protocol error
    #[error("HTTP error: {0}")]
    Http(#[from] hyper::Error),

    /// Response encoding error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Request body could not be decoded
    #[error("Malformed request body: {reason}")]
    Decode {
        /// Parser message
        reason: String,
    },

    /// Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Database error
    #[error("Database error: {message}")]
    Database {
        /// Error message from database
        message: String,
    },

    /// Configuration could not be read or is inconsistent
    #[error("Configuration error: {message}")]
    Config {
        /// What is wrong with the configuration
        message: String,
    },

    /// Request payload too large
    #[error("Payload too large: limit={limit} bytes, received={actual} bytes")]
    PayloadTooLarge {
        /// Max allowed size
        limit: usize,
        /// Actual size
        actual: usize,
    },
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        Self::Database {
            message: err.to_string(),
        }
    }
}
