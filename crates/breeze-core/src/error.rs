//! Error types for breeze-core

use thiserror::Error;

/// Result type alias for breeze operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the breeze dev server
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid HTTP method
    #[error("Invalid HTTP method: {0}")]
    InvalidMethod(String),

    /// Request line did not yield a method and path token
    #[error("Malformed request line")]
    MalformedRequest,

    /// Serialized response header exceeded its fixed buffer
    #[error("Response header exceeded {limit} bytes")]
    HeaderTooLarge { limit: usize },

    /// Listen address could not be parsed
    #[error("Invalid listen address: {0}")]
    InvalidAddress(String),

    /// Socket operation missed its deadline
    #[error("Socket operation timed out")]
    Timeout,

    /// Buffer pool error
    #[error("Buffer pool error: {0}")]
    Pool(#[from] PoolError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from the buffer pool
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum PoolError {
    /// Handle is unknown, already released, or outlived a teardown
    #[error("Stale block handle: slot {slot}, generation {generation}")]
    StaleHandle { slot: u32, generation: u32 },

    /// Tracking table could not grow
    #[error("Buffer pool exhausted at {capacity} slots")]
    Exhausted { capacity: usize },
}
