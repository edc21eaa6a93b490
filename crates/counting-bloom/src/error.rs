//! Error types for the counting Bloom filter crate

use thiserror::Error;

/// Errors raised by filter construction and filter operations
#[derive(Debug, Error)]
pub enum FilterError {
    #[error("Invalid filter configuration: {0}")]
    InvalidConfig(String),

    #[error("Filter size exceeds hash space: {size} > {max}")]
    SizeExceedsHashSpace { size: u64, max: u64 },

    #[error("Invalid bucket width: {width} (must be between 1 and 8)")]
    InvalidBucketWidth { width: u8 },

    #[error("Bucket {index} overflowed (max value {max})")]
    Overflow { index: usize, max: u8 },

    #[error("Configuration mismatch: {left} vs {right}")]
    ConfigurationMismatch { left: String, right: String },

    #[error("Backend failure: {0}")]
    Backend(#[from] StoreError),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{operation} is not supported by the {backend} backend")]
    Unsupported {
        operation: &'static str,
        backend: &'static str,
    },
}

/// Errors surfaced by a keyed store (see [`crate::ports::KeyValueStore`])
///
/// These are never retried by the filter; they reach the caller unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Timeout")]
    Timeout,

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Operation against a key holding the wrong kind of value: {key}")]
    WrongType { key: String },
}
