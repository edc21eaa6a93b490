//! Domain Layer - Pure filter logic
//!
//! This layer contains:
//! - Configuration and validation
//! - Sizing formulas and false positive estimators
//! - Hash indexer
//! - Packed bucket array
//! - Counting Bloom filter engine
//! - Statistics report
//!
//! RULES:
//! - No I/O besides explicit save/load of a serialized filter
//! - No async code

pub mod bucket_array;
pub mod config;
pub mod counting_bloom;
pub mod hash_functions;
pub mod parameters;
pub mod stats;

pub use bucket_array::{BucketArray, OverflowPolicy};
pub use config::{
    FilterConfig, FilterConfigBuilder, HashScheme, HASH_SPACE, MAX_BUCKET_WIDTH, MAX_HASH_COUNT,
};
pub use counting_bloom::{CountingBloomFilter, FORMAT_VERSION};
pub use hash_functions::{chained_indices, compute_indices, diversified_indices};
pub use parameters::{calculate_fpr, calculate_optimal_parameters, fill_ratio_fpr, FilterParams};
pub use stats::FilterStats;
