//! # Counting Bloom
//!
//! Counting Bloom filters with packed multi-bit buckets, plus two backends
//! that keep bucket state in a shared keyed store.
//!
//! ## Architecture
//!
//! This crate follows Hexagonal Architecture (Ports & Adapters):
//!
//! - **Domain Layer** (`domain/`): Pure filter logic, no I/O
//!   - `CountingBloomFilter`: Local engine over a packed `BucketArray`
//!   - `FilterConfig`: Configuration with validation
//!   - `FilterConfigBuilder`: Fluent builder for configuration
//!   - `compute_indices`: Hash indexer shared by every backend
//!
//! - **Ports Layer** (`ports/`): Trait definitions
//!   - `MembershipFilter`: Driving port (insert, delete, lookup, clear, count)
//!   - `KeyValueStore`: Driven port (bitstring/counter keyed store)
//!
//! - **Adapters Layer** (`adapters/`): Backends
//!   - `RemoteBitsetFilter`: One bit per bucket in a shared value
//!   - `RemoteCounterFilter`: One expirable counter key per bucket
//!   - `InMemoryStore`: In-process `KeyValueStore`
//!
//! - **Service Layer** (`service/`): Orchestration
//!   - `Filter`: Backend chosen by `BackendConfig`, instrumented with metrics
//!
//! ## Invariants
//!
//! - No false negatives: a key inserted and not deleted (nor sharing a bucket
//!   with a deleted key) always tests positive
//! - Buckets never go below zero; at their maximum they saturate unless the
//!   filter raises on overflow
//! - Only filters with equal size, hash count, seed, bucket width and hash
//!   scheme can be merged
//!
//! ## Usage Example
//!
//! ```
//! use counting_bloom::{CountingBloomFilter, FilterConfigBuilder};
//!
//! let config = FilterConfigBuilder::new()
//!     .size(1000)
//!     .hash_count(4)
//!     .seed(1)
//!     .build()?;
//!
//! let mut filter = CountingBloomFilter::new(config)?;
//! filter.insert("test")?;
//! assert!(filter.contains("test"));
//!
//! filter.delete("test");
//! assert!(!filter.contains("test"));
//! # Ok::<(), counting_bloom::FilterError>(())
//! ```
//!
//! ## Shared Filters
//!
//! ```
//! use std::sync::Arc;
//! use counting_bloom::{BackendConfig, Filter, FilterConfig, InMemoryStore, MembershipFilter};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), counting_bloom::FilterError> {
//! let store = Arc::new(InMemoryStore::new());
//! let config = FilterConfig::new(1000, 4, 1)?;
//!
//! let mut writer = Filter::new(
//!     config,
//!     BackendConfig::RemoteCounter {
//!         store: store.clone(),
//!         identifier: "rbloom".to_string(),
//!         default_ttl: None,
//!     },
//! )?;
//! let reader = Filter::new(
//!     config,
//!     BackendConfig::RemoteCounter {
//!         store,
//!         identifier: "rbloom".to_string(),
//!         default_ttl: None,
//!     },
//! )?;
//!
//! writer.insert(b"test").await?;
//! assert!(reader.contains(b"test").await?);
//! # Ok(())
//! # }
//! ```

pub mod adapters;
pub mod domain;
pub mod error;
pub mod metrics;
pub mod ports;
pub mod service;

// Re-exports for convenience
pub use adapters::{InMemoryStore, RemoteBitsetFilter, RemoteCounterFilter};
pub use domain::{
    BucketArray, CountingBloomFilter, FilterConfig, FilterConfigBuilder, FilterStats, HashScheme,
    OverflowPolicy,
};
pub use error::{FilterError, StoreError};
pub use metrics::{Metrics, MetricsRecorder, MetricsSnapshot, NoOpMetrics};
pub use ports::{KeyValueStore, MembershipFilter, StoreCommand, StoreReply};
pub use service::{BackendConfig, Filter};
