//! Inbound Ports (Driving Ports)
//!
//! The capability every filter backend offers, whether its buckets live in
//! process memory or in a shared store.

use async_trait::async_trait;

use crate::error::FilterError;

/// Membership filter API (Driving Port)
///
/// Keys are raw bytes; the same bytes must be used to insert, test and delete
/// a key. Remote implementations perform I/O and surface store failures as
/// `FilterError::Backend`.
#[async_trait]
pub trait MembershipFilter: Send + Sync {
    /// Short backend name, used in logs and `Unsupported` errors.
    fn backend_name(&self) -> &'static str;

    /// Insert a key.
    async fn insert(&mut self, key: &[u8]) -> Result<(), FilterError>;

    /// Remove one insert of a key.
    ///
    /// Buckets shared with other keys are decremented too, which can turn
    /// those keys into false negatives.
    async fn delete(&mut self, key: &[u8]) -> Result<(), FilterError>;

    /// True only if every key might be in the filter.
    ///
    /// An empty key set is trivially contained.
    async fn contains_all(&self, keys: &[&[u8]]) -> Result<bool, FilterError>;

    /// Test a single key.
    async fn contains(&self, key: &[u8]) -> Result<bool, FilterError> {
        self.contains_all(&[key]).await
    }

    /// Reset every bucket.
    async fn clear(&mut self) -> Result<(), FilterError>;

    /// Number of non-zero buckets.
    async fn num_set(&self) -> Result<u64, FilterError>;
}
