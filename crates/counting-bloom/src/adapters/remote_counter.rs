//! Remote Counter Adapter
//!
//! Counting Bloom filter with one integer key per bucket, `identifier:index`,
//! in a shared keyed store. Counters are unbounded and can expire.
//!
//! ## Expiry
//!
//! Each bucket key carries its own TTL, refreshed by every insert that lands
//! on it. A key inserted once fades out of the filter bucket by bucket, and
//! an unrelated key colliding on the same bucket keeps that bucket alive
//! longer. Membership after a TTL is therefore approximate, not a hard cutoff.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use super::remote_bitset::remote_stats;
use crate::domain::{compute_indices, FilterConfig, FilterStats};
use crate::error::FilterError;
use crate::ports::{KeyValueStore, MembershipFilter, StoreCommand};

/// Counting Bloom filter over per-bucket counter keys
pub struct RemoteCounterFilter<S: KeyValueStore> {
    store: Arc<S>,
    identifier: String,
    config: FilterConfig,
    default_ttl: Option<Duration>,
}

impl<S: KeyValueStore> RemoteCounterFilter<S> {
    /// Attach to the counters under `identifier:`.
    ///
    /// The identifier may not contain `:`, so no filter's key prefix is a
    /// prefix of another's.
    ///
    /// `default_ttl` applies to every insert that does not pass its own.
    pub fn new(
        store: Arc<S>,
        identifier: impl Into<String>,
        config: FilterConfig,
        default_ttl: Option<Duration>,
    ) -> Result<Self, FilterError> {
        config.validate()?;
        let identifier = identifier.into();
        if identifier.is_empty() {
            return Err(FilterError::InvalidConfig(
                "identifier cannot be empty".to_string(),
            ));
        }
        if identifier.contains(':') {
            return Err(FilterError::InvalidConfig(format!(
                "identifier {identifier:?} cannot contain ':'"
            )));
        }
        if default_ttl.is_some_and(|ttl| ttl.is_zero()) {
            return Err(FilterError::InvalidConfig(
                "default_ttl cannot be zero".to_string(),
            ));
        }

        debug!(
            identifier = %identifier,
            size = config.size,
            hash_count = config.hash_count,
            ?default_ttl,
            "Remote counter filter attached"
        );

        Ok(Self {
            store,
            identifier,
            config,
            default_ttl,
        })
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn config(&self) -> &FilterConfig {
        &self.config
    }

    pub fn default_ttl(&self) -> Option<Duration> {
        self.default_ttl
    }

    /// Store keys of the buckets `key` maps to
    pub fn bucket_keys(&self, key: &[u8]) -> Vec<String> {
        compute_indices(key, &self.config)
            .into_iter()
            .map(|index| self.bucket_key(index))
            .collect()
    }

    fn bucket_key(&self, index: usize) -> String {
        format!("{}:{}", self.identifier, index)
    }

    fn prefix(&self) -> String {
        format!("{}:", self.identifier)
    }

    /// Insert a key, setting each of its buckets to expire after `ttl`.
    ///
    /// `None` falls back to the filter's default TTL; with neither, the
    /// buckets keep whatever expiry they already had.
    pub async fn insert_with_ttl(
        &self,
        key: &[u8],
        ttl: Option<Duration>,
    ) -> Result<(), FilterError> {
        let ttl = ttl.or(self.default_ttl);
        let mut commands = Vec::with_capacity(self.config.hash_count * 2);
        for bucket in self.bucket_keys(key) {
            if let Some(ttl) = ttl {
                commands.push(StoreCommand::incr(bucket.clone()));
                commands.push(StoreCommand::expire(bucket, ttl));
            } else {
                commands.push(StoreCommand::incr(bucket));
            }
        }

        debug!(
            identifier = %self.identifier,
            commands = commands.len(),
            ?ttl,
            "Incrementing filter counters"
        );
        self.store.pipeline(commands).await?;
        Ok(())
    }

    /// Decrement the key's counters, removing any that reach zero.
    async fn decrement(&self, key: &[u8]) -> Result<(), FilterError> {
        let buckets = self.bucket_keys(key);
        let commands = buckets
            .iter()
            .map(|bucket| StoreCommand::decr(bucket.as_str()))
            .collect();
        let replies = self.store.pipeline(commands).await?;

        let mut removals = Vec::new();
        for (bucket, reply) in buckets.into_iter().zip(replies) {
            if reply.into_integer()? <= 0 {
                removals.push(StoreCommand::delete(bucket));
            }
        }

        debug!(
            identifier = %self.identifier,
            removed = removals.len(),
            "Decremented filter counters"
        );
        if !removals.is_empty() {
            self.store.pipeline(removals).await?;
        }
        Ok(())
    }

    /// Statistics report; counters have no fixed width.
    pub async fn stats(&self) -> Result<FilterStats, FilterError> {
        let set_buckets = self.num_set().await?;
        Ok(remote_stats(&self.config, None, set_buckets))
    }
}

#[async_trait]
impl<S: KeyValueStore> MembershipFilter for RemoteCounterFilter<S> {
    fn backend_name(&self) -> &'static str {
        "remote-counter"
    }

    async fn insert(&mut self, key: &[u8]) -> Result<(), FilterError> {
        self.insert_with_ttl(key, None).await
    }

    async fn delete(&mut self, key: &[u8]) -> Result<(), FilterError> {
        self.decrement(key).await
    }

    async fn contains_all(&self, keys: &[&[u8]]) -> Result<bool, FilterError> {
        let commands: Vec<StoreCommand> = keys
            .iter()
            .flat_map(|key| self.bucket_keys(key))
            .map(StoreCommand::exists)
            .collect();
        if commands.is_empty() {
            return Ok(true);
        }

        for reply in self.store.pipeline(commands).await? {
            if !reply.into_bool()? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    async fn clear(&mut self) -> Result<(), FilterError> {
        let removed = self.store.delete_prefix(&self.prefix()).await?;
        debug!(identifier = %self.identifier, removed, "Cleared remote counters");
        Ok(())
    }

    async fn num_set(&self) -> Result<u64, FilterError> {
        Ok(self.store.count_prefix(&self.prefix()).await?)
    }
}
