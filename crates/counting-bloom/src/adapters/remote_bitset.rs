//! Remote Bitset Adapter
//!
//! Plain Bloom filter whose bits live in one bitstring value of a shared
//! keyed store, at key `namespace`, offsets `[0, size)`. Every process that
//! uses the same namespace, size, hash count and seed sees the same filter.
//!
//! Buckets are single bits: inserting a key twice is the same as inserting it
//! once, and deleting a key clears bits that other keys may share. Deployments
//! that cannot afford false negatives should not call `delete` here.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::domain::{compute_indices, fill_ratio_fpr, FilterConfig, FilterStats};
use crate::error::FilterError;
use crate::ports::{KeyValueStore, MembershipFilter, StoreCommand};

/// Bloom filter over a shared bitstring value
pub struct RemoteBitsetFilter<S: KeyValueStore> {
    store: Arc<S>,
    namespace: String,
    config: FilterConfig,
}

impl<S: KeyValueStore> RemoteBitsetFilter<S> {
    /// Attach to the bitstring at `namespace`.
    ///
    /// `config.bucket_width` and `raise_on_overflow` are ignored: every bucket
    /// is one bit and setting a set bit is a no-op.
    pub fn new(
        store: Arc<S>,
        namespace: impl Into<String>,
        config: FilterConfig,
    ) -> Result<Self, FilterError> {
        config.validate()?;
        let namespace = namespace.into();
        if namespace.is_empty() {
            return Err(FilterError::InvalidConfig(
                "namespace cannot be empty".to_string(),
            ));
        }

        debug!(
            namespace = %namespace,
            size = config.size,
            hash_count = config.hash_count,
            "Remote bitset filter attached"
        );

        Ok(Self {
            store,
            namespace,
            config,
        })
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn config(&self) -> &FilterConfig {
        &self.config
    }

    fn bit_commands(&self, key: &[u8], value: Option<bool>) -> Vec<StoreCommand> {
        compute_indices(key, &self.config)
            .into_iter()
            .map(|index| match value {
                Some(value) => StoreCommand::set_bit(&*self.namespace, index as u64, value),
                None => StoreCommand::get_bit(&*self.namespace, index as u64),
            })
            .collect()
    }

    async fn write_bits(&self, key: &[u8], value: bool) -> Result<(), FilterError> {
        let commands = self.bit_commands(key, Some(value));
        debug!(
            namespace = %self.namespace,
            commands = commands.len(),
            value,
            "Writing filter bits"
        );
        self.store.pipeline(commands).await?;
        Ok(())
    }

    /// Whether every bit of `key` is set.
    ///
    /// Reads the first bit alone and stops there if it is clear; the
    /// remaining bits are read in one pipeline.
    async fn contains_key(&self, key: &[u8]) -> Result<bool, FilterError> {
        let mut commands = self.bit_commands(key, None).into_iter();
        let Some(first) = commands.next() else {
            return Ok(true);
        };
        if !self.store.execute(first).await?.into_bit()? {
            return Ok(false);
        }

        let rest: Vec<StoreCommand> = commands.collect();
        if rest.is_empty() {
            return Ok(true);
        }
        for reply in self.store.pipeline(rest).await? {
            if !reply.into_bit()? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Statistics report; buckets are one bit wide.
    pub async fn stats(&self) -> Result<FilterStats, FilterError> {
        let set_buckets = self.num_set().await?;
        Ok(remote_stats(&self.config, Some(1), set_buckets))
    }
}

/// Report for a store-backed filter, whose overflow policy is fixed by the
/// backend rather than the configuration.
pub(crate) fn remote_stats(
    config: &FilterConfig,
    bucket_width: Option<u8>,
    set_buckets: u64,
) -> FilterStats {
    FilterStats {
        size: config.size,
        bucket_width,
        hash_count: config.hash_count,
        raise_on_overflow: false,
        set_buckets,
        estimated_fpr: fill_ratio_fpr(set_buckets as usize, config.size, config.hash_count),
    }
}

#[async_trait]
impl<S: KeyValueStore> MembershipFilter for RemoteBitsetFilter<S> {
    fn backend_name(&self) -> &'static str {
        "remote-bitset"
    }

    async fn insert(&mut self, key: &[u8]) -> Result<(), FilterError> {
        self.write_bits(key, true).await
    }

    async fn delete(&mut self, key: &[u8]) -> Result<(), FilterError> {
        self.write_bits(key, false).await
    }

    async fn contains_all(&self, keys: &[&[u8]]) -> Result<bool, FilterError> {
        for key in keys {
            if !self.contains_key(key).await? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    async fn clear(&mut self) -> Result<(), FilterError> {
        debug!(namespace = %self.namespace, "Clearing remote bitset");
        self.store
            .execute(StoreCommand::delete(&*self.namespace))
            .await?;
        Ok(())
    }

    async fn num_set(&self) -> Result<u64, FilterError> {
        let reply = self
            .store
            .execute(StoreCommand::BitCount {
                key: self.namespace.clone(),
            })
            .await?;
        Ok(reply.into_integer()?.max(0) as u64)
    }
}
