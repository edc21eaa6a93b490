//! Filter Service
//!
//! One filter, backed by whichever variant its `BackendConfig` selects.
//! Operations every backend supports go through `MembershipFilter`; merge and
//! persistence work on local snapshots only and fail with `Unsupported` on
//! store-backed filters.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tracing::debug;

use crate::adapters::{InMemoryStore, RemoteBitsetFilter, RemoteCounterFilter};
use crate::domain::{CountingBloomFilter, FilterConfig, FilterStats};
use crate::error::FilterError;
use crate::metrics::{MetricsRecorder, NoOpMetrics};
use crate::ports::{KeyValueStore, MembershipFilter};

/// Where a filter keeps its buckets
pub enum BackendConfig<S> {
    /// Packed bucket array in process memory
    Local,
    /// One bit per bucket in the bitstring at `namespace`
    RemoteBitset { store: Arc<S>, namespace: String },
    /// One counter key per bucket, `identifier:index`
    RemoteCounter {
        store: Arc<S>,
        identifier: String,
        default_ttl: Option<Duration>,
    },
}

enum Backend<S: KeyValueStore> {
    Local(CountingBloomFilter),
    RemoteBitset(RemoteBitsetFilter<S>),
    RemoteCounter(RemoteCounterFilter<S>),
}

/// Filter front door
///
/// Implements `MembershipFilter` for every backend and records operations
/// through the injected `MetricsRecorder`.
pub struct Filter<S: KeyValueStore = InMemoryStore> {
    backend: Backend<S>,
    metrics: Arc<dyn MetricsRecorder>,
}

impl Filter<InMemoryStore> {
    /// Create a local filter without metrics.
    ///
    /// Shorthand for `Filter::new(config, BackendConfig::Local)` that needs no
    /// store type annotation.
    pub fn local(config: FilterConfig) -> Result<Self, FilterError> {
        Self::new(config, BackendConfig::Local)
    }
}

impl<S: KeyValueStore> Filter<S> {
    /// Create a filter without metrics.
    pub fn new(config: FilterConfig, backend: BackendConfig<S>) -> Result<Self, FilterError> {
        Self::with_metrics(config, backend, Arc::new(NoOpMetrics))
    }

    /// Create a filter that records through `metrics`.
    pub fn with_metrics(
        config: FilterConfig,
        backend: BackendConfig<S>,
        metrics: Arc<dyn MetricsRecorder>,
    ) -> Result<Self, FilterError> {
        let backend = match backend {
            BackendConfig::Local => Backend::Local(CountingBloomFilter::new(config)?),
            BackendConfig::RemoteBitset { store, namespace } => {
                Backend::RemoteBitset(RemoteBitsetFilter::new(store, namespace, config)?)
            }
            BackendConfig::RemoteCounter {
                store,
                identifier,
                default_ttl,
            } => Backend::RemoteCounter(RemoteCounterFilter::new(
                store,
                identifier,
                config,
                default_ttl,
            )?),
        };

        Ok(Self::from_backend(backend, metrics))
    }

    /// Wrap an existing local engine.
    pub fn from_local(filter: CountingBloomFilter) -> Self {
        Self::from_backend(Backend::Local(filter), Arc::new(NoOpMetrics))
    }

    fn from_backend(backend: Backend<S>, metrics: Arc<dyn MetricsRecorder>) -> Self {
        let filter = Self { backend, metrics };
        let config = filter.config();
        let local_bytes = match &filter.backend {
            Backend::Local(_) => config.byte_len(),
            _ => 0,
        };
        filter
            .metrics
            .record_filter_created(config.size, config.hash_count, local_bytes);
        debug!(
            backend = filter.inner().backend_name(),
            size = config.size,
            hash_count = config.hash_count,
            "Filter created"
        );
        filter
    }

    /// Filter configuration
    pub fn config(&self) -> &FilterConfig {
        match &self.backend {
            Backend::Local(filter) => filter.config(),
            Backend::RemoteBitset(filter) => filter.config(),
            Backend::RemoteCounter(filter) => filter.config(),
        }
    }

    /// The local engine, if this filter is local
    pub fn as_local(&self) -> Option<&CountingBloomFilter> {
        match &self.backend {
            Backend::Local(filter) => Some(filter),
            _ => None,
        }
    }

    fn inner(&self) -> &dyn MembershipFilter {
        match &self.backend {
            Backend::Local(filter) => filter,
            Backend::RemoteBitset(filter) => filter,
            Backend::RemoteCounter(filter) => filter,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn MembershipFilter {
        match &mut self.backend {
            Backend::Local(filter) => filter,
            Backend::RemoteBitset(filter) => filter,
            Backend::RemoteCounter(filter) => filter,
        }
    }

    fn unsupported(&self, operation: &'static str) -> FilterError {
        FilterError::Unsupported {
            operation,
            backend: self.inner().backend_name(),
        }
    }

    fn local_pair<'a>(
        &'a self,
        other: &'a Filter<S>,
        operation: &'static str,
    ) -> Result<(&'a CountingBloomFilter, &'a CountingBloomFilter), FilterError> {
        let left = self.as_local().ok_or_else(|| self.unsupported(operation))?;
        let right = other
            .as_local()
            .ok_or_else(|| other.unsupported(operation))?;
        Ok((left, right))
    }

    fn derived(&self, filter: CountingBloomFilter) -> Self {
        Self::from_backend(Backend::Local(filter), self.metrics.clone())
    }

    /// New local filter holding the bitwise OR of both filters' buckets.
    pub fn merge_union(&self, other: &Filter<S>) -> Result<Self, FilterError> {
        let (left, right) = self.local_pair(other, "merge_union")?;
        let merged = left.merge_union(right)?;
        self.metrics.record_merge();
        Ok(self.derived(merged))
    }

    /// New local filter holding the bitwise AND of both filters' buckets.
    pub fn merge_intersect(&self, other: &Filter<S>) -> Result<Self, FilterError> {
        let (left, right) = self.local_pair(other, "merge_intersect")?;
        let merged = left.merge_intersect(right)?;
        self.metrics.record_merge();
        Ok(self.derived(merged))
    }

    /// OR another local filter's buckets into this one.
    pub fn merge_in_place(&mut self, other: &Filter<S>) -> Result<(), FilterError> {
        let right = other
            .as_local()
            .ok_or_else(|| other.unsupported("merge_in_place"))?;
        let unsupported = self.unsupported("merge_in_place");
        let Backend::Local(left) = &mut self.backend else {
            return Err(unsupported);
        };
        left.merge_in_place(right)?;
        self.metrics.record_merge();
        Ok(())
    }

    /// Serialize a local filter.
    pub fn to_bytes(&self) -> Result<Vec<u8>, FilterError> {
        self.as_local()
            .ok_or_else(|| self.unsupported("to_bytes"))?
            .to_bytes()
    }

    /// Restore a local filter serialized with [`to_bytes`](Self::to_bytes).
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, FilterError> {
        Ok(Self::from_local(CountingBloomFilter::from_bytes(bytes)?))
    }

    /// Write a local filter to `path` atomically.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), FilterError> {
        self.as_local()
            .ok_or_else(|| self.unsupported("save"))?
            .save(path)
    }

    /// Read a local filter written by [`save`](Self::save).
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, FilterError> {
        Ok(Self::from_local(CountingBloomFilter::load(path)?))
    }

    /// Insert with a bucket TTL; remote counter backend only.
    pub async fn insert_with_ttl(
        &mut self,
        key: &[u8],
        ttl: Option<Duration>,
    ) -> Result<(), FilterError> {
        let Backend::RemoteCounter(filter) = &self.backend else {
            return Err(self.unsupported("insert_with_ttl"));
        };

        let start = Instant::now();
        filter.insert_with_ttl(key, ttl).await?;
        self.metrics.record_insert(start.elapsed());
        Ok(())
    }

    /// Statistics report (O(m) locally, one store query remotely).
    pub async fn stats(&self) -> Result<FilterStats, FilterError> {
        match &self.backend {
            Backend::Local(filter) => Ok(filter.stats()),
            Backend::RemoteBitset(filter) => filter.stats().await,
            Backend::RemoteCounter(filter) => filter.stats().await,
        }
    }
}

#[async_trait]
impl<S: KeyValueStore> MembershipFilter for Filter<S> {
    fn backend_name(&self) -> &'static str {
        self.inner().backend_name()
    }

    async fn insert(&mut self, key: &[u8]) -> Result<(), FilterError> {
        let start = Instant::now();
        self.inner_mut().insert(key).await?;
        self.metrics.record_insert(start.elapsed());
        Ok(())
    }

    async fn delete(&mut self, key: &[u8]) -> Result<(), FilterError> {
        let start = Instant::now();
        self.inner_mut().delete(key).await?;
        self.metrics.record_delete(start.elapsed());
        Ok(())
    }

    async fn contains_all(&self, keys: &[&[u8]]) -> Result<bool, FilterError> {
        let start = Instant::now();
        let found = self.inner().contains_all(keys).await?;
        self.metrics.record_lookup(start.elapsed(), found);
        Ok(found)
    }

    async fn clear(&mut self) -> Result<(), FilterError> {
        self.inner_mut().clear().await
    }

    async fn num_set(&self) -> Result<u64, FilterError> {
        self.inner().num_set().await
    }
}
