//! # Counting Bloom Filter
//!
//! Local, in-process filter engine.
//!
//! Each key maps to `hash_count` buckets:
//! - Insert: increment every bucket
//! - Delete: decrement every bucket (floored at zero)
//! - Membership: true iff every bucket is non-zero
//!
//! With `bucket_width == 1` this is a plain Bloom filter; wider buckets count
//! how many inserts landed on them, so deletes can be undone per key.
//!
//! ## Caveats
//!
//! - Inserts are not rolled back: if `raise_on_overflow` is set and the third
//!   of four buckets overflows, the first two stay incremented.
//! - Deleting a key decrements buckets it shares with other keys. Those keys
//!   can then test negative (a false negative). Wider buckets make this rarer
//!   but never impossible; at width 1 a single delete clears shared bits.
//! - `merge_union`/`merge_intersect` OR/AND the raw bucket bytes. At width 1
//!   that is set union/intersection. At wider widths it combines counter
//!   bits, not counts: `2 | 1 == 3`, `2 & 1 == 0`.
//!
//! The engine is single-threaded. Wrap it in a lock to share it.

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use bincode::Options;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::bucket_array::BucketArray;
use super::config::FilterConfig;
use super::hash_functions::compute_indices;
use super::parameters::fill_ratio_fpr;
use super::stats::FilterStats;
use crate::error::FilterError;

/// Version tag written at the start of every serialized filter.
pub const FORMAT_VERSION: u8 = 1;

/// Counting Bloom filter over a packed bucket array
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CountingBloomFilter {
    config: FilterConfig,
    buckets: BucketArray,
}

/// Serialized form: configuration record followed by the packed buckets
#[derive(Serialize)]
struct SnapshotRef<'a> {
    format_version: u8,
    config: &'a FilterConfig,
    buckets: &'a [u8],
}

#[derive(Deserialize)]
struct Snapshot {
    format_version: u8,
    config: FilterConfig,
    buckets: Vec<u8>,
}

impl CountingBloomFilter {
    /// Create an empty filter.
    pub fn new(config: FilterConfig) -> Result<Self, FilterError> {
        config.validate()?;
        let buckets = BucketArray::new(
            config.size,
            config.bucket_width,
            config.raise_on_overflow.into(),
        )?;

        debug!(
            size = config.size,
            hash_count = config.hash_count,
            bucket_width = config.bucket_width,
            bytes = buckets.as_bytes().len(),
            "Counting filter created"
        );

        Ok(Self { config, buckets })
    }

    /// Filter configuration
    pub fn config(&self) -> &FilterConfig {
        &self.config
    }

    /// Underlying bucket storage
    pub fn buckets(&self) -> &BucketArray {
        &self.buckets
    }

    /// Bucket positions `key` maps to
    pub fn indices<K: AsRef<[u8]> + ?Sized>(&self, key: &K) -> Vec<usize> {
        compute_indices(key.as_ref(), &self.config)
    }

    /// Insert a key (increment its buckets).
    ///
    /// With `raise_on_overflow`, fails on the first bucket already at its
    /// maximum; buckets incremented before it keep their new value.
    pub fn insert<K: AsRef<[u8]> + ?Sized>(&mut self, key: &K) -> Result<(), FilterError> {
        for index in self.indices(key) {
            if let Err(e) = self.buckets.increment(index) {
                warn!(index, error = %e, "Insert stopped on bucket overflow");
                return Err(e);
            }
        }
        Ok(())
    }

    /// Delete a key (decrement its buckets).
    ///
    /// **Note**: Only delete keys that were inserted. Deleting a key also
    /// decrements buckets shared with other keys and can make them test
    /// negative.
    pub fn delete<K: AsRef<[u8]> + ?Sized>(&mut self, key: &K) {
        for index in self.indices(key) {
            self.buckets.decrement(index);
        }
    }

    /// Test if a key might be in the filter
    ///
    /// Returns:
    /// - `true` if the key might be in the set (could be false positive)
    /// - `false` if the key is definitely not in the set
    pub fn contains<K: AsRef<[u8]> + ?Sized>(&self, key: &K) -> bool {
        self.indices(key)
            .into_iter()
            .all(|index| self.buckets.is_set(index))
    }

    /// True only if every key might be in the filter.
    ///
    /// An empty key set is trivially contained.
    pub fn contains_all<I>(&self, keys: I) -> bool
    where
        I: IntoIterator,
        I::Item: AsRef<[u8]>,
    {
        keys.into_iter().all(|key| self.contains(key.as_ref()))
    }

    /// New filter holding the OR of both filters' bucket bytes.
    pub fn merge_union(&self, other: &CountingBloomFilter) -> Result<Self, FilterError> {
        self.check_mergeable(other)?;
        let buckets = self.buckets.bitwise_or(&other.buckets)?;
        debug!(size = self.config.size, "Filters merged (union)");
        Ok(Self {
            config: self.config,
            buckets,
        })
    }

    /// New filter holding the AND of both filters' bucket bytes.
    pub fn merge_intersect(&self, other: &CountingBloomFilter) -> Result<Self, FilterError> {
        self.check_mergeable(other)?;
        let buckets = self.buckets.bitwise_and(&other.buckets)?;
        debug!(size = self.config.size, "Filters merged (intersection)");
        Ok(Self {
            config: self.config,
            buckets,
        })
    }

    /// OR another filter's bucket bytes into this one.
    ///
    /// Uses bitwise OR on the underlying byte slices - O(m·b/8).
    pub fn merge_in_place(&mut self, other: &CountingBloomFilter) -> Result<(), FilterError> {
        self.check_mergeable(other)?;
        self.buckets.union_in_place(&other.buckets)?;
        debug!(size = self.config.size, "Filter merged in place");
        Ok(())
    }

    /// Clear all buckets.
    pub fn clear(&mut self) {
        self.buckets.clear();
        debug!(size = self.config.size, "Filter cleared");
    }

    /// Number of non-zero buckets (O(m) scan).
    pub fn size_estimate(&self) -> usize {
        self.buckets.count_nonzero()
    }

    /// `(set buckets / size) ^ hash_count`.
    ///
    /// O(m): computes the fill ratio from a full scan on every call.
    pub fn false_positive_rate_estimate(&self) -> f64 {
        fill_ratio_fpr(
            self.size_estimate(),
            self.config.size,
            self.config.hash_count,
        )
    }

    /// One value per bucket, in index order
    pub fn bucket_values(&self) -> Vec<u8> {
        self.buckets.values().collect()
    }

    /// `1` for every non-zero bucket and `0` for every empty one, in index order
    pub fn to_bit_string(&self) -> String {
        self.buckets.to_string()
    }

    /// Current statistics (O(m)).
    pub fn stats(&self) -> FilterStats {
        let set_buckets = self.size_estimate();
        FilterStats {
            size: self.config.size,
            bucket_width: Some(self.config.bucket_width),
            hash_count: self.config.hash_count,
            raise_on_overflow: self.config.raise_on_overflow,
            set_buckets: set_buckets as u64,
            estimated_fpr: fill_ratio_fpr(set_buckets, self.config.size, self.config.hash_count),
        }
    }

    /// Serialize the filter to bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>, FilterError> {
        let snapshot = SnapshotRef {
            format_version: FORMAT_VERSION,
            config: &self.config,
            buckets: self.buckets.as_bytes(),
        };
        bincode::serialize(&snapshot).map_err(|e| FilterError::Serialization(e.to_string()))
    }

    /// Deserialize a filter from bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, FilterError> {
        let snapshot: Snapshot = bincode::DefaultOptions::new()
            .with_fixint_encoding()
            .reject_trailing_bytes()
            .deserialize(bytes)
            .map_err(|e| FilterError::Serialization(e.to_string()))?;

        if snapshot.format_version != FORMAT_VERSION {
            return Err(FilterError::Serialization(format!(
                "unsupported format version {}",
                snapshot.format_version
            )));
        }

        let config = snapshot.config;
        config.validate()?;
        let buckets = BucketArray::from_bytes(
            snapshot.buckets,
            config.size,
            config.bucket_width,
            config.raise_on_overflow.into(),
        )?;

        Ok(Self { config, buckets })
    }

    /// Write the serialized filter to `path` atomically (temp file + rename).
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), FilterError> {
        let path = path.as_ref();
        let bytes = self.to_bytes()?;

        let temp_path = path.with_extension("tmp");
        let mut file = File::create(&temp_path)?;
        file.write_all(&bytes)?;
        file.sync_all()?;
        fs::rename(&temp_path, path)?;

        debug!(path = %path.display(), bytes = bytes.len(), "Filter saved");
        Ok(())
    }

    /// Read a filter written by [`save`](Self::save).
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, FilterError> {
        let path = path.as_ref();
        let bytes = fs::read(path)?;
        let filter = Self::from_bytes(&bytes)?;
        debug!(path = %path.display(), bytes = bytes.len(), "Filter loaded");
        Ok(filter)
    }

    fn check_mergeable(&self, other: &CountingBloomFilter) -> Result<(), FilterError> {
        self.config.ensure_compatible(&other.config).map_err(|e| {
            warn!(error = %e, "Refusing to merge incompatible filters");
            e
        })
    }
}
