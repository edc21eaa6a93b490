//! Filter configuration and validation
//!
//! A [`FilterConfig`] is immutable once a filter has been built from it. The
//! fields that drive indexing (`size`, `hash_count`, `seed`, `bucket_width`
//! and the hash scheme) decide whether two filters can be merged.
//!
//! # Example
//!
//! ```
//! use counting_bloom::FilterConfigBuilder;
//!
//! let config = FilterConfigBuilder::new()
//!     .size(10_000)
//!     .hash_count(7)
//!     .seed(42)
//!     .bucket_width(4)
//!     .build()
//!     .expect("valid config");
//!
//! assert_eq!(config.byte_len(), 5_000);
//! ```

use serde::{Deserialize, Serialize};

use super::parameters::calculate_optimal_parameters;
use crate::error::FilterError;

/// Number of distinct values a 32-bit checksum can produce.
///
/// A filter with more buckets than this would leave buckets unreachable.
pub const HASH_SPACE: u64 = 1 << 32;

/// Widest supported bucket, in bits.
pub const MAX_BUCKET_WIDTH: u8 = 8;

/// Most hash rounds a filter may use.
pub const MAX_HASH_COUNT: usize = 1024;

/// Default number of buckets
pub const DEFAULT_SIZE: usize = 100;
/// Default number of hash rounds
pub const DEFAULT_HASH_COUNT: usize = 4;
/// Default bucket width in bits
pub const DEFAULT_BUCKET_WIDTH: u8 = 3;

/// Which hash family the indexer uses to derive bucket positions
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HashScheme {
    /// CRC-32 of `key:round+seed` for every round.
    #[default]
    Chained,
    /// Distinct hash families for the first eight rounds, then CRC-32 chaining.
    Diversified,
}

/// Filter configuration
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Number of buckets (m)
    pub size: usize,
    /// Number of hash rounds (k)
    pub hash_count: usize,
    /// Seed mixed into every hash round (s)
    pub seed: u64,
    /// Bits per bucket (b), 1 to 8
    pub bucket_width: u8,
    /// Fail inserts that would overflow a bucket instead of saturating it
    pub raise_on_overflow: bool,
    /// Hash family used to derive indices
    pub hash_scheme: HashScheme,
}

impl FilterConfig {
    /// Create a configuration with default width, policy and scheme.
    pub fn new(size: usize, hash_count: usize, seed: u64) -> Result<Self, FilterError> {
        let config = Self {
            size,
            hash_count,
            seed,
            bucket_width: DEFAULT_BUCKET_WIDTH,
            raise_on_overflow: false,
            hash_scheme: HashScheme::Chained,
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), FilterError> {
        if self.size == 0 {
            return Err(FilterError::InvalidConfig(
                "size cannot be 0".to_string(),
            ));
        }

        if self.size as u64 > HASH_SPACE {
            return Err(FilterError::SizeExceedsHashSpace {
                size: self.size as u64,
                max: HASH_SPACE,
            });
        }

        if self.hash_count == 0 {
            return Err(FilterError::InvalidConfig(
                "hash_count cannot be 0".to_string(),
            ));
        }

        if self.hash_count > MAX_HASH_COUNT {
            return Err(FilterError::InvalidConfig(format!(
                "hash_count {} exceeds maximum {}",
                self.hash_count, MAX_HASH_COUNT
            )));
        }

        if self.bucket_width == 0 || self.bucket_width > MAX_BUCKET_WIDTH {
            return Err(FilterError::InvalidBucketWidth {
                width: self.bucket_width,
            });
        }

        Ok(())
    }

    /// Whether filters built from `self` and `other` index keys identically.
    ///
    /// `raise_on_overflow` is a local policy and does not take part.
    pub fn is_compatible_with(&self, other: &FilterConfig) -> bool {
        self.size == other.size
            && self.hash_count == other.hash_count
            && self.seed == other.seed
            && self.bucket_width == other.bucket_width
            && self.hash_scheme == other.hash_scheme
    }

    /// Fail with `ConfigurationMismatch` unless the two configs are compatible.
    pub fn ensure_compatible(&self, other: &FilterConfig) -> Result<(), FilterError> {
        if self.is_compatible_with(other) {
            return Ok(());
        }
        Err(FilterError::ConfigurationMismatch {
            left: self.identity(),
            right: other.identity(),
        })
    }

    /// Packed storage size in bytes: `ceil(size * bucket_width / 8)`
    pub fn byte_len(&self) -> usize {
        (self.size * self.bucket_width as usize).div_ceil(8)
    }

    /// Largest value a single bucket can hold
    pub fn max_bucket_value(&self) -> u8 {
        u8::MAX >> (8 - self.bucket_width.clamp(1, MAX_BUCKET_WIDTH))
    }

    fn identity(&self) -> String {
        format!(
            "size={} hash_count={} seed={} bucket_width={} scheme={:?}",
            self.size, self.hash_count, self.seed, self.bucket_width, self.hash_scheme
        )
    }
}

/// Builder for FilterConfig with validation
///
/// Every field except the seed has a default. The seed has to be chosen by the
/// caller: filters that should answer for each other's keys must share it.
#[derive(Default)]
pub struct FilterConfigBuilder {
    size: Option<usize>,
    hash_count: Option<usize>,
    seed: Option<u64>,
    bucket_width: Option<u8>,
    raise_on_overflow: Option<bool>,
    hash_scheme: Option<HashScheme>,
    capacity: Option<(usize, f64)>,
}

impl FilterConfigBuilder {
    /// Create a new builder with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of buckets
    pub fn size(mut self, size: usize) -> Self {
        self.size = Some(size);
        self
    }

    /// Set the number of hash rounds
    pub fn hash_count(mut self, hash_count: usize) -> Self {
        self.hash_count = Some(hash_count);
        self
    }

    /// Set the hash seed
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Set bits per bucket (1 to 8)
    pub fn bucket_width(mut self, width: u8) -> Self {
        self.bucket_width = Some(width);
        self
    }

    /// Fail on bucket overflow instead of saturating
    pub fn raise_on_overflow(mut self, raise: bool) -> Self {
        self.raise_on_overflow = Some(raise);
        self
    }

    /// Select the hash family
    pub fn hash_scheme(mut self, scheme: HashScheme) -> Self {
        self.hash_scheme = Some(scheme);
        self
    }

    /// Derive `size` and `hash_count` for an expected element count and
    /// target false positive rate.
    ///
    /// Explicit `size`/`hash_count` settings take precedence.
    pub fn capacity(mut self, expected_elements: usize, target_fpr: f64) -> Self {
        self.capacity = Some((expected_elements, target_fpr));
        self
    }

    /// Build the FilterConfig, validating all parameters
    pub fn build(self) -> Result<FilterConfig, FilterError> {
        let seed = self.seed.ok_or_else(|| {
            FilterError::InvalidConfig("seed must be set explicitly".to_string())
        })?;

        let (mut size, mut hash_count) = (DEFAULT_SIZE, DEFAULT_HASH_COUNT);
        if let Some((expected_elements, target_fpr)) = self.capacity {
            if !(target_fpr > 0.0 && target_fpr < 1.0) {
                return Err(FilterError::InvalidConfig(format!(
                    "target false positive rate {target_fpr} must be in (0, 1)"
                )));
            }
            let params = calculate_optimal_parameters(expected_elements, target_fpr);
            size = params.size;
            hash_count = params.hash_count;
        }

        let config = FilterConfig {
            size: self.size.unwrap_or(size),
            hash_count: self.hash_count.unwrap_or(hash_count),
            seed,
            bucket_width: self.bucket_width.unwrap_or(DEFAULT_BUCKET_WIDTH),
            raise_on_overflow: self.raise_on_overflow.unwrap_or(false),
            hash_scheme: self.hash_scheme.unwrap_or_default(),
        };

        config.validate()?;
        Ok(config)
    }
}
