//! Sizing formulas and false positive estimators
//!
//! Formulas:
//! - m = -n*ln(p) / (ln(2)^2)   -- optimal bucket count
//! - k = (m/n) * ln(2)          -- optimal hash rounds
//! - p ≈ (1 - e^(-kn/m))^k      -- predicted rate after n inserts
//! - p ≈ (set/m)^k              -- estimate from the observed fill ratio

use std::f64::consts::LN_2;

/// Upper bound on the hash rounds `calculate_optimal_parameters` suggests.
pub const MAX_SUGGESTED_HASHES: usize = 32;

/// Sizing suggestion for a filter
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FilterParams {
    /// Number of buckets
    pub size: usize,
    /// Number of hash rounds
    pub hash_count: usize,
    /// Predicted false positive rate at the expected element count
    pub expected_fpr: f64,
}

/// Bucket and hash counts that reach `target_fpr` after `num_elements` inserts
///
/// An empty set needs nothing: the result is a single bucket and round.
pub fn calculate_optimal_parameters(num_elements: usize, target_fpr: f64) -> FilterParams {
    if num_elements == 0 {
        return FilterParams {
            size: 1,
            hash_count: 1,
            expected_fpr: 1.0,
        };
    }

    let elements = num_elements as f64;
    let size = ((-elements * target_fpr.ln()) / (LN_2 * LN_2)).ceil().max(1.0) as usize;
    let hash_count =
        ((size as f64 / elements) * LN_2).round().clamp(1.0, MAX_SUGGESTED_HASHES as f64) as usize;

    FilterParams {
        size,
        hash_count,
        expected_fpr: calculate_fpr(size, num_elements, hash_count),
    }
}

/// Predicted false positive rate of `m` buckets and `k` rounds after `n`
/// distinct inserts: `(1 - e^(-kn/m))^k`
pub fn calculate_fpr(m: usize, n: usize, k: usize) -> f64 {
    if m == 0 {
        return 1.0;
    }
    let empty_ratio = (-(k as f64) * n as f64 / m as f64).exp();
    pow_rounds(1.0 - empty_ratio, k)
}

/// False positive estimate from the observed fill ratio
///
/// Formula: FPR = (set / m)^k. Assumes uniformly filled buckets.
pub fn fill_ratio_fpr(set_buckets: usize, m: usize, k: usize) -> f64 {
    if m == 0 {
        return 1.0;
    }
    let fill = set_buckets.min(m) as f64 / m as f64;
    pow_rounds(fill, k)
}

/// `base^k` without truncating `k` to `i32`
fn pow_rounds(base: f64, k: usize) -> f64 {
    match i32::try_from(k) {
        Ok(k) => base.powi(k),
        Err(_) => base.powf(k as f64),
    }
}
