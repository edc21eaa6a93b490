//! Read-only statistics report for a filter

use std::fmt;

use serde::{Deserialize, Serialize};

/// Point-in-time filter statistics
///
/// `set_buckets` and `estimated_fpr` come from a full scan (or a store-side
/// count for remote filters), so build this on demand rather than per lookup.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FilterStats {
    /// Number of buckets (m)
    pub size: usize,
    /// Bits per bucket (b); `None` when buckets are unbounded counters
    pub bucket_width: Option<u8>,
    /// Number of hash rounds (k)
    pub hash_count: usize,
    /// Whether inserts fail on bucket overflow
    pub raise_on_overflow: bool,
    /// Non-zero buckets
    pub set_buckets: u64,
    /// `(set_buckets / size) ^ hash_count`
    pub estimated_fpr: f64,
}

impl FilterStats {
    /// Fraction of buckets holding a non-zero value
    pub fn fill_ratio(&self) -> f64 {
        if self.size == 0 {
            return 0.0;
        }
        self.set_buckets as f64 / self.size as f64
    }
}

impl fmt::Display for FilterStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Number of filter buckets (m): {}", self.size)?;
        match self.bucket_width {
            Some(width) => writeln!(f, "Number of bits per bucket (b): {}", width)?,
            None => writeln!(f, "Number of bits per bucket (b): unbounded")?,
        }
        writeln!(f, "Number of set buckets (n): {}", self.set_buckets)?;
        writeln!(f, "Number of filter hashes (k): {}", self.hash_count)?;
        writeln!(f, "Raise on overflow? (r): {}", self.raise_on_overflow)?;
        write!(
            f,
            "Predicted false positive rate = {:.2}%",
            self.estimated_fpr * 100.0
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> FilterStats {
        FilterStats {
            size: 100,
            bucket_width: Some(3),
            hash_count: 2,
            raise_on_overflow: false,
            set_buckets: 10,
            estimated_fpr: 0.01,
        }
    }

    #[test]
    fn test_display_report() {
        let report = sample().to_string();
        assert!(report.contains("Number of filter buckets (m): 100"));
        assert!(report.contains("Number of bits per bucket (b): 3"));
        assert!(report.contains("Number of set buckets (n): 10"));
        assert!(report.contains("Number of filter hashes (k): 2"));
        assert!(report.contains("Raise on overflow? (r): false"));
        assert!(report.ends_with("Predicted false positive rate = 1.00%"));
    }

    #[test]
    fn test_display_unbounded_width() {
        let stats = FilterStats {
            bucket_width: None,
            ..sample()
        };
        assert!(stats
            .to_string()
            .contains("Number of bits per bucket (b): unbounded"));
    }

    #[test]
    fn test_fill_ratio() {
        assert!((sample().fill_ratio() - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_json_shape() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["size"], 100);
        assert_eq!(json["bucket_width"], 3);
        assert_eq!(json["set_buckets"], 10);
    }
}
