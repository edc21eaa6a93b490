//! Packed bucket storage
//!
//! `size` unsigned counters of `width` bits each, packed back to back into a
//! byte buffer (bucket `i` starts at bit `i * width`, least significant bit
//! first). The buffer is exactly `ceil(size * width / 8)` bytes, which is also
//! what a serialized filter carries.
//!
//! With `width == 1` every bucket is a plain bit and the array is a classic
//! Bloom filter bitmap.

use std::fmt;
use std::ops::Range;

use bitvec::prelude::*;
use serde::{Deserialize, Serialize};

use super::config::MAX_BUCKET_WIDTH;
use crate::error::FilterError;

/// What `increment` does when a bucket is already at its maximum
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum OverflowPolicy {
    /// Leave the bucket at its maximum and report success.
    #[default]
    Saturate,
    /// Leave the bucket unchanged and fail with `FilterError::Overflow`.
    Raise,
}

impl From<bool> for OverflowPolicy {
    fn from(raise_on_overflow: bool) -> Self {
        if raise_on_overflow {
            OverflowPolicy::Raise
        } else {
            OverflowPolicy::Saturate
        }
    }
}

/// Array of `size` counters, `width` bits each
///
/// Not internally synchronized: share it across threads only behind a lock.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BucketArray {
    bits: BitVec<u8, Lsb0>,
    size: usize,
    width: u8,
    policy: OverflowPolicy,
}

impl BucketArray {
    /// Allocate `size` zeroed buckets of `width` bits.
    pub fn new(size: usize, width: u8, policy: OverflowPolicy) -> Result<Self, FilterError> {
        check_width(width)?;
        Ok(Self {
            bits: bitvec![u8, Lsb0; 0; size * width as usize],
            size,
            width,
            policy,
        })
    }

    /// Rebuild an array from its packed bytes.
    ///
    /// `bytes` must be exactly `ceil(size * width / 8)` long.
    pub fn from_bytes(
        bytes: Vec<u8>,
        size: usize,
        width: u8,
        policy: OverflowPolicy,
    ) -> Result<Self, FilterError> {
        check_width(width)?;
        let bit_len = size * width as usize;
        let expected = bit_len.div_ceil(8);
        if bytes.len() != expected {
            return Err(FilterError::Serialization(format!(
                "bucket data is {} bytes, expected {}",
                bytes.len(),
                expected
            )));
        }

        let mut bits = BitVec::<u8, Lsb0>::from_vec(bytes);
        bits.truncate(bit_len);
        bits.set_uninitialized(false);

        Ok(Self {
            bits,
            size,
            width,
            policy,
        })
    }

    /// Packed storage bytes
    pub fn as_bytes(&self) -> &[u8] {
        self.bits.as_raw_slice()
    }

    /// Number of buckets
    pub fn len(&self) -> usize {
        self.size
    }

    /// Whether the array has no buckets at all
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Bits per bucket
    pub fn width(&self) -> u8 {
        self.width
    }

    /// Overflow policy applied by `increment`
    pub fn policy(&self) -> OverflowPolicy {
        self.policy
    }

    /// Largest value a bucket can hold: `2^width - 1`
    pub fn max_value(&self) -> u8 {
        u8::MAX >> (8 - self.width)
    }

    /// Value of bucket `index` (0 if never touched).
    ///
    /// # Panics
    /// Panics if `index >= len()`.
    pub fn get(&self, index: usize) -> u8 {
        let range = self.range(index);
        self.bits[range].load_le::<u8>()
    }

    /// Whether bucket `index` is non-zero
    pub fn is_set(&self, index: usize) -> bool {
        let range = self.range(index);
        self.bits[range].any()
    }

    /// Overwrite bucket `index`.
    ///
    /// Fails with `Overflow` if `value` does not fit in the bucket width.
    pub fn set(&mut self, index: usize, value: u8) -> Result<(), FilterError> {
        let max = self.max_value();
        if value > max {
            return Err(FilterError::Overflow { index, max });
        }
        self.store(index, value);
        Ok(())
    }

    /// Add one to bucket `index` and return the new value.
    ///
    /// At the maximum value the overflow policy decides: `Saturate` keeps
    /// the maximum, `Raise` fails and leaves the bucket untouched.
    pub fn increment(&mut self, index: usize) -> Result<u8, FilterError> {
        let current = self.get(index);
        let max = self.max_value();
        if current == max {
            return match self.policy {
                OverflowPolicy::Saturate => Ok(max),
                OverflowPolicy::Raise => Err(FilterError::Overflow { index, max }),
            };
        }
        self.store(index, current + 1);
        Ok(current + 1)
    }

    /// Subtract one from bucket `index`, never going below zero.
    pub fn decrement(&mut self, index: usize) -> u8 {
        let current = self.get(index);
        if current == 0 {
            return 0;
        }
        self.store(index, current - 1);
        current - 1
    }

    /// Reset every bucket to zero.
    pub fn clear(&mut self) {
        self.bits.fill(false);
    }

    /// Number of non-zero buckets.
    ///
    /// Scans the whole array (O(m)); keep it off per-lookup paths.
    pub fn count_nonzero(&self) -> usize {
        if self.width == 1 {
            return self.bits.count_ones();
        }
        self.bits
            .chunks(self.width as usize)
            .filter(|bucket| bucket.any())
            .count()
    }

    /// Bucket values in index order
    pub fn values(&self) -> impl Iterator<Item = u8> + '_ {
        self.bits
            .chunks(self.width as usize)
            .map(|bucket| bucket.load_le::<u8>())
    }

    /// New array whose bytes are the AND of both operands' bytes.
    pub fn bitwise_and(&self, other: &BucketArray) -> Result<BucketArray, FilterError> {
        self.combine(other, |a, b| a & b)
    }

    /// New array whose bytes are the OR of both operands' bytes.
    pub fn bitwise_or(&self, other: &BucketArray) -> Result<BucketArray, FilterError> {
        self.combine(other, |a, b| a | b)
    }

    /// OR `other`'s bytes into this array.
    pub fn union_in_place(&mut self, other: &BucketArray) -> Result<(), FilterError> {
        self.check_shape(other)?;
        let self_raw = self.bits.as_raw_mut_slice();
        let other_raw = other.bits.as_raw_slice();
        for (s, o) in self_raw.iter_mut().zip(other_raw.iter()) {
            *s |= *o;
        }
        Ok(())
    }

    fn combine(
        &self,
        other: &BucketArray,
        op: impl Fn(u8, u8) -> u8,
    ) -> Result<BucketArray, FilterError> {
        self.check_shape(other)?;
        let mut result = self.clone();
        let result_raw = result.bits.as_raw_mut_slice();
        let other_raw = other.bits.as_raw_slice();
        for (r, o) in result_raw.iter_mut().zip(other_raw.iter()) {
            *r = op(*r, *o);
        }
        Ok(result)
    }

    fn check_shape(&self, other: &BucketArray) -> Result<(), FilterError> {
        if self.size == other.size && self.width == other.width {
            return Ok(());
        }
        Err(FilterError::ConfigurationMismatch {
            left: format!("size={} bucket_width={}", self.size, self.width),
            right: format!("size={} bucket_width={}", other.size, other.width),
        })
    }

    fn store(&mut self, index: usize, value: u8) {
        let range = self.range(index);
        self.bits[range].store_le::<u8>(value);
    }

    fn range(&self, index: usize) -> Range<usize> {
        assert!(
            index < self.size,
            "bucket index {} out of range for {} buckets",
            index,
            self.size
        );
        let start = index * self.width as usize;
        start..start + self.width as usize
    }
}

/// One character per bucket: `1` if non-zero, `0` otherwise
impl fmt::Display for BucketArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for value in self.values() {
            f.write_str(if value == 0 { "0" } else { "1" })?;
        }
        Ok(())
    }
}

fn check_width(width: u8) -> Result<(), FilterError> {
    if width == 0 || width > MAX_BUCKET_WIDTH {
        return Err(FilterError::InvalidBucketWidth { width });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_new_array_is_zeroed() {
        let array = BucketArray::new(100, 3, OverflowPolicy::Saturate).unwrap();
        assert_eq!(array.len(), 100);
        assert_eq!(array.count_nonzero(), 0);
        assert!((0..100).all(|i| array.get(i) == 0));
        assert_eq!(array.as_bytes().len(), 38); // ceil(300 / 8)
    }

    #[test]
    fn test_display_marks_nonzero_buckets() {
        let mut array = BucketArray::new(6, 3, OverflowPolicy::Saturate).unwrap();
        array.increment(1).unwrap();
        array.increment(4).unwrap();
        array.increment(4).unwrap();
        assert_eq!(array.to_string(), "010010");

        array.decrement(1);
        assert_eq!(array.to_string(), "000010");
    }

    #[test]
    fn test_rejects_bad_width() {
        assert!(matches!(
            BucketArray::new(10, 0, OverflowPolicy::Saturate),
            Err(FilterError::InvalidBucketWidth { width: 0 })
        ));
        assert!(matches!(
            BucketArray::new(10, 9, OverflowPolicy::Saturate),
            Err(FilterError::InvalidBucketWidth { width: 9 })
        ));
    }

    #[test]
    fn test_byte_length_scales_linearly_with_width() {
        for width in 1..=8u8 {
            let array = BucketArray::new(10_000, width, OverflowPolicy::Saturate).unwrap();
            assert_eq!(array.as_bytes().len(), 1_250 * width as usize);
        }
    }

    #[test]
    fn test_increment_and_get() {
        let mut array = BucketArray::new(10, 4, OverflowPolicy::Saturate).unwrap();
        assert_eq!(array.increment(3).unwrap(), 1);
        assert_eq!(array.increment(3).unwrap(), 2);
        assert_eq!(array.get(3), 2);
        assert!(array.is_set(3));
        assert!(!array.is_set(2));
        assert!(!array.is_set(4));
    }

    #[test]
    fn test_saturating_increment() {
        let mut array = BucketArray::new(10, 2, OverflowPolicy::Saturate).unwrap();
        for _ in 0..10 {
            array.increment(5).unwrap();
        }
        assert_eq!(array.get(5), 3);
        assert_eq!(array.get(4), 0);
        assert_eq!(array.get(6), 0);
    }

    #[test]
    fn test_raising_increment_leaves_bucket_unchanged() {
        let mut array = BucketArray::new(10, 1, OverflowPolicy::Raise).unwrap();
        assert_eq!(array.increment(7).unwrap(), 1);

        let result = array.increment(7);
        assert!(matches!(
            result,
            Err(FilterError::Overflow { index: 7, max: 1 })
        ));
        assert_eq!(array.get(7), 1);
    }

    #[test]
    fn test_decrement_floors_at_zero() {
        let mut array = BucketArray::new(10, 3, OverflowPolicy::Saturate).unwrap();
        assert_eq!(array.decrement(0), 0);
        assert_eq!(array.get(0), 0);

        array.increment(0).unwrap();
        assert_eq!(array.decrement(0), 0);
        assert_eq!(array.decrement(0), 0);
    }

    #[test]
    fn test_buckets_spanning_bytes_are_independent() {
        // width 3: bucket 2 covers bits 6..9, crossing the first byte boundary
        let mut array = BucketArray::new(8, 3, OverflowPolicy::Saturate).unwrap();
        array.set(2, 7).unwrap();
        assert_eq!(array.get(1), 0);
        assert_eq!(array.get(2), 7);
        assert_eq!(array.get(3), 0);
        assert_eq!(array.as_bytes()[0], 0b1100_0000);
        assert_eq!(array.as_bytes()[1], 0b0000_0001);
    }

    #[test]
    fn test_set_rejects_unrepresentable_value() {
        let mut array = BucketArray::new(4, 2, OverflowPolicy::Saturate).unwrap();
        assert!(matches!(
            array.set(1, 4),
            Err(FilterError::Overflow { index: 1, max: 3 })
        ));
        assert_eq!(array.get(1), 0);
    }

    #[test]
    fn test_clear_and_count_nonzero() {
        let mut array = BucketArray::new(50, 5, OverflowPolicy::Saturate).unwrap();
        for i in (0..50).step_by(5) {
            array.increment(i).unwrap();
            array.increment(i).unwrap();
        }
        assert_eq!(array.count_nonzero(), 10);

        array.clear();
        assert_eq!(array.count_nonzero(), 0);
        assert!(array.as_bytes().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_bitwise_or_and_and() {
        let mut a = BucketArray::new(16, 1, OverflowPolicy::Saturate).unwrap();
        let mut b = BucketArray::new(16, 1, OverflowPolicy::Saturate).unwrap();
        a.increment(1).unwrap();
        a.increment(2).unwrap();
        b.increment(2).unwrap();
        b.increment(9).unwrap();

        let union = a.bitwise_or(&b).unwrap();
        let intersection = a.bitwise_and(&b).unwrap();

        let ones = |array: &BucketArray| -> Vec<usize> {
            (0..array.len()).filter(|&i| array.is_set(i)).collect()
        };
        assert_eq!(ones(&union), vec![1, 2, 9]);
        assert_eq!(ones(&intersection), vec![2]);
        // operands are untouched
        assert_eq!(ones(&a), vec![1, 2]);
    }

    #[test]
    fn test_bitwise_ops_combine_raw_counter_bits() {
        // 2 (0b10) | 1 (0b01) == 3, 2 & 1 == 0: not a numeric merge
        let mut a = BucketArray::new(4, 2, OverflowPolicy::Saturate).unwrap();
        let mut b = BucketArray::new(4, 2, OverflowPolicy::Saturate).unwrap();
        a.set(0, 2).unwrap();
        b.set(0, 1).unwrap();

        assert_eq!(a.bitwise_or(&b).unwrap().get(0), 3);
        assert_eq!(a.bitwise_and(&b).unwrap().get(0), 0);
    }

    #[test]
    fn test_bitwise_ops_require_same_shape() {
        let a = BucketArray::new(16, 1, OverflowPolicy::Saturate).unwrap();
        let b = BucketArray::new(17, 1, OverflowPolicy::Saturate).unwrap();
        let c = BucketArray::new(16, 2, OverflowPolicy::Saturate).unwrap();

        assert!(matches!(
            a.bitwise_or(&b),
            Err(FilterError::ConfigurationMismatch { .. })
        ));
        assert!(matches!(
            a.bitwise_and(&c),
            Err(FilterError::ConfigurationMismatch { .. })
        ));
    }

    #[test]
    fn test_union_in_place() {
        let mut a = BucketArray::new(16, 1, OverflowPolicy::Saturate).unwrap();
        let mut b = BucketArray::new(16, 1, OverflowPolicy::Saturate).unwrap();
        b.increment(11).unwrap();
        a.union_in_place(&b).unwrap();
        assert!(a.is_set(11));
    }

    #[test]
    fn test_from_bytes_checks_length() {
        let result = BucketArray::from_bytes(vec![0; 3], 10, 3, OverflowPolicy::Saturate);
        assert!(matches!(result, Err(FilterError::Serialization(_))));
    }

    #[test]
    fn test_from_bytes_restores_values() {
        let mut array = BucketArray::new(10, 3, OverflowPolicy::Raise).unwrap();
        array.set(0, 5).unwrap();
        array.set(9, 7).unwrap();

        let restored = BucketArray::from_bytes(
            array.as_bytes().to_vec(),
            10,
            3,
            OverflowPolicy::Raise,
        )
        .unwrap();
        assert_eq!(restored, array);
        assert_eq!(restored.values().collect::<Vec<_>>(), vec![5, 0, 0, 0, 0, 0, 0, 0, 0, 7]);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Increment(usize),
        Decrement(usize),
        Clear,
    }

    fn op_strategy(size: usize) -> impl Strategy<Value = Op> {
        prop_oneof![
            8 => (0..size).prop_map(Op::Increment),
            4 => (0..size).prop_map(Op::Decrement),
            1 => Just(Op::Clear),
        ]
    }

    proptest! {
        #[test]
        fn prop_matches_counter_model(
            width in 1u8..=8,
            ops in proptest::collection::vec(op_strategy(37), 0..200),
        ) {
            let mut array = BucketArray::new(37, width, OverflowPolicy::Saturate).unwrap();
            let mut model = vec![0u8; 37];
            let max = array.max_value();

            for op in ops {
                match op {
                    Op::Increment(i) => {
                        model[i] = model[i].saturating_add(1).min(max);
                        prop_assert_eq!(array.increment(i).unwrap(), model[i]);
                    }
                    Op::Decrement(i) => {
                        model[i] = model[i].saturating_sub(1);
                        prop_assert_eq!(array.decrement(i), model[i]);
                    }
                    Op::Clear => {
                        model.iter_mut().for_each(|v| *v = 0);
                        array.clear();
                    }
                }
            }

            prop_assert_eq!(array.values().collect::<Vec<_>>(), model.clone());
            prop_assert_eq!(array.count_nonzero(), model.iter().filter(|&&v| v > 0).count());
        }
    }
}
