//! Hash indexer: maps a key to the k bucket positions it occupies
//!
//! Indices depend only on the key bytes, the round count, the bucket count and
//! the seed, so a filter loaded from disk or shared through a store answers
//! for keys inserted by another process.
//!
//! Keys are raw bytes. Callers that index non-string values must pick a
//! stable textual (or binary) form and always use it.

use std::io::Cursor;

use md5::Md5;
use ripemd::Ripemd160;
use sha1::Sha1;
use sha2::{Digest, Sha256, Sha384, Sha512};

use super::config::{FilterConfig, HashScheme};

/// Rounds that use their own hash family before falling back to CRC-32 chaining.
pub const DIVERSIFIED_ROUNDS: usize = 8;

/// Compute the k bucket positions for `key` under `config`.
pub fn compute_indices(key: &[u8], config: &FilterConfig) -> Vec<usize> {
    match config.hash_scheme {
        HashScheme::Chained => chained_indices(key, config.hash_count, config.size, config.seed),
        HashScheme::Diversified => {
            diversified_indices(key, config.hash_count, config.size, config.seed)
        }
    }
}

/// CRC-32 of `key ":" (round + seed)` modulo `m`, for every round.
pub fn chained_indices(key: &[u8], k: usize, m: usize, seed: u64) -> Vec<usize> {
    let m = m.max(1) as u64;

    (0..k)
        .map(|round| {
            let round_seed = (round as u64).wrapping_add(seed);
            let mut hasher = crc32fast::Hasher::new();
            hasher.update(key);
            hasher.update(b":");
            hasher.update(round_seed.to_string().as_bytes());
            (hasher.finalize() as u64 % m) as usize
        })
        .collect()
}

/// One hash family per round for the first [`DIVERSIFIED_ROUNDS`] rounds:
///
/// | round | family |
/// |-------|--------|
/// | 0 | MurmurHash3 x64/128 |
/// | 1 | CRC-32 |
/// | 2..=7 | MD5, SHA-1, SHA-256, SHA-384, SHA-512, RIPEMD-160 |
///
/// Digests are read as big-endian integers and reduced modulo `m`. Rounds
/// past the table chain CRC-32, each round seeded with the previous round's
/// low 32 bits. The seed is appended to the key as `key ":" seed`.
pub fn diversified_indices(key: &[u8], k: usize, m: usize, seed: u64) -> Vec<usize> {
    let m = m.max(1) as u64;
    let mut salted = Vec::with_capacity(key.len() + 21);
    salted.extend_from_slice(key);
    salted.push(b':');
    salted.extend_from_slice(seed.to_string().as_bytes());

    let mut state: u32 = 0;
    let mut indices = Vec::with_capacity(k);

    for round in 0..k {
        let (index, low_bits) = match round {
            0 => {
                let hash = murmur3::murmur3_x64_128(&mut Cursor::new(&salted), 0).unwrap_or(0);
                ((hash % m as u128) as u64, hash as u32)
            }
            1 => {
                let crc = crc32fast::hash(&salted);
                (crc as u64 % m, crc)
            }
            2 => digest_index::<Md5>(&salted, m),
            3 => digest_index::<Sha1>(&salted, m),
            4 => digest_index::<Sha256>(&salted, m),
            5 => digest_index::<Sha384>(&salted, m),
            6 => digest_index::<Sha512>(&salted, m),
            7 => digest_index::<Ripemd160>(&salted, m),
            _ => {
                let mut hasher = crc32fast::Hasher::new_with_initial(state);
                hasher.update(&salted);
                let crc = hasher.finalize();
                (crc as u64 % m, crc)
            }
        };
        state = low_bits;
        indices.push(index as usize);
    }

    indices
}

/// Reduce a digest, read as a big-endian integer, modulo `m`.
///
/// Returns the index and the digest's low 32 bits.
fn digest_index<D: Digest>(data: &[u8], m: u64) -> (u64, u32) {
    let digest = D::digest(data);
    let index = digest
        .iter()
        .fold(0u64, |acc, &byte| ((acc << 8) | byte as u64) % m);

    let tail = &digest[digest.len() - 4..];
    let low_bits = u32::from_be_bytes([tail[0], tail[1], tail[2], tail[3]]);
    (index, low_bits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_chained_known_positions() {
        // crc32("test:1") % 10 == 8, crc32("test:2") % 10 == 2
        assert_eq!(chained_indices(b"test", 2, 10, 1), vec![8, 2]);
        assert_eq!(
            chained_indices(b"test", 4, 1000, 1),
            vec![948, 422, 848, 979]
        );
        assert_eq!(chained_indices(b"totally-absent-key", 2, 10, 1), vec![7, 1]);
    }

    #[test]
    fn test_chained_rounds_shift_with_seed() {
        // Round i under seed s hashes the same input as round i-1 under seed s+1
        let seed0 = chained_indices(b"wallet_address_0x1234", 5, 1000, 0);
        let seed1 = chained_indices(b"wallet_address_0x1234", 5, 1000, 1);
        assert_eq!(&seed0[1..], &seed1[..4]);
    }

    #[test]
    fn test_compute_indices_dispatches_on_scheme() {
        let mut config = FilterConfig::new(1000, 6, 9).unwrap();
        assert_eq!(
            compute_indices(b"key", &config),
            chained_indices(b"key", 6, 1000, 9)
        );

        config.hash_scheme = HashScheme::Diversified;
        assert_eq!(
            compute_indices(b"key", &config),
            diversified_indices(b"key", 6, 1000, 9)
        );
    }

    #[test]
    fn test_diversified_deterministic() {
        let first = diversified_indices(b"test_address_0xABCD", 12, 10_000, 42);
        let second = diversified_indices(b"test_address_0xABCD", 12, 10_000, 42);
        assert_eq!(first, second, "Same input must produce same positions");
        assert_eq!(first.len(), 12);
    }

    #[test]
    fn test_diversified_seed_changes_positions() {
        let a = diversified_indices(b"test_address_0xABCD", 8, 1_000_000, 0);
        let b = diversified_indices(b"test_address_0xABCD", 8, 1_000_000, 1);
        assert_ne!(a, b, "Different seeds should produce different positions");
    }

    #[test]
    fn test_diversified_families_are_independent() {
        let positions = diversified_indices(b"test_address_0xABCD", 8, 1_000_000, 0);
        let unique: std::collections::HashSet<_> = positions.iter().collect();
        assert!(
            unique.len() >= 6,
            "Distinct hash families should produce varied positions: {:?}",
            positions
        );
    }

    #[test]
    fn test_diversified_prefix_stable() {
        // Asking for more rounds never changes the earlier ones
        let short = diversified_indices(b"prefix", 3, 997, 5);
        let long = diversified_indices(b"prefix", 20, 997, 5);
        assert_eq!(&long[..3], &short[..]);
    }

    #[test]
    fn test_digest_index_is_big_integer_modulo() {
        // m = 2^32 keeps exactly the low 32 bits of the big-endian integer
        let (index, low_bits) = digest_index::<Sha256>(b"abc", 1 << 32);
        assert_eq!(index, low_bits as u64);

        // m = 256 keeps the last byte
        let digest = Sha256::digest(b"abc");
        let (index, _) = digest_index::<Sha256>(b"abc", 256);
        assert_eq!(index, digest[digest.len() - 1] as u64);
    }

    #[test]
    fn test_hash_uniformity() {
        let m = 1000;
        let k = 7;
        let mut counts = vec![0usize; 10];

        for i in 0..1000 {
            let element = format!("element_{}", i);
            for pos in chained_indices(element.as_bytes(), k, m, 0) {
                counts[pos / 100] += 1;
            }
        }

        // Each bucket should have roughly 1000*7/10 = 700 entries
        let expected = 700;
        for (i, count) in counts.iter().enumerate() {
            assert!(
                *count >= expected / 2 && *count <= expected * 3 / 2,
                "Bucket {} has {} entries, expected ~{}",
                i,
                count,
                expected
            );
        }
    }

    proptest! {
        #[test]
        fn prop_indices_in_range(
            key in proptest::collection::vec(any::<u8>(), 0..64),
            k in 1usize..16,
            m in 1usize..100_000,
            seed in any::<u64>(),
        ) {
            let chained = chained_indices(&key, k, m, seed);
            let diversified = diversified_indices(&key, k, m, seed);
            prop_assert_eq!(chained.len(), k);
            prop_assert_eq!(diversified.len(), k);
            prop_assert!(chained.iter().chain(diversified.iter()).all(|&i| i < m));
        }
    }
}
