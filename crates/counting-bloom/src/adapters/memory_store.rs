//! In-memory keyed store
//!
//! Implements [`KeyValueStore`] over a `HashMap` behind a tokio `RwLock`.
//! Expiry is lazy: an expired key is dropped the next time a command touches
//! it. Time comes from `tokio::time::Instant`, so tests can drive TTLs with a
//! paused clock.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use bitvec::prelude::*;
use tokio::sync::RwLock;
use tokio::time::Instant;

use crate::error::StoreError;
use crate::ports::outbound::{KeyValueStore, StoreCommand, StoreReply};

#[derive(Debug)]
enum Value {
    /// Bitstring; bit 0 is the most significant bit of the first byte
    Bits(BitVec<u8, Msb0>),
    Integer(i64),
}

#[derive(Debug)]
struct Entry {
    value: Value,
    expires_at: Option<Instant>,
}

impl Entry {
    fn new(value: Value) -> Self {
        Self {
            value,
            expires_at: None,
        }
    }

    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| at > now)
    }
}

/// In-memory keyed store for tests and single-process deployments.
///
/// A pipeline runs under one write lock, so concurrent pipelines never
/// interleave; a failing command still leaves earlier ones applied.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    entries: RwLock<HashMap<String, Entry>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remaining time to live of `key`, if it exists and has one.
    pub async fn ttl(&self, key: &str) -> Option<Duration> {
        let now = Instant::now();
        let entries = self.entries.read().await;
        entries
            .get(key)
            .filter(|entry| entry.is_live(now))
            .and_then(|entry| entry.expires_at)
            .map(|at| at.saturating_duration_since(now))
    }

    /// Number of live keys.
    pub async fn len(&self) -> usize {
        let now = Instant::now();
        let entries = self.entries.read().await;
        entries.values().filter(|entry| entry.is_live(now)).count()
    }

    /// Whether the store holds no live keys.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

fn live<'a>(
    entries: &'a mut HashMap<String, Entry>,
    key: &str,
    now: Instant,
) -> Option<&'a mut Entry> {
    if entries.get(key).is_some_and(|entry| !entry.is_live(now)) {
        entries.remove(key);
    }
    entries.get_mut(key)
}

fn wrong_type(key: &str) -> StoreError {
    StoreError::WrongType {
        key: key.to_string(),
    }
}

fn add_to_counter(
    entries: &mut HashMap<String, Entry>,
    key: &str,
    delta: i64,
    now: Instant,
) -> Result<StoreReply, StoreError> {
    let entry = match live(entries, key, now) {
        Some(entry) => entry,
        None => entries
            .entry(key.to_string())
            .or_insert_with(|| Entry::new(Value::Integer(0))),
    };

    match &mut entry.value {
        Value::Integer(value) => {
            *value = value.checked_add(delta).ok_or_else(|| {
                StoreError::Protocol(format!("counter {key} out of range"))
            })?;
            Ok(StoreReply::Integer(*value))
        }
        Value::Bits(_) => Err(wrong_type(key)),
    }
}

fn apply(
    entries: &mut HashMap<String, Entry>,
    command: StoreCommand,
    now: Instant,
) -> Result<StoreReply, StoreError> {
    match command {
        StoreCommand::GetBit { key, offset } => match live(entries, &key, now) {
            None => Ok(StoreReply::Bit(false)),
            Some(Entry {
                value: Value::Bits(bits),
                ..
            }) => Ok(StoreReply::Bit(
                bits.get(offset as usize).map(|bit| *bit).unwrap_or(false),
            )),
            Some(_) => Err(wrong_type(&key)),
        },
        StoreCommand::SetBit { key, offset, value } => {
            let entry = match live(entries, &key, now) {
                Some(entry) => entry,
                None => entries
                    .entry(key.clone())
                    .or_insert_with(|| Entry::new(Value::Bits(BitVec::new()))),
            };
            let Value::Bits(bits) = &mut entry.value else {
                return Err(wrong_type(&key));
            };

            let offset = offset as usize;
            if offset >= bits.len() {
                // grow in whole bytes, like a string value would
                bits.resize((offset / 8 + 1) * 8, false);
            }
            let previous = bits[offset];
            bits.set(offset, value);
            Ok(StoreReply::Bit(previous))
        }
        StoreCommand::BitCount { key } => match live(entries, &key, now) {
            None => Ok(StoreReply::Integer(0)),
            Some(Entry {
                value: Value::Bits(bits),
                ..
            }) => Ok(StoreReply::Integer(bits.count_ones() as i64)),
            Some(_) => Err(wrong_type(&key)),
        },
        StoreCommand::Incr { key } => add_to_counter(entries, &key, 1, now),
        StoreCommand::Decr { key } => add_to_counter(entries, &key, -1, now),
        StoreCommand::Expire { key, ttl } => match live(entries, &key, now) {
            Some(entry) => {
                entry.expires_at = Some(now + ttl);
                Ok(StoreReply::Bool(true))
            }
            None => Ok(StoreReply::Bool(false)),
        },
        StoreCommand::Delete { key } => {
            let existed = live(entries, &key, now).is_some();
            entries.remove(&key);
            Ok(StoreReply::Bool(existed))
        }
        StoreCommand::Exists { key } => Ok(StoreReply::Bool(live(entries, &key, now).is_some())),
    }
}

#[async_trait]
impl KeyValueStore for InMemoryStore {
    async fn pipeline(&self, commands: Vec<StoreCommand>) -> Result<Vec<StoreReply>, StoreError> {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        commands
            .into_iter()
            .map(|command| apply(&mut entries, command, now))
            .collect()
    }

    async fn count_prefix(&self, prefix: &str) -> Result<u64, StoreError> {
        let now = Instant::now();
        let entries = self.entries.read().await;
        Ok(entries
            .iter()
            .filter(|(key, entry)| key.starts_with(prefix) && entry.is_live(now))
            .count() as u64)
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<u64, StoreError> {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        let mut expired = 0;
        entries.retain(|key, entry| {
            if !key.starts_with(prefix) {
                return true;
            }
            if !entry.is_live(now) {
                expired += 1;
            }
            false
        });
        Ok((before - entries.len() - expired) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_bits_default_to_zero() {
        let store = InMemoryStore::new();
        let reply = store.execute(StoreCommand::get_bit("ns", 42)).await.unwrap();
        assert_eq!(reply, StoreReply::Bit(false));
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_set_bit_returns_previous_and_grows() {
        let store = InMemoryStore::new();

        let replies = store
            .pipeline(vec![
                StoreCommand::set_bit("ns", 10, true),
                StoreCommand::set_bit("ns", 10, true),
                StoreCommand::get_bit("ns", 10),
                StoreCommand::get_bit("ns", 11),
                StoreCommand::BitCount {
                    key: "ns".to_string(),
                },
            ])
            .await
            .unwrap();

        assert_eq!(
            replies,
            vec![
                StoreReply::Bit(false),
                StoreReply::Bit(true),
                StoreReply::Bit(true),
                StoreReply::Bit(false),
                StoreReply::Integer(1),
            ]
        );
    }

    #[tokio::test]
    async fn test_bits_are_msb_first() {
        let store = InMemoryStore::new();
        store.execute(StoreCommand::set_bit("ns", 0, true)).await.unwrap();

        let entries = store.entries.read().await;
        let Some(Entry {
            value: Value::Bits(bits),
            ..
        }) = entries.get("ns")
        else {
            panic!("expected a bitstring");
        };
        assert_eq!(bits.as_raw_slice(), &[0b1000_0000]);
    }

    #[tokio::test]
    async fn test_counters() {
        let store = InMemoryStore::new();
        let replies = store
            .pipeline(vec![
                StoreCommand::incr("bf:1"),
                StoreCommand::incr("bf:1"),
                StoreCommand::decr("bf:1"),
                StoreCommand::decr("bf:2"),
                StoreCommand::exists("bf:1"),
                StoreCommand::exists("bf:3"),
            ])
            .await
            .unwrap();

        assert_eq!(
            replies,
            vec![
                StoreReply::Integer(1),
                StoreReply::Integer(2),
                StoreReply::Integer(1),
                StoreReply::Integer(-1),
                StoreReply::Bool(true),
                StoreReply::Bool(false),
            ]
        );
    }

    #[tokio::test]
    async fn test_wrong_type_stops_pipeline() {
        let store = InMemoryStore::new();
        let result = store
            .pipeline(vec![
                StoreCommand::set_bit("ns", 1, true),
                StoreCommand::incr("ns"),
                StoreCommand::incr("other"),
            ])
            .await;

        assert_eq!(
            result,
            Err(StoreError::WrongType {
                key: "ns".to_string()
            })
        );
        // earlier command applied, later one never ran
        assert_eq!(
            store.execute(StoreCommand::get_bit("ns", 1)).await.unwrap(),
            StoreReply::Bit(true)
        );
        assert_eq!(
            store.execute(StoreCommand::exists("other")).await.unwrap(),
            StoreReply::Bool(false)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_expiry() {
        let store = InMemoryStore::new();
        store
            .pipeline(vec![
                StoreCommand::incr("bf:1"),
                StoreCommand::expire("bf:1", Duration::from_secs(1)),
            ])
            .await
            .unwrap();

        assert_eq!(store.ttl("bf:1").await, Some(Duration::from_secs(1)));
        assert_eq!(store.count_prefix("bf:").await.unwrap(), 1);

        tokio::time::advance(Duration::from_secs(2)).await;

        assert_eq!(
            store.execute(StoreCommand::exists("bf:1")).await.unwrap(),
            StoreReply::Bool(false)
        );
        assert_eq!(store.count_prefix("bf:").await.unwrap(), 0);
        // a fresh increment starts over from zero without a ttl
        assert_eq!(
            store.execute(StoreCommand::incr("bf:1")).await.unwrap(),
            StoreReply::Integer(1)
        );
        assert_eq!(store.ttl("bf:1").await, None);
    }

    #[tokio::test]
    async fn test_expire_missing_key() {
        let store = InMemoryStore::new();
        let reply = store
            .execute(StoreCommand::expire("nope", Duration::from_secs(5)))
            .await
            .unwrap();
        assert_eq!(reply, StoreReply::Bool(false));
    }

    #[tokio::test]
    async fn test_prefix_operations() {
        let store = InMemoryStore::new();
        store
            .pipeline(vec![
                StoreCommand::incr("a:1"),
                StoreCommand::incr("a:2"),
                StoreCommand::incr("b:1"),
            ])
            .await
            .unwrap();

        assert_eq!(store.count_prefix("a:").await.unwrap(), 2);
        assert_eq!(store.delete_prefix("a:").await.unwrap(), 2);
        assert_eq!(store.count_prefix("a:").await.unwrap(), 0);
        assert_eq!(store.count_prefix("b:").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_delete() {
        let store = InMemoryStore::new();
        store.execute(StoreCommand::incr("k")).await.unwrap();
        assert_eq!(
            store.execute(StoreCommand::delete("k")).await.unwrap(),
            StoreReply::Bool(true)
        );
        assert_eq!(
            store.execute(StoreCommand::delete("k")).await.unwrap(),
            StoreReply::Bool(false)
        );
    }
}
