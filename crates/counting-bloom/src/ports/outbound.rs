//! Outbound Ports (Driven Ports)
//!
//! The keyed store the remote filters keep their buckets in. Commands mirror
//! a bitstring/counter key-value server:
//!
//! - bit commands address one string value, bit 0 being the most significant
//!   bit of its first byte
//! - counter commands treat a missing key as 0 and keep an existing expiry
//! - integer commands against a bitstring value fail with `WrongType`
//!
//! Production deployments implement this over their network client; tests
//! and single-process setups use `InMemoryStore`.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::StoreError;

/// One store command
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StoreCommand {
    /// Read one bit. Replies `Bit`.
    GetBit { key: String, offset: u64 },
    /// Write one bit, growing the value as needed. Replies `Bit` (old value).
    SetBit { key: String, offset: u64, value: bool },
    /// Count the set bits of a value. Replies `Integer`.
    BitCount { key: String },
    /// Add one to a counter. Replies `Integer` (new value).
    Incr { key: String },
    /// Subtract one from a counter. Replies `Integer` (new value).
    Decr { key: String },
    /// Set a key's time to live. Replies `Bool` (whether the key existed).
    Expire { key: String, ttl: Duration },
    /// Remove a key. Replies `Bool` (whether the key existed).
    Delete { key: String },
    /// Whether a key holds a value. Replies `Bool`.
    Exists { key: String },
}

impl StoreCommand {
    /// Create a GetBit command.
    pub fn get_bit(key: impl Into<String>, offset: u64) -> Self {
        StoreCommand::GetBit {
            key: key.into(),
            offset,
        }
    }

    /// Create a SetBit command.
    pub fn set_bit(key: impl Into<String>, offset: u64, value: bool) -> Self {
        StoreCommand::SetBit {
            key: key.into(),
            offset,
            value,
        }
    }

    /// Create an Incr command.
    pub fn incr(key: impl Into<String>) -> Self {
        StoreCommand::Incr { key: key.into() }
    }

    /// Create a Decr command.
    pub fn decr(key: impl Into<String>) -> Self {
        StoreCommand::Decr { key: key.into() }
    }

    /// Create an Expire command.
    pub fn expire(key: impl Into<String>, ttl: Duration) -> Self {
        StoreCommand::Expire {
            key: key.into(),
            ttl,
        }
    }

    /// Create a Delete command.
    pub fn delete(key: impl Into<String>) -> Self {
        StoreCommand::Delete { key: key.into() }
    }

    /// Create an Exists command.
    pub fn exists(key: impl Into<String>) -> Self {
        StoreCommand::Exists { key: key.into() }
    }
}

/// Reply to one store command
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StoreReply {
    Bit(bool),
    Integer(i64),
    Bool(bool),
    Ok,
}

impl StoreReply {
    /// Interpret the reply as a bit.
    pub fn into_bit(self) -> Result<bool, StoreError> {
        match self {
            StoreReply::Bit(bit) => Ok(bit),
            other => Err(unexpected("bit", &other)),
        }
    }

    /// Interpret the reply as an integer.
    pub fn into_integer(self) -> Result<i64, StoreError> {
        match self {
            StoreReply::Integer(value) => Ok(value),
            other => Err(unexpected("integer", &other)),
        }
    }

    /// Interpret the reply as a boolean.
    pub fn into_bool(self) -> Result<bool, StoreError> {
        match self {
            StoreReply::Bool(value) => Ok(value),
            other => Err(unexpected("boolean", &other)),
        }
    }
}

fn unexpected(expected: &str, reply: &StoreReply) -> StoreError {
    StoreError::Protocol(format!("expected {expected} reply, got {reply:?}"))
}

/// Keyed store (Driven Port)
///
/// ## Batching
///
/// `pipeline` sends a whole command sequence in one round trip and returns one
/// reply per command, in order. It is NOT a transaction: a failure part way
/// through leaves the earlier commands applied.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Execute a command sequence in one round trip.
    async fn pipeline(&self, commands: Vec<StoreCommand>) -> Result<Vec<StoreReply>, StoreError>;

    /// Execute a single command.
    async fn execute(&self, command: StoreCommand) -> Result<StoreReply, StoreError> {
        self.pipeline(vec![command])
            .await?
            .pop()
            .ok_or_else(|| StoreError::Protocol("empty pipeline reply".to_string()))
    }

    /// Count keys starting with `prefix`.
    async fn count_prefix(&self, prefix: &str) -> Result<u64, StoreError>;

    /// Remove every key starting with `prefix`; returns how many were removed.
    async fn delete_prefix(&self, prefix: &str) -> Result<u64, StoreError>;
}
