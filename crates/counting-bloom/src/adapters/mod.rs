//! Adapters Layer
//!
//! Backends behind the membership port, plus an in-process keyed store.
//!
//! ## Adapters
//!
//! - `local` - `CountingBloomFilter` as a `MembershipFilter`
//! - `RemoteBitsetFilter` - one bit per bucket in a shared bitstring value
//! - `RemoteCounterFilter` - one expirable counter key per bucket
//! - `InMemoryStore` - `KeyValueStore` kept in process memory

pub mod local;
pub mod memory_store;
pub mod remote_bitset;
pub mod remote_counter;

pub use memory_store::InMemoryStore;
pub use remote_bitset::RemoteBitsetFilter;
pub use remote_counter::RemoteCounterFilter;
