//! Ports Layer
//!
//! Defines the interfaces (traits) for:
//! - Driving Ports (inbound) - the membership API every backend offers
//! - Driven Ports (outbound) - the keyed store remote backends depend on

pub mod inbound;
pub mod outbound;

pub use inbound::MembershipFilter;
pub use outbound::{KeyValueStore, StoreCommand, StoreReply};
