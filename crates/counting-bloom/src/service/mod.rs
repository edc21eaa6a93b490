//! Service Layer
//!
//! The filter front door: selects a backend from configuration and
//! instruments every operation.

pub mod filter;

pub use filter::{BackendConfig, Filter};
