//! Application layer - Cache-aside engine and its ports
//!
//! Contains the core cache client with in-flight call coalescing, the
//! resource-scoped helpers, introspection, and the key-value store port that
//! infrastructure adapters implement.

pub mod error;
pub mod ports;
pub mod services;

pub use error::{ApplicationError, ComputeError};
pub use ports::*;
pub use services::*;
