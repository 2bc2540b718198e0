//! Domain layer for the cache layer
//!
//! Contains the cache key scheme, TTL policy, and the stored entry shapes.
//! This layer performs no I/O and defines the vocabulary shared by the
//! application and infrastructure crates.

pub mod entities;
pub mod errors;
pub mod value_objects;

pub use entities::*;
pub use errors::DomainError;
pub use value_objects::*;
