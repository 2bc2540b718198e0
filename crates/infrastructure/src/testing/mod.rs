//! Testing utilities for store integration tests.
//!
//! Starts a disposable Redis server with testcontainers so the Redis adapter
//! can be exercised against the real protocol. Tests using it are marked
//! `#[ignore]` because they require Docker.

mod containers;

pub use containers::{ContainerError, RedisContainer};
