//! Cache keys, entries and store adapters.
//!
//! The proxy addresses cached responses by a canonical method + URL key and
//! treats the store as a capability with two operations, `get` and `put`.
//! Two adapters are provided:
//!
//! - [`MemoryStore`]: bounded in-process cache backed by moka
//! - [`CacheDb`]: SQLite file via tokio-rusqlite, WAL mode, versioned migrations
//!
//! Both are safe for concurrent use and resolve racing writes by last-write-wins.

pub mod connection;
pub mod entries;
pub mod entry;
pub mod key;
pub mod memory;
pub mod migrations;
pub mod store;

pub use crate::Error;

pub use connection::CacheDb;
pub use entry::{CacheEntry, X_CACHE_TIME};
pub use key::CacheKey;
pub use memory::MemoryStore;
pub use store::CacheStore;
