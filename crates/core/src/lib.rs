//! Core types and shared functionality for stalegate.
//!
//! This crate provides:
//! - Cache keys, entries and the `CacheStore` contract
//! - In-memory (moka) and SQLite store adapters
//! - Freshness policy and retry plan
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;
pub mod policy;
pub mod retry;

pub use cache::{CacheDb, CacheEntry, CacheKey, CacheStore, MemoryStore};
pub use config::{AppConfig, ConfigError};
pub use error::Error;
pub use policy::{Freshness, FreshnessPolicy, TtlPair};
pub use retry::RetryPlan;
