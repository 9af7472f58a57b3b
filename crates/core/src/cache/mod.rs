//! SQLite-backed store of cache generations.
//!
//! This module provides the persistent keyed store the caching agent
//! orchestrates. It supports:
//!
//! - Named generations, one per deployed version
//! - Entries keyed by request identity (method + URL), hashed with SHA-256
//! - Automatic schema migrations
//! - WAL mode for concurrent access
//!
//! Entries never expire on their own; they disappear only when their
//! generation is deleted.

pub mod connection;
pub mod entries;
pub mod generations;
pub mod key;
pub mod migrations;
pub mod store;

pub use crate::Error;

pub use connection::CacheDb;
pub use entries::EntrySummary;
pub use generations::Generation;
pub use key::RequestKey;
pub use store::CacheStore;
