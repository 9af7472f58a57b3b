//! Core types and shared functionality for appshell.
//!
//! This crate provides:
//! - Cache generations and entries with a SQLite backend
//! - Request/response snapshot types shared by the agent and its hosts
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;
pub mod resource;

pub use cache::{CacheDb, CacheStore, Generation, RequestKey};
pub use config::{AppConfig, ConfigError, InstallPolicy};
pub use error::Error;
pub use resource::{Method, RequestMode, ResourceRequest, ResponseKind, ResponseSnapshot};
