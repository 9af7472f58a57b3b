//! Cache inspection MCP tools.
//!
//! This module provides read-only views of the agent's cache generations.

pub mod generations;
pub mod get;

pub use generations::{CacheGenerationsOutput, GenerationInfo, generations_impl};
pub use get::{CacheGetOutput, CacheGetParams, get_impl};
