//! # saga-core
//!
//! Core types, traits, and abstractions for the saga analysis pipeline.
//!
//! This crate provides the foundational data structures (tasks, cache
//! entries, extracted units, connections), the error taxonomy, and the
//! repository/backend traits that the other saga crates depend on.

pub mod defaults;
pub mod error;
pub mod hashing;
pub mod logging;
pub mod models;
pub mod traits;
pub mod uuid_utils;

// Re-export commonly used types at crate root
pub use error::{Error, ErrorKind, Result};
pub use hashing::{content_hash, is_content_hash};
pub use models::*;
pub use traits::*;
pub use uuid_utils::{new_v7, scope_cache_id, unit_id_for};
