//! Centralized default constants for the saga pipeline.
//!
//! All crates reference these constants instead of defining their own magic
//! numbers. Environment-driven configs fall back to these values.

// =============================================================================
// INFERENCE
// =============================================================================

/// Default OpenAI-compatible API endpoint.
pub const OPENAI_URL: &str = "https://api.openai.com/v1";

/// Default generation model.
pub const GEN_MODEL: &str = "gpt-4o-mini";

/// Timeout for generation requests in seconds.
pub const GEN_TIMEOUT_SECS: u64 = 120;

/// Completion token budget for a single-unit analysis.
pub const GEN_MAX_TOKENS: u32 = 1500;

/// Maximum characters of unit content placed in the prompt.
///
/// The content hash still covers the full text.
pub const PROMPT_CONTENT_CHARS: usize = 3000;

/// Placeholder used in prompts when a context list is empty.
pub const PROMPT_EMPTY_LIST: &str = "none";

// =============================================================================
// TASK PROCESSING
// =============================================================================

/// Default maximum number of analyses running at once.
pub const TASK_MAX_CONCURRENT: usize = 4;

/// Default per-task execution timeout in seconds (5 minutes).
pub const TASK_TIMEOUT_SECS: u64 = 300;

/// Age after which terminal tasks become eligible for cleanup.
pub const TASK_TTL_HOURS: u64 = 24;

/// Task event broadcast channel capacity.
pub const EVENT_BUS_CAPACITY: usize = 256;

// =============================================================================
// TIMELINE
// =============================================================================

/// Temporal key used when the service does not supply a year.
pub const DEFAULT_TEMPORAL_KEY: i64 = 0;

/// Label prefix for connections derived from a shared character.
pub const SHARED_CHARACTER_LABEL: &str = "shares character";

/// Label prefix for connections derived from a shared location.
pub const SHARED_LOCATION_LABEL: &str = "shares location";

// =============================================================================
// DATABASE
// =============================================================================

/// Default maximum number of connections in the pool.
pub const DB_MAX_CONNECTIONS: u32 = 10;

/// Default connection timeout in seconds.
pub const DB_CONNECT_TIMEOUT_SECS: u64 = 30;
