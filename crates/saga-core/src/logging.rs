//! Structured logging field name constants.
//!
//! All saga crates use these names for `tracing` fields so log aggregation
//! can query the analysis pipeline consistently.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Worker panic or storage failure, requires operator attention |
//! | WARN  | Task failed, malformed service output, dropped items |
//! | INFO  | Task lifecycle (submitted, completed), backend initialisation |
//! | DEBUG | Cache decisions, prompt/response sizes, index sizes |
//! | TRACE | Per-item iteration (position snapping, bucket membership) |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Subsystem originating the log event.
/// Values: "cache", "inference", "jobs", "timeline", "db"
pub const SUBSYSTEM: &str = "subsystem";

/// Logical operation name.
/// Examples: "submit", "lookup", "invoke", "aggregate"
pub const OPERATION: &str = "op";

// ─── Entity fields ─────────────────────────────────────────────────────────

/// Analysis task UUID.
pub const TASK_ID: &str = "task_id";

/// Content unit (story) UUID being analyzed.
pub const UNIT_ID: &str = "unit_id";

/// Scope (world) UUID.
pub const SCOPE_ID: &str = "scope_id";

/// SHA-256 digest of the analyzed content.
pub const CONTENT_HASH: &str = "content_hash";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Number of extracted units produced or consumed.
pub const UNIT_COUNT: &str = "unit_count";

/// Number of connections derived.
pub const CONNECTION_COUNT: &str = "connection_count";

/// Byte length of a prompt.
pub const PROMPT_LEN: &str = "prompt_len";

/// Byte length of a model response.
pub const RESPONSE_LEN: &str = "response_len";

// ─── Inference fields ──────────────────────────────────────────────────────

/// Model name used for inference.
pub const MODEL: &str = "model";

// ─── Outcome fields ────────────────────────────────────────────────────────

/// Whether a cached analysis satisfied the request.
pub const CACHE_HIT: &str = "cache_hit";

/// Error classification of a failed operation.
pub const ERROR_KIND: &str = "error_kind";

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "error";
