//! Core traits for saga abstractions.
//!
//! These traits define the interfaces that concrete implementations must
//! satisfy, enabling pluggable backends and testability.

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::error::Result;
use crate::models::*;

// =============================================================================
// INFERENCE TRAITS
// =============================================================================

/// Backend for text generation.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Generate text given a prompt.
    async fn generate(&self, prompt: &str) -> Result<String>;

    /// Generate text with system context.
    async fn generate_with_system(&self, system: &str, prompt: &str) -> Result<String>;

    /// Generate a reply constrained to a JSON object.
    ///
    /// Backends without a structured-output mode fall back to plain
    /// generation; the caller still validates the reply.
    async fn generate_json(&self, system: &str, prompt: &str) -> Result<String> {
        self.generate_with_system(system, prompt).await
    }

    /// Get the model name being used.
    fn model_name(&self) -> &str;

    /// Check if the backend is available and responding.
    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }
}

// =============================================================================
// STORAGE TRAITS
// =============================================================================

/// Durable memo of analysis results keyed by `(unit_id, content_hash)`.
#[async_trait]
pub trait ContentCache: Send + Sync {
    /// Fetch the entry for exactly this revision of the unit.
    async fn lookup(&self, unit_id: Uuid, content_hash: &str) -> Result<Option<CacheEntry>>;

    /// Insert or overwrite the entry for `(unit_id, content_hash)`.
    async fn store(
        &self,
        unit_id: Uuid,
        content_hash: &str,
        raw_result: JsonValue,
        model_used: &str,
    ) -> Result<CacheEntry>;

    /// Remove every entry for the unit. Returns the number removed.
    async fn invalidate(&self, unit_id: Uuid) -> Result<u64>;

    /// Most recently stored entry for the unit, regardless of hash.
    async fn latest(&self, unit_id: Uuid) -> Result<Option<CacheEntry>>;

    /// All entries for the unit, newest first.
    async fn entries(&self, unit_id: Uuid) -> Result<Vec<CacheEntry>>;
}

/// Storage for units extracted from analyzed content.
#[async_trait]
pub trait UnitRepository: Send + Sync {
    /// Atomically replace every unit derived from `parent_unit_id`.
    async fn replace_for_parent(&self, parent_unit_id: Uuid, units: &[ExtractedUnit])
        -> Result<()>;

    /// All units in a scope, in insertion order.
    async fn list_by_scope(&self, scope_id: Uuid) -> Result<Vec<ExtractedUnit>>;

    /// Units derived from one parent, in extraction order.
    async fn list_by_parent(&self, parent_unit_id: Uuid) -> Result<Vec<ExtractedUnit>>;

    /// Fetch a single unit.
    async fn get(&self, id: Uuid) -> Result<Option<ExtractedUnit>>;

    /// Delete every unit derived from `parent_unit_id`. Returns the number removed.
    async fn delete_for_parent(&self, parent_unit_id: Uuid) -> Result<u64>;
}
