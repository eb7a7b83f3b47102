//! Data models for analysis tasks, cached results, and extracted units.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::error::{Error, ErrorKind, Result};

// =============================================================================
// ANALYSIS TASKS
// =============================================================================

/// Lifecycle state of an analysis task.
///
/// `Pending` moves to exactly one of the terminal states and never back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Completed,
    Failed,
}

impl TaskStatus {
    /// Whether this status is final.
    pub fn is_terminal(self) -> bool {
        !matches!(self, TaskStatus::Pending)
    }
}

/// Classified failure attached to a Failed task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskError {
    pub kind: ErrorKind,
    pub message: String,
}

impl TaskError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl From<&Error> for TaskError {
    fn from(e: &Error) -> Self {
        Self::new(e.kind(), e.to_string())
    }
}

impl From<Error> for TaskError {
    fn from(e: Error) -> Self {
        Self::from(&e)
    }
}

/// Units extracted by one completed analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisOutput {
    pub unit_id: Uuid,
    pub content_hash: String,
    pub model_used: String,
    pub units: Vec<ExtractedUnit>,
}

/// Caller-visible record of one analysis request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisTask {
    pub task_id: Uuid,
    pub unit_id: Uuid,
    pub status: TaskStatus,
    pub result: Option<AnalysisOutput>,
    pub error: Option<TaskError>,
    /// True when the result came from the content cache without a service call.
    pub cache_hit: bool,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl AnalysisTask {
    /// A freshly submitted task.
    pub fn pending(task_id: Uuid, unit_id: Uuid) -> Self {
        Self {
            task_id,
            unit_id,
            status: TaskStatus::Pending,
            result: None,
            error: None,
            cache_hit: false,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    /// The Completed record that follows this one.
    pub fn completed(&self, output: AnalysisOutput, cache_hit: bool) -> Self {
        Self {
            status: TaskStatus::Completed,
            result: Some(output),
            error: None,
            cache_hit,
            completed_at: Some(Utc::now()),
            ..self.clone()
        }
    }

    /// The Failed record that follows this one.
    pub fn failed(&self, error: TaskError) -> Self {
        Self {
            status: TaskStatus::Failed,
            result: None,
            error: Some(error),
            cache_hit: false,
            completed_at: Some(Utc::now()),
            ..self.clone()
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// One member of a scope-wide analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScopeUnit {
    pub unit_id: Uuid,
    #[serde(default)]
    pub title: String,
    pub content: String,
}

impl ScopeUnit {
    pub fn new(unit_id: Uuid, content: impl Into<String>) -> Self {
        Self {
            unit_id,
            title: String::new(),
            content: content.into(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }
}

/// Caller-supplied context sent with an analysis request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisContext {
    /// Scope (world) the unit belongs to.
    pub scope_id: Uuid,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub genre: Option<String>,
    #[serde(default)]
    pub known_characters: Vec<String>,
    #[serde(default)]
    pub known_locations: Vec<String>,
    /// Free-form calendar description (era, current year, year naming).
    #[serde(default)]
    pub calendar: Option<String>,
}

impl AnalysisContext {
    pub fn new(scope_id: Uuid) -> Self {
        Self {
            scope_id,
            ..Default::default()
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_genre(mut self, genre: impl Into<String>) -> Self {
        self.genre = Some(genre.into());
        self
    }

    pub fn with_known_characters<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.known_characters = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_known_locations<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.known_locations = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_calendar(mut self, calendar: impl Into<String>) -> Self {
        self.calendar = Some(calendar.into());
        self
    }
}

// =============================================================================
// CONTENT CACHE
// =============================================================================

/// Memoized analysis of one exact revision of a unit's content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub unit_id: Uuid,
    /// Hex SHA-256 of the analyzed text.
    pub content_hash: String,
    /// Unparsed structured output of the service.
    pub raw_result: JsonValue,
    /// Number of items in the raw `events` array, blank ones included.
    pub derived_count: i32,
    pub analyzed_at: DateTime<Utc>,
    pub model_used: String,
}

impl CacheEntry {
    /// Build an entry stamped with the current time.
    pub fn new(
        unit_id: Uuid,
        content_hash: impl Into<String>,
        raw_result: JsonValue,
        model_used: impl Into<String>,
    ) -> Self {
        let derived_count = derived_count_of(&raw_result);
        Self {
            unit_id,
            content_hash: content_hash.into(),
            raw_result,
            derived_count,
            analyzed_at: Utc::now(),
            model_used: model_used.into(),
        }
    }

    /// Re-parse the stored raw result.
    ///
    /// A stored payload that no longer validates is reported as
    /// [`Error::MalformedResponse`] so the caller can force a refresh.
    pub fn parse(&self) -> Result<AnalysisResult> {
        AnalysisResult::from_raw(&self.raw_result)
    }
}

/// Number of items in a raw result's `events` array.
///
/// This is a raw item count: blank items that extraction drops are included.
pub fn derived_count_of(raw: &JsonValue) -> i32 {
    raw.get("events")
        .and_then(|v| v.as_array())
        .map(|a| i32::try_from(a.len()).unwrap_or(i32::MAX))
        .unwrap_or(0)
}

// =============================================================================
// SERVICE RESULT SCHEMA
// =============================================================================

/// Typed view of the language-model output.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub events: Vec<ExtractedItem>,
    #[serde(default)]
    pub connections: Vec<ItemRelation>,
}

/// One item the service extracted from the unit content.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractedItem {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, alias = "temporal_key", deserialize_with = "lenient_i64")]
    pub year: i64,
    #[serde(default)]
    pub era: Option<String>,
    #[serde(default)]
    pub characters: Vec<String>,
    #[serde(default)]
    pub locations: Vec<String>,
    #[serde(default, alias = "position")]
    pub story_position: Option<i64>,
    #[serde(default)]
    pub abstract_image_seed: Option<String>,
    /// Member the item belongs to, in a scope-wide analysis.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub story_index: Option<i64>,
}

impl ExtractedItem {
    /// Items with neither a title nor a description carry no information.
    pub fn is_blank(&self) -> bool {
        self.title.trim().is_empty() && self.description.trim().is_empty()
    }
}

/// Explicit relation between two items of the same result, by index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemRelation {
    pub from_event_index: usize,
    pub to_event_index: usize,
    #[serde(default)]
    pub relation_type: Option<String>,
    #[serde(default)]
    pub relation_label: String,
}

impl AnalysisResult {
    /// Validate a raw JSON payload against the result schema.
    pub fn from_raw(raw: &JsonValue) -> Result<Self> {
        let obj = raw
            .as_object()
            .ok_or_else(|| Error::MalformedResponse("expected a JSON object".to_string()))?;
        if !obj.get("events").is_some_and(JsonValue::is_array) {
            return Err(Error::MalformedResponse(
                "missing `events` array".to_string(),
            ));
        }
        serde_json::from_value(raw.clone()).map_err(|e| Error::MalformedResponse(e.to_string()))
    }

    /// Parse the text body returned by the service.
    ///
    /// Returns the typed result together with the raw JSON that should be
    /// cached.
    pub fn parse_text(text: &str) -> Result<(Self, JsonValue)> {
        let cleaned = strip_code_fences(text);
        let raw: JsonValue = serde_json::from_str(cleaned)
            .map_err(|e| Error::MalformedResponse(format!("invalid JSON: {}", e)))?;
        let parsed = Self::from_raw(&raw)?;
        Ok((parsed, raw))
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// Remove a surrounding Markdown code fence, if any.
pub fn strip_code_fences(text: &str) -> &str {
    text.trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim()
}

fn lenient_i64<'de, D>(deserializer: D) -> std::result::Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error as _;

    match JsonValue::deserialize(deserializer)? {
        JsonValue::Null => Ok(0),
        JsonValue::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f.round() as i64))
            .ok_or_else(|| D::Error::custom("year out of range")),
        JsonValue::String(s) => s
            .trim()
            .parse::<i64>()
            .map_err(|_| D::Error::custom(format!("year is not an integer: {:?}", s))),
        other => Err(D::Error::custom(format!(
            "year must be an integer, got {}",
            other
        ))),
    }
}

// =============================================================================
// EXTRACTED UNITS AND CONNECTIONS
// =============================================================================

/// Why two units relate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelationType {
    Character,
    Location,
    Causation,
    Temporal,
}

impl RelationType {
    /// Map a free-form relation label from the service.
    ///
    /// Unknown or missing labels fall back to `Temporal`.
    pub fn from_label(label: Option<&str>) -> Self {
        match label.map(|s| s.trim().to_lowercase()).as_deref() {
            Some("character") => RelationType::Character,
            Some("location") => RelationType::Location,
            Some("causation" | "causal" | "cause") => RelationType::Causation,
            _ => RelationType::Temporal,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RelationType::Character => "character",
            RelationType::Location => "location",
            RelationType::Causation => "causation",
            RelationType::Temporal => "temporal",
        }
    }
}

/// Identity of a connection: canonical endpoint pair plus type.
pub type ConnectionKey = (Uuid, Uuid, RelationType);

/// Relation between two units, stored with `from_id < to_id`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Connection {
    pub from_id: Uuid,
    pub to_id: Uuid,
    pub relation_type: RelationType,
    pub label: String,
}

impl Connection {
    /// Canonical connection between `a` and `b`; `None` for a self-loop.
    pub fn between(
        a: Uuid,
        b: Uuid,
        relation_type: RelationType,
        label: impl Into<String>,
    ) -> Option<Self> {
        if a == b {
            return None;
        }
        let (from_id, to_id) = if a < b { (a, b) } else { (b, a) };
        Some(Self {
            from_id,
            to_id,
            relation_type,
            label: label.into(),
        })
    }

    pub fn key(&self) -> ConnectionKey {
        (self.from_id, self.to_id, self.relation_type)
    }

    /// Whether `id` is one of the endpoints.
    pub fn touches(&self, id: Uuid) -> bool {
        self.from_id == id || self.to_id == id
    }
}

/// Structured item derived from one analyzed unit (an event of a story).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedUnit {
    pub id: Uuid,
    pub parent_unit_id: Uuid,
    #[serde(alias = "world_id")]
    pub scope_id: Uuid,
    pub title: String,
    pub description: String,
    /// Year in the scope's timeline.
    pub temporal_key: i64,
    pub era: Option<String>,
    pub characters: Vec<String>,
    pub locations: Vec<String>,
    /// Line index into the parent content.
    pub position: i64,
    #[serde(default)]
    pub image_seed: Option<String>,
    #[serde(default)]
    pub connections: Vec<Connection>,
}

impl ExtractedUnit {
    /// Attach a connection unless one with the same key is already present.
    pub fn add_connection(&mut self, connection: Connection) -> bool {
        let key = connection.key();
        if self.connections.iter().any(|c| c.key() == key) {
            return false;
        }
        self.connections.push(connection);
        true
    }
}
