//! Prompt templates for unit analysis.
//!
//! The analyzed text is sent with every line prefixed by its 0-based index so
//! that the model can report a `story_position` that maps back to a line.
//! Scope-wide prompts carry several units, each under a `=== STORY_{i} ===`
//! header with its own line numbering.

use uuid::Uuid;

use saga_core::{defaults, AnalysisContext};

/// System prompt for event extraction.
pub const EXTRACTION_SYSTEM_PROMPT: &str = "You are a literary analyst. You extract the \
important events of a story and return them as a single JSON object. Return valid JSON \
only, with no explanations or Markdown.";

/// Longest prefix of `content` holding at most `max_chars` characters.
pub fn truncate_chars(content: &str, max_chars: usize) -> &str {
    match content.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &content[..byte_idx],
        None => content,
    }
}

/// Split content into the lines the model sees.
///
/// Only `\n` separates lines; a trailing `\r` stays part of its line.
pub fn content_lines(content: &str) -> impl Iterator<Item = &str> {
    content.split('\n')
}

/// Prefix each line with its index: `"{i}| {line}"`.
pub fn number_lines(content: &str) -> String {
    content_lines(content)
        .enumerate()
        .map(|(i, line)| format!("{}| {}", i, line))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Indices of lines that contain something other than whitespace.
pub fn non_empty_line_indices(content: &str) -> Vec<i64> {
    content_lines(content)
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, _)| i as i64)
        .collect()
}

fn list_or_none(items: &[String]) -> String {
    let names: Vec<&str> = items
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect();
    if names.is_empty() {
        defaults::PROMPT_EMPTY_LIST.to_string()
    } else {
        names.join(", ")
    }
}

fn or_unspecified(value: Option<&str>) -> &str {
    value.filter(|v| !v.trim().is_empty()).unwrap_or("unspecified")
}

/// One member unit as it appears in a scope-wide prompt.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScopeSection<'a> {
    /// Position of the unit in the submitted list; the model reports it back
    /// as `story_index`.
    pub index: usize,
    pub unit_id: Uuid,
    pub title: &'a str,
    /// Already truncated to the prompt budget.
    pub content: &'a str,
}

impl ScopeSection<'_> {
    fn display_title(&self) -> String {
        match self.title.trim() {
            "" => format!("Story {}", self.index + 1),
            t => t.to_string(),
        }
    }

    /// Separator line introducing this unit's content.
    pub fn header(&self) -> String {
        format!("=== STORY_{}: {} ===", self.index, self.display_title())
    }
}

/// Build the user prompt for one unit.
///
/// `content` must already be truncated to the prompt budget.
pub fn extraction_prompt(content: &str, context: &AnalysisContext) -> String {
    let title = if context.title.trim().is_empty() {
        "(untitled)"
    } else {
        context.title.trim()
    };

    format!(
        r#"Analyze the following story and extract its main events.

Title: {title}
Genre: {genre}
Story content (every line is numbered at the start, empty lines included):
{numbered}

World information:
- Known characters: {characters}
- Known locations: {locations}
- Calendar: {calendar}

Return JSON in exactly this shape:
{{
    "events": [
        {{
            "title": "short event name (3-8 words)",
            "description": "one or two sentences",
            "year": <integer year in the world timeline>,
            "era": "era name if known",
            "characters": ["character name"],
            "locations": ["location name"],
            "story_position": <line number before the | of the line where the event happens>,
            "abstract_image_seed": "2-3 keywords"
        }}
    ],
    "connections": [
        {{
            "from_event_index": 0,
            "to_event_index": 1,
            "relation_type": "character|location|causation|temporal",
            "relation_label": "short description of the link"
        }}
    ]
}}

Rules:
- Only extract events that actually happen in the content.
- Every event names at least one character or one location.
- year is an integer inferred from the story context.
- story_position is the number printed before the | of a non-empty line; do not recount.
- Use the known names above when an event involves them.
- Do not use the world itself as a location.
"#,
        title = title,
        genre = or_unspecified(context.genre.as_deref()),
        numbered = number_lines(content),
        characters = list_or_none(&context.known_characters),
        locations = list_or_none(&context.known_locations),
        calendar = or_unspecified(context.calendar.as_deref()),
    )
}

/// Build the user prompt analyzing every section of a scope at once.
pub fn scope_extraction_prompt(
    sections: &[ScopeSection<'_>],
    context: &AnalysisContext,
) -> String {
    let story_list = sections
        .iter()
        .map(|s| format!("- STORY_{}: {}", s.index, s.display_title()))
        .collect::<Vec<_>>()
        .join("\n");
    let combined = sections
        .iter()
        .map(|s| format!("{}\n{}", s.header(), number_lines(s.content)))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"Extract the main events from ALL of the following stories. They take place in the same world.

Stories:
{story_list}

Genre: {genre}
Story contents (each story starts with a === STORY_<index> === header; its lines are numbered from 0):
{combined}

World information:
- Known characters: {characters}
- Known locations: {locations}
- Calendar: {calendar}

Return JSON in exactly this shape:
{{
    "events": [
        {{
            "story_index": <index from the STORY_<index> header of the story containing the event>,
            "title": "short event name (3-8 words)",
            "description": "one or two sentences",
            "year": <integer year in the world timeline>,
            "era": "era name if known",
            "characters": ["character name"],
            "locations": ["location name"],
            "story_position": <line number before the | within that story>,
            "abstract_image_seed": "2-3 keywords"
        }}
    ],
    "connections": [
        {{
            "from_event_index": 0,
            "to_event_index": 1,
            "relation_type": "character|location|causation|temporal",
            "relation_label": "short description of the link"
        }}
    ]
}}

Rules:
- Every event carries the story_index of the story it happens in.
- story_position is the number printed before the | of a non-empty line of that story.
- Connections may link events of the same story or of different stories.
- Use the known names above when an event involves them.
- Do not use the world itself as a location.
"#,
        story_list = story_list,
        genre = or_unspecified(context.genre.as_deref()),
        combined = combined,
        characters = list_or_none(&context.known_characters),
        locations = list_or_none(&context.known_locations),
        calendar = or_unspecified(context.calendar.as_deref()),
    )
}
