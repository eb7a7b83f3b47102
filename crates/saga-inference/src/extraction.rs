//! Conversion of a validated analysis result into extracted units.
//!
//! [`extract_units`] is a pure function: the same result, parent, hash,
//! content and context always produce the same units with the same ids. Cache
//! hits rely on this to return exactly what the original analysis returned.
//! [`extract_scope_units`] does the same for a scope-wide result, routing each
//! item to the member unit named by its `story_index`.

use std::collections::{HashMap, HashSet};

use tracing::{debug, trace, warn};
use uuid::Uuid;

use saga_core::{
    unit_id_for, AnalysisContext, AnalysisResult, Connection, ConnectionKey, ExtractedItem,
    ExtractedUnit, RelationType,
};

use crate::prompts::{non_empty_line_indices, ScopeSection};

/// Case-insensitive lookup from a name to its canonical spelling.
struct NameTable {
    canonical: HashMap<String, String>,
}

impl NameTable {
    fn new(known: &[String]) -> Self {
        let mut canonical = HashMap::with_capacity(known.len());
        for name in known {
            let trimmed = name.trim();
            if !trimmed.is_empty() {
                canonical
                    .entry(trimmed.to_lowercase())
                    .or_insert_with(|| trimmed.to_string());
            }
        }
        Self { canonical }
    }

    /// Canonicalize, trim and de-duplicate names, keeping first-seen order.
    fn resolve(&self, names: &[String]) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut out = Vec::with_capacity(names.len());
        for name in names {
            let trimmed = name.trim();
            if trimmed.is_empty() {
                continue;
            }
            let key = trimmed.to_lowercase();
            if !seen.insert(key.clone()) {
                continue;
            }
            let resolved = self
                .canonical
                .get(&key)
                .cloned()
                .unwrap_or_else(|| trimmed.to_string());
            out.push(resolved);
        }
        out
    }
}

/// Snap `position` to the nearest non-empty line; ties go to the lower index.
pub fn snap_position(position: i64, non_empty: &[i64]) -> i64 {
    if non_empty.is_empty() || non_empty.binary_search(&position).is_ok() {
        return position;
    }
    non_empty
        .iter()
        .copied()
        .min_by_key(|&line| ((line - position).abs(), line))
        .unwrap_or(position)
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Parent unit an item is attributed to, with the non-empty lines of the
/// text the model saw for that parent.
struct Target {
    parent_unit_id: Uuid,
    non_empty: Vec<i64>,
}

/// Build the units described by `result`.
///
/// `analyzed_content` is the text the model saw (after truncation); item
/// positions are interpreted as line indices into it. Items with neither a
/// title nor a description are dropped. Explicit relations whose endpoints
/// were dropped, are out of range, or coincide are ignored.
pub fn extract_units(
    result: &AnalysisResult,
    parent_unit_id: Uuid,
    content_hash: &str,
    analyzed_content: &str,
    context: &AnalysisContext,
) -> Vec<ExtractedUnit> {
    let targets = [Target {
        parent_unit_id,
        non_empty: non_empty_line_indices(analyzed_content),
    }];
    let units = assemble(result, &targets, content_hash, context, |_, _| Some(0));
    debug!(
        parent_unit_id = %parent_unit_id,
        unit_count = units.len(),
        dropped = result.events.len() - units.len(),
        "Extracted units"
    );
    units
}

/// Build the units described by a scope-wide `result`.
///
/// Each item belongs to the section whose `index` equals its `story_index`
/// (0 when absent); items naming no section are dropped. Positions are line
/// indices into that section's content. Relations may join items of
/// different sections.
pub fn extract_scope_units(
    result: &AnalysisResult,
    sections: &[ScopeSection<'_>],
    content_hash: &str,
    context: &AnalysisContext,
) -> Vec<ExtractedUnit> {
    let targets: Vec<Target> = sections
        .iter()
        .map(|s| Target {
            parent_unit_id: s.unit_id,
            non_empty: non_empty_line_indices(s.content),
        })
        .collect();
    let by_story: HashMap<i64, usize> = sections
        .iter()
        .enumerate()
        .map(|(slot, s)| (s.index as i64, slot))
        .collect();

    let units = assemble(result, &targets, content_hash, context, |index, item| {
        let story = item.story_index.unwrap_or(0);
        let slot = by_story.get(&story).copied();
        if slot.is_none() {
            warn!(index, story_index = story, "Skipping item with unknown story index");
        }
        slot
    });
    debug!(
        scope_id = %context.scope_id,
        section_count = sections.len(),
        unit_count = units.len(),
        dropped = result.events.len() - units.len(),
        "Extracted scope units"
    );
    units
}

/// Shared construction: `locate` picks the target of each item, or `None`
/// to drop it.
fn assemble(
    result: &AnalysisResult,
    targets: &[Target],
    content_hash: &str,
    context: &AnalysisContext,
    locate: impl Fn(usize, &ExtractedItem) -> Option<usize>,
) -> Vec<ExtractedUnit> {
    let characters = NameTable::new(&context.known_characters);
    let locations = NameTable::new(&context.known_locations);

    let mut units: Vec<ExtractedUnit> = Vec::with_capacity(result.events.len());
    // item index in the result -> slot in `units`
    let mut slots: HashMap<usize, usize> = HashMap::with_capacity(result.events.len());

    for (index, item) in result.events.iter().enumerate() {
        if item.is_blank() {
            debug!(index, "Skipping empty item");
            continue;
        }
        let Some(target) = locate(index, item).and_then(|t| targets.get(t)) else {
            continue;
        };
        let unit = build_unit(
            index,
            item,
            target.parent_unit_id,
            content_hash,
            context.scope_id,
            &characters,
            &locations,
            &target.non_empty,
        );
        slots.insert(index, units.len());
        units.push(unit);
    }

    // A relation and its mirror canonicalize to one key; keep whichever
    // comes first even when they were listed on different items.
    let mut seen: HashSet<ConnectionKey> = HashSet::new();
    for relation in &result.connections {
        let (Some(&from_slot), Some(&to_slot)) = (
            slots.get(&relation.from_event_index),
            slots.get(&relation.to_event_index),
        ) else {
            trace!(
                from = relation.from_event_index,
                to = relation.to_event_index,
                "Ignoring relation to missing item"
            );
            continue;
        };
        let relation_type = RelationType::from_label(relation.relation_type.as_deref());
        let Some(connection) = Connection::between(
            units[from_slot].id,
            units[to_slot].id,
            relation_type,
            relation.relation_label.trim(),
        ) else {
            continue;
        };
        if seen.insert(connection.key()) {
            units[from_slot].add_connection(connection);
        }
    }

    debug!(connection_count = seen.len(), "Resolved explicit relations");
    units
}

#[allow(clippy::too_many_arguments)]
fn build_unit(
    index: usize,
    item: &ExtractedItem,
    parent_unit_id: Uuid,
    content_hash: &str,
    scope_id: Uuid,
    characters: &NameTable,
    locations: &NameTable,
    non_empty: &[i64],
) -> ExtractedUnit {
    let title = match item.title.trim() {
        "" => format!("Event {}", index + 1),
        t => t.to_string(),
    };
    let hint = item.story_position.unwrap_or(index as i64);
    let position = snap_position(hint, non_empty);
    if position != hint {
        trace!(index, hint, position, "Snapped position to non-empty line");
    }

    ExtractedUnit {
        id: unit_id_for(parent_unit_id, content_hash, index),
        parent_unit_id,
        scope_id,
        title,
        description: item.description.trim().to_string(),
        temporal_key: item.year,
        era: non_blank(item.era.as_deref()),
        characters: characters.resolve(&item.characters),
        locations: locations.resolve(&item.locations),
        position,
        image_seed: non_blank(item.abstract_image_seed.as_deref()),
        connections: Vec::new(),
    }
}
