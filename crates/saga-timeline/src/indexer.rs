//! Inverted indices over shared references and the connections they imply.

use std::collections::{BTreeMap, HashSet};

use tracing::{debug, trace};
use uuid::Uuid;

use saga_core::defaults::{SHARED_CHARACTER_LABEL, SHARED_LOCATION_LABEL};
use saga_core::{Connection, ConnectionKey, ExtractedUnit, RelationType};

/// Options controlling which structural connections are derived.
#[derive(Debug, Clone, Default)]
pub struct IndexerOptions {
    /// Location refs (compared case-insensitively) that never link units,
    /// such as the name of the scope itself.
    pub excluded_locations: HashSet<String>,
    /// Only link units whose parents differ.
    pub cross_parent_only: bool,
}

impl IndexerOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn exclude_location(mut self, name: impl AsRef<str>) -> Self {
        let key = normalize(name.as_ref());
        if !key.is_empty() {
            self.excluded_locations.insert(key);
        }
        self
    }

    pub fn with_cross_parent_only(mut self, enabled: bool) -> Self {
        self.cross_parent_only = enabled;
        self
    }

    fn is_excluded(&self, key: &str) -> bool {
        self.excluded_locations.contains(key)
    }
}

fn normalize(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Units sharing one reference.
#[derive(Debug, Clone, PartialEq)]
pub struct Bucket {
    /// Spelling of the reference as first seen.
    pub display: String,
    /// Members in insertion order, without duplicates.
    pub units: Vec<Uuid>,
}

/// Map from a normalized reference to the units that mention it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InvertedIndex {
    buckets: BTreeMap<String, Bucket>,
}

impl InvertedIndex {
    pub fn insert(&mut self, reference: &str, unit_id: Uuid) {
        let key = normalize(reference);
        if key.is_empty() {
            return;
        }
        let bucket = self.buckets.entry(key).or_insert_with(|| Bucket {
            display: reference.trim().to_string(),
            units: Vec::new(),
        });
        if !bucket.units.contains(&unit_id) {
            bucket.units.push(unit_id);
        }
    }

    /// Members of the bucket for `reference`, if any.
    pub fn get(&self, reference: &str) -> Option<&Bucket> {
        self.buckets.get(&normalize(reference))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Bucket)> {
        self.buckets.iter()
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}

/// Character and location indices for one scope.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RelationshipIndex {
    pub characters: InvertedIndex,
    pub locations: InvertedIndex,
}

/// Derives Character and Location connections from shared references.
#[derive(Debug, Clone, Default)]
pub struct RelationshipIndexer {
    options: IndexerOptions,
}

impl RelationshipIndexer {
    pub fn new(options: IndexerOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &IndexerOptions {
        &self.options
    }

    /// Build the inverted indices. Excluded locations are left out.
    pub fn build_index(&self, units: &[ExtractedUnit]) -> RelationshipIndex {
        let mut index = RelationshipIndex::default();
        for unit in units {
            for name in &unit.characters {
                index.characters.insert(name, unit.id);
            }
            for name in &unit.locations {
                if !self.options.is_excluded(&normalize(name)) {
                    index.locations.insert(name, unit.id);
                }
            }
        }
        index
    }

    /// Every connection in scope: structural Character/Location links plus
    /// the explicit links carried by the units themselves.
    ///
    /// The result has no self-loops and at most one entry per unordered pair
    /// and relation type. Explicit links whose endpoints are not both in
    /// `units` are dropped.
    pub fn connections(&self, units: &[ExtractedUnit]) -> Vec<Connection> {
        let index = self.build_index(units);
        let parent_of: BTreeMap<Uuid, Uuid> =
            units.iter().map(|u| (u.id, u.parent_unit_id)).collect();

        let mut seen: HashSet<ConnectionKey> = HashSet::new();
        let mut out = Vec::new();

        self.link_buckets(
            &index.characters,
            RelationType::Character,
            SHARED_CHARACTER_LABEL,
            &parent_of,
            &mut seen,
            &mut out,
        );
        self.link_buckets(
            &index.locations,
            RelationType::Location,
            SHARED_LOCATION_LABEL,
            &parent_of,
            &mut seen,
            &mut out,
        );
        let structural = out.len();

        for unit in units {
            for conn in &unit.connections {
                if conn.from_id == conn.to_id
                    || !parent_of.contains_key(&conn.from_id)
                    || !parent_of.contains_key(&conn.to_id)
                {
                    continue;
                }
                // normalize in case the stored pair is not canonical
                let Some(conn) = Connection::between(
                    conn.from_id,
                    conn.to_id,
                    conn.relation_type,
                    conn.label.clone(),
                ) else {
                    continue;
                };
                if seen.insert(conn.key()) {
                    out.push(conn);
                }
            }
        }

        debug!(
            subsystem = "timeline",
            op = "index",
            unit_count = units.len(),
            characters = index.characters.len(),
            locations = index.locations.len(),
            structural,
            explicit = out.len() - structural,
            "Derived connections"
        );
        out
    }

    fn link_buckets(
        &self,
        index: &InvertedIndex,
        relation_type: RelationType,
        label: &str,
        parent_of: &BTreeMap<Uuid, Uuid>,
        seen: &mut HashSet<ConnectionKey>,
        out: &mut Vec<Connection>,
    ) {
        for (_, bucket) in index.iter() {
            trace!(reference = %bucket.display, members = bucket.units.len(), "Linking bucket");
            for (i, &a) in bucket.units.iter().enumerate() {
                for &b in &bucket.units[i + 1..] {
                    if self.options.cross_parent_only && parent_of.get(&a) == parent_of.get(&b) {
                        continue;
                    }
                    let Some(conn) = Connection::between(
                        a,
                        b,
                        relation_type,
                        format!("{} {}", label, bucket.display),
                    ) else {
                        continue;
                    };
                    if seen.insert(conn.key()) {
                        out.push(conn);
                    }
                }
            }
        }
    }
}
