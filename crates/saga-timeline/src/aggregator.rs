//! Year-bucketed timeline over a scope's extracted units.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use saga_core::{Connection, ExtractedUnit};

use crate::indexer::RelationshipIndexer;

/// Units sharing one temporal key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YearBucket {
    pub year: i64,
    /// First non-empty era among the bucket's units.
    pub era: Option<String>,
    /// Units in insertion order.
    pub units: Vec<ExtractedUnit>,
}

/// Read-only aggregate returned by `get_timeline`. Recomputed per request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Timeline {
    pub scope_id: Uuid,
    /// Buckets sorted by ascending year.
    pub year_buckets: Vec<YearBucket>,
    /// Deduplicated connections by unit id; may cross buckets.
    pub connections: Vec<Connection>,
}

impl Timeline {
    pub fn unit_count(&self) -> usize {
        self.year_buckets.iter().map(|b| b.units.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.year_buckets.is_empty()
    }

    pub fn bucket(&self, year: i64) -> Option<&YearBucket> {
        self.year_buckets.iter().find(|b| b.year == year)
    }

    /// Ascending list of years present.
    pub fn years(&self) -> Vec<i64> {
        self.year_buckets.iter().map(|b| b.year).collect()
    }
}

/// Groups units by year and attaches the scope's connections.
#[derive(Debug, Clone, Default)]
pub struct TimelineAggregator {
    indexer: RelationshipIndexer,
}

impl TimelineAggregator {
    pub fn new(indexer: RelationshipIndexer) -> Self {
        Self { indexer }
    }

    pub fn indexer(&self) -> &RelationshipIndexer {
        &self.indexer
    }

    /// Build the timeline for `units`, given in insertion order.
    pub fn aggregate(&self, scope_id: Uuid, units: Vec<ExtractedUnit>) -> Timeline {
        let connections = self.indexer.connections(&units);

        let mut by_year: BTreeMap<i64, YearBucket> = BTreeMap::new();
        for unit in units {
            let bucket = by_year.entry(unit.temporal_key).or_insert_with(|| YearBucket {
                year: unit.temporal_key,
                era: None,
                units: Vec::new(),
            });
            if bucket.era.is_none() {
                bucket.era = unit
                    .era
                    .as_deref()
                    .map(str::trim)
                    .filter(|e| !e.is_empty())
                    .map(str::to_string);
            }
            bucket.units.push(unit);
        }

        let timeline = Timeline {
            scope_id,
            year_buckets: by_year.into_values().collect(),
            connections,
        };

        debug!(
            subsystem = "timeline",
            op = "aggregate",
            scope_id = %scope_id,
            buckets = timeline.year_buckets.len(),
            unit_count = timeline.unit_count(),
            connection_count = timeline.connections.len(),
            "Timeline aggregated"
        );
        timeline
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(id: u128, year: i64, era: Option<&str>) -> ExtractedUnit {
        ExtractedUnit {
            id: Uuid::from_u128(id),
            parent_unit_id: Uuid::from_u128(1000 + id),
            scope_id: Uuid::nil(),
            title: format!("u{}", id),
            description: String::new(),
            temporal_key: year,
            era: era.map(str::to_string),
            characters: vec![],
            locations: vec![],
            position: 0,
            image_seed: None,
            connections: vec![],
        }
    }

    #[test]
    fn test_buckets_ascending() {
        let tl = TimelineAggregator::default()
            .aggregate(Uuid::nil(), vec![unit(1, 3, None), unit(2, 1, None), unit(3, 2, None)]);
        assert_eq!(tl.years(), vec![1, 2, 3]);
    }

    #[test]
    fn test_insertion_order_within_bucket() {
        let tl = TimelineAggregator::default().aggregate(
            Uuid::nil(),
            vec![unit(9, 5, None), unit(3, 5, None), unit(7, 5, None)],
        );
        let ids: Vec<u128> = tl.year_buckets[0]
            .units
            .iter()
            .map(|u| u.id.as_u128())
            .collect();
        assert_eq!(ids, vec![9, 3, 7]);
    }

    #[test]
    fn test_negative_and_zero_years() {
        let tl = TimelineAggregator::default()
            .aggregate(Uuid::nil(), vec![unit(1, 0, None), unit(2, -40, None)]);
        assert_eq!(tl.years(), vec![-40, 0]);
    }

    #[test]
    fn test_era_is_first_non_empty() {
        let tl = TimelineAggregator::default().aggregate(
            Uuid::nil(),
            vec![
                unit(1, 1, None),
                unit(2, 1, Some("  ")),
                unit(3, 1, Some("Age of Fire")),
                unit(4, 1, Some("Age of Ice")),
            ],
        );
        assert_eq!(tl.year_buckets[0].era.as_deref(), Some("Age of Fire"));
    }

    #[test]
    fn test_empty_scope() {
        let tl = TimelineAggregator::default().aggregate(Uuid::nil(), vec![]);
        assert!(tl.is_empty());
        assert!(tl.connections.is_empty());
        assert_eq!(tl.unit_count(), 0);
    }
}
