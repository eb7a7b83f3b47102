//! # saga-timeline
//!
//! Relationship inference and timeline aggregation over extracted units.
//!
//! - [`RelationshipIndexer`] builds character and location inverted indices
//!   for a scope and derives pairwise connections from shared buckets.
//! - [`TimelineAggregator`] groups units by year and attaches the scope's
//!   deduplicated connection list.

pub mod aggregator;
pub mod indexer;

pub use aggregator::{Timeline, TimelineAggregator, YearBucket};
pub use indexer::{Bucket, IndexerOptions, InvertedIndex, RelationshipIndex, RelationshipIndexer};
