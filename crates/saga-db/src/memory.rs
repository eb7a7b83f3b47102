//! In-process implementations of the storage traits.
//!
//! These back the analysis service when no database is configured and in
//! tests. Data lives for the lifetime of the value.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use saga_core::{CacheEntry, ContentCache, Error, ExtractedUnit, Result, UnitRepository};

#[derive(Debug, Default)]
struct UnitHistory {
    by_hash: HashMap<String, CacheEntry>,
    /// Hashes in store order, most recent last.
    order: Vec<String>,
}

/// In-memory [`ContentCache`] keyed by `(unit_id, content_hash)`.
#[derive(Debug, Default)]
pub struct MemoryContentCache {
    units: RwLock<HashMap<Uuid, UnitHistory>>,
}

impl MemoryContentCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of entries across all units.
    pub async fn len(&self) -> usize {
        self.units
            .read()
            .await
            .values()
            .map(|h| h.by_hash.len())
            .sum()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl ContentCache for MemoryContentCache {
    async fn lookup(&self, unit_id: Uuid, content_hash: &str) -> Result<Option<CacheEntry>> {
        let units = self.units.read().await;
        let entry = units
            .get(&unit_id)
            .and_then(|h| h.by_hash.get(content_hash))
            .cloned();
        debug!(
            subsystem = "cache",
            op = "lookup",
            unit_id = %unit_id,
            content_hash = %content_hash,
            cache_hit = entry.is_some(),
            "Cache lookup"
        );
        Ok(entry)
    }

    async fn store(
        &self,
        unit_id: Uuid,
        content_hash: &str,
        raw_result: JsonValue,
        model_used: &str,
    ) -> Result<CacheEntry> {
        let entry = CacheEntry::new(unit_id, content_hash, raw_result, model_used);

        let mut units = self.units.write().await;
        let history = units.entry(unit_id).or_default();
        history.order.retain(|h| h != content_hash);
        history.order.push(content_hash.to_string());
        history
            .by_hash
            .insert(content_hash.to_string(), entry.clone());

        debug!(
            subsystem = "cache",
            op = "store",
            unit_id = %unit_id,
            content_hash = %content_hash,
            unit_count = entry.derived_count,
            "Cache entry stored"
        );
        Ok(entry)
    }

    async fn invalidate(&self, unit_id: Uuid) -> Result<u64> {
        let removed = self
            .units
            .write()
            .await
            .remove(&unit_id)
            .map(|h| h.by_hash.len() as u64)
            .unwrap_or(0);
        debug!(subsystem = "cache", op = "invalidate", unit_id = %unit_id, removed, "Cache invalidated");
        Ok(removed)
    }

    async fn latest(&self, unit_id: Uuid) -> Result<Option<CacheEntry>> {
        let units = self.units.read().await;
        Ok(units.get(&unit_id).and_then(|h| {
            h.order
                .last()
                .and_then(|hash| h.by_hash.get(hash))
                .cloned()
        }))
    }

    async fn entries(&self, unit_id: Uuid) -> Result<Vec<CacheEntry>> {
        let units = self.units.read().await;
        Ok(units
            .get(&unit_id)
            .map(|h| {
                h.order
                    .iter()
                    .rev()
                    .filter_map(|hash| h.by_hash.get(hash).cloned())
                    .collect()
            })
            .unwrap_or_default())
    }
}

/// In-memory [`UnitRepository`] preserving insertion order.
#[derive(Debug, Default)]
pub struct MemoryUnitRepository {
    units: RwLock<Vec<ExtractedUnit>>,
}

impl MemoryUnitRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UnitRepository for MemoryUnitRepository {
    async fn replace_for_parent(
        &self,
        parent_unit_id: Uuid,
        units: &[ExtractedUnit],
    ) -> Result<()> {
        if let Some(stray) = units.iter().find(|u| u.parent_unit_id != parent_unit_id) {
            return Err(Error::InvalidInput(format!(
                "unit {} belongs to parent {}, not {}",
                stray.id, stray.parent_unit_id, parent_unit_id
            )));
        }

        let mut stored = self.units.write().await;
        let before = stored.len();
        stored.retain(|u| u.parent_unit_id != parent_unit_id);
        let removed = before - stored.len();
        stored.extend(units.iter().cloned());

        debug!(
            subsystem = "db",
            op = "replace_units",
            unit_id = %parent_unit_id,
            removed,
            unit_count = units.len(),
            "Replaced extracted units"
        );
        Ok(())
    }

    async fn list_by_scope(&self, scope_id: Uuid) -> Result<Vec<ExtractedUnit>> {
        Ok(self
            .units
            .read()
            .await
            .iter()
            .filter(|u| u.scope_id == scope_id)
            .cloned()
            .collect())
    }

    async fn list_by_parent(&self, parent_unit_id: Uuid) -> Result<Vec<ExtractedUnit>> {
        Ok(self
            .units
            .read()
            .await
            .iter()
            .filter(|u| u.parent_unit_id == parent_unit_id)
            .cloned()
            .collect())
    }

    async fn get(&self, id: Uuid) -> Result<Option<ExtractedUnit>> {
        Ok(self.units.read().await.iter().find(|u| u.id == id).cloned())
    }

    async fn delete_for_parent(&self, parent_unit_id: Uuid) -> Result<u64> {
        let mut stored = self.units.write().await;
        let before = stored.len();
        stored.retain(|u| u.parent_unit_id != parent_unit_id);
        Ok((before - stored.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn unit(id: u128, parent: u128, scope: u128) -> ExtractedUnit {
        ExtractedUnit {
            id: Uuid::from_u128(id),
            parent_unit_id: Uuid::from_u128(parent),
            scope_id: Uuid::from_u128(scope),
            title: format!("unit {}", id),
            description: String::new(),
            temporal_key: 0,
            era: None,
            characters: vec![],
            locations: vec![],
            position: 0,
            image_seed: None,
            connections: vec![],
        }
    }

    #[tokio::test]
    async fn test_lookup_miss_on_cold_cache() {
        let cache = MemoryContentCache::new();
        assert!(cache.lookup(Uuid::nil(), "h").await.unwrap().is_none());
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_store_then_lookup() {
        let cache = MemoryContentCache::new();
        let unit_id = Uuid::from_u128(1);
        let stored = cache
            .store(unit_id, "h1", json!({"events": [{}]}), "m")
            .await
            .unwrap();
        assert_eq!(stored.derived_count, 1);

        let found = cache.lookup(unit_id, "h1").await.unwrap().unwrap();
        assert_eq!(found, stored);
        assert!(cache.lookup(unit_id, "h2").await.unwrap().is_none());
        assert!(cache.lookup(Uuid::from_u128(2), "h1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_new_hash_keeps_history() {
        let cache = MemoryContentCache::new();
        let unit_id = Uuid::from_u128(1);
        cache.store(unit_id, "h1", json!({"events": []}), "m").await.unwrap();
        cache.store(unit_id, "h2", json!({"events": []}), "m").await.unwrap();

        assert!(cache.lookup(unit_id, "h1").await.unwrap().is_some());
        assert_eq!(cache.latest(unit_id).await.unwrap().unwrap().content_hash, "h2");
        let hashes: Vec<String> = cache
            .entries(unit_id)
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.content_hash)
            .collect();
        assert_eq!(hashes, vec!["h2", "h1"]);
    }

    #[tokio::test]
    async fn test_store_same_key_overwrites() {
        let cache = MemoryContentCache::new();
        let unit_id = Uuid::from_u128(1);
        cache.store(unit_id, "h1", json!({"events": []}), "old").await.unwrap();
        cache.store(unit_id, "h2", json!({"events": []}), "m").await.unwrap();
        cache
            .store(unit_id, "h1", json!({"events": [{}, {}]}), "new")
            .await
            .unwrap();

        let entry = cache.lookup(unit_id, "h1").await.unwrap().unwrap();
        assert_eq!(entry.model_used, "new");
        assert_eq!(entry.derived_count, 2);
        assert_eq!(cache.len().await, 2);
        assert_eq!(cache.latest(unit_id).await.unwrap().unwrap().content_hash, "h1");
    }

    #[tokio::test]
    async fn test_invalidate_removes_all_hashes() {
        let cache = MemoryContentCache::new();
        let unit_id = Uuid::from_u128(1);
        cache.store(unit_id, "h1", json!({"events": []}), "m").await.unwrap();
        cache.store(unit_id, "h2", json!({"events": []}), "m").await.unwrap();
        cache
            .store(Uuid::from_u128(2), "h1", json!({"events": []}), "m")
            .await
            .unwrap();

        assert_eq!(cache.invalidate(unit_id).await.unwrap(), 2);
        assert!(cache.lookup(unit_id, "h1").await.unwrap().is_none());
        assert!(cache.latest(unit_id).await.unwrap().is_none());
        assert!(cache.lookup(Uuid::from_u128(2), "h1").await.unwrap().is_some());
        assert_eq!(cache.invalidate(unit_id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_replace_for_parent_keeps_insertion_order() {
        let repo = MemoryUnitRepository::new();
        repo.replace_for_parent(Uuid::from_u128(10), &[unit(1, 10, 99), unit(2, 10, 99)])
            .await
            .unwrap();
        repo.replace_for_parent(Uuid::from_u128(20), &[unit(3, 20, 99)])
            .await
            .unwrap();

        let ids: Vec<u128> = repo
            .list_by_scope(Uuid::from_u128(99))
            .await
            .unwrap()
            .iter()
            .map(|u| u.id.as_u128())
            .collect();
        assert_eq!(ids, vec![1, 2, 3]);

        // re-analysis of parent 10 replaces its units and moves them last
        repo.replace_for_parent(Uuid::from_u128(10), &[unit(4, 10, 99)])
            .await
            .unwrap();
        let ids: Vec<u128> = repo
            .list_by_scope(Uuid::from_u128(99))
            .await
            .unwrap()
            .iter()
            .map(|u| u.id.as_u128())
            .collect();
        assert_eq!(ids, vec![3, 4]);
        assert!(repo.get(Uuid::from_u128(1)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_replace_rejects_foreign_units() {
        let repo = MemoryUnitRepository::new();
        let err = repo
            .replace_for_parent(Uuid::from_u128(10), &[unit(1, 11, 99)])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        assert!(repo.list_by_scope(Uuid::from_u128(99)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_scope_isolation_and_delete() {
        let repo = MemoryUnitRepository::new();
        repo.replace_for_parent(Uuid::from_u128(10), &[unit(1, 10, 1)])
            .await
            .unwrap();
        repo.replace_for_parent(Uuid::from_u128(20), &[unit(2, 20, 2)])
            .await
            .unwrap();

        assert_eq!(repo.list_by_scope(Uuid::from_u128(1)).await.unwrap().len(), 1);
        assert_eq!(repo.list_by_parent(Uuid::from_u128(20)).await.unwrap().len(), 1);
        assert_eq!(repo.delete_for_parent(Uuid::from_u128(20)).await.unwrap(), 1);
        assert!(repo.list_by_scope(Uuid::from_u128(2)).await.unwrap().is_empty());
    }
}
