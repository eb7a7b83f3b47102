//! PostgreSQL implementation of the content cache.

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use sqlx::postgres::PgRow;
use sqlx::{Pool, Postgres, Row};
use tracing::debug;
use uuid::Uuid;

use saga_core::{derived_count_of, CacheEntry, ContentCache, Error, Result};

const ENTRY_COLUMNS: &str =
    "unit_id, content_hash, raw_result, derived_count, analyzed_at, model_used";

/// PostgreSQL implementation of ContentCache.
pub struct PgContentCache {
    pool: Pool<Postgres>,
}

impl PgContentCache {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

fn entry_from_row(row: &PgRow) -> Result<CacheEntry> {
    Ok(CacheEntry {
        unit_id: row.try_get("unit_id")?,
        content_hash: row.try_get("content_hash")?,
        raw_result: row.try_get("raw_result")?,
        derived_count: row.try_get("derived_count")?,
        analyzed_at: row.try_get("analyzed_at")?,
        model_used: row.try_get("model_used")?,
    })
}

#[async_trait]
impl ContentCache for PgContentCache {
    async fn lookup(&self, unit_id: Uuid, content_hash: &str) -> Result<Option<CacheEntry>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM analysis_cache WHERE unit_id = $1 AND content_hash = $2",
            ENTRY_COLUMNS
        ))
        .bind(unit_id)
        .bind(content_hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        let entry = row.as_ref().map(entry_from_row).transpose()?;
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
        let derived_count = derived_count_of(&raw_result);
        let row = sqlx::query(&format!(
            "INSERT INTO analysis_cache (unit_id, content_hash, raw_result, derived_count, analyzed_at, model_used)
             VALUES ($1, $2, $3, $4, now(), $5)
             ON CONFLICT (unit_id, content_hash) DO UPDATE SET
                 raw_result = EXCLUDED.raw_result,
                 derived_count = EXCLUDED.derived_count,
                 analyzed_at = EXCLUDED.analyzed_at,
                 model_used = EXCLUDED.model_used
             RETURNING {}",
            ENTRY_COLUMNS
        ))
        .bind(unit_id)
        .bind(content_hash)
        .bind(&raw_result)
        .bind(derived_count)
        .bind(model_used)
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;

        debug!(
            subsystem = "cache",
            op = "store",
            unit_id = %unit_id,
            content_hash = %content_hash,
            unit_count = derived_count,
            "Cache entry stored"
        );
        entry_from_row(&row)
    }

    async fn invalidate(&self, unit_id: Uuid) -> Result<u64> {
        let result = sqlx::query("DELETE FROM analysis_cache WHERE unit_id = $1")
            .bind(unit_id)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(result.rows_affected())
    }

    async fn latest(&self, unit_id: Uuid) -> Result<Option<CacheEntry>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM analysis_cache WHERE unit_id = $1
             ORDER BY analyzed_at DESC LIMIT 1",
            ENTRY_COLUMNS
        ))
        .bind(unit_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;
        row.as_ref().map(entry_from_row).transpose()
    }

    async fn entries(&self, unit_id: Uuid) -> Result<Vec<CacheEntry>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM analysis_cache WHERE unit_id = $1 ORDER BY analyzed_at DESC",
            ENTRY_COLUMNS
        ))
        .bind(unit_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;
        rows.iter().map(entry_from_row).collect()
    }
}
