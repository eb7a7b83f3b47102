//! PostgreSQL implementation of the extracted-unit repository.

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{Pool, Postgres, Row};
use tracing::debug;
use uuid::Uuid;

use saga_core::{Connection, Error, ExtractedUnit, Result, UnitRepository};

const UNIT_COLUMNS: &str = "id, parent_unit_id, scope_id, title, description, temporal_key, \
     era, characters, locations, line_position, image_seed, connections";

/// PostgreSQL implementation of UnitRepository.
///
/// Rows keep a `seq` column so listings come back in insertion order.
pub struct PgUnitRepository {
    pool: Pool<Postgres>,
}

impl PgUnitRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

fn unit_from_row(row: &PgRow) -> Result<ExtractedUnit> {
    let characters: Json<Vec<String>> = row.try_get("characters")?;
    let locations: Json<Vec<String>> = row.try_get("locations")?;
    let connections: Json<Vec<Connection>> = row.try_get("connections")?;
    Ok(ExtractedUnit {
        id: row.try_get("id")?,
        parent_unit_id: row.try_get("parent_unit_id")?,
        scope_id: row.try_get("scope_id")?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        temporal_key: row.try_get("temporal_key")?,
        era: row.try_get("era")?,
        characters: characters.0,
        locations: locations.0,
        position: row.try_get("line_position")?,
        image_seed: row.try_get("image_seed")?,
        connections: connections.0,
    })
}

#[async_trait]
impl UnitRepository for PgUnitRepository {
    async fn replace_for_parent(
        &self,
        parent_unit_id: Uuid,
        units: &[ExtractedUnit],
    ) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        let removed = sqlx::query("DELETE FROM extracted_unit WHERE parent_unit_id = $1")
            .bind(parent_unit_id)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?
            .rows_affected();

        for unit in units {
            if unit.parent_unit_id != parent_unit_id {
                return Err(Error::InvalidInput(format!(
                    "unit {} belongs to parent {}, not {}",
                    unit.id, unit.parent_unit_id, parent_unit_id
                )));
            }
            sqlx::query(
                "INSERT INTO extracted_unit
                    (id, parent_unit_id, scope_id, title, description, temporal_key, era,
                     characters, locations, line_position, image_seed, connections)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
                 ON CONFLICT (id) DO UPDATE SET
                     parent_unit_id = EXCLUDED.parent_unit_id,
                     scope_id = EXCLUDED.scope_id,
                     title = EXCLUDED.title,
                     description = EXCLUDED.description,
                     temporal_key = EXCLUDED.temporal_key,
                     era = EXCLUDED.era,
                     characters = EXCLUDED.characters,
                     locations = EXCLUDED.locations,
                     line_position = EXCLUDED.line_position,
                     image_seed = EXCLUDED.image_seed,
                     connections = EXCLUDED.connections",
            )
            .bind(unit.id)
            .bind(unit.parent_unit_id)
            .bind(unit.scope_id)
            .bind(&unit.title)
            .bind(&unit.description)
            .bind(unit.temporal_key)
            .bind(&unit.era)
            .bind(Json(&unit.characters))
            .bind(Json(&unit.locations))
            .bind(unit.position)
            .bind(&unit.image_seed)
            .bind(Json(&unit.connections))
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;
        }

        tx.commit().await.map_err(Error::Database)?;

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
        let rows = sqlx::query(&format!(
            "SELECT {} FROM extracted_unit WHERE scope_id = $1 ORDER BY seq",
            UNIT_COLUMNS
        ))
        .bind(scope_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;
        rows.iter().map(unit_from_row).collect()
    }

    async fn list_by_parent(&self, parent_unit_id: Uuid) -> Result<Vec<ExtractedUnit>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM extracted_unit WHERE parent_unit_id = $1 ORDER BY seq",
            UNIT_COLUMNS
        ))
        .bind(parent_unit_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;
        rows.iter().map(unit_from_row).collect()
    }

    async fn get(&self, id: Uuid) -> Result<Option<ExtractedUnit>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM extracted_unit WHERE id = $1",
            UNIT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;
        row.as_ref().map(unit_from_row).transpose()
    }

    async fn delete_for_parent(&self, parent_unit_id: Uuid) -> Result<u64> {
        let result = sqlx::query("DELETE FROM extracted_unit WHERE parent_unit_id = $1")
            .bind(parent_unit_id)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(result.rows_affected())
    }
}
