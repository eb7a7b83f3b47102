//! # saga-db
//!
//! Storage for the saga analysis pipeline.
//!
//! Two families of implementations of the `saga-core` storage traits:
//! - in-memory ([`MemoryContentCache`], [`MemoryUnitRepository`]), used when
//!   no database is configured and in tests
//! - PostgreSQL ([`PgContentCache`], [`PgUnitRepository`]) bundled in
//!   [`Database`]
//!
//! ## Example
//!
//! ```rust,no_run
//! use saga_db::Database;
//!
//! # async fn example() -> saga_core::Result<()> {
//! let db = Database::connect("postgres://localhost/saga").await?;
//! db.migrate().await?;
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod memory;
pub mod pool;
pub mod units;

pub use cache::PgContentCache;
pub use memory::{MemoryContentCache, MemoryUnitRepository};
pub use pool::{create_pool, PoolConfig};
pub use units::PgUnitRepository;

use saga_core::{Error, Result};
use tracing::info;

/// Schema for the cache and unit tables. Idempotent.
pub const SCHEMA_SQL: &str = include_str!("../migrations/0001_analysis.sql");

/// Combined database context with all repositories.
pub struct Database {
    pub pool: sqlx::Pool<sqlx::Postgres>,
    /// Content-addressed analysis cache.
    pub cache: PgContentCache,
    /// Units extracted from analyzed content.
    pub units: PgUnitRepository,
}

impl Database {
    /// Create a new Database instance from a connection pool.
    pub fn new(pool: sqlx::Pool<sqlx::Postgres>) -> Self {
        Self {
            cache: PgContentCache::new(pool.clone()),
            units: PgUnitRepository::new(pool.clone()),
            pool,
        }
    }

    /// Connect with the default pool configuration.
    pub async fn connect(url: &str) -> Result<Self> {
        Self::connect_with_config(url, PoolConfig::default()).await
    }

    pub async fn connect_with_config(url: &str, config: PoolConfig) -> Result<Self> {
        let pool = create_pool(url, config).await?;
        Ok(Self::new(pool))
    }

    /// Connect using `DATABASE_URL`.
    pub async fn from_env() -> Result<Self> {
        let url = std::env::var("DATABASE_URL")
            .map_err(|_| Error::Config("DATABASE_URL is not set".to_string()))?;
        Self::connect_with_config(&url, PoolConfig::from_env()).await
    }

    /// Create the tables and indexes if they do not exist.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::raw_sql(SCHEMA_SQL)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        info!(subsystem = "db", op = "migrate", "Schema is up to date");
        Ok(())
    }

    pub fn pool(&self) -> &sqlx::Pool<sqlx::Postgres> {
        &self.pool
    }
}

impl Clone for Database {
    fn clone(&self) -> Self {
        Self::new(self.pool.clone())
    }
}
