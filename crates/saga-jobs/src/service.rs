//! The analysis service boundary: submit, poll, timeline, invalidate.

use std::sync::Arc;

use tracing::{debug, info, instrument};
use uuid::Uuid;

use saga_core::{
    AnalysisContext, AnalysisTask, CacheEntry, ContentCache, Error, ExtractedUnit,
    GenerationBackend, Result, ScopeUnit, UnitRepository,
};
use saga_db::{Database, MemoryContentCache, MemoryUnitRepository, PgContentCache, PgUnitRepository};
use saga_inference::AnalysisInvoker;
use saga_timeline::{IndexerOptions, RelationshipIndexer, Timeline, TimelineAggregator};

use crate::config::OrchestratorConfig;
use crate::orchestrator::{TaskEvent, TaskOrchestrator};

/// Facade over the orchestrator, the stores, and the timeline aggregator.
///
/// Permission checks are the caller's concern and happen before a timeline
/// is exposed.
#[derive(Clone)]
pub struct AnalysisService {
    orchestrator: TaskOrchestrator,
    cache: Arc<dyn ContentCache>,
    units: Arc<dyn UnitRepository>,
    indexer_options: IndexerOptions,
}

impl AnalysisService {
    pub fn new(
        invoker: AnalysisInvoker,
        cache: Arc<dyn ContentCache>,
        units: Arc<dyn UnitRepository>,
        config: OrchestratorConfig,
    ) -> Self {
        let orchestrator = TaskOrchestrator::new(invoker, cache.clone(), units.clone(), config);
        Self {
            orchestrator,
            cache,
            units,
            indexer_options: IndexerOptions::default(),
        }
    }

    /// Service backed by in-process stores.
    pub fn in_memory(backend: Arc<dyn GenerationBackend>, config: OrchestratorConfig) -> Self {
        Self::new(
            AnalysisInvoker::new(backend),
            Arc::new(MemoryContentCache::new()),
            Arc::new(MemoryUnitRepository::new()),
            config,
        )
    }

    /// Service backed by PostgreSQL.
    pub fn with_database(
        backend: Arc<dyn GenerationBackend>,
        db: &Database,
        config: OrchestratorConfig,
    ) -> Self {
        Self::new(
            AnalysisInvoker::new(backend),
            Arc::new(PgContentCache::new(db.pool.clone())),
            Arc::new(PgUnitRepository::new(db.pool.clone())),
            config,
        )
    }

    /// Options applied to every timeline this service builds.
    pub fn with_indexer_options(mut self, options: IndexerOptions) -> Self {
        self.indexer_options = options;
        self
    }

    pub fn orchestrator(&self) -> &TaskOrchestrator {
        &self.orchestrator
    }

    /// Start analyzing `content` as the current revision of `unit_id`.
    pub async fn submit_analysis(
        &self,
        unit_id: Uuid,
        content: impl Into<String>,
        context: AnalysisContext,
        force_refresh: bool,
    ) -> Uuid {
        self.orchestrator
            .submit(unit_id, content, context, force_refresh)
            .await
    }

    /// Analyze every unit of a scope in one call.
    ///
    /// The cached result is keyed by the scope, so resubmitting the same
    /// members with the same titles and content is a cache hit. Each member's
    /// units are replaced, including members that received none.
    pub async fn submit_scope_analysis(
        &self,
        scope_id: Uuid,
        units: Vec<ScopeUnit>,
        context: AnalysisContext,
        force_refresh: bool,
    ) -> Uuid {
        self.orchestrator
            .submit_scope(scope_id, units, context, force_refresh)
            .await
    }

    pub async fn poll(&self, task_id: Uuid) -> Result<AnalysisTask> {
        self.orchestrator.poll(task_id).await
    }

    /// Wait for the task's terminal state.
    pub async fn wait(&self, task_id: Uuid) -> Result<AnalysisTask> {
        self.orchestrator.wait(task_id).await
    }

    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<TaskEvent> {
        self.orchestrator.subscribe()
    }

    /// Year-bucketed timeline of every unit extracted in the scope.
    #[instrument(skip(self), fields(subsystem = "timeline", op = "get_timeline"))]
    pub async fn get_timeline(&self, scope_id: Uuid) -> Result<Timeline> {
        self.build_timeline(scope_id, self.indexer_options.clone())
            .await
    }

    /// Like [`get_timeline`](Self::get_timeline), but locations equal to
    /// `scope_name` never link units.
    #[instrument(skip(self), fields(subsystem = "timeline", op = "get_timeline"))]
    pub async fn get_timeline_named(&self, scope_id: Uuid, scope_name: &str) -> Result<Timeline> {
        let options = self.indexer_options.clone().exclude_location(scope_name);
        self.build_timeline(scope_id, options).await
    }

    async fn build_timeline(&self, scope_id: Uuid, options: IndexerOptions) -> Result<Timeline> {
        let units = self.units.list_by_scope(scope_id).await?;
        debug!(unit_count = units.len(), "Loaded scope units");
        let aggregator = TimelineAggregator::new(RelationshipIndexer::new(options));
        Ok(aggregator.aggregate(scope_id, units))
    }

    /// Drop every cached analysis of the unit. Returns the number of entries
    /// removed; an unknown unit removes nothing.
    pub async fn invalidate_cache(&self, unit_id: Uuid) -> Result<u64> {
        let removed = self.cache.invalidate(unit_id).await?;
        info!(
            subsystem = "cache",
            op = "invalidate",
            unit_id = %unit_id,
            removed,
            "Cache invalidated"
        );
        Ok(removed)
    }

    /// Most recent cached analysis of the unit.
    pub async fn latest_analysis(&self, unit_id: Uuid) -> Result<CacheEntry> {
        self.cache
            .latest(unit_id)
            .await?
            .ok_or(Error::UnitNotFound(unit_id))
    }

    /// Cached analyses of the unit, newest first.
    pub async fn analysis_history(&self, unit_id: Uuid) -> Result<Vec<CacheEntry>> {
        self.cache.entries(unit_id).await
    }

    /// Units currently extracted from `parent_unit_id`.
    pub async fn units_for(&self, parent_unit_id: Uuid) -> Result<Vec<ExtractedUnit>> {
        self.units.list_by_parent(parent_unit_id).await
    }

    /// Remove finished tasks older than the configured TTL.
    pub async fn cleanup_expired(&self) -> usize {
        let ttl = self.orchestrator.config().task_ttl();
        self.orchestrator.cleanup_expired(ttl).await
    }

    pub async fn health_check(&self) -> Result<bool> {
        self.orchestrator.invoker().backend().health_check().await
    }
}
