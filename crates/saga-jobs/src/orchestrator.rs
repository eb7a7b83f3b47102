//! Analysis task orchestration.
//!
//! `submit` records a Pending task and returns its id immediately; the
//! cache-check, invoke, store and extract steps run on a spawned task.
//! Each task's status lives in a `watch` channel whose only sender is the
//! worker running it, so the terminal state is written exactly once and any
//! number of pollers read it without contention.
//!
//! Every submission gets a sequence number. A parent unit's extracted units
//! are only replaced by a submission at least as new as the one that last
//! wrote them, so a slow older revision cannot overwrite a newer one.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::sync::{broadcast, watch, Mutex, RwLock, Semaphore};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use saga_core::{
    content_hash, defaults, new_v7, scope_cache_id, AnalysisContext, AnalysisOutput,
    AnalysisResult, AnalysisTask, ContentCache, Error, ErrorKind, ExtractedUnit, Result,
    ScopeUnit, TaskError, UnitRepository,
};
use saga_inference::{
    extract_scope_units, extract_units, scope_sections, AnalysisInvoker, Invocation,
};

use crate::config::OrchestratorConfig;

/// Event emitted as tasks move through their lifecycle.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskEvent {
    /// A task was accepted and is Pending.
    Submitted { task_id: Uuid, unit_id: Uuid },
    /// A task completed.
    Completed {
        task_id: Uuid,
        unit_id: Uuid,
        cache_hit: bool,
        unit_count: usize,
    },
    /// A task failed.
    Failed {
        task_id: Uuid,
        unit_id: Uuid,
        kind: ErrorKind,
        error: String,
    },
}

impl TaskEvent {
    pub fn task_id(&self) -> Uuid {
        match self {
            TaskEvent::Submitted { task_id, .. }
            | TaskEvent::Completed { task_id, .. }
            | TaskEvent::Failed { task_id, .. } => *task_id,
        }
    }
}

/// What a task analyzes.
enum Subject {
    Unit { unit_id: Uuid, content: String },
    /// Every member of a scope in one call.
    Scope {
        scope_id: Uuid,
        members: Vec<ScopeUnit>,
    },
}

impl Subject {
    /// Id recorded on the task: the unit, or the scope.
    fn id(&self) -> Uuid {
        match self {
            Subject::Unit { unit_id, .. } => *unit_id,
            Subject::Scope { scope_id, .. } => *scope_id,
        }
    }
}

/// One submission, as handed to the worker.
struct AnalysisRequest {
    seq: u64,
    subject: Subject,
    context: AnalysisContext,
    force_refresh: bool,
}

/// Text a scope analysis is hashed over: every member's title and full
/// content in submitted order.
fn scope_document(members: &[ScopeUnit]) -> String {
    members
        .iter()
        .enumerate()
        .map(|(i, m)| format!("=== STORY_{}: {} ===\n{}", i, m.title, m.content))
        .collect::<Vec<_>>()
        .join("\n")
}

/// The cache-checked analysis of one unit or scope.
#[derive(Clone)]
struct Pipeline {
    invoker: AnalysisInvoker,
    cache: Arc<dyn ContentCache>,
    units: Arc<dyn UnitRepository>,
    /// Sequence number of the submission that last wrote each parent.
    written: Arc<Mutex<HashMap<Uuid, u64>>>,
}

impl Pipeline {
    /// Returns the output and whether it came from the cache.
    async fn run(&self, request: &AnalysisRequest) -> Result<(AnalysisOutput, bool)> {
        match &request.subject {
            Subject::Unit { unit_id, content } => {
                self.run_unit(request, *unit_id, content).await
            }
            Subject::Scope { scope_id, members } => {
                self.run_scope(request, *scope_id, members).await
            }
        }
    }

    async fn run_unit(
        &self,
        request: &AnalysisRequest,
        unit_id: Uuid,
        content: &str,
    ) -> Result<(AnalysisOutput, bool)> {
        if content.trim().is_empty() {
            return Err(Error::InvalidInput(format!("unit {} has no content", unit_id)));
        }

        let hash = content_hash(content);
        let analyzed = self.invoker.analyzed_text(content);

        let (result, model_used, cache_hit) =
            match self.cached(unit_id, &hash, request.force_refresh).await? {
                Some((result, model_used)) => (result, model_used, true),
                None => {
                    let invocation = self.invoker.invoke(content, &request.context).await?;
                    let (result, model_used) = self.remember(unit_id, &hash, invocation).await?;
                    (result, model_used, false)
                }
            };

        let units = extract_units(&result, unit_id, &hash, analyzed, &request.context);
        self.commit(request.seq, unit_id, &units).await?;

        Ok((
            AnalysisOutput {
                unit_id,
                content_hash: hash,
                model_used,
                units,
            },
            cache_hit,
        ))
    }

    async fn run_scope(
        &self,
        request: &AnalysisRequest,
        scope_id: Uuid,
        members: &[ScopeUnit],
    ) -> Result<(AnalysisOutput, bool)> {
        let sections = scope_sections(members, self.invoker.config().content_chars);
        if sections.is_empty() {
            return Err(Error::InvalidInput(format!("scope {} has no content", scope_id)));
        }

        let hash = content_hash(&scope_document(members));
        let cache_key = scope_cache_id(scope_id);

        let (result, model_used, cache_hit) =
            match self.cached(cache_key, &hash, request.force_refresh).await? {
                Some((result, model_used)) => (result, model_used, true),
                None => {
                    let invocation = self
                        .invoker
                        .invoke_scope(&sections, &request.context)
                        .await?;
                    let (result, model_used) = self.remember(cache_key, &hash, invocation).await?;
                    (result, model_used, false)
                }
            };

        let units = extract_scope_units(&result, &sections, &hash, &request.context);
        let mut seen = HashSet::new();
        for member in members.iter().filter(|m| seen.insert(m.unit_id)) {
            let owned: Vec<ExtractedUnit> = units
                .iter()
                .filter(|u| u.parent_unit_id == member.unit_id)
                .cloned()
                .collect();
            self.commit(request.seq, member.unit_id, &owned).await?;
        }

        Ok((
            AnalysisOutput {
                unit_id: scope_id,
                content_hash: hash,
                model_used,
                units,
            },
            cache_hit,
        ))
    }

    /// Cached result for `(key, hash)` unless the caller forces a refresh.
    async fn cached(
        &self,
        key: Uuid,
        hash: &str,
        force_refresh: bool,
    ) -> Result<Option<(AnalysisResult, String)>> {
        if force_refresh {
            debug!(cache_key = %key, content_hash = %hash, "Forced refresh, bypassing cache");
            return Ok(None);
        }
        match self.cache.lookup(key, hash).await? {
            Some(entry) => {
                debug!(cache_key = %key, content_hash = %hash, "Cache hit, skipping service call");
                Ok(Some((entry.parse()?, entry.model_used)))
            }
            None => {
                debug!(cache_key = %key, content_hash = %hash, "Cache miss");
                Ok(None)
            }
        }
    }

    /// Store a fresh invocation and hand back its result.
    async fn remember(
        &self,
        key: Uuid,
        hash: &str,
        invocation: Invocation,
    ) -> Result<(AnalysisResult, String)> {
        let entry = self
            .cache
            .store(key, hash, invocation.raw, &invocation.model_used)
            .await?;
        Ok((invocation.result, entry.model_used))
    }

    /// Replace the parent's units unless a newer submission already did.
    async fn commit(&self, seq: u64, parent_unit_id: Uuid, units: &[ExtractedUnit]) -> Result<()> {
        let mut written = self.written.lock().await;
        if let Some(&newer) = written.get(&parent_unit_id).filter(|&&last| last > seq) {
            debug!(
                parent_unit_id = %parent_unit_id,
                seq,
                newer,
                "Superseded by a newer submission, keeping stored units"
            );
            return Ok(());
        }
        self.units.replace_for_parent(parent_unit_id, units).await?;
        written.insert(parent_unit_id, seq);
        Ok(())
    }
}

/// Everything a spawned task needs, detached from the orchestrator.
struct TaskWorker {
    pipeline: Pipeline,
    permits: Arc<Semaphore>,
    timeout: Duration,
    event_tx: broadcast::Sender<TaskEvent>,
}

impl TaskWorker {
    /// Drive one task to its terminal state. Consumes the only sender.
    async fn execute(
        self,
        task_id: Uuid,
        request: AnalysisRequest,
        status_tx: watch::Sender<AnalysisTask>,
    ) {
        let unit_id = request.subject.id();
        let outcome = match self.permits.clone().acquire_owned().await {
            Ok(permit) => {
                let start = Instant::now();
                let pipeline = self.pipeline.clone();
                let mut handle = tokio::spawn(async move {
                    let _permit = permit;
                    pipeline.run(&request).await
                });
                let outcome = match tokio::time::timeout(self.timeout, &mut handle).await {
                    Ok(Ok(result)) => result,
                    Ok(Err(join_err)) => {
                        error!(task_id = %task_id, error = %join_err, "Analysis task panicked");
                        Err(Error::Internal(format!("analysis worker failed: {}", join_err)))
                    }
                    Err(_) => {
                        handle.abort();
                        warn!(
                            task_id = %task_id,
                            "Analysis exceeded timeout of {}s",
                            self.timeout.as_secs()
                        );
                        Err(Error::ServiceUnavailable(format!(
                            "analysis exceeded timeout of {}s",
                            self.timeout.as_secs()
                        )))
                    }
                };
                debug!(
                    task_id = %task_id,
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Analysis pipeline finished"
                );
                outcome
            }
            Err(_) => Err(Error::Internal("task scheduler is closed".to_string())),
        };

        let pending = status_tx.borrow().clone();
        let (terminal, event) = match outcome {
            Ok((output, cache_hit)) => {
                let unit_count = output.units.len();
                info!(
                    subsystem = "jobs",
                    task_id = %task_id,
                    unit_id = %unit_id,
                    cache_hit,
                    unit_count,
                    "Analysis task completed"
                );
                (
                    pending.completed(output, cache_hit),
                    TaskEvent::Completed {
                        task_id,
                        unit_id,
                        cache_hit,
                        unit_count,
                    },
                )
            }
            Err(e) => {
                let err = TaskError::from(&e);
                warn!(
                    subsystem = "jobs",
                    task_id = %task_id,
                    unit_id = %unit_id,
                    error_kind = %err.kind,
                    error = %err.message,
                    "Analysis task failed"
                );
                (
                    pending.failed(err.clone()),
                    TaskEvent::Failed {
                        task_id,
                        unit_id,
                        kind: err.kind,
                        error: err.message,
                    },
                )
            }
        };

        status_tx.send_replace(terminal);
        let _ = self.event_tx.send(event);
    }
}

/// Accepts analysis requests and tracks their tasks.
///
/// Cloning yields another handle onto the same task store.
#[derive(Clone)]
pub struct TaskOrchestrator {
    pipeline: Pipeline,
    config: OrchestratorConfig,
    tasks: Arc<RwLock<HashMap<Uuid, watch::Receiver<AnalysisTask>>>>,
    permits: Arc<Semaphore>,
    event_tx: broadcast::Sender<TaskEvent>,
    next_seq: Arc<AtomicU64>,
}

impl TaskOrchestrator {
    pub fn new(
        invoker: AnalysisInvoker,
        cache: Arc<dyn ContentCache>,
        units: Arc<dyn UnitRepository>,
        config: OrchestratorConfig,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(defaults::EVENT_BUS_CAPACITY);
        Self {
            pipeline: Pipeline {
                invoker,
                cache,
                units,
                written: Arc::new(Mutex::new(HashMap::new())),
            },
            permits: Arc::new(Semaphore::new(config.max_concurrent.max(1))),
            config,
            tasks: Arc::new(RwLock::new(HashMap::new())),
            event_tx,
            next_seq: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn invoker(&self) -> &AnalysisInvoker {
        &self.pipeline.invoker
    }

    /// Get a receiver for task events.
    pub fn subscribe(&self) -> broadcast::Receiver<TaskEvent> {
        self.event_tx.subscribe()
    }

    /// Record a Pending task and start analyzing `content` in the background.
    ///
    /// Never waits for the analysis itself. Two submissions of the same
    /// content are independent tasks; only the content cache collapses the
    /// repeated work.
    #[instrument(
        skip(self, content, context),
        fields(subsystem = "jobs", op = "submit", unit_id = %unit_id)
    )]
    pub async fn submit(
        &self,
        unit_id: Uuid,
        content: impl Into<String>,
        context: AnalysisContext,
        force_refresh: bool,
    ) -> Uuid {
        let subject = Subject::Unit {
            unit_id,
            content: content.into(),
        };
        self.start(subject, context, force_refresh).await
    }

    /// Like [`submit`](Self::submit), but analyzes every member of the scope
    /// in one call. The task records `scope_id` as its unit id, and each
    /// member's units are replaced by the ones attributed to it.
    #[instrument(
        skip(self, members, context),
        fields(
            subsystem = "jobs",
            op = "submit_scope",
            scope_id = %scope_id,
            member_count = members.len()
        )
    )]
    pub async fn submit_scope(
        &self,
        scope_id: Uuid,
        members: Vec<ScopeUnit>,
        mut context: AnalysisContext,
        force_refresh: bool,
    ) -> Uuid {
        context.scope_id = scope_id;
        let subject = Subject::Scope { scope_id, members };
        self.start(subject, context, force_refresh).await
    }

    async fn start(&self, subject: Subject, context: AnalysisContext, force_refresh: bool) -> Uuid {
        let task_id = new_v7();
        let unit_id = subject.id();
        let (status_tx, status_rx) = watch::channel(AnalysisTask::pending(task_id, unit_id));
        self.tasks.write().await.insert(task_id, status_rx);

        info!(task_id = %task_id, force_refresh, "Analysis task submitted");
        let _ = self.event_tx.send(TaskEvent::Submitted { task_id, unit_id });

        let worker = TaskWorker {
            pipeline: self.pipeline.clone(),
            permits: self.permits.clone(),
            timeout: self.config.timeout(),
            event_tx: self.event_tx.clone(),
        };
        let request = AnalysisRequest {
            seq: self.next_seq.fetch_add(1, Ordering::SeqCst),
            subject,
            context,
            force_refresh,
        };
        tokio::spawn(worker.execute(task_id, request, status_tx));

        task_id
    }

    /// Current record of a task.
    pub async fn poll(&self, task_id: Uuid) -> Result<AnalysisTask> {
        let tasks = self.tasks.read().await;
        let rx = tasks.get(&task_id).ok_or(Error::TaskNotFound(task_id))?;
        let task = rx.borrow().clone();
        Ok(task)
    }

    /// Wait until the task reaches a terminal state.
    pub async fn wait(&self, task_id: Uuid) -> Result<AnalysisTask> {
        let mut rx = {
            let tasks = self.tasks.read().await;
            tasks
                .get(&task_id)
                .cloned()
                .ok_or(Error::TaskNotFound(task_id))?
        };
        let task = rx
            .wait_for(AnalysisTask::is_terminal)
            .await
            .map_err(|_| Error::Internal(format!("worker for task {} exited early", task_id)))?
            .clone();
        Ok(task)
    }

    /// Forget a task. Returns whether it was known.
    pub async fn evict(&self, task_id: Uuid) -> bool {
        self.tasks.write().await.remove(&task_id).is_some()
    }

    /// Remove terminal tasks that finished more than `max_age` ago.
    /// Pending tasks are never removed. Returns the number removed.
    pub async fn cleanup_expired(&self, max_age: Duration) -> usize {
        let Some(cutoff) = chrono::Duration::from_std(max_age)
            .ok()
            .and_then(|age| Utc::now().checked_sub_signed(age))
        else {
            return 0;
        };

        let mut tasks = self.tasks.write().await;
        let before = tasks.len();
        tasks.retain(|_, rx| {
            let task = rx.borrow();
            !(task.is_terminal() && task.completed_at.unwrap_or(task.created_at) < cutoff)
        });
        let removed = before - tasks.len();
        if removed > 0 {
            info!(subsystem = "jobs", op = "cleanup", removed, "Expired analysis tasks removed");
        }
        removed
    }

    /// Number of tracked tasks.
    pub async fn task_count(&self) -> usize {
        self.tasks.read().await.len()
    }

    /// Number of tracked tasks still Pending.
    pub async fn pending_count(&self) -> usize {
        self.tasks
            .read()
            .await
            .values()
            .filter(|rx| !rx.borrow().is_terminal())
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use saga_core::TaskStatus;
    use saga_db::{MemoryContentCache, MemoryUnitRepository};
    use saga_inference::MockGenerationBackend;

    const ONE_EVENT: &str = r#"{"events": [{"title": "Meeting", "description": "Alice meets Bob", "year": 1, "characters": ["Alice", "Bob"], "locations": ["Tower"], "position": 0}], "connections": []}"#;

    fn orchestrator(mock: &MockGenerationBackend, config: OrchestratorConfig) -> TaskOrchestrator {
        TaskOrchestrator::new(
            AnalysisInvoker::new(Arc::new(mock.clone())),
            Arc::new(MemoryContentCache::new()),
            Arc::new(MemoryUnitRepository::new()),
            config,
        )
    }

    #[tokio::test]
    async fn test_submit_returns_pending_before_completion() {
        let mock = MockGenerationBackend::new()
            .with_fixed_response(ONE_EVENT)
            .with_latency_ms(50);
        let orch = orchestrator(&mock, OrchestratorConfig::default());

        let task_id = orch
            .submit(Uuid::new_v4(), "Alice meets Bob.", AnalysisContext::default(), false)
            .await;
        let first = orch.poll(task_id).await.unwrap();
        assert_eq!(first.status, TaskStatus::Pending);
        assert!(first.result.is_none());

        let done = orch.wait(task_id).await.unwrap();
        assert_eq!(done.status, TaskStatus::Completed);
        assert_eq!(done.result.unwrap().units.len(), 1);
        assert!(done.completed_at.is_some());
    }

    #[tokio::test]
    async fn test_poll_unknown_task() {
        let orch = orchestrator(&MockGenerationBackend::new(), OrchestratorConfig::default());
        let err = orch.poll(Uuid::nil()).await.unwrap_err();
        assert!(matches!(err, Error::TaskNotFound(_)));
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(orch.wait(Uuid::nil()).await.is_err());
    }

    #[tokio::test]
    async fn test_events_follow_lifecycle() {
        let mock = MockGenerationBackend::new().with_fixed_response(ONE_EVENT);
        let orch = orchestrator(&mock, OrchestratorConfig::default());
        let mut events = orch.subscribe();

        let unit_id = Uuid::new_v4();
        let task_id = orch
            .submit(unit_id, "content", AnalysisContext::default(), false)
            .await;

        assert_eq!(
            events.recv().await.unwrap(),
            TaskEvent::Submitted { task_id, unit_id }
        );
        match events.recv().await.unwrap() {
            TaskEvent::Completed {
                task_id: id,
                cache_hit,
                unit_count,
                ..
            } => {
                assert_eq!(id, task_id);
                assert!(!cache_hit);
                assert_eq!(unit_count, 1);
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_failed_event_carries_kind() {
        let mock = MockGenerationBackend::new().with_fixed_response("no json here");
        let orch = orchestrator(&mock, OrchestratorConfig::default());
        let mut events = orch.subscribe();

        let task_id = orch
            .submit(Uuid::new_v4(), "content", AnalysisContext::default(), false)
            .await;
        let _submitted = events.recv().await.unwrap();
        match events.recv().await.unwrap() {
            TaskEvent::Failed { task_id: id, kind, .. } => {
                assert_eq!(id, task_id);
                assert_eq!(kind, ErrorKind::MalformedResponse);
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_evict_and_cleanup() {
        let orch = orchestrator(&MockGenerationBackend::new(), OrchestratorConfig::default());
        let a = orch
            .submit(Uuid::new_v4(), "a", AnalysisContext::default(), false)
            .await;
        let b = orch
            .submit(Uuid::new_v4(), "b", AnalysisContext::default(), false)
            .await;
        orch.wait(a).await.unwrap();
        orch.wait(b).await.unwrap();
        assert_eq!(orch.task_count().await, 2);
        assert_eq!(orch.pending_count().await, 0);

        assert!(orch.evict(a).await);
        assert!(!orch.evict(a).await);
        assert!(matches!(orch.poll(a).await, Err(Error::TaskNotFound(_))));

        // not old enough yet
        assert_eq!(orch.cleanup_expired(Duration::from_secs(3600)).await, 0);
        assert_eq!(orch.cleanup_expired(Duration::ZERO).await, 1);
        assert_eq!(orch.task_count().await, 0);
    }

    #[tokio::test]
    async fn test_cleanup_keeps_pending_tasks() {
        let mock = MockGenerationBackend::new().with_latency_ms(200);
        let orch = orchestrator(&mock, OrchestratorConfig::default());
        let task_id = orch
            .submit(Uuid::new_v4(), "slow", AnalysisContext::default(), false)
            .await;
        assert_eq!(orch.cleanup_expired(Duration::ZERO).await, 0);
        assert_eq!(orch.pending_count().await, 1);
        orch.wait(task_id).await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_fails_task_as_unavailable() {
        let mock = MockGenerationBackend::new().with_latency_ms(10_000);
        let orch = orchestrator(&mock, OrchestratorConfig::default().with_timeout_secs(1));

        let task_id = orch
            .submit(Uuid::new_v4(), "content", AnalysisContext::default(), false)
            .await;
        let task = orch.wait(task_id).await.unwrap();
        assert_eq!(task.status, TaskStatus::Failed);
        let err = task.error.unwrap();
        assert_eq!(err.kind, ErrorKind::ServiceUnavailable);
        assert!(err.message.contains("timeout"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_older_revision_keeps_newer_units() {
        let mock = MockGenerationBackend::new()
            .with_response_mapping("DRAFT", r#"{"events": [{"title": "Draft event"}]}"#)
            .with_response_mapping(
                "FINAL",
                r#"{"events": [{"title": "Final event"}, {"title": "Epilogue"}]}"#,
            )
            .with_latency_for("DRAFT", 5_000);
        let units = Arc::new(MemoryUnitRepository::new());
        let orch = TaskOrchestrator::new(
            AnalysisInvoker::new(Arc::new(mock.clone())),
            Arc::new(MemoryContentCache::new()),
            units.clone(),
            OrchestratorConfig::default(),
        );

        let unit_id = Uuid::new_v4();
        let older = orch
            .submit(unit_id, "DRAFT text", AnalysisContext::default(), false)
            .await;
        let newer = orch
            .submit(unit_id, "FINAL text", AnalysisContext::default(), false)
            .await;
        orch.wait(newer).await.unwrap();

        // the older task still completes with its own result
        let late = orch.wait(older).await.unwrap();
        assert_eq!(late.status, TaskStatus::Completed);
        assert_eq!(late.result.unwrap().units[0].title, "Draft event");

        let mut titles: Vec<String> = units
            .list_by_parent(unit_id)
            .await
            .unwrap()
            .into_iter()
            .map(|u| u.title)
            .collect();
        titles.sort();
        assert_eq!(titles, vec!["Epilogue", "Final event"]);
    }

    #[tokio::test]
    async fn test_older_revision_writes_when_newer_fails() {
        let mock = MockGenerationBackend::new()
            .with_response_mapping("DRAFT", r#"{"events": [{"title": "Draft event"}]}"#)
            .with_response_mapping("BROKEN", "not json");
        let units = Arc::new(MemoryUnitRepository::new());
        let orch = TaskOrchestrator::new(
            AnalysisInvoker::new(Arc::new(mock.clone())),
            Arc::new(MemoryContentCache::new()),
            units.clone(),
            OrchestratorConfig::default(),
        );

        let unit_id = Uuid::new_v4();
        let older = orch
            .submit(unit_id, "DRAFT text", AnalysisContext::default(), false)
            .await;
        let newer = orch
            .submit(unit_id, "BROKEN text", AnalysisContext::default(), false)
            .await;
        assert_eq!(orch.wait(newer).await.unwrap().status, TaskStatus::Failed);
        orch.wait(older).await.unwrap();

        let stored = units.list_by_parent(unit_id).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].title, "Draft event");
    }

    #[tokio::test]
    async fn test_scope_task_records_scope_id() {
        let mock = MockGenerationBackend::new()
            .with_fixed_response(r#"{"events": [{"title": "Flight", "story_index": 1}]}"#);
        let orch = orchestrator(&mock, OrchestratorConfig::default());
        let scope_id = Uuid::new_v4();
        let members = vec![
            ScopeUnit::new(Uuid::new_v4(), "Alice waits."),
            ScopeUnit::new(Uuid::new_v4(), "Bob flees."),
        ];
        let bob = members[1].unit_id;

        let task_id = orch
            .submit_scope(scope_id, members, AnalysisContext::default(), false)
            .await;
        let task = orch.wait(task_id).await.unwrap();
        assert_eq!(task.unit_id, scope_id);
        let output = task.result.unwrap();
        assert_eq!(output.unit_id, scope_id);
        assert_eq!(output.units.len(), 1);
        assert_eq!(output.units[0].parent_unit_id, bob);
        assert_eq!(output.units[0].scope_id, scope_id);
    }

    #[tokio::test]
    async fn test_blank_scope_is_invalid() {
        let mock = MockGenerationBackend::new();
        let orch = orchestrator(&mock, OrchestratorConfig::default());
        let task_id = orch
            .submit_scope(
                Uuid::new_v4(),
                vec![ScopeUnit::new(Uuid::new_v4(), "  ")],
                AnalysisContext::default(),
                false,
            )
            .await;
        let task = orch.wait(task_id).await.unwrap();
        assert_eq!(task.error.unwrap().kind, ErrorKind::InvalidInput);
        assert_eq!(mock.generate_call_count(), 0);
    }
}
