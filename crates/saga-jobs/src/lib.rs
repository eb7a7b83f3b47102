//! # saga-jobs
//!
//! Analysis task orchestration for saga.
//!
//! This crate provides:
//! - [`TaskOrchestrator`]: non-blocking submission, write-once task records,
//!   bounded concurrency and per-task timeouts
//! - Lifecycle notifications via a broadcast channel of [`TaskEvent`]s
//! - [`AnalysisService`]: the submit / poll / timeline / invalidate boundary,
//!   per unit or for a whole scope in one call
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use saga_jobs::{AnalysisService, OrchestratorConfig};
//! use saga_core::AnalysisContext;
//! use saga_inference::OpenAIBackend;
//!
//! let backend = Arc::new(OpenAIBackend::from_env()?);
//! let service = AnalysisService::in_memory(backend, OrchestratorConfig::from_env());
//!
//! let task_id = service
//!     .submit_analysis(story_id, text, AnalysisContext::new(world_id), false)
//!     .await;
//! let task = service.wait(task_id).await?;
//! let timeline = service.get_timeline(world_id).await?;
//! ```

pub mod config;
pub mod orchestrator;
pub mod service;

pub use config::OrchestratorConfig;
pub use orchestrator::{TaskEvent, TaskOrchestrator};
pub use service::AnalysisService;
