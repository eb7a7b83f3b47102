//! # saga-inference
//!
//! Language-model access for the saga analysis pipeline.
//!
//! This crate provides:
//! - OpenAI-compatible generation backend (feature `openai`, default)
//! - Prompt templates with numbered content lines
//! - [`AnalysisInvoker`]: one prompt, one call, strict schema validation
//! - [`extract_units`]: deterministic conversion of a result into units
//! - Scope-wide analysis of several units in one call ([`extract_scope_units`])
//! - Deterministic mock backend (feature `mock`)

pub mod extraction;
pub mod invoker;
pub mod prompts;

#[cfg(feature = "openai")]
pub mod openai;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use extraction::{extract_scope_units, extract_units, snap_position};
pub use invoker::{scope_sections, AnalysisInvoker, Invocation, InvokerConfig};
pub use prompts::ScopeSection;

#[cfg(feature = "openai")]
pub use openai::{OpenAIBackend, OpenAIConfig};

#[cfg(any(test, feature = "mock"))]
pub use mock::{MockGenerationBackend, MockReply};
