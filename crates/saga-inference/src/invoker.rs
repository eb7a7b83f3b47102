//! Single analysis call against a generation backend.

use std::sync::Arc;
use std::time::Instant;

use serde_json::Value as JsonValue;
use tracing::{debug, instrument, warn};

use saga_core::{
    defaults, AnalysisContext, AnalysisResult, Error, GenerationBackend, Result, ScopeUnit,
};

use crate::prompts::{
    extraction_prompt, scope_extraction_prompt, truncate_chars, ScopeSection,
    EXTRACTION_SYSTEM_PROMPT,
};

/// Invoker settings.
#[derive(Debug, Clone)]
pub struct InvokerConfig {
    /// Characters of unit content placed in the prompt.
    pub content_chars: usize,
}

impl Default for InvokerConfig {
    fn default() -> Self {
        Self {
            content_chars: defaults::PROMPT_CONTENT_CHARS,
        }
    }
}

impl InvokerConfig {
    pub fn with_content_chars(mut self, chars: usize) -> Self {
        self.content_chars = chars;
        self
    }
}

/// Outcome of a successful invocation.
#[derive(Debug, Clone)]
pub struct Invocation {
    /// Schema-validated result.
    pub result: AnalysisResult,
    /// Raw JSON to be stored in the content cache.
    pub raw: JsonValue,
    pub model_used: String,
}

/// Prompt sections for the members of a scope, each truncated to
/// `content_chars`. Members with blank content get no section but keep their
/// index, so `story_index` always refers to the submitted order.
pub fn scope_sections(units: &[ScopeUnit], content_chars: usize) -> Vec<ScopeSection<'_>> {
    units
        .iter()
        .enumerate()
        .filter(|(_, u)| !u.content.trim().is_empty())
        .map(|(index, u)| ScopeSection {
            index,
            unit_id: u.unit_id,
            title: &u.title,
            content: truncate_chars(&u.content, content_chars),
        })
        .collect()
}

/// Wraps one call to the language-model service: prompt, call, validate.
#[derive(Clone)]
pub struct AnalysisInvoker {
    backend: Arc<dyn GenerationBackend>,
    config: InvokerConfig,
}

impl AnalysisInvoker {
    pub fn new(backend: Arc<dyn GenerationBackend>) -> Self {
        Self {
            backend,
            config: InvokerConfig::default(),
        }
    }

    pub fn with_config(mut self, config: InvokerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &InvokerConfig {
        &self.config
    }

    pub fn backend(&self) -> &Arc<dyn GenerationBackend> {
        &self.backend
    }

    pub fn model_name(&self) -> &str {
        self.backend.model_name()
    }

    /// The part of `content` that is sent to the service.
    pub fn analyzed_text<'a>(&self, content: &'a str) -> &'a str {
        truncate_chars(content, self.config.content_chars)
    }

    /// Analyze `content`.
    ///
    /// Errors are [`Error::ServiceUnavailable`] for transport, timeout and
    /// quota failures and [`Error::MalformedResponse`] when the reply does not
    /// validate. A valid reply with zero items is a success.
    #[instrument(
        skip_all,
        fields(subsystem = "inference", op = "invoke", model = %self.model_name())
    )]
    pub async fn invoke(&self, content: &str, context: &AnalysisContext) -> Result<Invocation> {
        let prompt = extraction_prompt(self.analyzed_text(content), context);
        self.call(&prompt).await
    }

    /// Analyze several units of one scope in a single call.
    ///
    /// Same error contract as [`invoke`](Self::invoke). Items in the result
    /// carry the `story_index` of their section.
    #[instrument(
        skip_all,
        fields(
            subsystem = "inference",
            op = "invoke_scope",
            model = %self.model_name(),
            section_count = sections.len()
        )
    )]
    pub async fn invoke_scope(
        &self,
        sections: &[ScopeSection<'_>],
        context: &AnalysisContext,
    ) -> Result<Invocation> {
        let prompt = scope_extraction_prompt(sections, context);
        self.call(&prompt).await
    }

    async fn call(&self, prompt: &str) -> Result<Invocation> {
        let start = Instant::now();
        debug!(prompt_len = prompt.len(), "Invoking analysis");

        let text = self
            .backend
            .generate_json(EXTRACTION_SYSTEM_PROMPT, prompt)
            .await
            .map_err(|e| match e {
                Error::Serialization(msg) => Error::MalformedResponse(msg),
                other => other,
            })?;

        let (result, raw) = AnalysisResult::parse_text(&text).map_err(|e| {
            warn!(response_len = text.len(), error = %e, "Service returned malformed analysis");
            e
        })?;

        debug!(
            response_len = text.len(),
            unit_count = result.events.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Analysis invocation succeeded"
        );

        Ok(Invocation {
            result,
            raw,
            model_used: self.backend.model_name().to_string(),
        })
    }
}
