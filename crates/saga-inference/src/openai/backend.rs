//! OpenAI-compatible generation backend implementation.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, info, warn};

use saga_core::{defaults, Error, GenerationBackend, Result};

use super::error::{to_saga_error, OpenAIErrorCode};
use super::types::*;

/// Configuration for the OpenAI-compatible backend.
#[derive(Debug, Clone)]
pub struct OpenAIConfig {
    /// Base URL for the API endpoint.
    pub base_url: String,
    /// API key for authentication (optional for local endpoints).
    pub api_key: Option<String>,
    /// Model to use for generation.
    pub gen_model: String,
    /// Request timeout in seconds.
    pub timeout_seconds: u64,
    /// Completion token budget.
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    /// Skip TLS verification (for self-signed certs in local environments).
    pub skip_tls_verify: bool,
}

impl Default for OpenAIConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::OPENAI_URL.to_string(),
            api_key: None,
            gen_model: defaults::GEN_MODEL.to_string(),
            timeout_seconds: defaults::GEN_TIMEOUT_SECS,
            max_tokens: Some(defaults::GEN_MAX_TOKENS),
            temperature: None,
            skip_tls_verify: false,
        }
    }
}

impl OpenAIConfig {
    /// Load configuration from environment variables.
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `OPENAI_BASE_URL` | `https://api.openai.com/v1` |
    /// | `OPENAI_API_KEY` | unset |
    /// | `OPENAI_GEN_MODEL` | `gpt-4o-mini` |
    /// | `OPENAI_TIMEOUT` | `120` |
    /// | `OPENAI_MAX_TOKENS` | `1500` |
    /// | `OPENAI_SKIP_TLS_VERIFY` | `false` |
    pub fn from_env() -> Self {
        let base = Self::default();
        Self {
            base_url: std::env::var("OPENAI_BASE_URL").unwrap_or(base.base_url),
            api_key: std::env::var("OPENAI_API_KEY")
                .ok()
                .filter(|k| !k.trim().is_empty()),
            gen_model: std::env::var("OPENAI_GEN_MODEL").unwrap_or(base.gen_model),
            timeout_seconds: std::env::var("OPENAI_TIMEOUT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(base.timeout_seconds),
            max_tokens: std::env::var("OPENAI_MAX_TOKENS")
                .ok()
                .and_then(|s| s.parse().ok())
                .or(base.max_tokens),
            temperature: None,
            skip_tls_verify: std::env::var("OPENAI_SKIP_TLS_VERIFY")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.gen_model = model.into();
        self
    }

    pub fn with_timeout_seconds(mut self, secs: u64) -> Self {
        self.timeout_seconds = secs;
        self
    }
}

/// OpenAI-compatible generation backend.
pub struct OpenAIBackend {
    client: Client,
    config: OpenAIConfig,
}

impl OpenAIBackend {
    /// Create a new backend with the given configuration.
    pub fn new(config: OpenAIConfig) -> Result<Self> {
        let mut client_builder =
            Client::builder().timeout(Duration::from_secs(config.timeout_seconds));

        if config.skip_tls_verify {
            client_builder = client_builder.danger_accept_invalid_certs(true);
        }

        let client = client_builder
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        info!(
            base_url = %config.base_url,
            model = %config.gen_model,
            timeout_secs = config.timeout_seconds,
            "Initializing OpenAI backend"
        );

        Ok(Self { client, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::new(OpenAIConfig::from_env())
    }

    pub fn config(&self) -> &OpenAIConfig {
        &self.config
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), endpoint)
    }

    fn authorize(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.config.api_key {
            Some(ref key) => req.header("Authorization", format!("Bearer {}", key)),
            None => req,
        }
    }

    async fn chat(&self, system: &str, prompt: &str, json_mode: bool) -> Result<String> {
        let start = Instant::now();
        debug!(
            model = %self.config.gen_model,
            prompt_len = prompt.len(),
            json_mode,
            "Sending chat completion"
        );

        let mut messages = Vec::with_capacity(2);
        if !system.is_empty() {
            messages.push(ChatMessage::system(system));
        }
        messages.push(ChatMessage::user(prompt));

        let request = ChatCompletionRequest {
            model: self.config.gen_model.clone(),
            messages,
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
            response_format: json_mode.then(ResponseFormat::json_object),
        };

        let response = self
            .authorize(self.client.post(self.url("/chat/completions")))
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Error::ServiceUnavailable(format!("Request timed out: {}", e))
                } else {
                    Error::ServiceUnavailable(format!("Request failed: {}", e))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let (message, error_type) = match response.json::<OpenAIErrorResponse>().await {
                Ok(body) => (body.error.message, body.error.error_type),
                Err(_) => ("Unknown error".to_string(), String::new()),
            };
            let code = OpenAIErrorCode::from_response(status.as_u16(), &error_type);
            warn!(
                status = status.as_u16(),
                ?code,
                error = %message,
                "Chat completion rejected"
            );
            return Err(to_saga_error(
                code,
                &format!("OpenAI returned {}: {}", status, message),
            ));
        }

        let result: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| Error::MalformedResponse(format!("Failed to parse response: {}", e)))?;

        let choice = result
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| Error::MalformedResponse("response has no choices".to_string()))?;

        let content = choice.message.content.ok_or_else(|| {
            Error::MalformedResponse(format!(
                "response has no content (finish_reason={})",
                choice.finish_reason.as_deref().unwrap_or("unknown")
            ))
        })?;

        debug!(
            response_len = content.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Chat completion finished"
        );
        Ok(content)
    }
}

#[async_trait]
impl GenerationBackend for OpenAIBackend {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.chat("", prompt, false).await
    }

    async fn generate_with_system(&self, system: &str, prompt: &str) -> Result<String> {
        self.chat(system, prompt, false).await
    }

    async fn generate_json(&self, system: &str, prompt: &str) -> Result<String> {
        self.chat(system, prompt, true).await
    }

    fn model_name(&self) -> &str {
        &self.config.gen_model
    }

    async fn health_check(&self) -> Result<bool> {
        let response = self
            .authorize(self.client.get(self.url("/models")))
            .timeout(Duration::from_secs(5))
            .send()
            .await;

        match response {
            Ok(resp) if resp.status().is_success() => {
                info!("OpenAI health check passed");
                Ok(true)
            }
            Ok(resp) => {
                warn!(status = resp.status().as_u16(), "OpenAI health check failed");
                Ok(false)
            }
            Err(e) => {
                warn!(error = %e, "OpenAI health check error");
                Ok(false)
            }
        }
    }
}
