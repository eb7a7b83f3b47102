//! Mock generation backend for deterministic testing.
//!
//! Replies are chosen in this order: the next scripted reply, the first
//! mapping whose needle occurs in the prompt, then the default response.
//!
//! ```rust,ignore
//! use saga_inference::mock::MockGenerationBackend;
//! use saga_core::GenerationBackend;
//!
//! let backend = MockGenerationBackend::new().with_fixed_response(r#"{"events": []}"#);
//! let reply = backend.generate("anything").await.unwrap();
//! assert_eq!(reply, r#"{"events": []}"#);
//! assert_eq!(backend.generate_call_count(), 1);
//! ```

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use saga_core::{Error, GenerationBackend, Result};

/// One scripted outcome for the next generation call.
#[derive(Debug, Clone)]
pub enum MockReply {
    Text(String),
    Unavailable(String),
}

#[derive(Debug, Clone)]
pub struct MockCall {
    pub system: String,
    pub prompt: String,
    pub timestamp: std::time::Instant,
}

#[derive(Debug, Clone)]
struct MockConfig {
    model: String,
    mappings: Vec<(String, String)>,
    default_response: String,
    latency_ms: u64,
    slow_needles: Vec<(String, u64)>,
    failure_rate: f64,
    healthy: bool,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            model: "mock-model".to_string(),
            mappings: Vec::new(),
            default_response: r#"{"events": [], "connections": []}"#.to_string(),
            latency_ms: 0,
            slow_needles: Vec::new(),
            failure_rate: 0.0,
            healthy: true,
        }
    }
}

/// Mock generation backend for testing.
#[derive(Clone)]
pub struct MockGenerationBackend {
    config: Arc<MockConfig>,
    script: Arc<Mutex<VecDeque<MockReply>>>,
    call_log: Arc<Mutex<Vec<MockCall>>>,
    in_flight: Arc<AtomicUsize>,
    peak_in_flight: Arc<AtomicUsize>,
}

impl MockGenerationBackend {
    pub fn new() -> Self {
        Self {
            config: Arc::new(MockConfig::default()),
            script: Arc::new(Mutex::new(VecDeque::new())),
            call_log: Arc::new(Mutex::new(Vec::new())),
            in_flight: Arc::new(AtomicUsize::new(0)),
            peak_in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.config).model = model.into();
        self
    }

    /// Reply used when no script entry or mapping applies.
    pub fn with_fixed_response(mut self, response: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.config).default_response = response.into();
        self
    }

    /// Reply with `output` whenever the prompt contains `needle`.
    pub fn with_response_mapping(
        mut self,
        needle: impl Into<String>,
        output: impl Into<String>,
    ) -> Self {
        Arc::make_mut(&mut self.config)
            .mappings
            .push((needle.into(), output.into()));
        self
    }

    pub fn with_latency_ms(mut self, latency_ms: u64) -> Self {
        Arc::make_mut(&mut self.config).latency_ms = latency_ms;
        self
    }

    /// Add `latency_ms` to calls whose prompt contains `needle`.
    pub fn with_latency_for(mut self, needle: impl Into<String>, latency_ms: u64) -> Self {
        Arc::make_mut(&mut self.config)
            .slow_needles
            .push((needle.into(), latency_ms));
        self
    }

    /// Fail this fraction (0.0 - 1.0) of calls with `ServiceUnavailable`.
    pub fn with_failure_rate(mut self, rate: f64) -> Self {
        Arc::make_mut(&mut self.config).failure_rate = rate.clamp(0.0, 1.0);
        self
    }

    pub fn with_health(mut self, healthy: bool) -> Self {
        Arc::make_mut(&mut self.config).healthy = healthy;
        self
    }

    /// Queue a reply for the next call. Queued replies are consumed in order.
    pub fn push_reply(&self, reply: MockReply) {
        self.script.lock().unwrap().push_back(reply);
    }

    pub fn get_calls(&self) -> Vec<MockCall> {
        self.call_log.lock().unwrap().clone()
    }

    pub fn clear_calls(&self) {
        self.call_log.lock().unwrap().clear()
    }

    pub fn generate_call_count(&self) -> usize {
        self.call_log.lock().unwrap().len()
    }

    /// Highest number of calls observed running at the same time.
    pub fn peak_concurrency(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    fn should_fail(&self) -> bool {
        use rand::Rng;
        self.config.failure_rate > 0.0 && rand::thread_rng().gen::<f64>() < self.config.failure_rate
    }

    fn pick_reply(&self, prompt: &str) -> MockReply {
        if let Some(reply) = self.script.lock().unwrap().pop_front() {
            return reply;
        }
        if self.should_fail() {
            return MockReply::Unavailable("simulated failure".to_string());
        }
        let text = self
            .config
            .mappings
            .iter()
            .find(|(needle, _)| prompt.contains(needle.as_str()))
            .map(|(_, output)| output.clone())
            .unwrap_or_else(|| self.config.default_response.clone());
        MockReply::Text(text)
    }

    async fn respond(&self, system: &str, prompt: &str) -> Result<String> {
        self.call_log.lock().unwrap().push(MockCall {
            system: system.to_string(),
            prompt: prompt.to_string(),
            timestamp: std::time::Instant::now(),
        });

        let reply = self.pick_reply(prompt);

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);

        let extra: u64 = self
            .config
            .slow_needles
            .iter()
            .filter(|(needle, _)| prompt.contains(needle.as_str()))
            .map(|(_, ms)| ms)
            .sum();
        let latency_ms = self.config.latency_ms + extra;
        if latency_ms > 0 {
            tokio::time::sleep(tokio::time::Duration::from_millis(latency_ms)).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match reply {
            MockReply::Text(text) => Ok(text),
            MockReply::Unavailable(msg) => Err(Error::ServiceUnavailable(msg)),
        }
    }
}

impl Default for MockGenerationBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GenerationBackend for MockGenerationBackend {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.respond("", prompt).await
    }

    async fn generate_with_system(&self, system: &str, prompt: &str) -> Result<String> {
        self.respond(system, prompt).await
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(self.config.healthy)
    }
}
