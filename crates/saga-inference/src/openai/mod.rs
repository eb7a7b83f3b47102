//! OpenAI-compatible generation backend.
//!
//! Works with any endpoint that speaks the chat completions protocol
//! (OpenAI, Azure OpenAI, Ollama in compatibility mode, vLLM, LM Studio).
//!
//! # Example
//!
//! ```rust,no_run
//! use saga_inference::openai::{OpenAIBackend, OpenAIConfig};
//! use saga_core::GenerationBackend;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = OpenAIConfig::from_env().with_model("gpt-4o-mini");
//!     let backend = OpenAIBackend::new(config).unwrap();
//!     let reply = backend
//!         .generate_json("Reply in JSON.", "{\"ping\": true}")
//!         .await
//!         .unwrap();
//!     println!("{}", reply);
//! }
//! ```

mod backend;
mod error;
mod types;

pub use backend::{OpenAIBackend, OpenAIConfig};
pub use error::{to_saga_error, OpenAIErrorCode};
pub use types::*;
