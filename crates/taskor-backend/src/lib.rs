//! Backend invocation interface and concrete HTTP backend clients.
//!
//! The orchestration engine depends only on the [`GenerationBackend`]
//! trait, never on vendor-specific request or response shapes. Each
//! provider implements the trait once and is selected through the
//! backend registry by descriptor id.
//!
//! To add a new provider:
//! 1. Create a new module in this crate.
//! 2. Implement [`GenerationBackend`] for your client struct.
//! 3. Register it alongside its `BackendDescriptor` in the engine.

/// Ollama HTTP client (`/api/generate`, `/api/tags`).
pub mod ollama;
/// OpenAI-compatible chat-completions client.
pub mod openai;

pub use ollama::OllamaBackend;
pub use openai::OpenAiBackend;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use taskor_core::TaskorResult;

/// Per-invocation generation options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvokeOptions {
    /// Sampling temperature.
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Maximum tokens to generate.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Optional transport-level timeout for the request.
    #[serde(default)]
    pub timeout: Option<Duration>,
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_tokens() -> u32 {
    4096
}

impl Default for InvokeOptions {
    fn default() -> Self {
        Self {
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout: None,
        }
    }
}

impl InvokeOptions {
    /// Sets a transport-level timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Trait for callable generation backends.
///
/// Implementations wrap one model/service endpoint and turn an opaque
/// payload into text output. They must be cheap to share (`Arc`) and
/// safe to invoke concurrently up to the descriptor's ceiling.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Executes one generation request and returns the raw text output.
    async fn invoke(&self, payload: &str, opts: &InvokeOptions) -> TaskorResult<String>;
}
