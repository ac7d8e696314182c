use crate::{GenerationBackend, InvokeOptions};
use async_trait::async_trait;
use taskor_core::{TaskorError, TaskorResult};
use tracing::debug;

/// Ollama HTTP backend for locally served models.
///
/// Uses `/api/generate` for completions and `/api/tags` to discover
/// which models the server currently has loaded, so newly pulled models
/// can be appended to the backend registry at runtime.
pub struct OllamaBackend {
    model: String,
    base_url: String,
    http: reqwest::Client,
}

impl OllamaBackend {
    /// Creates a client for the given model against a local Ollama server.
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            base_url: "http://127.0.0.1:11434".to_string(),
            http: reqwest::Client::new(),
        }
    }

    /// Points the client at a different Ollama server.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// The model this client invokes.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Lists the model names the server currently serves.
    pub async fn list_models(&self) -> TaskorResult<Vec<String>> {
        let url = format!("{}/api/tags", self.base_url);

        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| TaskorError::Http(e.to_string()))?;

        let status = resp.status();
        let body: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| TaskorError::Http(e.to_string()))?;

        if !status.is_success() {
            return Err(TaskorError::Http(format!(
                "Ollama API error {status}: {body}"
            )));
        }

        let models = body["models"]
            .as_array()
            .map(|models| {
                models
                    .iter()
                    .filter_map(|m| m["name"].as_str().map(ToString::to_string))
                    .collect()
            })
            .unwrap_or_default();

        Ok(models)
    }
}

#[async_trait]
impl GenerationBackend for OllamaBackend {
    async fn invoke(&self, payload: &str, opts: &InvokeOptions) -> TaskorResult<String> {
        let url = format!("{}/api/generate", self.base_url);

        let body = serde_json::json!({
            "model": self.model,
            "prompt": payload,
            "stream": false,
            "options": {
                "temperature": opts.temperature,
                "num_predict": opts.max_tokens,
            },
        });

        let mut request = self.http.post(&url);
        if let Some(timeout) = opts.timeout {
            request = request.timeout(timeout);
        }

        debug!(model = %self.model, url = %url, "Ollama: sending generate request");

        let resp = request
            .json(&body)
            .send()
            .await
            .map_err(|e| TaskorError::Http(e.to_string()))?;

        let status = resp.status();
        let resp_body: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| TaskorError::Http(e.to_string()))?;

        if !status.is_success() {
            return Err(TaskorError::Http(format!(
                "Ollama API error {status}: {resp_body}"
            )));
        }

        resp_body["response"]
            .as_str()
            .map(ToString::to_string)
            .ok_or_else(|| {
                TaskorError::Http(format!("Ollama API returned no response field: {resp_body}"))
            })
    }
}
