use crate::{GenerationBackend, InvokeOptions};
use async_trait::async_trait;
use taskor_core::{TaskorError, TaskorResult};
use tracing::debug;

/// OpenAI-compatible chat-completions backend.
///
/// Works with OpenAI, OpenRouter, Groq, and any other provider that
/// implements the OpenAI chat completions API.
pub struct OpenAiBackend {
    model_id: String,
    api_key: String,
    base_url: String,
    http: reqwest::Client,
}

impl OpenAiBackend {
    /// Creates a client for the given model, pointed at api.openai.com.
    pub fn new(model_id: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            model_id: model_id.into(),
            api_key: api_key.into(),
            base_url: "https://api.openai.com".to_string(),
            http: reqwest::Client::new(),
        }
    }

    /// Points the client at a different OpenAI-compatible server.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// The model this client invokes.
    pub fn model_id(&self) -> &str {
        &self.model_id
    }
}

#[async_trait]
impl GenerationBackend for OpenAiBackend {
    async fn invoke(&self, payload: &str, opts: &InvokeOptions) -> TaskorResult<String> {
        let url = format!("{}/v1/chat/completions", self.base_url);

        let body = serde_json::json!({
            "model": self.model_id,
            "max_tokens": opts.max_tokens,
            "temperature": opts.temperature,
            "messages": [{"role": "user", "content": payload}],
        });

        let mut request = self
            .http
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json");

        if let Some(timeout) = opts.timeout {
            request = request.timeout(timeout);
        }

        debug!(model = %self.model_id, url = %url, "OpenAI: sending completion request");

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
                "OpenAI API error {status}: {resp_body}"
            )));
        }

        resp_body["choices"][0]["message"]["content"]
            .as_str()
            .map(ToString::to_string)
            .ok_or_else(|| {
                TaskorError::Http(format!(
                    "OpenAI API returned no message content: {resp_body}"
                ))
            })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn completion_body(content: &str) -> serde_json::Value {
        serde_json::json!({
            "choices": [{
                "message": {"role": "assistant", "content": content},
                "finish_reason": "stop"
            }]
        })
    }

    #[tokio::test]
    async fn test_invoke_returns_message_content() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("Authorization", "Bearer test-key"))
            .and(body_partial_json(serde_json::json!({"model": "gpt-test"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion_body("fn main() {}")))
            .mount(&server)
            .await;

        let backend = OpenAiBackend::new("gpt-test", "test-key").with_base_url(server.uri());
        let output = backend
            .invoke("write a main function", &InvokeOptions::default())
            .await
            .unwrap();
        assert_eq!(output, "fn main() {}");
    }

    #[tokio::test]
    async fn test_invoke_surfaces_api_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(
                ResponseTemplate::new(429)
                    .set_body_json(serde_json::json!({"error": "rate limited"})),
            )
            .mount(&server)
            .await;

        let backend = OpenAiBackend::new("gpt-test", "k").with_base_url(server.uri());
        let err = backend
            .invoke("hello", &InvokeOptions::default())
            .await
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("429"), "expected status in error, got: {msg}");
    }

    #[tokio::test]
    async fn test_invoke_rejects_malformed_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true})))
            .mount(&server)
            .await;

        let backend = OpenAiBackend::new("gpt-test", "k").with_base_url(server.uri());
        let err = backend
            .invoke("hello", &InvokeOptions::default())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no message content"));
    }

    #[tokio::test]
    async fn test_invoke_passes_generation_options() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(body_partial_json(serde_json::json!({
                "temperature": 0.1,
                "max_tokens": 256
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion_body("ok")))
            .mount(&server)
            .await;

        let opts = InvokeOptions {
            temperature: 0.1,
            max_tokens: 256,
            timeout: None,
        };
        let backend = OpenAiBackend::new("gpt-test", "k").with_base_url(server.uri());
        assert_eq!(backend.invoke("hi", &opts).await.unwrap(), "ok");
    }
}
