//! OpenAI-compatible model service implementation.
//!
//! Works with: OpenAI, OpenRouter, Ollama, vLLM, Together AI, and any other
//! endpoint exposing `/v1/chat/completions`. The whole assembled prompt is
//! sent as a single user message and the first choice's content comes back
//! as the completion text — tool calling happens in text, not in the
//! provider's structured tool API, so the request shape stays minimal.

use async_trait::async_trait;
use murmur_core::error::ModelError;
use murmur_core::ModelService;
use serde::Deserialize;
use tracing::{debug, warn};

/// An OpenAI-compatible model service.
pub struct OpenAiCompatModel {
    name: String,
    base_url: String,
    api_key: String,
    model: String,
    client: reqwest::Client,
    request_timeout: std::time::Duration,
}

impl OpenAiCompatModel {
    /// Create a new OpenAI-compatible model service.
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
            client: reqwest::Client::new(),
            request_timeout: std::time::Duration::from_secs(120),
        }
    }

    /// Create an OpenRouter backend (convenience constructor).
    pub fn openrouter(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self::new("openrouter", "https://openrouter.ai/api/v1", api_key, model)
    }

    /// Create an OpenAI backend (convenience constructor).
    pub fn openai(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self::new("openai", "https://api.openai.com/v1", api_key, model)
    }

    /// Create an Ollama backend (convenience constructor).
    pub fn ollama(base_url: Option<&str>, model: impl Into<String>) -> Self {
        Self::new(
            "ollama",
            base_url.unwrap_or("http://localhost:11434/v1"),
            "ollama", // Ollama doesn't need a real key
            model,
        )
    }

    /// Set the per-request timeout.
    pub fn with_request_timeout(mut self, timeout: std::time::Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    fn request_body(&self, prompt: &str) -> serde_json::Value {
        serde_json::json!({
            "model": self.model,
            "messages": [{"role": "user", "content": prompt}],
            "stream": false,
        })
    }
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    choices: Vec<ApiChoice>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiMessage,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    content: Option<String>,
}

/// Pull the completion text out of a parsed chat-completions response.
fn extract_content(response: ApiResponse) -> Result<String, ModelError> {
    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| ModelError::InvalidResponse("no choices in response".into()))?;

    choice
        .message
        .content
        .ok_or_else(|| ModelError::InvalidResponse("choice has no content".into()))
}

#[async_trait]
impl ModelService for OpenAiCompatModel {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, prompt: &str) -> Result<String, ModelError> {
        let url = format!("{}/chat/completions", self.base_url);

        debug!(backend = %self.name, model = %self.model, "Sending completion request");

        let response = self
            .client
            .post(&url)
            .timeout(self.request_timeout)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&self.request_body(prompt))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ModelError::Timeout(format!("no response within {:?}", self.request_timeout))
                } else {
                    ModelError::Network(e.to_string())
                }
            })?;

        let status = response.status().as_u16();
        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Model backend returned error");
            return Err(ModelError::Api {
                status_code: status,
                message: error_body,
            });
        }

        let api_response: ApiResponse = response
            .json()
            .await
            .map_err(|e| ModelError::InvalidResponse(format!("failed to parse response: {e}")))?;

        extract_content(api_response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_body_shape() {
        let model = OpenAiCompatModel::openai("sk-test", "gpt-4o");
        let body = model.request_body("What time is it?");
        assert_eq!(body["model"], "gpt-4o");
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["messages"][0]["content"], "What time is it?");
        assert_eq!(body["stream"], false);
    }

    #[test]
    fn base_url_trailing_slash_trimmed() {
        let model = OpenAiCompatModel::new("custom", "http://localhost:8000/v1/", "", "m");
        assert_eq!(model.base_url, "http://localhost:8000/v1");
    }

    #[test]
    fn extract_content_happy_path() {
        let response: ApiResponse = serde_json::from_value(serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": "Hello!"}}]
        }))
        .unwrap();
        assert_eq!(extract_content(response).unwrap(), "Hello!");
    }

    #[test]
    fn extract_content_no_choices() {
        let response: ApiResponse =
            serde_json::from_value(serde_json::json!({"choices": []})).unwrap();
        assert!(matches!(
            extract_content(response),
            Err(ModelError::InvalidResponse(_))
        ));
    }

    #[test]
    fn extract_content_null_content() {
        let response: ApiResponse = serde_json::from_value(serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": null}}]
        }))
        .unwrap();
        assert!(extract_content(response).is_err());
    }
}
