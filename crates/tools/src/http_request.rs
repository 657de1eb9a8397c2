//! HTTP request tool — fetches a URL on the assistant's behalf.
//!
//! GET and POST only, response bodies capped so a large page cannot blow up
//! the model context.

use async_trait::async_trait;
use murmur_core::error::ToolError;
use murmur_core::tool::{Tool, ToolOutput};
use tracing::debug;

/// Maximum number of response-body bytes handed back to the model.
const MAX_BODY_BYTES: usize = 16 * 1024;

pub struct HttpRequestTool {
    client: reqwest::Client,
}

impl HttpRequestTool {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for HttpRequestTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for HttpRequestTool {
    fn name(&self) -> &str {
        "http_request"
    }

    fn description(&self) -> &str {
        "Make an HTTP request to a URL. Supports GET and POST. Returns the status \
         code and the response body (truncated if large)."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "url": {
                    "type": "string",
                    "description": "The URL to request (http:// or https://)"
                },
                "method": {
                    "type": "string",
                    "enum": ["GET", "POST"],
                    "default": "GET"
                },
                "body": {
                    "type": "string",
                    "description": "Optional request body (POST only)"
                },
                "timeout_secs": {
                    "type": "integer",
                    "description": "Request timeout in seconds (default 30)",
                    "default": 30
                }
            },
            "required": ["url"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolOutput, ToolError> {
        let url = arguments["url"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("missing 'url' argument".into()))?;

        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(ToolError::InvalidArguments(
                "url must start with http:// or https://".into(),
            ));
        }

        let method = arguments["method"].as_str().unwrap_or("GET").to_uppercase();
        let timeout_secs = arguments["timeout_secs"].as_u64().unwrap_or(30);

        let request = match method.as_str() {
            "GET" => self.client.get(url),
            "POST" => {
                let mut req = self.client.post(url);
                if let Some(body) = arguments["body"].as_str() {
                    req = req.body(body.to_string());
                }
                req
            }
            other => {
                return Err(ToolError::InvalidArguments(format!(
                    "unsupported method '{other}' (GET and POST only)"
                )));
            }
        };

        debug!(%url, %method, "Executing http_request tool");

        let response = request
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .send()
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: "http_request".into(),
                reason: e.to_string(),
            })?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: "http_request".into(),
                reason: format!("failed to read body: {e}"),
            })?;

        let truncated = body.len() > MAX_BODY_BYTES;
        let body = if truncated {
            let mut end = MAX_BODY_BYTES;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            &body[..end]
        } else {
            &body[..]
        };

        Ok(ToolOutput::json(serde_json::json!({
            "status": status,
            "body": body,
            "truncated": truncated,
        })))
    }
}
