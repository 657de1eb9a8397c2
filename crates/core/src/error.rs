//! Error types for the murmur domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.
//!
//! Propagation policy: only model-service failures and run deadlines
//! propagate to callers as run-level errors. Tool failures are folded into
//! loop context as error-results, classification failures degrade to an
//! immediate reply, and parse failures degrade to treating the raw model
//! text as the final answer — none of those surface here.

use thiserror::Error;

/// The top-level error type for all murmur operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Model service errors ---
    #[error("Model service error: {0}")]
    Model(#[from] ModelError),

    // --- Tool errors ---
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    // --- Conversation history errors ---
    #[error("History error: {0}")]
    History(#[from] HistoryError),

    // --- Notification delivery errors ---
    #[error("Notification error: {0}")]
    Notify(#[from] NotifyError),

    // --- Run deadline ---
    #[error("Run exceeded its deadline of {deadline_secs}s")]
    DeadlineExceeded { deadline_secs: u64 },

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ModelError {
    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("API request failed: {message} (status: {status_code})")]
    Api { status_code: u16, message: String },

    #[error("Malformed model response: {0}")]
    InvalidResponse(String),

    #[error("Model service not configured: {0}")]
    NotConfigured(String),
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),

    #[error("Tool execution failed: {tool_name} — {reason}")]
    ExecutionFailed { tool_name: String, reason: String },
}

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("Storage error: {0}")]
    Storage(String),
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Delivery failed: {0}")]
    Delivery(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_error_displays_correctly() {
        let err = Error::Model(ModelError::Api {
            status_code: 429,
            message: "Too many requests".into(),
        });
        assert!(err.to_string().contains("429"));
        assert!(err.to_string().contains("Too many requests"));
    }

    #[test]
    fn tool_error_displays_correctly() {
        let err = Error::Tool(ToolError::ExecutionFailed {
            tool_name: "http_request".into(),
            reason: "connection refused".into(),
        });
        assert!(err.to_string().contains("http_request"));
        assert!(err.to_string().contains("connection refused"));
    }

    #[test]
    fn deadline_error_names_the_budget() {
        let err = Error::DeadlineExceeded { deadline_secs: 120 };
        assert!(err.to_string().contains("120"));
    }
}
