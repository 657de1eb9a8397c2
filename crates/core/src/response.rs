//! Controller run output types.

use serde::{Deserialize, Serialize};

/// Record of one tool call actually executed during a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallRecord {
    /// Name of the tool that ran
    pub tool: String,

    /// The arguments it was called with
    pub arguments: serde_json::Value,

    /// Error message if the call failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Wall-clock duration of the call
    pub duration_ms: u64,
}

/// The terminal output of one controller run. Immutable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerResponse {
    /// The answer text shown to the user
    pub answer: String,

    /// Thinking trace extracted from the model output, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thinking: Option<String>,

    /// Base64-encoded blobs accumulated from tool output, in order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<String>,

    /// Every tool call executed this run, in order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCallRecord>,
}

impl ControllerResponse {
    /// A bare text answer with no tool activity.
    pub fn answer(text: impl Into<String>) -> Self {
        Self {
            answer: text.into(),
            thinking: None,
            attachments: Vec::new(),
            tool_calls: Vec::new(),
        }
    }
}
