//! Prompt builder — assembles the model input for one step.
//!
//! Layout, in order: tool catalog and calling convention, the history
//! window, tool results accumulated this run, then the goal instruction.
//! Tool results come after history and before the instruction so the model
//! sees the outcome of its own most recent action.
//!
//! # Determinism
//!
//! Assembly is deterministic: identical inputs always produce an identical
//! prompt. No randomness, no clock reads — the loop's behavior has to be
//! reproducible for testing.

use murmur_core::message::{ChatMessage, Role};
use murmur_core::tool::{ToolDefinition, ToolResult};

/// Assembles model input from conversation state.
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    /// Maximum history messages included, oldest truncated first.
    history_limit: usize,
}

impl PromptBuilder {
    pub fn new(history_limit: usize) -> Self {
        Self { history_limit }
    }

    pub fn history_limit(&self) -> usize {
        self.history_limit
    }

    /// Build the prompt for one model call.
    pub fn build(
        &self,
        history: &[ChatMessage],
        tool_catalog: &[ToolDefinition],
        pending_results: &[ToolResult],
        goal: &str,
    ) -> String {
        let mut prompt = String::new();

        if !tool_catalog.is_empty() {
            prompt.push_str("## Tools\n");
            prompt.push_str(
                "You may call at most one tool per reply. To call a tool, reply with \
                 only a JSON object: {\"tool\": \"<name>\", \"arguments\": {...}}\n\n",
            );
            for def in tool_catalog {
                prompt.push_str(&format!(
                    "- {}: {}\n  parameters: {}\n",
                    def.name,
                    def.description,
                    def.parameters // serde_json maps render in sorted key order
                ));
            }
            prompt.push('\n');
        }

        // FIFO eviction: most recent `history_limit` messages survive.
        let window = &history[history.len().saturating_sub(self.history_limit)..];
        if !window.is_empty() {
            prompt.push_str("## Conversation\n");
            for message in window {
                prompt.push_str(&format!("{}: {}\n", role_label(message.role), message.content));
            }
            prompt.push('\n');
        }

        if !pending_results.is_empty() {
            prompt.push_str("## Tool results this run\n");
            for result in pending_results {
                prompt.push_str(&render_result(result));
                prompt.push('\n');
            }
            prompt.push('\n');
        }

        prompt.push_str("## Instruction\n");
        prompt.push_str(goal);
        prompt.push_str(
            "\n\nReply with a single tool call JSON object, or answer directly as plain text.",
        );

        prompt
    }
}

fn role_label(role: Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::Tool => "tool",
    }
}

fn render_result(result: &ToolResult) -> String {
    match (&result.output, &result.error) {
        (_, Some(error)) => format!("{} -> error: {}", result.tool, error),
        (Some(output), None) => format!("{} -> {}", result.tool, output),
        (None, None) => format!("{} -> (no output)", result.tool),
    }
}
