//! The agentic controller — a bounded step-loop state machine.
//!
//! A run starts at step 0 and either reaches a final answer (DONE) or burns
//! through its step budget (EXHAUSTED). Each step is one model call plus at
//! most one tool execution. The whole run races an overall wall-clock
//! deadline so a permissive step budget cannot produce unbounded latency.
//!
//! Failure semantics:
//! - A model-service failure aborts the run. No retry here — retry policy
//!   belongs to the caller.
//! - A tool failure is folded into the working context as an error-result;
//!   the model can self-correct on the next step.
//! - Budget exhaustion is not an error: the run still returns a best-effort
//!   response carrying everything that happened.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use murmur_core::event::{DomainEvent, EventBus};
use murmur_core::message::{ChatMessage, OwnerId};
use murmur_core::response::{ControllerResponse, ToolCallRecord};
use murmur_core::tool::{ToolRegistry, ToolResult};
use murmur_core::{Error, ModelService, Result};
use tracing::{debug, info, warn};

use crate::parser::{self, Parsed};
use crate::prompt::PromptBuilder;

/// Per-run limits, supplied by the caller.
///
/// Immediate replies and background tasks carry different step budgets —
/// a task is not latency-sensitive and can afford more tool round-trips.
#[derive(Debug, Clone, Copy)]
pub struct RunBudget {
    /// Maximum steps (model calls) before the run is declared exhausted.
    pub max_steps: u32,

    /// Overall wall-clock budget, independent of step count.
    pub deadline: Duration,
}

impl RunBudget {
    pub fn new(max_steps: u32, deadline: Duration) -> Self {
        Self { max_steps, deadline }
    }
}

/// Runs the bounded reasoning loop for one goal.
pub struct Controller {
    model: Arc<dyn ModelService>,
    tools: Arc<ToolRegistry>,
    prompt: PromptBuilder,
    events: Arc<EventBus>,
    exhausted_message: String,
}

impl Controller {
    pub fn new(
        model: Arc<dyn ModelService>,
        tools: Arc<ToolRegistry>,
        prompt: PromptBuilder,
        events: Arc<EventBus>,
    ) -> Self {
        Self {
            model,
            tools,
            prompt,
            events,
            exhausted_message: "I ran out of working steps before finishing this.".into(),
        }
    }

    /// Set the user-facing text returned when the step budget runs out.
    pub fn with_exhausted_message(mut self, message: impl Into<String>) -> Self {
        self.exhausted_message = message.into();
        self
    }

    pub fn prompt_builder(&self) -> &PromptBuilder {
        &self.prompt
    }

    /// Run the loop to completion.
    ///
    /// History is read-only here — appending the outcome is the caller's
    /// job, which is what keeps concurrent runs for different owners from
    /// interleaving writes.
    pub async fn run(
        &self,
        owner: &OwnerId,
        history: &[ChatMessage],
        goal: &str,
        budget: &RunBudget,
    ) -> Result<ControllerResponse> {
        let started = std::time::Instant::now();

        let outcome = tokio::time::timeout(
            budget.deadline,
            self.run_steps(owner, history, goal, budget.max_steps),
        )
        .await;

        match outcome {
            Ok(result) => match result {
                Ok((response, steps)) => {
                    self.events.publish(DomainEvent::ResponseGenerated {
                        owner: owner.to_string(),
                        steps,
                        duration_ms: started.elapsed().as_millis() as u64,
                        timestamp: Utc::now(),
                    });
                    Ok(response)
                }
                Err(e) => Err(e),
            },
            Err(_) => {
                warn!(%owner, deadline = ?budget.deadline, "Run exceeded its deadline");
                Err(Error::DeadlineExceeded {
                    deadline_secs: budget.deadline.as_secs(),
                })
            }
        }
    }

    /// The loop proper. Returns the response and how many model calls it took.
    async fn run_steps(
        &self,
        owner: &OwnerId,
        history: &[ChatMessage],
        goal: &str,
        max_steps: u32,
    ) -> Result<(ControllerResponse, u32)> {
        let catalog = self.tools.definitions();
        let mut pending_results: Vec<ToolResult> = Vec::new();
        let mut records: Vec<ToolCallRecord> = Vec::new();
        let mut attachments: Vec<String> = Vec::new();

        for step in 0..max_steps {
            debug!(%owner, step, "Controller step");

            let prompt = self.prompt.build(history, &catalog, &pending_results, goal);

            // The one place a run can die: a model-service failure.
            let raw = self.model.complete(&prompt).await?;

            match parser::parse(&raw) {
                Parsed::Answer { answer, thinking } => {
                    info!(%owner, step, tool_calls = records.len(), "Run finished with an answer");
                    return Ok((
                        ControllerResponse {
                            answer,
                            thinking,
                            attachments,
                            tool_calls: records,
                        },
                        step + 1,
                    ));
                }
                Parsed::ToolCall(call) => {
                    let call_started = std::time::Instant::now();
                    let result = self.tools.execute(&call).await;
                    let duration_ms = call_started.elapsed().as_millis() as u64;

                    self.events.publish(DomainEvent::ToolExecuted {
                        tool_name: call.tool.clone(),
                        success: !result.is_error(),
                        duration_ms,
                        timestamp: Utc::now(),
                    });

                    records.push(ToolCallRecord {
                        tool: call.tool.clone(),
                        arguments: call.arguments.clone(),
                        error: result.error.clone(),
                        duration_ms,
                    });
                    attachments.extend(result.attachments.iter().cloned());
                    pending_results.push(result);
                }
            }
        }

        // EXHAUSTED: the budget ran out while the model kept calling tools.
        // Still a response, never a hang or an empty hand.
        warn!(%owner, max_steps, "Step budget exhausted without a final answer");
        Ok((
            ControllerResponse {
                answer: self.exhausted_message.clone(),
                thinking: None,
                attachments,
                tool_calls: records,
            },
            max_steps,
        ))
    }
}
