//! Message classifier — immediate reply or deferred task?
//!
//! One model call decides. The classifier fails closed: any error or
//! malformed verdict means the message is handled immediately, so a user
//! message is never silently dropped on the floor.

use std::sync::Arc;

use murmur_core::message::ChatMessage;
use murmur_core::ModelService;
use tracing::{debug, warn};

use crate::parser::first_json_object;

/// The classifier's verdict for one incoming message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassificationResult {
    /// Answer now.
    Immediate,

    /// Defer to a background slot; send the acknowledgment right away.
    Task { acknowledgment: String },
}

/// Labels incoming messages as immediate or deferrable.
pub struct MessageClassifier {
    model: Arc<dyn ModelService>,
}

impl MessageClassifier {
    pub fn new(model: Arc<dyn ModelService>) -> Self {
        Self { model }
    }

    /// Classify a message given recent conversation context.
    ///
    /// Pure function of its inputs plus one model call; degrades to
    /// `Immediate` on any failure.
    pub async fn classify(
        &self,
        message: &str,
        recent_history: &[ChatMessage],
    ) -> ClassificationResult {
        match self.try_classify(message, recent_history).await {
            Ok(result) => result,
            Err(reason) => {
                warn!(%reason, "Classification failed, defaulting to immediate");
                ClassificationResult::Immediate
            }
        }
    }

    async fn try_classify(
        &self,
        message: &str,
        recent_history: &[ChatMessage],
    ) -> Result<ClassificationResult, String> {
        let prompt = classification_prompt(message, recent_history);
        let raw = self
            .model
            .complete(&prompt)
            .await
            .map_err(|e| e.to_string())?;

        let verdict = first_json_object(&raw).ok_or("no JSON verdict in model output")?;

        match verdict["kind"].as_str() {
            Some("immediate") => Ok(ClassificationResult::Immediate),
            Some("task") => {
                let acknowledgment = verdict["acknowledgment"]
                    .as_str()
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .ok_or("task verdict without acknowledgment")?
                    .to_string();
                debug!(%acknowledgment, "Message classified as deferred task");
                Ok(ClassificationResult::Task { acknowledgment })
            }
            other => Err(format!("unknown classification kind: {other:?}")),
        }
    }
}

fn classification_prompt(message: &str, recent_history: &[ChatMessage]) -> String {
    let mut prompt = String::from(
        "Decide whether this message needs an answer right now, or describes work \
         that can be done in the background once the conversation goes quiet \
         (research, multi-step jobs, anything the user phrased as \"when you get \
         a chance\").\n\n",
    );

    if !recent_history.is_empty() {
        prompt.push_str("Recent conversation:\n");
        for m in recent_history {
            prompt.push_str(&format!("{:?}: {}\n", m.role, m.content));
        }
        prompt.push('\n');
    }

    prompt.push_str(&format!("New message:\n{message}\n\n"));
    prompt.push_str(
        "Reply with only a JSON object: {\"kind\": \"immediate\"} or \
         {\"kind\": \"task\", \"acknowledgment\": \"<short confirmation to send now>\"}",
    );
    prompt
}
