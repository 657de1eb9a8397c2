//! The assistant facade — what callers actually talk to.
//!
//! `handle_message` takes an incoming message and either answers it now or
//! acknowledges it and queues a task; `tick` drives the scheduler's
//! periodic check. Callers pick the timer mechanism — the CLI wires a
//! `tokio::time::interval` at the configured check interval.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use murmur_agent::{ClassificationResult, Controller, MessageClassifier, PromptBuilder, RunBudget};
use murmur_config::{AppConfig, PolicyConfig, RoutineConfig};
use murmur_core::event::{DomainEvent, EventBus};
use murmur_core::message::{ChatMessage, OwnerId};
use murmur_core::response::ControllerResponse;
use murmur_core::tool::ToolRegistry;
use murmur_core::{ConversationStore, ModelService, NotificationSink, Result};
use tracing::{debug, info};

use crate::schedule::Schedule;
use crate::scheduler::{ScheduledTask, Scheduler};

/// What `handle_message` produced.
#[derive(Debug)]
pub enum HandleOutcome {
    /// The message was answered synchronously.
    Replied(ControllerResponse),

    /// The message became a background task; this acknowledgment goes out
    /// now, the real answer arrives later through the notification sink.
    Deferred { acknowledgment: String },
}

/// The conversational assistant: classifier in front, controller for the
/// reasoning, scheduler for deferred work.
pub struct Assistant {
    classifier: MessageClassifier,
    controller: Arc<Controller>,
    scheduler: Arc<Scheduler>,
    store: Arc<dyn ConversationStore>,
    events: Arc<EventBus>,
    reply_budget: RunBudget,
    history_limit: usize,
    default_policy: PolicyConfig,
}

impl Assistant {
    /// Wire up a full assistant from configuration and collaborators.
    pub fn new(
        config: &AppConfig,
        model: Arc<dyn ModelService>,
        tools: Arc<ToolRegistry>,
        store: Arc<dyn ConversationStore>,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        let events = Arc::new(EventBus::default());
        let deadline = Duration::from_secs(config.agent.run_deadline_secs);

        let controller = Arc::new(
            Controller::new(
                model.clone(),
                tools,
                PromptBuilder::new(config.agent.conversation_history_limit),
                events.clone(),
            )
            .with_exhausted_message(config.agent.exhausted_message.clone()),
        );

        let scheduler = Arc::new(Scheduler::new(
            controller.clone(),
            store.clone(),
            sink,
            events.clone(),
            RunBudget::new(config.agent.task_max_steps, deadline),
            config.agent.conversation_history_limit,
        ));

        Self {
            classifier: MessageClassifier::new(model),
            controller,
            scheduler,
            store,
            events,
            reply_budget: RunBudget::new(config.agent.reply_max_steps, deadline),
            history_limit: config.agent.conversation_history_limit,
            default_policy: config.scheduler.default_policy.clone(),
        }
    }

    /// Handle one incoming message for a conversation.
    ///
    /// Either returns the answer, or the acknowledgment for work that was
    /// deferred. Only a model-service failure or a blown run deadline
    /// surface as errors; everything else degrades into the response.
    pub async fn handle_message(&self, owner: &OwnerId, text: &str) -> Result<HandleOutcome> {
        self.events.publish(DomainEvent::MessageReceived {
            owner: owner.to_string(),
            content_preview: preview(text),
            timestamp: Utc::now(),
        });

        // The arrival restarts the idle clock and resets every queued
        // task's schedule — before classification, so a freshly deferred
        // task sees a quiet conversation from zero.
        self.scheduler.note_message(owner).await;
        self.store.append(owner, ChatMessage::user(text)).await?;

        let recent = self.store.read(owner, self.history_limit).await?;

        match self.classifier.classify(text, &recent).await {
            ClassificationResult::Task { acknowledgment } => {
                let task = ScheduledTask::new(
                    owner.clone(),
                    text.to_string(),
                    Schedule::from_policy(&self.default_policy),
                );
                debug!(%owner, task_id = %task.id, "Deferring message to background task");
                self.scheduler.enqueue(task).await;

                self.store
                    .append(owner, ChatMessage::assistant(&acknowledgment))
                    .await?;
                Ok(HandleOutcome::Deferred { acknowledgment })
            }

            ClassificationResult::Immediate => {
                // Same per-owner lock the scheduler takes: runs for one
                // conversation are strictly serialized, in admission order.
                let lock = self.scheduler.run_lock(owner).await;
                let _guard = lock.lock().await;

                let history = self.store.read(owner, self.history_limit).await?;
                let response = self
                    .controller
                    .run(owner, &history, text, &self.reply_budget)
                    .await?;

                self.store
                    .append(owner, ChatMessage::assistant(&response.answer))
                    .await?;
                Ok(HandleOutcome::Replied(response))
            }
        }
    }

    /// One scheduler polling pass. Call this on a fixed timer.
    pub async fn tick(&self) {
        self.scheduler.tick().await;
    }

    /// Load standing routines from config as periodic tasks.
    pub async fn load_routines(&self, routines: &[RoutineConfig]) {
        for routine in routines {
            let task = ScheduledTask::with_id(
                routine.name.clone(),
                OwnerId::new(routine.owner.clone()),
                routine.goal.clone(),
                Schedule::periodic(Duration::from_secs(routine.interval_secs)),
            );
            // Routines fire on wall-clock intervals even if the owner has
            // never spoken; seed the idle clock so tick() can see them.
            self.scheduler.note_message(&task.owner).await;
            self.scheduler.enqueue(task).await;
        }
        if !routines.is_empty() {
            info!(count = routines.len(), "Routines loaded from config");
        }
    }

    /// Number of queued tasks for an owner (status displays, tests).
    pub async fn queued_tasks(&self, owner: &OwnerId) -> usize {
        self.scheduler.queued_count(owner).await
    }

    /// The domain event bus, for subscribers.
    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }
}

fn preview(text: &str) -> String {
    const MAX: usize = 80;
    if text.chars().count() <= MAX {
        text.to_string()
    } else {
        let cut: String = text.chars().take(MAX).collect();
        format!("{cut}…")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use murmur_core::error::{ModelError, NotifyError};
    use murmur_history::InMemoryStore;
    use tokio::sync::Mutex;

    const SEC: Duration = Duration::from_secs(1);

    /// Replies with a scripted classification verdict first, then with
    /// scripted answers for controller runs.
    struct ScriptedModel {
        lines: Mutex<Vec<String>>,
    }

    impl ScriptedModel {
        fn new(lines: Vec<&str>) -> Arc<Self> {
            Arc::new(Self {
                lines: Mutex::new(lines.into_iter().rev().map(String::from).collect()),
            })
        }
    }

    #[async_trait]
    impl ModelService for ScriptedModel {
        fn name(&self) -> &str {
            "scripted"
        }
        async fn complete(&self, _prompt: &str) -> std::result::Result<String, ModelError> {
            let mut lines = self.lines.lock().await;
            lines
                .pop()
                .ok_or_else(|| ModelError::InvalidResponse("script exhausted".into()))
        }
    }

    struct RecordingSink {
        delivered: Mutex<Vec<ControllerResponse>>,
    }

    impl RecordingSink {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                delivered: Mutex::new(Vec::new()),
            })
        }
        async fn count(&self) -> usize {
            self.delivered.lock().await.len()
        }
    }

    #[async_trait]
    impl NotificationSink for RecordingSink {
        async fn notify(
            &self,
            _owner: &OwnerId,
            response: &ControllerResponse,
        ) -> std::result::Result<(), NotifyError> {
            self.delivered.lock().await.push(response.clone());
            Ok(())
        }
    }

    fn config_with_idle_policy(idle_timeout_secs: u64) -> AppConfig {
        let mut config = AppConfig::default();
        config.scheduler.default_policy = PolicyConfig::Idle { idle_timeout_secs };
        config
    }

    fn assistant_with(
        config: &AppConfig,
        model: Arc<dyn ModelService>,
        sink: Arc<RecordingSink>,
    ) -> (Assistant, Arc<InMemoryStore>) {
        let store = Arc::new(InMemoryStore::new());
        let assistant = Assistant::new(
            config,
            model,
            Arc::new(ToolRegistry::new()),
            store.clone(),
            sink,
        );
        (assistant, store)
    }

    #[tokio::test(start_paused = true)]
    async fn immediate_message_is_answered_synchronously() {
        let model = ScriptedModel::new(vec![
            r#"{"kind": "immediate"}"#, // classifier verdict
            "Paris.",                   // controller answer
        ]);
        let sink = RecordingSink::new();
        let (assistant, store) = assistant_with(&AppConfig::default(), model, sink);
        let owner = OwnerId::new("u1");

        let outcome = assistant
            .handle_message(&owner, "capital of France?")
            .await
            .unwrap();

        match outcome {
            HandleOutcome::Replied(response) => assert_eq!(response.answer, "Paris."),
            _ => panic!("expected a synchronous reply"),
        }

        // History: user message + assistant answer
        let history = store.read(&owner, 10).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].content, "Paris.");
        assert_eq!(assistant.queued_tasks(&owner).await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn task_message_acknowledged_then_run_on_idle() {
        let model = ScriptedModel::new(vec![
            r#"{"kind": "task", "acknowledgment": "On it!"}"#, // classifier
            "Finished the research.",                          // background run
        ]);
        let sink = RecordingSink::new();
        let config = config_with_idle_policy(300);
        let (assistant, store) = assistant_with(&config, model, sink.clone());
        let owner = OwnerId::new("u1");

        let outcome = assistant
            .handle_message(&owner, "research this when you get a chance")
            .await
            .unwrap();

        match outcome {
            HandleOutcome::Deferred { acknowledgment } => {
                assert_eq!(acknowledgment, "On it!");
            }
            _ => panic!("expected a deferred outcome"),
        }
        assert_eq!(assistant.queued_tasks(&owner).await, 1);
        assert_eq!(sink.count().await, 0);

        // Not idle long enough yet
        tokio::time::advance(299 * SEC).await;
        assistant.tick().await;
        assert_eq!(sink.count().await, 0);

        // Exactly one run once the threshold passes, then the task is gone
        tokio::time::advance(1 * SEC).await;
        assistant.tick().await;
        assert_eq!(sink.count().await, 1);
        assert_eq!(assistant.queued_tasks(&owner).await, 0);

        let delivered = sink.delivered.lock().await;
        assert_eq!(delivered[0].answer, "Finished the research.");
        drop(delivered);

        // The acknowledgment and the eventual answer both made history
        let history = store.read(&owner, 10).await.unwrap();
        let contents: Vec<&str> = history.iter().map(|m| m.content.as_str()).collect();
        assert!(contents.contains(&"On it!"));
        assert!(contents.contains(&"Finished the research."));
    }

    #[tokio::test(start_paused = true)]
    async fn new_message_defers_queued_tasks_further() {
        let model = ScriptedModel::new(vec![
            r#"{"kind": "task", "acknowledgment": "Will do."}"#,
            r#"{"kind": "immediate"}"#,
            "Quick answer.",
            "Deferred work done.",
        ]);
        let sink = RecordingSink::new();
        let config = config_with_idle_policy(300);
        let (assistant, _store) = assistant_with(&config, model, sink.clone());
        let owner = OwnerId::new("u1");

        assistant
            .handle_message(&owner, "look into this later")
            .await
            .unwrap();

        // Just before the idle threshold, the user speaks again
        tokio::time::advance(299 * SEC).await;
        assistant.handle_message(&owner, "quick question").await.unwrap();

        // The original threshold point passes without a firing
        tokio::time::advance(1 * SEC).await;
        assistant.tick().await;
        assert_eq!(sink.count().await, 0);

        // Idle accumulates from the second message instead
        tokio::time::advance(299 * SEC).await;
        assistant.tick().await;
        assert_eq!(sink.count().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn model_failure_on_immediate_run_propagates() {
        let model = ScriptedModel::new(vec![
            r#"{"kind": "immediate"}"#,
            // script exhausted -> controller's model call errors
        ]);
        let sink = RecordingSink::new();
        let (assistant, _store) = assistant_with(&AppConfig::default(), model, sink);
        let owner = OwnerId::new("u1");

        let result = assistant.handle_message(&owner, "hello").await;
        assert!(result.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn routines_fire_periodically() {
        let model = ScriptedModel::new(vec!["Digest ready.", "Digest ready again."]);
        let sink = RecordingSink::new();
        let (assistant, _store) = assistant_with(&AppConfig::default(), model, sink.clone());

        assistant
            .load_routines(&[RoutineConfig {
                name: "digest".into(),
                owner: "cli:local".into(),
                goal: "prepare the digest".into(),
                interval_secs: 3600,
            }])
            .await;

        let owner = OwnerId::new("cli:local");
        assert_eq!(assistant.queued_tasks(&owner).await, 1);

        tokio::time::advance(3600 * SEC).await;
        assistant.tick().await;
        assert_eq!(sink.count().await, 1);
        // Recurring: still queued
        assert_eq!(assistant.queued_tasks(&owner).await, 1);

        tokio::time::advance(3600 * SEC).await;
        assistant.tick().await;
        assert_eq!(sink.count().await, 2);
    }
}
