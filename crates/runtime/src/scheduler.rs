//! Background scheduler — owns task queues and idle clocks per conversation.
//!
//! One polling pass (`tick`) per `task_check_interval`: compute each
//! conversation's idle time, ask every queued task's schedule whether it
//! should fire, and run the due ones through the controller with the
//! task-level step budget. Results go out through the notification sink.
//!
//! Concurrency discipline: the owner map is only ever locked for short,
//! non-awaiting sections. Each conversation has its own run lock — the same
//! lock immediate replies take — so runs for one owner are strictly
//! serialized while independent owners proceed concurrently. There is no
//! global run lock.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use murmur_agent::{Controller, RunBudget};
use murmur_core::event::{DomainEvent, EventBus};
use murmur_core::message::{ChatMessage, OwnerId};
use murmur_core::response::ControllerResponse;
use murmur_core::{ConversationStore, NotificationSink};
use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::schedule::Schedule;

/// A deferred piece of work queued for a conversation.
#[derive(Debug)]
pub struct ScheduledTask {
    /// Unique task id
    pub id: String,

    /// The conversation this task belongs to
    pub owner: OwnerId,

    /// The goal text handed to the controller when the task fires
    pub goal: String,

    /// When the task was created
    pub created_at: DateTime<Utc>,

    /// When the task last ran, if ever
    pub last_run: Option<DateTime<Utc>>,

    /// The firing policy. Owned exclusively by this task.
    pub schedule: Schedule,
}

impl ScheduledTask {
    pub fn new(owner: OwnerId, goal: impl Into<String>, schedule: Schedule) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            owner,
            goal: goal.into(),
            created_at: Utc::now(),
            last_run: None,
            schedule,
        }
    }

    /// A task with a caller-chosen id (config routines use their name).
    pub fn with_id(
        id: impl Into<String>,
        owner: OwnerId,
        goal: impl Into<String>,
        schedule: Schedule,
    ) -> Self {
        Self {
            id: id.into(),
            owner,
            goal: goal.into(),
            created_at: Utc::now(),
            last_run: None,
            schedule,
        }
    }
}

/// Everything the scheduler tracks for one conversation.
struct OwnerState {
    /// When the last message arrived — the idle clock's zero point.
    last_message_at: Instant,

    /// Queued tasks, in enqueue order.
    tasks: Vec<ScheduledTask>,

    /// Serializes controller runs for this conversation. Shared with the
    /// assistant facade so immediate replies queue behind background runs
    /// and vice versa.
    run_lock: Arc<Mutex<()>>,
}

impl OwnerState {
    fn new() -> Self {
        Self {
            last_message_at: Instant::now(),
            tasks: Vec::new(),
            run_lock: Arc::new(Mutex::new(())),
        }
    }
}

/// The background scheduler.
pub struct Scheduler {
    owners: RwLock<HashMap<OwnerId, OwnerState>>,
    controller: Arc<Controller>,
    store: Arc<dyn ConversationStore>,
    sink: Arc<dyn NotificationSink>,
    events: Arc<EventBus>,
    task_budget: RunBudget,
    history_limit: usize,
}

impl Scheduler {
    pub fn new(
        controller: Arc<Controller>,
        store: Arc<dyn ConversationStore>,
        sink: Arc<dyn NotificationSink>,
        events: Arc<EventBus>,
        task_budget: RunBudget,
        history_limit: usize,
    ) -> Self {
        Self {
            owners: RwLock::new(HashMap::new()),
            controller,
            store,
            sink,
            events,
            task_budget,
            history_limit,
        }
    }

    /// Record a message arrival: restart the owner's idle clock and reset
    /// every queued task's schedule. Called before the message is
    /// classified, so an interrupting task defers further.
    pub async fn note_message(&self, owner: &OwnerId) {
        let mut owners = self.owners.write().await;
        let state = owners
            .entry(owner.clone())
            .or_insert_with(OwnerState::new);
        state.last_message_at = Instant::now();
        for task in &mut state.tasks {
            task.schedule.reset();
        }
    }

    /// Queue a task for its owner.
    pub async fn enqueue(&self, task: ScheduledTask) {
        info!(owner = %task.owner, task_id = %task.id, "Task enqueued");
        self.events.publish(DomainEvent::TaskEnqueued {
            owner: task.owner.to_string(),
            task_id: task.id.clone(),
            timestamp: Utc::now(),
        });

        let mut owners = self.owners.write().await;
        owners
            .entry(task.owner.clone())
            .or_insert_with(OwnerState::new)
            .tasks
            .push(task);
    }

    /// The run lock for a conversation. Hold it for the whole duration of
    /// any controller run on behalf of this owner.
    pub async fn run_lock(&self, owner: &OwnerId) -> Arc<Mutex<()>> {
        let mut owners = self.owners.write().await;
        owners
            .entry(owner.clone())
            .or_insert_with(OwnerState::new)
            .run_lock
            .clone()
    }

    /// How long the conversation has been idle, if we have seen it at all.
    pub async fn idle_for(&self, owner: &OwnerId) -> Option<Duration> {
        let owners = self.owners.read().await;
        owners.get(owner).map(|s| s.last_message_at.elapsed())
    }

    /// Number of tasks currently queued for an owner.
    pub async fn queued_count(&self, owner: &OwnerId) -> usize {
        let owners = self.owners.read().await;
        owners.get(owner).map(|s| s.tasks.len()).unwrap_or(0)
    }

    /// One polling pass over every conversation.
    ///
    /// Owners with due tasks are processed concurrently with each other,
    /// sequentially within themselves.
    pub async fn tick(&self) {
        let candidates: Vec<(OwnerId, Arc<Mutex<()>>)> = {
            let owners = self.owners.read().await;
            owners
                .iter()
                .filter(|(_, state)| {
                    let idle = state.last_message_at.elapsed();
                    state.tasks.iter().any(|t| t.schedule.should_run(idle))
                })
                .map(|(owner, state)| (owner.clone(), state.run_lock.clone()))
                .collect()
        };

        if candidates.is_empty() {
            return;
        }
        debug!(owners = candidates.len(), "Tick found due tasks");

        futures::future::join_all(
            candidates
                .into_iter()
                .map(|(owner, lock)| self.drain_due_tasks(owner, lock)),
        )
        .await;
    }

    /// Run every due task for one owner, one at a time, under its run lock.
    async fn drain_due_tasks(&self, owner: OwnerId, lock: Arc<Mutex<()>>) {
        let _guard = lock.lock().await;
        let mut handled: Vec<String> = Vec::new();

        loop {
            // Re-check under the lock each time: a message may have arrived
            // while we waited, resetting the idle clock.
            let due = {
                let owners = self.owners.read().await;
                let Some(state) = owners.get(&owner) else { return };
                let idle = state.last_message_at.elapsed();
                state
                    .tasks
                    .iter()
                    .find(|t| !handled.contains(&t.id) && t.schedule.should_run(idle))
                    .map(|t| (t.id.clone(), t.goal.clone(), idle))
            };
            let Some((task_id, goal, idle)) = due else { return };
            handled.push(task_id.clone());

            self.events.publish(DomainEvent::TaskFired {
                owner: owner.to_string(),
                task_id: task_id.clone(),
                idle_secs: idle.as_secs(),
                timestamp: Utc::now(),
            });
            info!(%owner, %task_id, idle_secs = idle.as_secs(), "Running due task");

            self.run_task(&owner, &task_id, &goal).await;
            self.complete_task(&owner, &task_id).await;
        }
    }

    /// One controller run for a fired task, plus delivery of the outcome.
    async fn run_task(&self, owner: &OwnerId, task_id: &str, goal: &str) {
        let history = match self.store.read(owner, self.history_limit).await {
            Ok(history) => history,
            Err(e) => {
                warn!(%owner, error = %e, "History read failed, running task without context");
                Vec::new()
            }
        };

        let response = match self
            .controller
            .run(owner, &history, goal, &self.task_budget)
            .await
        {
            Ok(response) => response,
            Err(e) => {
                // Reported, not retried — the task is still completed below.
                warn!(%owner, %task_id, error = %e, "Background run failed");
                self.events.publish(DomainEvent::ErrorOccurred {
                    context: format!("background task {task_id}"),
                    error_message: e.to_string(),
                    timestamp: Utc::now(),
                });
                ControllerResponse::answer(format!(
                    "I wasn't able to finish the background work I promised: {e}"
                ))
            }
        };

        if let Err(e) = self
            .store
            .append(owner, ChatMessage::assistant(&response.answer))
            .await
        {
            warn!(%owner, error = %e, "Failed to append background answer to history");
        }

        if let Err(e) = self.sink.notify(owner, &response).await {
            warn!(%owner, %task_id, error = %e, "Notification delivery failed");
        }
    }

    /// Mark the task complete; drop it unless its policy is recurring.
    async fn complete_task(&self, owner: &OwnerId, task_id: &str) {
        let mut owners = self.owners.write().await;
        let Some(state) = owners.get_mut(owner) else { return };
        let Some(pos) = state.tasks.iter().position(|t| t.id == task_id) else {
            return;
        };

        let task = &mut state.tasks[pos];
        task.schedule.mark_complete();
        task.last_run = Some(Utc::now());
        let recurring = task.schedule.is_recurring();

        self.events.publish(DomainEvent::TaskCompleted {
            owner: owner.to_string(),
            task_id: task_id.to_string(),
            recurring,
            timestamp: Utc::now(),
        });

        if !recurring {
            state.tasks.remove(pos);
        }
    }
}
