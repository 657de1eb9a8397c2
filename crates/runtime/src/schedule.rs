//! Schedule policies — when should a queued task fire?
//!
//! Every variant answers `should_run(idle)` as a pure predicate over the
//! conversation's idle time plus its own private state (thresholds and
//! monotonic timestamps). The scheduler owns the idle clock itself; a
//! schedule never looks at wall-clock history, only at how long ago it was
//! created or last completed.
//!
//! Uses `tokio::time::Instant`, so tests drive these deterministically
//! under paused time.

use std::time::Duration;

use murmur_config::PolicyConfig;
use tokio::time::Instant;

/// A firing policy attached to exactly one scheduled task.
#[derive(Debug, Clone)]
pub enum Schedule {
    /// Fires once the conversation has been idle long enough. One-shot.
    Idle {
        idle_timeout: Duration,
        completed: bool,
    },

    /// Fires on idle like `Idle`, or unconditionally once
    /// `fallback_threshold` has passed since task creation. The fallback is
    /// the starvation guard: in a conversation chatty enough that idle time
    /// never accumulates, the task still runs eventually. One-shot.
    TwoPhase {
        primary_threshold: Duration,
        fallback_threshold: Duration,
        created_at: Instant,
        completed: bool,
    },

    /// Fires a fixed delay after creation, idle or not. One-shot.
    Delayed {
        delay: Duration,
        created_at: Instant,
        completed: bool,
    },

    /// Fires every `interval`, measured from the previous completion.
    /// Recurring — the owning task is never removed.
    Periodic {
        interval: Duration,
        last_completed: Instant,
    },
}

impl Schedule {
    pub fn idle(idle_timeout: Duration) -> Self {
        Self::Idle {
            idle_timeout,
            completed: false,
        }
    }

    pub fn two_phase(primary_threshold: Duration, fallback_threshold: Duration) -> Self {
        Self::TwoPhase {
            primary_threshold,
            fallback_threshold,
            created_at: Instant::now(),
            completed: false,
        }
    }

    pub fn delayed(delay: Duration) -> Self {
        Self::Delayed {
            delay,
            created_at: Instant::now(),
            completed: false,
        }
    }

    pub fn periodic(interval: Duration) -> Self {
        Self::Periodic {
            interval,
            last_completed: Instant::now(),
        }
    }

    /// Build a schedule from its configuration form.
    pub fn from_policy(policy: &PolicyConfig) -> Self {
        match policy {
            PolicyConfig::Idle { idle_timeout_secs } => {
                Self::idle(Duration::from_secs(*idle_timeout_secs))
            }
            PolicyConfig::TwoPhase {
                idle_timeout_secs,
                fallback_timeout_secs,
            } => Self::two_phase(
                Duration::from_secs(*idle_timeout_secs),
                Duration::from_secs(*fallback_timeout_secs),
            ),
            PolicyConfig::Delayed { delay_secs } => {
                Self::delayed(Duration::from_secs(*delay_secs))
            }
            PolicyConfig::Periodic { interval_secs } => {
                Self::periodic(Duration::from_secs(*interval_secs))
            }
        }
    }

    /// Should the owning task fire now, given the conversation has been
    /// idle for `idle`?
    pub fn should_run(&self, idle: Duration) -> bool {
        match self {
            Self::Idle {
                idle_timeout,
                completed,
            } => !completed && idle >= *idle_timeout,

            Self::TwoPhase {
                primary_threshold,
                fallback_threshold,
                created_at,
                completed,
            } => {
                !completed
                    && (idle >= *primary_threshold || created_at.elapsed() >= *fallback_threshold)
            }

            Self::Delayed {
                delay,
                created_at,
                completed,
            } => !completed && created_at.elapsed() >= *delay,

            Self::Periodic {
                interval,
                last_completed,
            } => last_completed.elapsed() >= *interval,
        }
    }

    /// Invoked when a new message arrives on the owning conversation.
    ///
    /// The idle clock lives in the scheduler and restarts there; no variant
    /// keeps private idle state to rewind. In particular the two-phase
    /// fallback countdown stays anchored to task creation — a message
    /// arrival must never push the starvation guard further out. And a
    /// completed one-shot stays completed: reset never un-fires it.
    pub fn reset(&mut self) {
        // Intentionally empty for every variant today; the method is part
        // of the policy contract and the scheduler calls it on each message
        // arrival. A variant that ever keeps private idle state rewinds it
        // here.
    }

    /// Invoked by the scheduler right after a successful run of the owning
    /// task. Latches one-shot variants fired; re-arms the periodic cycle.
    pub fn mark_complete(&mut self) {
        match self {
            Self::Idle { completed, .. }
            | Self::TwoPhase { completed, .. }
            | Self::Delayed { completed, .. } => *completed = true,
            Self::Periodic { last_completed, .. } => *last_completed = Instant::now(),
        }
    }

    /// Recurring schedules keep their task queued after a run.
    pub fn is_recurring(&self) -> bool {
        matches!(self, Self::Periodic { .. })
    }
}
