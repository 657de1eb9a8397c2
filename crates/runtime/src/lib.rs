//! The murmur runtime — deciding *when* deferred work runs.
//!
//! Three pieces:
//!
//! - [`schedule`] — pure, per-task firing policies over conversation idle
//!   time (idle, two-phase, delayed, periodic)
//! - [`scheduler`] — the per-conversation task queues, idle clocks, and the
//!   polling pass that turns due tasks into controller runs
//! - [`assistant`] — the facade callers talk to: `handle_message` for
//!   incoming text, `tick` for the periodic check
//!
//! The invariant everything here protects: at most one controller run is
//! active per conversation at any time, so background work and immediate
//! replies never interleave their model or tool calls for the same user.

pub mod assistant;
pub mod schedule;
pub mod scheduler;

pub use assistant::{Assistant, HandleOutcome};
pub use schedule::Schedule;
pub use scheduler::{ScheduledTask, Scheduler};
