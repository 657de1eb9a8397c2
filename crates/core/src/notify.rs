//! NotificationSink trait — out-of-band delivery of background results.
//!
//! When a deferred task completes, the user did not ask for the answer
//! synchronously; the sink is how it reaches them. Channel adapters
//! implement this — the core never talks to a transport directly.

use async_trait::async_trait;

use crate::error::NotifyError;
use crate::message::OwnerId;
use crate::response::ControllerResponse;

/// Accepts a finished `ControllerResponse` for out-of-band delivery.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(
        &self,
        owner: &OwnerId,
        response: &ControllerResponse,
    ) -> std::result::Result<(), NotifyError>;
}
