//! ConversationStore trait — the abstraction over conversation history.
//!
//! History is owned by the store; the agent core only ever reads a bounded
//! window and appends new messages. Persistence schema design is out of
//! scope — backends live in `murmur-history`.

use async_trait::async_trait;

use crate::error::HistoryError;
use crate::message::{ChatMessage, OwnerId};

/// Read/append access to per-conversation message history.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// The most recent `limit` messages for this owner, oldest first.
    async fn read(
        &self,
        owner: &OwnerId,
        limit: usize,
    ) -> std::result::Result<Vec<ChatMessage>, HistoryError>;

    /// Append a message to this owner's history.
    async fn append(
        &self,
        owner: &OwnerId,
        message: ChatMessage,
    ) -> std::result::Result<(), HistoryError>;
}
