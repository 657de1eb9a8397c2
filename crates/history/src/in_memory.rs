//! In-memory history backend — per-owner message logs behind an RwLock.

use async_trait::async_trait;
use murmur_core::error::HistoryError;
use murmur_core::message::{ChatMessage, OwnerId};
use murmur_core::ConversationStore;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// An in-memory conversation store.
///
/// Messages are kept per owner in arrival order. Useful for testing and
/// ephemeral sessions where persistence isn't needed.
pub struct InMemoryStore {
    conversations: RwLock<HashMap<OwnerId, Vec<ChatMessage>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            conversations: RwLock::new(HashMap::new()),
        }
    }

    /// Total number of messages stored for an owner.
    pub async fn len(&self, owner: &OwnerId) -> usize {
        self.conversations
            .read()
            .await
            .get(owner)
            .map(|m| m.len())
            .unwrap_or(0)
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConversationStore for InMemoryStore {
    async fn read(
        &self,
        owner: &OwnerId,
        limit: usize,
    ) -> Result<Vec<ChatMessage>, HistoryError> {
        let conversations = self.conversations.read().await;
        let Some(messages) = conversations.get(owner) else {
            return Ok(Vec::new());
        };

        // Most recent `limit` messages, still oldest-first.
        let start = messages.len().saturating_sub(limit);
        Ok(messages[start..].to_vec())
    }

    async fn append(&self, owner: &OwnerId, message: ChatMessage) -> Result<(), HistoryError> {
        self.conversations
            .write()
            .await
            .entry(owner.clone())
            .or_default()
            .push(message);
        Ok(())
    }
}
