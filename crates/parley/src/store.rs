//! Persistence of conversations and their messages.
//!
//! Every operation is scoped to the owning user: a conversation that
//! belongs to someone else is reported as [`StoreError::NotFound`], the same
//! as one that does not exist.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Title given to conversations created without one.
pub const DEFAULT_TITLE: &str = "New Conversation";

/// A stored conversation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Conversation {
    /// Conversation identifier.
    pub id: Uuid,
    /// Owner of the conversation.
    pub user_id: String,
    /// Display title.
    pub title: String,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Time of the last appended message, or the creation time.
    pub updated_at: DateTime<Utc>,
}

/// Author of a stored message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The signed-in user.
    User,
    /// The assistant.
    Assistant,
}

/// A stored message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StoredMessage {
    /// Message identifier.
    pub id: Uuid,
    /// Conversation the message belongs to.
    pub conversation_id: Uuid,
    /// Author of the message.
    pub role: Role,
    /// Message text.
    pub content: String,
    /// Time the message was stored.
    pub created_at: DateTime<Utc>,
}

/// An error raised by a [`ConversationStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    /// No conversation with this id is visible to the user.
    #[error("conversation {0} not found")]
    NotFound(Uuid),
    /// The backing storage failed.
    #[error("storage failure: {0}")]
    Backend(String),
}

/// Storage for conversations, keyed by owner.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Lists the user's conversations, most recently updated first.
    async fn list_conversations(
        &self,
        user_id: &str,
    ) -> Result<Vec<Conversation>, StoreError>;

    /// Creates an empty conversation.
    async fn create_conversation(
        &self,
        user_id: &str,
        title: &str,
    ) -> Result<Conversation, StoreError>;

    /// Returns a single conversation.
    async fn get_conversation(
        &self,
        user_id: &str,
        id: Uuid,
    ) -> Result<Conversation, StoreError>;

    /// Deletes a conversation together with its messages.
    async fn delete_conversation(
        &self,
        user_id: &str,
        id: Uuid,
    ) -> Result<(), StoreError>;

    /// Returns the messages of a conversation, oldest first.
    async fn list_messages(
        &self,
        user_id: &str,
        id: Uuid,
    ) -> Result<Vec<StoredMessage>, StoreError>;

    /// Appends a message and bumps the conversation's `updated_at`.
    async fn append_message(
        &self,
        user_id: &str,
        id: Uuid,
        role: Role,
        content: &str,
    ) -> Result<StoredMessage, StoreError>;
}

struct Entry {
    conversation: Conversation,
    messages: Vec<StoredMessage>,
    // Breaks ties between equal timestamps.
    touched: u64,
}

#[derive(Default)]
struct Inner {
    entries: HashMap<Uuid, Entry>,
    clock: u64,
}

impl Inner {
    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    fn owned_mut(
        &mut self,
        user_id: &str,
        id: Uuid,
    ) -> Result<&mut Entry, StoreError> {
        self.entries
            .get_mut(&id)
            .filter(|entry| entry.conversation.user_id == user_id)
            .ok_or(StoreError::NotFound(id))
    }

    fn owned(&self, user_id: &str, id: Uuid) -> Result<&Entry, StoreError> {
        self.entries
            .get(&id)
            .filter(|entry| entry.conversation.user_id == user_id)
            .ok_or(StoreError::NotFound(id))
    }
}

/// An in-process [`ConversationStore`]. Contents are lost on restart.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConversationStore for MemoryStore {
    async fn list_conversations(
        &self,
        user_id: &str,
    ) -> Result<Vec<Conversation>, StoreError> {
        let inner = self.inner.read().await;
        let mut entries: Vec<&Entry> = inner
            .entries
            .values()
            .filter(|entry| entry.conversation.user_id == user_id)
            .collect();
        entries.sort_by(|a, b| {
            (b.conversation.updated_at, b.touched)
                .cmp(&(a.conversation.updated_at, a.touched))
        });
        Ok(entries
            .into_iter()
            .map(|entry| entry.conversation.clone())
            .collect())
    }

    async fn create_conversation(
        &self,
        user_id: &str,
        title: &str,
    ) -> Result<Conversation, StoreError> {
        let now = Utc::now();
        let conversation = Conversation {
            id: Uuid::new_v4(),
            user_id: user_id.to_owned(),
            title: title.to_owned(),
            created_at: now,
            updated_at: now,
        };

        let mut inner = self.inner.write().await;
        let touched = inner.tick();
        inner.entries.insert(
            conversation.id,
            Entry {
                conversation: conversation.clone(),
                messages: Vec::new(),
                touched,
            },
        );
        debug!(id = %conversation.id, "created conversation");
        Ok(conversation)
    }

    async fn get_conversation(
        &self,
        user_id: &str,
        id: Uuid,
    ) -> Result<Conversation, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner.owned(user_id, id)?.conversation.clone())
    }

    async fn delete_conversation(
        &self,
        user_id: &str,
        id: Uuid,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        inner.owned(user_id, id)?;
        inner.entries.remove(&id);
        debug!(%id, "deleted conversation");
        Ok(())
    }

    async fn list_messages(
        &self,
        user_id: &str,
        id: Uuid,
    ) -> Result<Vec<StoredMessage>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner.owned(user_id, id)?.messages.clone())
    }

    async fn append_message(
        &self,
        user_id: &str,
        id: Uuid,
        role: Role,
        content: &str,
    ) -> Result<StoredMessage, StoreError> {
        let mut inner = self.inner.write().await;
        let touched = inner.tick();
        let entry = inner.owned_mut(user_id, id)?;

        let message = StoredMessage {
            id: Uuid::new_v4(),
            conversation_id: id,
            role,
            content: content.to_owned(),
            created_at: Utc::now(),
        };
        entry.messages.push(message.clone());
        entry.conversation.updated_at = message.created_at;
        entry.touched = touched;
        Ok(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_conversation_lifecycle() {
        let store = MemoryStore::new();
        let conv = store.create_conversation("alice", "Trip").await.unwrap();
        assert_eq!(conv.created_at, conv.updated_at);

        store
            .append_message("alice", conv.id, Role::User, "Hi")
            .await
            .unwrap();
        let reply = store
            .append_message("alice", conv.id, Role::Assistant, "Hello!")
            .await
            .unwrap();

        let messages = store.list_messages("alice", conv.id).await.unwrap();
        let contents: Vec<_> =
            messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, ["Hi", "Hello!"]);

        let conv = store.get_conversation("alice", conv.id).await.unwrap();
        assert_eq!(conv.updated_at, reply.created_at);

        store.delete_conversation("alice", conv.id).await.unwrap();
        assert!(matches!(
            store.get_conversation("alice", conv.id).await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_most_recently_updated_first() {
        let store = MemoryStore::new();
        let first = store.create_conversation("alice", "first").await.unwrap();
        store.create_conversation("alice", "second").await.unwrap();

        let titles = |list: Vec<Conversation>| {
            list.into_iter().map(|c| c.title).collect::<Vec<_>>()
        };
        let list = store.list_conversations("alice").await.unwrap();
        assert_eq!(titles(list), ["second", "first"]);

        store
            .append_message("alice", first.id, Role::User, "bump")
            .await
            .unwrap();
        let list = store.list_conversations("alice").await.unwrap();
        assert_eq!(titles(list), ["first", "second"]);
    }

    #[tokio::test]
    async fn test_isolation_between_users() {
        let store = MemoryStore::new();
        let conv = store.create_conversation("alice", "mine").await.unwrap();

        assert!(store.list_conversations("bob").await.unwrap().is_empty());
        assert!(matches!(
            store.list_messages("bob", conv.id).await,
            Err(StoreError::NotFound(id)) if id == conv.id
        ));
        assert!(matches!(
            store.append_message("bob", conv.id, Role::User, "hi").await,
            Err(StoreError::NotFound(_))
        ));
        assert!(matches!(
            store.delete_conversation("bob", conv.id).await,
            Err(StoreError::NotFound(_))
        ));
        assert!(store.get_conversation("alice", conv.id).await.is_ok());
    }
}
