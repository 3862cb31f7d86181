use crate::error::AppError;
use crate::models::Message;
use crate::rooms;
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Pool, Postgres};
use tokio::sync::RwLock;
use uuid::Uuid;

/// Durable append-only log of chat messages, queryable per room in
/// timestamp order.
///
/// The store assigns id and timestamp at write time. `fetch_history` is
/// re-callable; it is not a one-shot cursor.
#[async_trait]
pub trait MessageStore: Send + Sync {
    async fn persist(
        &self,
        sender_id: &str,
        receiver_id: &str,
        content: &str,
    ) -> Result<Message, AppError>;

    /// All messages for the room resolved from the pair, ascending by
    /// timestamp.
    async fn fetch_history(
        &self,
        participant_a: &str,
        participant_b: &str,
    ) -> Result<Vec<Message>, AppError>;
}

/// Postgres-backed store.
pub struct PgMessageStore {
    db: Pool<Postgres>,
}

impl PgMessageStore {
    pub fn new(db: Pool<Postgres>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl MessageStore for PgMessageStore {
    async fn persist(
        &self,
        sender_id: &str,
        receiver_id: &str,
        content: &str,
    ) -> Result<Message, AppError> {
        let message = Message {
            id: Uuid::new_v4(),
            room_id: rooms::room_id(sender_id, receiver_id),
            sender_id: sender_id.to_string(),
            receiver_id: receiver_id.to_string(),
            content: content.to_string(),
            timestamp: Utc::now(),
        };

        sqlx::query(
            "INSERT INTO messages (id, room_id, sender_id, receiver_id, content, timestamp) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(message.id)
        .bind(&message.room_id)
        .bind(&message.sender_id)
        .bind(&message.receiver_id)
        .bind(&message.content)
        .bind(message.timestamp)
        .execute(&self.db)
        .await?;

        Ok(message)
    }

    async fn fetch_history(
        &self,
        participant_a: &str,
        participant_b: &str,
    ) -> Result<Vec<Message>, AppError> {
        let room_id = rooms::room_id(participant_a, participant_b);

        let messages = sqlx::query_as::<_, Message>(
            "SELECT id, room_id, sender_id, receiver_id, content, timestamp \
             FROM messages WHERE room_id = $1 ORDER BY timestamp ASC",
        )
        .bind(&room_id)
        .fetch_all(&self.db)
        .await?;

        Ok(messages)
    }
}

/// In-memory store used by tests and local development.
#[derive(Default)]
pub struct MemoryMessageStore {
    messages: RwLock<Vec<Message>>,
}

impl MemoryMessageStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MessageStore for MemoryMessageStore {
    async fn persist(
        &self,
        sender_id: &str,
        receiver_id: &str,
        content: &str,
    ) -> Result<Message, AppError> {
        let message = Message {
            id: Uuid::new_v4(),
            room_id: rooms::room_id(sender_id, receiver_id),
            sender_id: sender_id.to_string(),
            receiver_id: receiver_id.to_string(),
            content: content.to_string(),
            timestamp: Utc::now(),
        };

        self.messages.write().await.push(message.clone());
        Ok(message)
    }

    async fn fetch_history(
        &self,
        participant_a: &str,
        participant_b: &str,
    ) -> Result<Vec<Message>, AppError> {
        let room_id = rooms::room_id(participant_a, participant_b);

        let mut messages: Vec<Message> = self
            .messages
            .read()
            .await
            .iter()
            .filter(|m| m.room_id == room_id)
            .cloned()
            .collect();
        // Stable sort keeps insertion order for equal timestamps.
        messages.sort_by_key(|m| m.timestamp);

        Ok(messages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_store_assigns_id_and_timestamp() {
        let store = MemoryMessageStore::new();
        let message = store.persist("alice", "bob", "hi").await.unwrap();

        assert_eq!(message.sender_id, "alice");
        assert_eq!(message.receiver_id, "bob");
        assert_eq!(message.content, "hi");
        assert_eq!(message.room_id, "alice_bob");
    }

    #[tokio::test]
    async fn history_is_ordered_and_symmetric() {
        let store = MemoryMessageStore::new();
        store.persist("alice", "bob", "one").await.unwrap();
        store.persist("bob", "alice", "two").await.unwrap();
        store.persist("alice", "bob", "three").await.unwrap();

        let history = store.fetch_history("bob", "alice").await.unwrap();
        assert_eq!(history.len(), 3);
        let contents: Vec<&str> = history.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, ["one", "two", "three"]);
        for pair in history.windows(2) {
            assert!(pair[0].timestamp <= pair[1].timestamp);
        }
    }

    #[tokio::test]
    async fn history_does_not_leak_other_rooms() {
        let store = MemoryMessageStore::new();
        store.persist("alice", "bob", "hi").await.unwrap();
        store.persist("alice", "carol", "hey").await.unwrap();

        let history = store.fetch_history("alice", "bob").await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].content, "hi");
    }

    #[tokio::test]
    async fn fetch_history_is_recallable() {
        let store = MemoryMessageStore::new();
        store.persist("alice", "bob", "hi").await.unwrap();

        let first = store.fetch_history("alice", "bob").await.unwrap();
        let second = store.fetch_history("alice", "bob").await.unwrap();
        assert_eq!(first.len(), second.len());
    }
}
