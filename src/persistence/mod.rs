//! Persistence collaborator: the durable system of record for chat
//! messages, plus read access to the meeting service's `meetings` table.
//!
//! The gateway never owns relational-write correctness beyond its own
//! `chat_messages` table; the trait seam exists so the real-time core can
//! be exercised against an in-memory store in tests.

pub mod postgres;

use async_trait::async_trait;

use crate::domain::{ChatMessage, Identity, RoomId};
use crate::error::GatewayError;

/// Minimal view of a meeting row, owned by the meeting service.
#[derive(Debug, Clone)]
pub struct MeetingSummary {
    /// Meeting primary key.
    pub id: i64,
    /// Meeting title.
    pub title: String,
}

/// Durable message storage consumed by the real-time core.
#[async_trait]
pub trait MessageStore: Send + Sync + std::fmt::Debug {
    /// Appends a message and returns the stored row (id and timestamp
    /// assigned by the store).
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::PersistenceError`] on storage failure; the
    /// write is rolled back and nothing is visible to readers.
    async fn insert_message(
        &self,
        room: RoomId,
        sender: &Identity,
        sender_name: Option<&str>,
        content: &str,
    ) -> Result<ChatMessage, GatewayError>;

    /// Loads the most recent `limit` messages for a room, ordered by
    /// timestamp ascending.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::PersistenceError`] on storage failure.
    async fn load_recent(&self, room: RoomId, limit: i64)
    -> Result<Vec<ChatMessage>, GatewayError>;

    /// Looks up a meeting by id. `Ok(None)` means the meeting does not
    /// exist.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::PersistenceError`] on storage failure.
    async fn find_meeting(&self, room: RoomId) -> Result<Option<MeetingSummary>, GatewayError>;
}

#[cfg(test)]
pub(crate) mod memory {
    //! In-memory [`MessageStore`] used by unit tests.

    use std::sync::atomic::{AtomicI64, Ordering};

    use chrono::Utc;
    use tokio::sync::Mutex;

    use super::*;

    /// Test double backed by a `Vec` per room.
    #[derive(Debug, Default)]
    pub struct InMemoryStore {
        next_id: AtomicI64,
        messages: Mutex<Vec<ChatMessage>>,
        pub fail_writes: std::sync::atomic::AtomicBool,
    }

    #[async_trait]
    impl MessageStore for InMemoryStore {
        async fn insert_message(
            &self,
            room: RoomId,
            sender: &Identity,
            sender_name: Option<&str>,
            content: &str,
        ) -> Result<ChatMessage, GatewayError> {
            if self.fail_writes.load(Ordering::Relaxed) {
                return Err(GatewayError::PersistenceError("write failed".to_string()));
            }
            let message = ChatMessage {
                id: self.next_id.fetch_add(1, Ordering::Relaxed) + 1,
                meeting_id: room,
                user_id: sender.clone(),
                user_name: sender_name.map(str::to_string),
                content: content.to_string(),
                timestamp: Utc::now(),
            };
            self.messages.lock().await.push(message.clone());
            Ok(message)
        }

        async fn load_recent(
            &self,
            room: RoomId,
            limit: i64,
        ) -> Result<Vec<ChatMessage>, GatewayError> {
            let messages = self.messages.lock().await;
            let mut recent: Vec<ChatMessage> = messages
                .iter()
                .filter(|m| m.meeting_id == room)
                .cloned()
                .collect();
            recent.sort_by_key(ChatMessage::sort_key);
            let skip = recent.len().saturating_sub(usize::try_from(limit).unwrap_or(0));
            Ok(recent.split_off(skip))
        }

        async fn find_meeting(
            &self,
            room: RoomId,
        ) -> Result<Option<MeetingSummary>, GatewayError> {
            Ok(Some(MeetingSummary {
                id: room.meeting_id(),
                title: "Test Meeting".to_string(),
            }))
        }
    }
}
