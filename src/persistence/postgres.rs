//! PostgreSQL implementation of the message store.
//!
//! Guest-originated rows satisfy the `user_id` foreign key with a fixed
//! placeholder and carry the real guest id in `guest_user_id`; readers
//! reconstruct the sender identity from whichever column is set.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use super::{MeetingSummary, MessageStore};
use crate::domain::{ChatMessage, Identity, RoomId};
use crate::error::GatewayError;

/// Placeholder user id written for guest rows, required by the
/// `chat_messages.user_id` foreign key into the auth schema.
const GUEST_PLACEHOLDER_USER_ID: i64 = 1;

/// PostgreSQL-backed message store using `sqlx::PgPool`.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a new store with the given connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_message(
        (id, meeting_id, user_id, guest_user_id, user_name, content, timestamp): (
            i64,
            i64,
            i64,
            Option<String>,
            Option<String>,
            String,
            DateTime<Utc>,
        ),
    ) -> ChatMessage {
        let sender = match guest_user_id {
            Some(guest) => Identity::Guest(guest),
            None => Identity::User(user_id),
        };
        ChatMessage {
            id,
            meeting_id: RoomId::new(meeting_id),
            user_id: sender,
            user_name,
            content,
            timestamp,
        }
    }
}

#[async_trait]
impl MessageStore for PostgresStore {
    async fn insert_message(
        &self,
        room: RoomId,
        sender: &Identity,
        sender_name: Option<&str>,
        content: &str,
    ) -> Result<ChatMessage, GatewayError> {
        let (user_id, guest_user_id) = match sender {
            Identity::User(id) => (*id, None),
            Identity::Guest(id) => (GUEST_PLACEHOLDER_USER_ID, Some(id.as_str())),
        };

        let row = sqlx::query_as::<_, (i64, DateTime<Utc>)>(
            "INSERT INTO chat_messages (meeting_id, user_id, guest_user_id, user_name, content) \
             VALUES ($1, $2, $3, $4, $5) RETURNING id, timestamp",
        )
        .bind(room.meeting_id())
        .bind(user_id)
        .bind(guest_user_id)
        .bind(sender_name)
        .bind(content)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| GatewayError::PersistenceError(e.to_string()))?;

        Ok(ChatMessage {
            id: row.0,
            meeting_id: room,
            user_id: sender.clone(),
            user_name: sender_name.map(str::to_string),
            content: content.to_string(),
            timestamp: row.1,
        })
    }

    async fn load_recent(
        &self,
        room: RoomId,
        limit: i64,
    ) -> Result<Vec<ChatMessage>, GatewayError> {
        let rows = sqlx::query_as::<
            _,
            (
                i64,
                i64,
                i64,
                Option<String>,
                Option<String>,
                String,
                DateTime<Utc>,
            ),
        >(
            "SELECT id, meeting_id, user_id, guest_user_id, user_name, content, timestamp \
             FROM (SELECT * FROM chat_messages WHERE meeting_id = $1 \
                   ORDER BY timestamp DESC, id DESC LIMIT $2) recent \
             ORDER BY timestamp ASC, id ASC",
        )
        .bind(room.meeting_id())
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| GatewayError::PersistenceError(e.to_string()))?;

        Ok(rows.into_iter().map(Self::row_to_message).collect())
    }

    async fn find_meeting(&self, room: RoomId) -> Result<Option<MeetingSummary>, GatewayError> {
        let row = sqlx::query_as::<_, (i64, String)>(
            "SELECT id, title FROM meetings WHERE id = $1",
        )
        .bind(room.meeting_id())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| GatewayError::PersistenceError(e.to_string()))?;

        Ok(row.map(|(id, title)| MeetingSummary { id, title }))
    }
}
