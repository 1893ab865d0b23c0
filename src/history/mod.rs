//! Durable event log / cache blend for recent chat history.
//!
//! [`ChatHistory`] pairs the durable [`MessageStore`] (system of record)
//! with the bounded in-memory [`HistoryCache`]. Writes go durable first;
//! the cache mirror is best-effort. Reads prefer the cache and fall back
//! to the store when it is cold, backfilling as a side effect.

pub mod cache;

use std::sync::Arc;

use crate::config::HistoryCaps;
use crate::domain::{ChatMessage, Identity, RoomId};
use crate::error::GatewayError;
use crate::persistence::MessageStore;
use cache::HistoryCache;

/// Blended recent-history service.
#[derive(Debug)]
pub struct ChatHistory {
    cache: HistoryCache,
    store: Arc<dyn MessageStore>,
}

impl ChatHistory {
    /// Creates a history service over the given durable store.
    #[must_use]
    pub fn new(store: Arc<dyn MessageStore>, caps: HistoryCaps) -> Self {
        Self {
            cache: HistoryCache::new(caps),
            store,
        }
    }

    /// Durably appends a message, then mirrors it into the cache.
    ///
    /// A message becomes visible to readers only after the durable write
    /// succeeds; on failure nothing is cached and the error is returned
    /// to the caller alone.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::PersistenceError`] when the durable write
    /// fails.
    pub async fn record(
        &self,
        room: RoomId,
        sender: &Identity,
        sender_name: Option<&str>,
        content: &str,
    ) -> Result<ChatMessage, GatewayError> {
        let message = self
            .store
            .insert_message(room, sender, sender_name, content)
            .await?;
        self.cache.insert(room, message.clone()).await;
        Ok(message)
    }

    /// Returns recent history for a room, oldest first.
    ///
    /// With `per_sender_limit == 0` this is simply the most recent
    /// `limit` messages. A positive `per_sender_limit` produces the
    /// diversity-limited view. A cold cache falls back to the durable
    /// store and repopulates the cache from what it finds.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::PersistenceError`] only when the cache is
    /// cold *and* the durable fallback fails.
    pub async fn recent(
        &self,
        room: RoomId,
        limit: usize,
        per_sender_limit: usize,
    ) -> Result<Vec<ChatMessage>, GatewayError> {
        if self.cache.is_empty(room).await {
            self.backfill(room, limit).await?;
        }
        if per_sender_limit > 0 {
            Ok(self.cache.recent_diverse(room, limit, per_sender_limit).await)
        } else {
            Ok(self.cache.recent(room, limit).await)
        }
    }

    /// Looks up the meeting a room belongs to in the durable store.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::PersistenceError`] when the lookup fails.
    pub async fn find_meeting(
        &self,
        room: RoomId,
    ) -> Result<Option<crate::persistence::MeetingSummary>, GatewayError> {
        self.store.find_meeting(room).await
    }

    async fn backfill(&self, room: RoomId, limit: usize) -> Result<(), GatewayError> {
        let fetch = i64::try_from(limit).unwrap_or(i64::MAX);
        let stored = self.store.load_recent(room, fetch).await?;
        if stored.is_empty() {
            return Ok(());
        }
        tracing::info!(room = %room, count = stored.len(), "backfilling history cache from store");
        for message in stored {
            self.cache.insert(room, message).await;
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::persistence::memory::InMemoryStore;

    fn history() -> (Arc<InMemoryStore>, ChatHistory) {
        let store = Arc::new(InMemoryStore::default());
        let history = ChatHistory::new(
            Arc::<InMemoryStore>::clone(&store),
            HistoryCaps::default(),
        );
        (store, history)
    }

    #[tokio::test]
    async fn record_then_recent_returns_message_last() {
        let (_store, history) = history();
        let room = RoomId::new(42);
        let sender = Identity::User(1);

        for n in 1..=3 {
            let result = history
                .record(room, &sender, Some("Ada"), &format!("msg-{n}"))
                .await;
            assert!(result.is_ok());
        }

        let recent = history.recent(room, 10, 0).await;
        let Ok(recent) = recent else {
            panic!("recent failed");
        };
        assert_eq!(recent.len(), 3);
        assert_eq!(recent.last().map(|m| m.content.as_str()), Some("msg-3"));
    }

    #[tokio::test]
    async fn cold_cache_falls_back_to_store_and_backfills() {
        let (store, _) = history();
        let room = RoomId::new(42);
        let sender = Identity::User(1);
        for n in 1..=4 {
            let result = store
                .insert_message(room, &sender, None, &format!("old-{n}"))
                .await;
            assert!(result.is_ok());
        }

        // Fresh history service: cache is cold, store has rows.
        let history = ChatHistory::new(
            Arc::<InMemoryStore>::clone(&store),
            HistoryCaps::default(),
        );
        let first = history.recent(room, 10, 0).await;
        let Ok(first) = first else {
            panic!("recent failed");
        };
        assert_eq!(first.len(), 4);

        // Second read is served by the now-warm cache even if the store
        // starts failing.
        store
            .fail_writes
            .store(true, std::sync::atomic::Ordering::Relaxed);
        let second = history.recent(room, 10, 0).await;
        let Ok(second) = second else {
            panic!("warm read failed");
        };
        assert_eq!(second, first);
    }

    #[tokio::test]
    async fn diversity_applies_after_fallback() {
        let (store, _) = history();
        let room = RoomId::new(42);
        let chatty = Identity::User(1);
        for n in 1..=6 {
            let result = store
                .insert_message(room, &chatty, None, &format!("spam-{n}"))
                .await;
            assert!(result.is_ok());
        }
        let result = store
            .insert_message(room, &Identity::User(2), None, "hello")
            .await;
        assert!(result.is_ok());

        let history = ChatHistory::new(
            Arc::<InMemoryStore>::clone(&store),
            HistoryCaps::default(),
        );
        let view = history.recent(room, 10, 1).await;
        let Ok(view) = view else {
            panic!("recent failed");
        };
        let chatty_count = view.iter().filter(|m| m.user_id == chatty).count();
        assert_eq!(chatty_count, 1);
        assert_eq!(view.len(), 2);
    }

    #[tokio::test]
    async fn failed_write_is_not_cached() {
        let (store, history) = history();
        let room = RoomId::new(42);
        store
            .fail_writes
            .store(true, std::sync::atomic::Ordering::Relaxed);

        let result = history.record(room, &Identity::User(1), None, "lost").await;
        assert!(result.is_err());

        store
            .fail_writes
            .store(false, std::sync::atomic::Ordering::Relaxed);
        let recent = history.recent(room, 10, 0).await;
        let Ok(recent) = recent else {
            panic!("recent failed");
        };
        assert!(recent.is_empty());
    }
}
