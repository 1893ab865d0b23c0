//! Bounded in-memory recent-message cache.
//!
//! Each room keeps two indexes over the same messages: a room-wide
//! ordered ring and a per-sender ring. Both are trimmed by rank on every
//! insert and additionally expired by wall-clock TTL. The cache is a
//! read accelerator only; losing it degrades to the durable fallback.

use std::collections::HashMap;

use chrono::{Duration, Utc};
use tokio::sync::RwLock;

use crate::config::HistoryCaps;
use crate::domain::{ChatMessage, Identity, RoomId};

#[derive(Debug, Default)]
struct RoomHistory {
    /// Messages ordered by `(timestamp, id)` ascending.
    entries: Vec<ChatMessage>,
    /// Same messages grouped by sender, each ring ordered ascending.
    /// Carries the sender-scoped retention bounds (`sender_cap`,
    /// `sender_ttl_days`), which are tighter than the room-wide ones;
    /// the diversity view itself groups from `entries` so its working
    /// set matches the room window.
    per_sender: HashMap<Identity, Vec<ChatMessage>>,
}

/// In-memory bounded history cache, shared behind one coarse lock.
#[derive(Debug)]
pub struct HistoryCache {
    caps: HistoryCaps,
    rooms: RwLock<HashMap<RoomId, RoomHistory>>,
}

impl HistoryCache {
    /// Creates an empty cache with the given bounds.
    #[must_use]
    pub fn new(caps: HistoryCaps) -> Self {
        Self {
            caps,
            rooms: RwLock::new(HashMap::new()),
        }
    }

    /// Mirrors a stored message into both indexes, applying TTL purge
    /// and rank trims. Re-inserting an already-cached id is a no-op, so
    /// backfill and live appends can race safely.
    pub async fn insert(&self, room: RoomId, message: ChatMessage) {
        let mut rooms = self.rooms.write().await;
        let history = rooms.entry(room).or_default();

        Self::purge_expired(history, &self.caps);

        if history.entries.iter().any(|m| m.id == message.id) {
            return;
        }

        let key = message.sort_key();
        let pos = history.entries.partition_point(|m| m.sort_key() <= key);
        history.entries.insert(pos, message.clone());
        let excess = history.entries.len().saturating_sub(self.caps.room_cap);
        if excess > 0 {
            history.entries.drain(..excess);
        }

        let ring = history.per_sender.entry(message.user_id.clone()).or_default();
        let pos = ring.partition_point(|m| m.sort_key() <= key);
        ring.insert(pos, message);
        let excess = ring.len().saturating_sub(self.caps.sender_cap);
        if excess > 0 {
            ring.drain(..excess);
        }
    }

    /// Returns the most recent `limit` messages of a room, oldest first.
    /// Empty when the room has no cached history.
    pub async fn recent(&self, room: RoomId, limit: usize) -> Vec<ChatMessage> {
        let mut rooms = self.rooms.write().await;
        let Some(history) = rooms.get_mut(&room) else {
            return Vec::new();
        };
        Self::purge_expired(history, &self.caps);
        let skip = history.entries.len().saturating_sub(limit);
        history.entries.iter().skip(skip).cloned().collect()
    }

    /// Returns the diversity-limited recent view: among the last
    /// `scan_window` cached messages, each sender contributes at most
    /// `per_sender_limit`, the merge is ordered ascending, and the total
    /// never exceeds `global_limit` (most recent kept).
    pub async fn recent_diverse(
        &self,
        room: RoomId,
        global_limit: usize,
        per_sender_limit: usize,
    ) -> Vec<ChatMessage> {
        let mut rooms = self.rooms.write().await;
        let Some(history) = rooms.get_mut(&room) else {
            return Vec::new();
        };
        Self::purge_expired(history, &self.caps);

        let skip = history.entries.len().saturating_sub(self.caps.scan_window);
        let mut by_sender: HashMap<&Identity, Vec<&ChatMessage>> = HashMap::new();
        for message in history.entries.iter().skip(skip) {
            by_sender.entry(&message.user_id).or_default().push(message);
        }

        let mut kept: Vec<ChatMessage> = Vec::new();
        for ring in by_sender.into_values() {
            let skip = ring.len().saturating_sub(per_sender_limit);
            kept.extend(ring.into_iter().skip(skip).cloned());
        }
        kept.sort_by_key(ChatMessage::sort_key);

        let skip = kept.len().saturating_sub(global_limit);
        kept.split_off(skip)
    }

    /// Returns `true` if the room has no cached messages.
    pub async fn is_empty(&self, room: RoomId) -> bool {
        let rooms = self.rooms.read().await;
        rooms.get(&room).is_none_or(|h| h.entries.is_empty())
    }

    fn purge_expired(history: &mut RoomHistory, caps: &HistoryCaps) {
        let room_cutoff = Utc::now() - Duration::days(caps.room_ttl_days);
        history.entries.retain(|m| m.timestamp >= room_cutoff);

        let sender_cutoff = Utc::now() - Duration::days(caps.sender_ttl_days);
        for ring in history.per_sender.values_mut() {
            ring.retain(|m| m.timestamp >= sender_cutoff);
        }
        history.per_sender.retain(|_, ring| !ring.is_empty());
    }

    #[cfg(test)]
    pub(crate) async fn sender_ring_len(&self, room: RoomId, sender: &Identity) -> usize {
        let rooms = self.rooms.read().await;
        rooms
            .get(&room)
            .and_then(|h| h.per_sender.get(sender))
            .map_or(0, Vec::len)
    }
}
