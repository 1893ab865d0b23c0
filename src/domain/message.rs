//! Chat rooms and messages.
//!
//! A room is a logical channel keyed by the meeting id it belongs to;
//! rooms are never stored as first-class objects, membership is derived
//! from join/leave operations tracked per connection.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use utoipa::ToSchema;

use super::Identity;

/// Logical chat channel, keyed by meeting id.
///
/// Clients historically sent room names as strings, so deserialization
/// accepts either a JSON number or a numeric string. Serializes as a
/// number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RoomId(i64);

impl RoomId {
    /// Creates a `RoomId` from a meeting id.
    #[must_use]
    pub const fn new(meeting_id: i64) -> Self {
        Self(meeting_id)
    }

    /// Returns the underlying meeting id.
    #[must_use]
    pub const fn meeting_id(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for RoomId {
    fn from(meeting_id: i64) -> Self {
        Self(meeting_id)
    }
}

impl Serialize for RoomId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(self.0)
    }
}

struct RoomIdVisitor;

impl Visitor<'_> for RoomIdVisitor {
    type Value = RoomId;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a meeting id as a number or numeric string")
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<RoomId, E> {
        Ok(RoomId(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<RoomId, E> {
        i64::try_from(v)
            .map(RoomId)
            .map_err(|_| E::custom("meeting id out of range"))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<RoomId, E> {
        v.parse::<i64>()
            .map(RoomId)
            .map_err(|_| E::custom("meeting id is not numeric"))
    }
}

impl<'de> Deserialize<'de> for RoomId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(RoomIdVisitor)
    }
}

/// A stored chat message.
///
/// Immutable once created. Ordered by `timestamp`, ties broken by `id`
/// (insertion order in the durable store).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ChatMessage {
    /// Durable store primary key.
    pub id: i64,
    /// Meeting/room the message belongs to.
    #[schema(value_type = i64)]
    pub meeting_id: RoomId,
    /// Sender identity: numeric for users, tagged string for guests.
    #[schema(value_type = String)]
    pub user_id: Identity,
    /// Display name captured at send time.
    pub user_name: Option<String>,
    /// Message body.
    pub content: String,
    /// Creation time (UTC, set by the durable store).
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    /// Ordering key: timestamp ascending, ties broken by store id.
    #[must_use]
    pub const fn sort_key(&self) -> (i64, i64) {
        (self.timestamp.timestamp_micros(), self.id)
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn room_id_from_number_and_string() {
        let from_num: Option<RoomId> = serde_json::from_str("42").ok();
        assert_eq!(from_num, Some(RoomId::new(42)));

        let from_str: Option<RoomId> = serde_json::from_str("\"42\"").ok();
        assert_eq!(from_str, Some(RoomId::new(42)));
    }

    #[test]
    fn room_id_rejects_non_numeric() {
        let bad: Result<RoomId, _> = serde_json::from_str("\"lobby\"");
        assert!(bad.is_err());
    }

    #[test]
    fn message_serializes_guest_sender_as_string() {
        let msg = ChatMessage {
            id: 1,
            meeting_id: RoomId::new(42),
            user_id: Identity::Guest("guest_a".to_string()),
            user_name: Some("Ada".to_string()),
            content: "hello".to_string(),
            timestamp: Utc::now(),
        };
        let json = serde_json::to_string(&msg).ok();
        let Some(json) = json else {
            panic!("serialization failed");
        };
        assert!(json.contains("\"user_id\":\"guest_a\""));
        assert!(json.contains("\"meeting_id\":42"));
    }

    #[test]
    fn sort_key_breaks_ties_by_id() {
        let ts = Utc::now();
        let make = |id| ChatMessage {
            id,
            meeting_id: RoomId::new(1),
            user_id: Identity::User(1),
            user_name: None,
            content: String::new(),
            timestamp: ts,
        };
        assert!(make(1).sort_key() < make(2).sort_key());
    }
}
