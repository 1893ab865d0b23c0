//! Logical sender identity and transport connection identifiers.
//!
//! [`Identity`] distinguishes authenticated numeric user ids from
//! string-tagged ephemeral guests. [`ConnectionId`] is an opaque handle
//! for a single live WebSocket connection; one identity may own many
//! connections (multi-tab, multi-device).

use std::fmt;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Prefix convention marking browser-issued guest identities.
pub const GUEST_PREFIX: &str = "guest_";

/// Prefix for transport-derived fallback identities, used when a join or
/// message arrives with neither an authenticated nor a caller-supplied id.
pub const TEMP_PREFIX: &str = "temp_user_";

/// Logical identity of a message sender or notification target.
///
/// Resolved once per connection attempt and immutable for that
/// connection's lifetime. On the wire a user id is a JSON number and a
/// guest id is a JSON string, matching what clients already send.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Identity {
    /// Authenticated user, keyed by the auth service's numeric id.
    User(i64),
    /// Ephemeral guest, carrying a `guest_` or `temp_user_` tagged id.
    Guest(String),
}

impl Identity {
    /// Parses an identity from its wire form: numeric strings become
    /// [`Identity::User`], everything else is a guest id.
    #[must_use]
    pub fn from_wire(value: &str) -> Self {
        match value.parse::<i64>() {
            Ok(id) => Self::User(id),
            Err(_) => Self::Guest(value.to_string()),
        }
    }

    /// Builds the transport-derived fallback identity for a connection.
    #[must_use]
    pub fn temp_for(connection: ConnectionId) -> Self {
        Self::Guest(format!("{TEMP_PREFIX}{connection}"))
    }

    /// Returns `true` for guest identities (including `temp_user_` fallbacks).
    #[must_use]
    pub const fn is_guest(&self) -> bool {
        matches!(self, Self::Guest(_))
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User(id) => write!(f, "{id}"),
            Self::Guest(id) => write!(f, "{id}"),
        }
    }
}

impl Serialize for Identity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::User(id) => serializer.serialize_i64(*id),
            Self::Guest(id) => serializer.serialize_str(id),
        }
    }
}

struct IdentityVisitor;

impl Visitor<'_> for IdentityVisitor {
    type Value = Identity;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a numeric user id or guest id string")
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Identity, E> {
        Ok(Identity::User(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Identity, E> {
        i64::try_from(v)
            .map(Identity::User)
            .map_err(|_| E::custom("user id out of range"))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Identity, E> {
        Ok(Identity::from_wire(v))
    }
}

impl<'de> Deserialize<'de> for Identity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(IdentityVisitor)
    }
}

/// Opaque identifier for a single live WebSocket connection.
///
/// Wraps a UUID v4. Minted when the transport accepts the socket and
/// never reused; all registry state keyed by it is purged on disconnect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(uuid::Uuid);

impl ConnectionId {
    /// Creates a new random `ConnectionId` (UUID v4).
    #[must_use]
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    /// Returns the inner [`uuid::Uuid`].
    #[must_use]
    pub const fn as_uuid(&self) -> &uuid::Uuid {
        &self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn numeric_wire_value_is_user() {
        assert_eq!(Identity::from_wire("42"), Identity::User(42));
    }

    #[test]
    fn prefixed_wire_value_is_guest() {
        let id = Identity::from_wire("guest_abc123");
        assert_eq!(id, Identity::Guest("guest_abc123".to_string()));
        assert!(id.is_guest());
    }

    #[test]
    fn temp_identity_carries_prefix() {
        let conn = ConnectionId::new();
        let id = Identity::temp_for(conn);
        assert!(id.to_string().starts_with(TEMP_PREFIX));
        assert!(id.is_guest());
    }

    #[test]
    fn user_serializes_as_number() {
        let json = serde_json::to_string(&Identity::User(7)).ok();
        assert_eq!(json.as_deref(), Some("7"));
    }

    #[test]
    fn guest_serializes_as_string() {
        let json = serde_json::to_string(&Identity::Guest("guest_x".to_string())).ok();
        assert_eq!(json.as_deref(), Some("\"guest_x\""));
    }

    #[test]
    fn deserializes_from_number_and_string() {
        let user: Option<Identity> = serde_json::from_str("99").ok();
        assert_eq!(user, Some(Identity::User(99)));

        let guest: Option<Identity> = serde_json::from_str("\"guest_y\"").ok();
        assert_eq!(guest, Some(Identity::Guest("guest_y".to_string())));

        // Numeric strings collapse to user ids, matching the wire convention.
        let stringly: Option<Identity> = serde_json::from_str("\"15\"").ok();
        assert_eq!(stringly, Some(Identity::User(15)));
    }

    #[test]
    fn connection_ids_are_unique() {
        assert_ne!(ConnectionId::new(), ConnectionId::new());
    }
}
