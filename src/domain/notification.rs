//! Outbound real-time notifications pushed to connected clients.
//!
//! Every server-to-client push is a [`ServerEvent`], serialized as a
//! `{"event": ..., "data": ...}` envelope. The variant set is the fixed
//! notification vocabulary of the gateway.

use serde::Serialize;
use serde_json::Value;

use super::{ChatMessage, Identity, RoomId};

/// A notification pushed to one or more live connections.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    /// Someone joined a room (sent to the room, excluding the joiner).
    UserJoined {
        /// Effective identity of the joiner.
        user_id: Identity,
        /// Display name supplied at join time.
        user_name: String,
        /// Room that was joined.
        room: RoomId,
        /// Same as `room`; kept for client-side consistency.
        meeting_id: RoomId,
        /// Whether the joiner holds an authenticated identity.
        authenticated: bool,
    },

    /// Someone left a room (sent to the room, excluding the leaver).
    UserLeft {
        /// Effective identity of the leaver.
        user_id: Identity,
        /// Display name supplied at leave time.
        user_name: String,
        /// Room that was left.
        room: RoomId,
        /// Whether the leaver holds an authenticated identity.
        authenticated: bool,
    },

    /// A chat message broadcast to its room (including the sender).
    ChatMessage {
        /// The durably stored message.
        #[serde(flatten)]
        message: ChatMessage,
        /// Whether the sender holds an authenticated identity.
        authenticated: bool,
    },

    /// One-time recent-history push to a freshly joined connection.
    ChatHistory {
        /// Room the history belongs to.
        meeting_id: RoomId,
        /// Diversity-limited recent messages, oldest first.
        messages: Vec<ChatMessage>,
    },

    /// A meeting was updated, deleted, or changed participant status.
    MeetingUpdate(MeetingNotice),

    /// An invitation to a meeting, delivered to the invitee.
    MeetingInvitation(MeetingNotice),

    /// Scoped error for a failed `chat_message` request.
    MessageError {
        /// Human-readable reason.
        error: String,
    },

    /// Scoped error for a failed `meeting_update` request.
    UpdateError {
        /// Human-readable reason.
        error: String,
    },

    /// Scoped error for a failed `meeting_invitation` request.
    InvitationError {
        /// Human-readable reason.
        error: String,
    },
}

impl ServerEvent {
    /// Returns the wire event name for this variant.
    #[must_use]
    pub const fn event_name(&self) -> &'static str {
        match self {
            Self::UserJoined { .. } => "user_joined",
            Self::UserLeft { .. } => "user_left",
            Self::ChatMessage { .. } => "chat_message",
            Self::ChatHistory { .. } => "chat_history",
            Self::MeetingUpdate(_) => "meeting_update",
            Self::MeetingInvitation(_) => "meeting_invitation",
            Self::MessageError { .. } => "message_error",
            Self::UpdateError { .. } => "update_error",
            Self::InvitationError { .. } => "invitation_error",
        }
    }
}

/// Payload shared by `meeting_update` and `meeting_invitation` pushes.
///
/// Optional fields are omitted from the wire when absent.
#[derive(Debug, Clone, Serialize)]
pub struct MeetingNotice {
    /// Meeting the notice refers to.
    pub meeting_id: RoomId,
    /// Short headline, e.g. `"Meeting Updated"`.
    pub title: String,
    /// Human-readable description of the change.
    pub message: String,
    /// Timestamp forwarded from the originating event, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    /// Full meeting details as published by the meeting service.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meeting_details: Option<Value>,
    /// Field-level change flags for `meeting_updated` events.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub changes: Option<Value>,
    /// Meeting status, e.g. `"deleted"`, or a participant's new status.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// Participant's previous status, for status-change notices.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old_status: Option<String>,
    /// Participant whose status changed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub participant_id: Option<Identity>,
    /// Invitee, for invitation notices.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<Identity>,
    /// Authenticated originator of a client-initiated notice.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender_id: Option<Identity>,
}

impl MeetingNotice {
    /// Creates a notice with only the mandatory fields set.
    #[must_use]
    pub const fn new(meeting_id: RoomId, title: String, message: String) -> Self {
        Self {
            meeting_id,
            title,
            message,
            timestamp: None,
            meeting_details: None,
            changes: None,
            status: None,
            old_status: None,
            participant_id: None,
            user_id: None,
            sender_id: None,
        }
    }
}
