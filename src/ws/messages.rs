//! Client-to-server WebSocket frames.
//!
//! Every inbound frame is a `{"event": ..., "data": ...}` envelope
//! mirroring the outbound [`crate::domain::ServerEvent`] shape. Fields
//! are optional at the decode stage; each handler enforces its own
//! requirements and answers violations with a scoped error event.

use serde::Deserialize;
use serde_json::Value;

use crate::domain::{Identity, RoomId};

/// A decoded client frame.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientFrame {
    /// Late authentication with a bearer token (the protocol-level
    /// fallback when neither query parameter nor header carried one).
    Authenticate {
        /// Bearer token to verify.
        token: String,
    },
    /// Subscribe this connection to a meeting room.
    JoinRoom(RoomRequest),
    /// Unsubscribe this connection from a meeting room.
    LeaveRoom(RoomRequest),
    /// Send a chat message to a room.
    ChatMessage(ChatMessageRequest),
    /// Client-initiated meeting update notification.
    MeetingUpdate(MeetingUpdateRequest),
    /// Client-initiated meeting invitation.
    MeetingInvitation(MeetingInvitationRequest),
}

/// Payload for `join_room` and `leave_room`.
#[derive(Debug, Clone, Deserialize)]
pub struct RoomRequest {
    /// Target room. Requests without one are logged and ignored.
    #[serde(default)]
    pub meeting_id: Option<RoomId>,
    /// Caller-supplied identity, used when the connection is
    /// unauthenticated.
    #[serde(default)]
    pub user_id: Option<Identity>,
    /// Display name shown in presence notifications.
    #[serde(default)]
    pub user_name: Option<String>,
}

/// Payload for `chat_message`.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatMessageRequest {
    /// Target room.
    #[serde(default)]
    pub meeting_id: Option<RoomId>,
    /// Message body.
    #[serde(default)]
    pub message_text: Option<String>,
    /// Caller-supplied identity for unauthenticated connections.
    #[serde(default)]
    pub user_id: Option<Identity>,
    /// Display name stored with the message.
    #[serde(default)]
    pub user_name: Option<String>,
}

/// Payload for `meeting_update`.
#[derive(Debug, Clone, Deserialize)]
pub struct MeetingUpdateRequest {
    /// Meeting the update refers to.
    #[serde(default)]
    pub meeting_id: Option<RoomId>,
    /// Specific target identity; falls back to a room broadcast when
    /// absent or offline.
    #[serde(default)]
    pub user_id: Option<Identity>,
    /// Headline override.
    #[serde(default)]
    pub title: Option<String>,
    /// Message override.
    #[serde(default)]
    pub message: Option<String>,
    /// Full meeting details to forward.
    #[serde(default)]
    pub meeting_details: Option<Value>,
    /// Meeting status to forward.
    #[serde(default)]
    pub status: Option<String>,
    /// Participant the update refers to.
    #[serde(default)]
    pub participant_id: Option<Identity>,
}

/// Payload for `meeting_invitation`.
#[derive(Debug, Clone, Deserialize)]
pub struct MeetingInvitationRequest {
    /// Meeting being invited to.
    #[serde(default)]
    pub meeting_id: Option<RoomId>,
    /// Invitee. Required.
    #[serde(default)]
    pub user_id: Option<Identity>,
    /// Headline override.
    #[serde(default)]
    pub title: Option<String>,
    /// Message override.
    #[serde(default)]
    pub message: Option<String>,
    /// Full meeting details to forward.
    #[serde(default)]
    pub meeting_details: Option<Value>,
}
