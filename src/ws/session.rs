//! Per-connection protocol state machine.
//!
//! A connection starts unauthenticated; a valid bearer credential (at
//! connect time or via a later `authenticate` frame) binds an identity,
//! which is immutable for the connection's lifetime. Missing or invalid
//! credentials never reject the connection — unauthenticated sessions
//! simply act as guests. All request violations are answered with
//! scoped error events to the sender alone; nothing here ever tears
//! down the connection.

use chrono::Utc;

use crate::app_state::AppState;
use crate::domain::{ConnectionId, Identity, MeetingNotice, ServerEvent};

use super::messages::{
    ChatMessageRequest, ClientFrame, MeetingInvitationRequest, MeetingUpdateRequest, RoomRequest,
};

/// Mutable state for one live connection.
#[derive(Debug)]
pub struct Session {
    /// Transport handle this session belongs to.
    pub connection_id: ConnectionId,
    /// Identity bound at authentication time, if any.
    pub identity: Option<Identity>,
    /// Last display name the client supplied, for presence events.
    pub display_name: Option<String>,
}

impl Session {
    /// Creates a fresh unauthenticated session.
    #[must_use]
    pub const fn new(connection_id: ConnectionId) -> Self {
        Self {
            connection_id,
            identity: None,
            display_name: None,
        }
    }

    /// Returns `true` once an identity has been bound.
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        self.identity.is_some()
    }

    /// Resolves the effective identity for a request: the authenticated
    /// identity if present, else the caller-supplied one, else the
    /// transport-derived fallback.
    #[must_use]
    pub fn effective_identity(&self, supplied: Option<&Identity>) -> Identity {
        self.identity
            .clone()
            .or_else(|| supplied.cloned())
            .unwrap_or_else(|| Identity::temp_for(self.connection_id))
    }
}

/// Verifies a token and, on success, binds the identity to the session
/// and registers it. Failure leaves the session unauthenticated.
/// Once an identity is bound it is immutable for the connection's
/// lifetime; later `authenticate` frames are ignored.
pub async fn authenticate(state: &AppState, session: &mut Session, token: &str) {
    if let Some(identity) = &session.identity {
        tracing::debug!(user = %identity, connection = %session.connection_id,
            "connection already authenticated; ignoring re-authentication");
        return;
    }
    match state.auth.verify(token) {
        Some(verified) => {
            tracing::info!(user = %verified.identity, connection = %session.connection_id,
                "authenticated connection");
            session.identity = Some(verified.identity.clone());
            state
                .registry
                .register(verified.identity, session.connection_id)
                .await;
        }
        None => {
            tracing::debug!(connection = %session.connection_id,
                "invalid credential; connection stays unauthenticated");
        }
    }
}

/// Decodes and dispatches one text frame from the client.
pub async fn handle_frame(state: &AppState, session: &mut Session, text: &str) {
    let frame: ClientFrame = match serde_json::from_str(text) {
        Ok(frame) => frame,
        Err(error) => {
            tracing::debug!(connection = %session.connection_id, %error,
                "ignoring malformed frame");
            return;
        }
    };

    match frame {
        ClientFrame::Authenticate { token } => authenticate(state, session, &token).await,
        ClientFrame::JoinRoom(req) => handle_join(state, session, req).await,
        ClientFrame::LeaveRoom(req) => handle_leave(state, session, req).await,
        ClientFrame::ChatMessage(req) => handle_chat_message(state, session, req).await,
        ClientFrame::MeetingUpdate(req) => handle_meeting_update(state, session, req).await,
        ClientFrame::MeetingInvitation(req) => {
            handle_meeting_invitation(state, session, req).await;
        }
    }
}

async fn reply(state: &AppState, session: &Session, event: ServerEvent) {
    state
        .registry
        .send_to_connection(session.connection_id, event)
        .await;
}

async fn handle_join(state: &AppState, session: &mut Session, req: RoomRequest) {
    let Some(room) = req.meeting_id else {
        tracing::info!(connection = %session.connection_id, "join_room missing meeting_id");
        return;
    };
    let identity = session.effective_identity(req.user_id.as_ref());
    let user_name = req.user_name.unwrap_or_else(|| "Guest".to_string());
    session.display_name = Some(user_name.clone());

    state.registry.join_room(session.connection_id, room).await;
    tracing::info!(user = %identity, room = %room, "user joined room");

    let joined = ServerEvent::UserJoined {
        user_id: identity,
        user_name,
        room,
        meeting_id: room,
        authenticated: session.is_authenticated(),
    };
    state
        .registry
        .broadcast_to_room(room, &joined, Some(session.connection_id))
        .await;

    match state
        .history
        .recent(room, state.join_history_limit, state.join_history_per_sender)
        .await
    {
        Ok(messages) if !messages.is_empty() => {
            reply(
                state,
                session,
                ServerEvent::ChatHistory {
                    meeting_id: room,
                    messages,
                },
            )
            .await;
        }
        Ok(_) => {}
        Err(error) => {
            tracing::warn!(room = %room, %error, "failed to load chat history for join");
        }
    }
}

async fn handle_leave(state: &AppState, session: &mut Session, req: RoomRequest) {
    let Some(room) = req.meeting_id else {
        tracing::info!(connection = %session.connection_id, "leave_room missing meeting_id");
        return;
    };
    let identity = session.effective_identity(req.user_id.as_ref());
    let user_name = req
        .user_name
        .or_else(|| session.display_name.clone())
        .unwrap_or_else(|| "Guest".to_string());

    state.registry.leave_room(session.connection_id, room).await;
    tracing::info!(user = %identity, room = %room, "user left room");

    let left = ServerEvent::UserLeft {
        user_id: identity,
        user_name,
        room,
        authenticated: session.is_authenticated(),
    };
    state
        .registry
        .broadcast_to_room(room, &left, Some(session.connection_id))
        .await;
}

async fn handle_chat_message(state: &AppState, session: &mut Session, req: ChatMessageRequest) {
    let (Some(room), Some(content)) = (req.meeting_id, req.message_text) else {
        reply(
            state,
            session,
            ServerEvent::MessageError {
                error: "Missing room or message content".to_string(),
            },
        )
        .await;
        return;
    };
    if content.is_empty() {
        reply(
            state,
            session,
            ServerEvent::MessageError {
                error: "Missing room or message content".to_string(),
            },
        )
        .await;
        return;
    }

    let identity = session.effective_identity(req.user_id.as_ref());
    let user_name = req.user_name.unwrap_or_else(|| "Guest".to_string());

    match state
        .history
        .record(room, &identity, Some(&user_name), &content)
        .await
    {
        Ok(message) => {
            tracing::debug!(user = %identity, room = %room, id = message.id, "message stored");
            let event = ServerEvent::ChatMessage {
                message,
                authenticated: session.is_authenticated(),
            };
            state.registry.broadcast_to_room(room, &event, None).await;
        }
        Err(error) => {
            tracing::warn!(user = %identity, room = %room, %error, "failed to save message");
            reply(
                state,
                session,
                ServerEvent::MessageError {
                    error: "Failed to save message".to_string(),
                },
            )
            .await;
        }
    }
}

async fn handle_meeting_update(state: &AppState, session: &Session, req: MeetingUpdateRequest) {
    let Some(sender) = session.identity.clone() else {
        tracing::info!(connection = %session.connection_id,
            "unauthorized meeting_update attempt");
        reply(
            state,
            session,
            ServerEvent::UpdateError {
                error: "Authentication required".to_string(),
            },
        )
        .await;
        return;
    };
    let Some(room) = req.meeting_id else {
        reply(
            state,
            session,
            ServerEvent::UpdateError {
                error: "Missing meeting_id".to_string(),
            },
        )
        .await;
        return;
    };

    let mut notice = MeetingNotice::new(
        room,
        req.title.unwrap_or_else(|| "Meeting Updated".to_string()),
        req.message
            .unwrap_or_else(|| "A meeting has been updated".to_string()),
    );
    notice.timestamp = Some(Utc::now().to_rfc3339());
    notice.sender_id = Some(sender);
    notice.meeting_details = req.meeting_details;
    notice.status = req.status;
    notice.participant_id = req.participant_id;
    let event = ServerEvent::MeetingUpdate(notice);

    if let Some(target) = req.user_id {
        if state.registry.send_to_identity(&target, &event).await {
            tracing::debug!(target = %target, room = %room, "meeting update sent directly");
            return;
        }
        tracing::debug!(target = %target, room = %room,
            "target offline, broadcasting update to room");
    }
    state.registry.broadcast_to_room(room, &event, None).await;
}

async fn handle_meeting_invitation(
    state: &AppState,
    session: &Session,
    req: MeetingInvitationRequest,
) {
    let Some(sender) = session.identity.clone() else {
        tracing::info!(connection = %session.connection_id,
            "unauthorized meeting_invitation attempt");
        reply(
            state,
            session,
            ServerEvent::InvitationError {
                error: "Authentication required".to_string(),
            },
        )
        .await;
        return;
    };
    let (Some(room), Some(target)) = (req.meeting_id, req.user_id) else {
        reply(
            state,
            session,
            ServerEvent::InvitationError {
                error: "Missing required data".to_string(),
            },
        )
        .await;
        return;
    };

    let mut notice = MeetingNotice::new(
        room,
        req.title
            .unwrap_or_else(|| "Meeting Invitation".to_string()),
        req.message
            .unwrap_or_else(|| "You have been invited to a meeting".to_string()),
    );
    notice.timestamp = Some(Utc::now().to_rfc3339());
    notice.sender_id = Some(sender);
    notice.user_id = Some(target.clone());
    notice.meeting_details = req.meeting_details;
    let event = ServerEvent::MeetingInvitation(notice);

    if state.registry.send_to_identity(&target, &event).await {
        tracing::debug!(target = %target, room = %room, "invitation sent directly");
    } else {
        // Offline invitees get the invitation on their next connection
        // instead of leaking it to everyone else.
        tracing::info!(target = %target, room = %room, "invitee offline, invitation queued");
        state.registry.queue_invitation(target, event).await;
    }
}

/// Tears the session down: purges the registry and notifies rooms the
/// connection was still joined to.
pub async fn terminate(state: &AppState, session: &Session) {
    let rooms = state.registry.unregister(session.connection_id).await;
    if rooms.is_empty() {
        return;
    }
    let identity = session.effective_identity(None);
    let user_name = session
        .display_name
        .clone()
        .unwrap_or_else(|| "Guest".to_string());
    for room in rooms {
        let left = ServerEvent::UserLeft {
            user_id: identity.clone(),
            user_name: user_name.clone(),
            room,
            authenticated: session.is_authenticated(),
        };
        state.registry.broadcast_to_room(room, &left, None).await;
    }
}
