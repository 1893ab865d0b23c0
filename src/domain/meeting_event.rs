//! Domain events consumed from the `meeting_events` broadcast channel.
//!
//! The meeting service publishes one JSON event per committed mutation.
//! Delivery is at-least-once with per-publisher FIFO; the bridge layers a
//! dedup cache on top for events that carry an `event_id`.

use serde::Deserialize;
use serde_json::Value;

use super::{Identity, RoomId};

/// Event type published after a meeting is created.
pub const MEETING_CREATED: &str = "meeting_created";
/// Event type published after meeting details change.
pub const MEETING_UPDATED: &str = "meeting_updated";
/// Event type published after a meeting is deleted.
pub const MEETING_DELETED: &str = "meeting_deleted";
/// Event type published after a participant is invited.
pub const PARTICIPANT_ADDED: &str = "participant_added";
/// Event type published after a participant accepts or declines.
pub const PARTICIPANT_STATUS_UPDATED: &str = "participant_status_updated";

/// A decoded domain event from the meeting service.
///
/// Only `event_type` is mandatory at the decode stage; the bridge
/// validates per-type requirements (notably `meeting_id`) and drops
/// events that fail them with a logged warning.
#[derive(Debug, Clone, Deserialize)]
pub struct MeetingEvent {
    /// Discriminator, e.g. `"meeting_updated"`.
    pub event_type: String,
    /// Idempotency key; absent from legacy publishers.
    #[serde(default)]
    pub event_id: Option<String>,
    /// Meeting the event refers to. Required for every handled type.
    #[serde(default)]
    pub meeting_id: Option<RoomId>,
    /// Publisher-side timestamp, forwarded verbatim.
    #[serde(default)]
    pub timestamp: Option<String>,
    /// Meeting title, when the publisher included one.
    #[serde(default)]
    pub title: Option<String>,
    /// Full meeting details payload.
    #[serde(default)]
    pub meeting: Option<Value>,
    /// Field-level change flags for `meeting_updated`.
    #[serde(default)]
    pub changes: Option<Value>,
    /// Participants of a deleted meeting, for direct notification.
    #[serde(default)]
    pub participant_ids: Vec<Identity>,
    /// Invitee for `participant_added`.
    #[serde(default)]
    pub invited_user_id: Option<Identity>,
    /// Subject of `participant_status_updated`.
    #[serde(default)]
    pub user_id: Option<Identity>,
    /// Previous participant status.
    #[serde(default)]
    pub old_status: Option<String>,
    /// New participant status, e.g. `"accepted"`.
    #[serde(default)]
    pub new_status: Option<String>,
}
