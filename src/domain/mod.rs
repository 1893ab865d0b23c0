//! Domain layer: identities, rooms, messages, events, and the
//! connection registry.
//!
//! This module contains the server-side domain model: logical sender
//! identity, connection handles, the chat message shape, inbound meeting
//! events, outbound notifications, and the identity↔connection registry
//! used for all real-time fan-out.

pub mod identity;
pub mod meeting_event;
pub mod message;
pub mod notification;
pub mod registry;

pub use identity::{ConnectionId, GUEST_PREFIX, Identity, TEMP_PREFIX};
pub use meeting_event::MeetingEvent;
pub use message::{ChatMessage, RoomId};
pub use notification::{MeetingNotice, ServerEvent};
pub use registry::ConnectionRegistry;
