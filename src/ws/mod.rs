//! WebSocket layer: upgrade handling, protocol frames, session state.
//!
//! The WebSocket endpoint at `/ws` carries the whole chat protocol:
//! authentication, room membership, chat messages, and client-initiated
//! meeting notifications.

pub mod connection;
pub mod handler;
pub mod messages;
pub mod session;
