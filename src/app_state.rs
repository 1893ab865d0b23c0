//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::auth::TokenVerifier;
use crate::domain::ConnectionRegistry;
use crate::history::ChatHistory;

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Identity ↔ connection registry for all real-time fan-out.
    pub registry: Arc<ConnectionRegistry>,
    /// Blended recent-history service (cache over durable store).
    pub history: Arc<ChatHistory>,
    /// Bearer credential verifier.
    pub auth: Arc<TokenVerifier>,
    /// Total messages pushed as `chat_history` on room join.
    pub join_history_limit: usize,
    /// Per-sender cap applied to the join-time history push.
    pub join_history_per_sender: usize,
}
