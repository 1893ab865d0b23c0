//! DTOs for the chat history endpoint.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::domain::ChatMessage;

/// Query parameters for the history endpoint.
#[derive(Debug, Clone, Deserialize, IntoParams)]
pub struct HistoryParams {
    /// Maximum messages to return (max 200). Defaults to 50.
    #[serde(default = "default_limit")]
    pub limit: usize,
    /// Per-sender cap for the diversity-limited view. `0` disables the
    /// cap. Defaults to 0.
    #[serde(default)]
    pub per_user_limit: usize,
}

fn default_limit() -> usize {
    50
}

impl HistoryParams {
    /// Clamps `limit` to the allowed maximum of 200.
    #[must_use]
    pub fn clamped(&self) -> Self {
        Self {
            limit: self.limit.clamp(1, 200),
            per_user_limit: self.per_user_limit,
        }
    }
}

/// Response body for the history endpoint.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ChatHistoryResponse {
    /// Meeting the history belongs to.
    pub meeting_id: i64,
    /// Meeting title from the durable store.
    pub title: String,
    /// Messages, oldest first.
    pub messages: Vec<ChatMessage>,
}
