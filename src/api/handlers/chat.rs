//! Chat history handler.

use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};

use crate::api::dto::{ChatHistoryResponse, HistoryParams};
use crate::app_state::AppState;
use crate::domain::RoomId;
use crate::error::{ErrorResponse, GatewayError};

/// `GET /chat/history/:meeting_id` — Recent messages for a meeting.
///
/// Unlike the WebSocket surface, this endpoint requires a valid bearer
/// credential.
///
/// # Errors
///
/// Returns [`GatewayError::Unauthorized`] without a valid credential,
/// [`GatewayError::InvalidRequest`] for a non-numeric meeting id, and
/// [`GatewayError::MeetingNotFound`] when the meeting does not exist.
#[utoipa::path(
    get,
    path = "/api/v1/chat/history/{meeting_id}",
    tag = "Chat",
    summary = "Get chat history for a meeting",
    description = "Returns recent messages for the meeting, oldest first. A positive `per_user_limit` applies the per-sender diversity cap.",
    params(
        ("meeting_id" = String, Path, description = "Numeric meeting id"),
        HistoryParams,
    ),
    responses(
        (status = 200, description = "Recent messages", body = ChatHistoryResponse),
        (status = 400, description = "Invalid meeting id", body = ErrorResponse),
        (status = 401, description = "Missing or invalid credential", body = ErrorResponse),
        (status = 404, description = "Meeting not found", body = ErrorResponse),
    ),
    security(("bearer" = []))
)]
pub async fn get_history(
    State(state): State<AppState>,
    Path(meeting_id): Path<String>,
    Query(params): Query<HistoryParams>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, GatewayError> {
    let token = bearer_token(&headers).ok_or(GatewayError::Unauthorized)?;
    if state.auth.verify(&token).is_none() {
        return Err(GatewayError::Unauthorized);
    }

    let id: i64 = meeting_id
        .parse()
        .map_err(|_| GatewayError::InvalidRequest(format!("invalid meeting id: {meeting_id}")))?;
    let room = RoomId::new(id);

    let meeting = state
        .history
        .find_meeting(room)
        .await?
        .ok_or(GatewayError::MeetingNotFound(id))?;

    let params = params.clamped();
    let messages = state
        .history
        .recent(room, params.limit, params.per_user_limit)
        .await?;

    Ok(Json(ChatHistoryResponse {
        meeting_id: meeting.id,
        title: meeting.title,
        messages,
    }))
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(axum::http::header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::to_string)
}

/// Chat routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/chat/history/{meeting_id}", get(get_history))
}
