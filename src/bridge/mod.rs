//! Event bridge: durable pub/sub subscription → live push notifications.
//!
//! The meeting service publishes one JSON event per committed mutation
//! on the `meeting_events` Postgres NOTIFY channel. A single long-lived
//! task drains that subscription, decodes each event, and re-dispatches
//! it through the [`ConnectionRegistry`]. Per-event failures are logged
//! and skipped; losing the subscription itself triggers a supervised
//! reconnect with exponential backoff and jitter, never a crash.

pub mod dedup;

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use sqlx::PgPool;
use sqlx::postgres::PgListener;

use crate::config::GatewayConfig;
use crate::domain::meeting_event::{
    MEETING_CREATED, MEETING_DELETED, MEETING_UPDATED, PARTICIPANT_ADDED,
    PARTICIPANT_STATUS_UPDATED,
};
use crate::domain::{ConnectionRegistry, MeetingEvent, MeetingNotice, ServerEvent};
use crate::error::GatewayError;
use dedup::DedupCache;

/// Long-lived subscriber to the meeting event channel.
#[derive(Debug)]
pub struct EventBridge {
    pool: PgPool,
    registry: Arc<ConnectionRegistry>,
    channel: String,
    backoff_base: Duration,
    backoff_max: Duration,
    dedup: DedupCache,
}

impl EventBridge {
    /// Creates a bridge over the given connection pool and registry.
    #[must_use]
    pub fn new(pool: PgPool, registry: Arc<ConnectionRegistry>, config: &GatewayConfig) -> Self {
        Self {
            pool,
            registry,
            channel: config.event_channel.clone(),
            backoff_base: Duration::from_millis(config.bridge_backoff_base_ms),
            backoff_max: Duration::from_millis(config.bridge_backoff_max_ms),
            dedup: DedupCache::new(
                Duration::from_secs(config.dedup_ttl_secs),
                config.dedup_capacity,
            ),
        }
    }

    /// Runs the subscription loop forever. Spawn once per process.
    pub async fn run(mut self) {
        let mut backoff = self.backoff_base;
        loop {
            if let Err(error) = self.drain(&mut backoff).await {
                tracing::warn!(%error, delay_ms = backoff.as_millis() as u64,
                    "event bus subscription lost; reconnecting");
            }
            let jitter = Duration::from_millis(rand::rng().random_range(0..250));
            tokio::time::sleep(backoff + jitter).await;
            backoff = next_backoff(backoff, self.backoff_max);
        }
    }

    /// Subscribes and drains notifications until the listener fails.
    /// Resets the caller's backoff once the subscription is up.
    async fn drain(&mut self, backoff: &mut Duration) -> Result<(), GatewayError> {
        let mut listener = PgListener::connect_with(&self.pool)
            .await
            .map_err(|e| GatewayError::BusError(e.to_string()))?;
        listener
            .listen(&self.channel)
            .await
            .map_err(|e| GatewayError::BusError(e.to_string()))?;
        tracing::info!(channel = %self.channel, "event bridge subscribed");
        *backoff = self.backoff_base;

        loop {
            let notification = listener
                .recv()
                .await
                .map_err(|e| GatewayError::BusError(e.to_string()))?;
            self.handle_payload(notification.payload()).await;
        }
    }

    /// Decodes and dispatches one raw payload. Never fails the loop.
    async fn handle_payload(&mut self, payload: &str) {
        let event: MeetingEvent = match serde_json::from_str(payload) {
            Ok(event) => event,
            Err(error) => {
                tracing::warn!(%error, "dropping undecodable bus event");
                return;
            }
        };
        if let Some(event_id) = &event.event_id
            && !self.dedup.insert(event_id)
        {
            tracing::debug!(event_id, "dropping duplicate bus event");
            return;
        }
        dispatch(&self.registry, event).await;
    }
}

/// Doubles the reconnect delay up to `max`.
fn next_backoff(current: Duration, max: Duration) -> Duration {
    current.saturating_mul(2).min(max)
}

fn default_title(title: Option<String>, fallback: &str) -> String {
    title.unwrap_or_else(|| fallback.to_string())
}

/// Translates a decoded meeting event into registry pushes.
///
/// Events without a `meeting_id` and unrecognized event types are
/// dropped with a logged warning.
pub async fn dispatch(registry: &ConnectionRegistry, event: MeetingEvent) {
    let Some(room) = event.meeting_id else {
        tracing::warn!(event_type = %event.event_type, "bus event without meeting_id");
        return;
    };

    match event.event_type.as_str() {
        // No participants to notify yet.
        MEETING_CREATED => {}

        MEETING_UPDATED => {
            let mut notice = MeetingNotice::new(
                room,
                default_title(event.title, "Meeting Updated"),
                "The meeting details have been updated".to_string(),
            );
            notice.timestamp = event.timestamp;
            notice.meeting_details = event.meeting;
            notice.changes = event.changes;
            registry
                .broadcast_to_room(room, &ServerEvent::MeetingUpdate(notice), None)
                .await;
        }

        MEETING_DELETED => {
            let mut notice = MeetingNotice::new(
                room,
                default_title(event.title, "Meeting Deleted"),
                "This meeting has been canceled".to_string(),
            );
            notice.timestamp = event.timestamp;
            notice.status = Some("deleted".to_string());
            registry
                .broadcast_to_room(room, &ServerEvent::MeetingUpdate(notice.clone()), None)
                .await;

            // Participants not in the room still learn about the deletion.
            notice.message = "A meeting you were invited to has been canceled".to_string();
            let direct = ServerEvent::MeetingUpdate(notice);
            for participant in &event.participant_ids {
                registry
                    .send_to_identity_outside_room(participant, room, &direct)
                    .await;
            }
        }

        PARTICIPANT_ADDED => {
            let Some(invitee) = event.invited_user_id else {
                tracing::warn!(room = %room, "participant_added without invited_user_id");
                return;
            };
            let title = default_title(event.title, "Meeting Invitation");
            let mut notice = MeetingNotice::new(
                room,
                title.clone(),
                format!("You've been invited to a meeting: {title}"),
            );
            notice.timestamp = event.timestamp;
            notice.meeting_details = event.meeting;
            notice.user_id = Some(invitee.clone());
            let invitation = ServerEvent::MeetingInvitation(notice);
            if !registry.send_to_identity(&invitee, &invitation).await {
                tracing::debug!(invitee = %invitee, room = %room,
                    "invitee offline, invitation queued");
                registry.queue_invitation(invitee, invitation).await;
            }
        }

        PARTICIPANT_STATUS_UPDATED => {
            let (Some(user), Some(status)) = (event.user_id, event.new_status) else {
                tracing::warn!(room = %room, "participant_status_updated missing fields");
                return;
            };
            let mut notice = MeetingNotice::new(
                room,
                "Participant Status Updated".to_string(),
                format!("A participant has {status} the meeting"),
            );
            notice.timestamp = event.timestamp;
            notice.participant_id = Some(user);
            notice.status = Some(status);
            notice.old_status = event.old_status;
            registry
                .broadcast_to_room(room, &ServerEvent::MeetingUpdate(notice), None)
                .await;
        }

        other => {
            tracing::warn!(event_type = other, "unknown bus event type");
        }
    }
}
