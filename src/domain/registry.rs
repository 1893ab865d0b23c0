//! Connection registry: identity ↔ live connection mapping and fan-out.
//!
//! [`ConnectionRegistry`] is the single owned, lock-guarded object shared
//! by every connection task and the event bridge. It tracks which
//! connections exist, which identity (if any) each one is bound to, and
//! which rooms each one has joined. All pushes go through the
//! per-connection sender handles stored here; each push is independent
//! best-effort, so a dead connection never blocks delivery to others.
//!
//! # Concurrency
//!
//! One coarse `tokio::sync::RwLock` guards the whole map set. Mutations
//! (attach/register/unregister/join/leave) take the write lock; fan-out
//! takes the read lock and sends over unbounded channels, which never
//! blocks.

use std::collections::{HashMap, HashSet, VecDeque};

use tokio::sync::{RwLock, mpsc};

use super::notification::ServerEvent;
use super::{ConnectionId, Identity, RoomId};

/// Per-connection state held by the registry.
#[derive(Debug)]
struct ConnectionEntry {
    identity: Option<Identity>,
    rooms: HashSet<RoomId>,
    tx: mpsc::UnboundedSender<ServerEvent>,
}

#[derive(Debug, Default)]
struct Inner {
    connections: HashMap<ConnectionId, ConnectionEntry>,
    by_identity: HashMap<Identity, HashSet<ConnectionId>>,
    /// Invitations queued for identities with no live connection,
    /// flushed on their next registration.
    pending: HashMap<Identity, VecDeque<ServerEvent>>,
}

/// Bidirectional mapping between logical identities and live connections.
///
/// # Invariant
///
/// `connections[c].identity == Some(i)` iff `by_identity[i]` contains `c`.
/// An identity key is removed as soon as its connection set drains.
#[derive(Debug)]
pub struct ConnectionRegistry {
    inner: RwLock<Inner>,
    pending_cap: usize,
}

impl ConnectionRegistry {
    /// Creates an empty registry. `pending_cap` bounds the number of
    /// queued invitations retained per offline identity.
    #[must_use]
    pub fn new(pending_cap: usize) -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            pending_cap,
        }
    }

    /// Adds a connection handle. Called once when the transport accepts
    /// the socket, before any identity is bound.
    pub async fn attach(&self, connection: ConnectionId, tx: mpsc::UnboundedSender<ServerEvent>) {
        let mut inner = self.inner.write().await;
        inner.connections.insert(
            connection,
            ConnectionEntry {
                identity: None,
                rooms: HashSet::new(),
                tx,
            },
        );
    }

    /// Idempotently binds `connection` to `identity` and flushes any
    /// invitations queued while the identity was offline. Unknown
    /// connections are ignored. Re-binding to a different identity
    /// removes the connection from the previous identity's set first, so
    /// the forward and reverse maps stay symmetric.
    pub async fn register(&self, identity: Identity, connection: ConnectionId) {
        let mut inner = self.inner.write().await;
        let previous = {
            let Some(entry) = inner.connections.get_mut(&connection) else {
                return;
            };
            entry.identity.replace(identity.clone())
        };
        if let Some(previous) = previous
            && previous != identity
            && let Some(set) = inner.by_identity.get_mut(&previous)
        {
            set.remove(&connection);
            if set.is_empty() {
                inner.by_identity.remove(&previous);
            }
        }
        let flushed = inner.pending.remove(&identity);
        inner
            .by_identity
            .entry(identity)
            .or_default()
            .insert(connection);
        if let Some(queued) = flushed
            && let Some(entry) = inner.connections.get(&connection)
        {
            for event in queued {
                let _ = entry.tx.send(event);
            }
        }
    }

    /// Removes a connection and every registry entry referencing it.
    ///
    /// Safe to call for unknown connections (no-op). Returns the rooms
    /// the connection had joined, for presence notification.
    pub async fn unregister(&self, connection: ConnectionId) -> Vec<RoomId> {
        let mut inner = self.inner.write().await;
        let Some(entry) = inner.connections.remove(&connection) else {
            return Vec::new();
        };
        if let Some(identity) = entry.identity {
            if let Some(set) = inner.by_identity.get_mut(&identity) {
                set.remove(&connection);
                if set.is_empty() {
                    inner.by_identity.remove(&identity);
                }
            }
        }
        entry.rooms.into_iter().collect()
    }

    /// Looks up the identity bound to a connection.
    pub async fn resolve(&self, connection: ConnectionId) -> Option<Identity> {
        let inner = self.inner.read().await;
        inner
            .connections
            .get(&connection)
            .and_then(|entry| entry.identity.clone())
    }

    /// Returns `true` if the identity currently owns at least one
    /// registered connection.
    pub async fn is_registered(&self, identity: &Identity) -> bool {
        self.inner.read().await.by_identity.contains_key(identity)
    }

    /// Subscribes a connection to a room. Returns `false` for unknown
    /// connections.
    pub async fn join_room(&self, connection: ConnectionId, room: RoomId) -> bool {
        let mut inner = self.inner.write().await;
        match inner.connections.get_mut(&connection) {
            Some(entry) => {
                entry.rooms.insert(room);
                true
            }
            None => false,
        }
    }

    /// Unsubscribes a connection from a room. Returns `false` if the
    /// connection was unknown or not in the room.
    pub async fn leave_room(&self, connection: ConnectionId, room: RoomId) -> bool {
        let mut inner = self.inner.write().await;
        match inner.connections.get_mut(&connection) {
            Some(entry) => entry.rooms.remove(&room),
            None => false,
        }
    }

    /// Pushes an event to a single connection. Returns `false` if the
    /// connection is unknown or its channel is closed.
    pub async fn send_to_connection(&self, connection: ConnectionId, event: ServerEvent) -> bool {
        let inner = self.inner.read().await;
        match inner.connections.get(&connection) {
            Some(entry) => entry.tx.send(event).is_ok(),
            None => false,
        }
    }

    /// Fans an event out to every live connection of an identity.
    ///
    /// Returns whether at least one registered connection existed. Each
    /// push is best-effort; partial delivery is not rolled back.
    pub async fn send_to_identity(&self, identity: &Identity, event: &ServerEvent) -> bool {
        let inner = self.inner.read().await;
        let Some(set) = inner.by_identity.get(identity) else {
            return false;
        };
        for connection in set {
            if let Some(entry) = inner.connections.get(connection) {
                let _ = entry.tx.send(event.clone());
            }
        }
        true
    }

    /// Pushes an event to the identity's connections that are *not*
    /// currently in `room`. Returns the number of pushes attempted.
    pub async fn send_to_identity_outside_room(
        &self,
        identity: &Identity,
        room: RoomId,
        event: &ServerEvent,
    ) -> usize {
        let inner = self.inner.read().await;
        let Some(set) = inner.by_identity.get(identity) else {
            return 0;
        };
        let mut sent = 0;
        for connection in set {
            if let Some(entry) = inner.connections.get(connection)
                && !entry.rooms.contains(&room)
            {
                let _ = entry.tx.send(event.clone());
                sent += 1;
            }
        }
        sent
    }

    /// Broadcasts an event to every connection joined to `room`,
    /// optionally excluding one connection (typically the originator).
    /// Returns the number of pushes attempted.
    pub async fn broadcast_to_room(
        &self,
        room: RoomId,
        event: &ServerEvent,
        exclude: Option<ConnectionId>,
    ) -> usize {
        let inner = self.inner.read().await;
        let mut sent = 0;
        for (connection, entry) in &inner.connections {
            if Some(*connection) == exclude || !entry.rooms.contains(&room) {
                continue;
            }
            let _ = entry.tx.send(event.clone());
            sent += 1;
        }
        sent
    }

    /// Queues an invitation for an offline identity, to be delivered on
    /// its next registration. Oldest entries are dropped beyond the
    /// per-identity cap.
    pub async fn queue_invitation(&self, identity: Identity, event: ServerEvent) {
        let mut inner = self.inner.write().await;
        let queue = inner.pending.entry(identity).or_default();
        if queue.len() >= self.pending_cap {
            queue.pop_front();
        }
        queue.push_back(event);
    }

    /// Returns the number of live connections.
    pub async fn connection_count(&self) -> usize {
        self.inner.read().await.connections.len()
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    async fn attach(registry: &ConnectionRegistry) -> (ConnectionId, mpsc::UnboundedReceiver<ServerEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let conn = ConnectionId::new();
        registry.attach(conn, tx).await;
        (conn, rx)
    }

    fn probe_event() -> ServerEvent {
        ServerEvent::MessageError {
            error: "probe".to_string(),
        }
    }

    #[tokio::test]
    async fn resolve_defined_iff_registered() {
        let registry = ConnectionRegistry::new(8);
        let (conn, _rx) = attach(&registry).await;
        assert_eq!(registry.resolve(conn).await, None);

        registry.register(Identity::User(1), conn).await;
        assert_eq!(registry.resolve(conn).await, Some(Identity::User(1)));

        registry.unregister(conn).await;
        assert_eq!(registry.resolve(conn).await, None);
        assert!(!registry.is_registered(&Identity::User(1)).await);
    }

    #[tokio::test]
    async fn register_is_idempotent() {
        let registry = ConnectionRegistry::new(8);
        let (conn, _rx) = attach(&registry).await;
        registry.register(Identity::User(1), conn).await;
        registry.register(Identity::User(1), conn).await;
        assert!(registry.is_registered(&Identity::User(1)).await);

        registry.unregister(conn).await;
        assert!(!registry.is_registered(&Identity::User(1)).await);
    }

    #[tokio::test]
    async fn rebind_drops_previous_identity_entry() {
        let registry = ConnectionRegistry::new(8);
        let (conn, _rx) = attach(&registry).await;
        registry.register(Identity::User(1), conn).await;
        registry.register(Identity::User(2), conn).await;

        assert!(!registry.is_registered(&Identity::User(1)).await);
        assert!(registry.is_registered(&Identity::User(2)).await);
        assert_eq!(registry.resolve(conn).await, Some(Identity::User(2)));
        assert!(
            !registry
                .send_to_identity(&Identity::User(1), &probe_event())
                .await
        );

        registry.unregister(conn).await;
        assert!(!registry.is_registered(&Identity::User(2)).await);
    }

    #[tokio::test]
    async fn unregister_unknown_is_noop() {
        let registry = ConnectionRegistry::new(8);
        let rooms = registry.unregister(ConnectionId::new()).await;
        assert!(rooms.is_empty());
    }

    #[tokio::test]
    async fn identity_entry_survives_until_last_connection() {
        let registry = ConnectionRegistry::new(8);
        let (tab_a, _rx_a) = attach(&registry).await;
        let (tab_b, _rx_b) = attach(&registry).await;
        registry.register(Identity::User(5), tab_a).await;
        registry.register(Identity::User(5), tab_b).await;

        registry.unregister(tab_a).await;
        assert!(registry.is_registered(&Identity::User(5)).await);

        registry.unregister(tab_b).await;
        assert!(!registry.is_registered(&Identity::User(5)).await);
    }

    #[tokio::test]
    async fn send_to_identity_reaches_all_connections() {
        let registry = ConnectionRegistry::new(8);
        let (tab_a, mut rx_a) = attach(&registry).await;
        let (tab_b, mut rx_b) = attach(&registry).await;
        let (other, mut rx_other) = attach(&registry).await;
        registry.register(Identity::User(5), tab_a).await;
        registry.register(Identity::User(5), tab_b).await;
        registry.register(Identity::User(6), other).await;

        let delivered = registry
            .send_to_identity(&Identity::User(5), &probe_event())
            .await;
        assert!(delivered);
        assert!(rx_a.try_recv().is_ok());
        assert!(rx_b.try_recv().is_ok());
        assert!(rx_other.try_recv().is_err());
    }

    #[tokio::test]
    async fn send_to_unknown_identity_reports_undelivered() {
        let registry = ConnectionRegistry::new(8);
        let delivered = registry
            .send_to_identity(&Identity::User(404), &probe_event())
            .await;
        assert!(!delivered);
    }

    #[tokio::test]
    async fn room_broadcast_excludes_originator() {
        let registry = ConnectionRegistry::new(8);
        let (joiner, mut rx_joiner) = attach(&registry).await;
        let (peer, mut rx_peer) = attach(&registry).await;
        let room = RoomId::new(42);
        assert!(registry.join_room(joiner, room).await);
        assert!(registry.join_room(peer, room).await);

        let sent = registry
            .broadcast_to_room(room, &probe_event(), Some(joiner))
            .await;
        assert_eq!(sent, 1);
        assert!(rx_joiner.try_recv().is_err());
        assert!(rx_peer.try_recv().is_ok());
    }

    #[tokio::test]
    async fn leave_room_stops_delivery() {
        let registry = ConnectionRegistry::new(8);
        let (conn, mut rx) = attach(&registry).await;
        let room = RoomId::new(1);
        registry.join_room(conn, room).await;
        assert!(registry.leave_room(conn, room).await);

        let sent = registry.broadcast_to_room(room, &probe_event(), None).await;
        assert_eq!(sent, 0);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn outside_room_push_skips_connections_in_room() {
        let registry = ConnectionRegistry::new(8);
        let (in_room, mut rx_in) = attach(&registry).await;
        let (elsewhere, mut rx_out) = attach(&registry).await;
        let identity = Identity::User(9);
        registry.register(identity.clone(), in_room).await;
        registry.register(identity.clone(), elsewhere).await;
        let room = RoomId::new(3);
        registry.join_room(in_room, room).await;

        let sent = registry
            .send_to_identity_outside_room(&identity, room, &probe_event())
            .await;
        assert_eq!(sent, 1);
        assert!(rx_in.try_recv().is_err());
        assert!(rx_out.try_recv().is_ok());
    }

    #[tokio::test]
    async fn pending_invitation_flushes_on_register() {
        let registry = ConnectionRegistry::new(8);
        let invitee = Identity::User(11);
        registry
            .queue_invitation(invitee.clone(), probe_event())
            .await;

        let (conn, mut rx) = attach(&registry).await;
        registry.register(invitee, conn).await;
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn pending_queue_is_bounded() {
        let registry = ConnectionRegistry::new(2);
        let invitee = Identity::User(12);
        for _ in 0..5 {
            registry
                .queue_invitation(invitee.clone(), probe_event())
                .await;
        }

        let (conn, mut rx) = attach(&registry).await;
        registry.register(invitee, conn).await;
        let mut flushed = 0;
        while rx.try_recv().is_ok() {
            flushed += 1;
        }
        assert_eq!(flushed, 2);
    }

    #[tokio::test]
    async fn unregister_returns_joined_rooms() {
        let registry = ConnectionRegistry::new(8);
        let (conn, _rx) = attach(&registry).await;
        registry.join_room(conn, RoomId::new(1)).await;
        registry.join_room(conn, RoomId::new(2)).await;

        let mut rooms = registry.unregister(conn).await;
        rooms.sort();
        assert_eq!(rooms, vec![RoomId::new(1), RoomId::new(2)]);
        assert_eq!(registry.connection_count().await, 0);
    }
}
