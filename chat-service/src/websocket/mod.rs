use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{
    mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender},
    RwLock,
};
use uuid::Uuid;

/// Unique identifier for a registered WebSocket connection.
///
/// Each connection gets a unique id when it registers, which allows precise
/// deregistration when it closes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

struct Connection {
    id: ConnectionId,
    sender: UnboundedSender<String>,
}

/// Tracks, per room, the set of currently open connections.
///
/// A room entry exists if and only if it has at least one active
/// connection; deregistering the last connection removes the entry
/// entirely. Structural mutation is serialized by the registry lock, which
/// is never held across a blocking delivery: broadcast pushes into
/// unbounded channels, so one slow peer cannot stall registry mutations
/// for others.
#[derive(Default, Clone)]
pub struct ConnectionRegistry {
    // room_id -> list of connections
    inner: Arc<RwLock<HashMap<String, Vec<Connection>>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connection to the room's active set and hand back the channel
    /// its broadcast frames arrive on.
    ///
    /// Registering an id that is already present is a no-op and returns
    /// `None`, leaving the original channel in place.
    pub async fn register(
        &self,
        room_id: &str,
        connection_id: ConnectionId,
    ) -> Option<UnboundedReceiver<String>> {
        let mut guard = self.inner.write().await;
        let connections = guard.entry(room_id.to_string()).or_default();

        if connections.iter().any(|c| c.id == connection_id) {
            return None;
        }

        let (tx, rx) = unbounded_channel();
        connections.push(Connection {
            id: connection_id,
            sender: tx,
        });

        tracing::debug!(
            room_id,
            ?connection_id,
            total = connections.len(),
            "registered connection"
        );

        Some(rx)
    }

    /// Remove a connection from the room's set.
    ///
    /// Removes the room entry entirely when the set becomes empty, so stale
    /// rooms never accumulate. Safe to call more than once for the same
    /// connection.
    pub async fn deregister(&self, room_id: &str, connection_id: ConnectionId) {
        let mut guard = self.inner.write().await;

        if let Some(connections) = guard.get_mut(room_id) {
            connections.retain(|c| c.id != connection_id);

            if connections.is_empty() {
                guard.remove(room_id);
                tracing::debug!(room_id, "removed empty room from registry");
            }
        }
    }

    /// Deliver `payload` to every connection registered under `room_id` at
    /// the moment of the call, including the originating sender's own
    /// connection. Dead senders are dropped on the way.
    pub async fn broadcast(&self, room_id: &str, payload: &str) {
        let mut guard = self.inner.write().await;
        if let Some(connections) = guard.get_mut(room_id) {
            let before = connections.len();

            connections.retain(|c| c.sender.send(payload.to_string()).is_ok());

            let after = connections.len();
            if before != after {
                tracing::debug!(
                    room_id,
                    dropped = before - after,
                    active = after,
                    "cleaned up dead connections during broadcast"
                );
            }
        }
    }

    /// Number of connections currently registered to a room.
    pub async fn connection_count(&self, room_id: &str) -> usize {
        let guard = self.inner.read().await;
        guard.get(room_id).map(|v| v.len()).unwrap_or(0)
    }

    /// Number of rooms with at least one active connection.
    pub async fn room_count(&self) -> usize {
        self.inner.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn register_then_deregister_removes_room_entry() {
        let registry = ConnectionRegistry::new();
        let ids: Vec<ConnectionId> = (0..3).map(|_| ConnectionId::new()).collect();

        for id in &ids {
            assert!(registry.register("alice_bob", *id).await.is_some());
        }
        assert_eq!(registry.connection_count("alice_bob").await, 3);

        for id in &ids {
            registry.deregister("alice_bob", *id).await;
        }
        assert_eq!(registry.connection_count("alice_bob").await, 0);
        assert_eq!(registry.room_count().await, 0);
    }

    #[tokio::test]
    async fn duplicate_registration_is_a_noop() {
        let registry = ConnectionRegistry::new();
        let id = ConnectionId::new();

        assert!(registry.register("alice_bob", id).await.is_some());
        assert!(registry.register("alice_bob", id).await.is_none());
        assert_eq!(registry.connection_count("alice_bob").await, 1);
    }

    #[tokio::test]
    async fn deregister_is_idempotent() {
        let registry = ConnectionRegistry::new();
        let id = ConnectionId::new();

        registry.register("alice_bob", id).await;
        registry.deregister("alice_bob", id).await;
        registry.deregister("alice_bob", id).await;
        assert_eq!(registry.room_count().await, 0);
    }

    #[tokio::test]
    async fn broadcast_reaches_only_the_target_room() {
        let registry = ConnectionRegistry::new();
        let in_room = ConnectionId::new();
        let other_room = ConnectionId::new();

        let mut rx_in = registry.register("alice_bob", in_room).await.unwrap();
        let mut rx_other = registry.register("alice_carol", other_room).await.unwrap();

        registry.broadcast("alice_bob", "hello").await;

        assert_eq!(rx_in.recv().await.unwrap(), "hello");
        assert!(rx_other.try_recv().is_err());
    }

    #[tokio::test]
    async fn broadcast_echoes_to_every_registered_connection() {
        let registry = ConnectionRegistry::new();
        let a = ConnectionId::new();
        let b = ConnectionId::new();

        let mut rx_a = registry.register("alice_bob", a).await.unwrap();
        let mut rx_b = registry.register("alice_bob", b).await.unwrap();

        registry.broadcast("alice_bob", "hi").await;

        assert_eq!(rx_a.recv().await.unwrap(), "hi");
        assert_eq!(rx_b.recv().await.unwrap(), "hi");
    }

    #[tokio::test]
    async fn broadcast_drops_dead_connections() {
        let registry = ConnectionRegistry::new();
        let live = ConnectionId::new();
        let dead = ConnectionId::new();

        let mut rx_live = registry.register("alice_bob", live).await.unwrap();
        let rx_dead = registry.register("alice_bob", dead).await.unwrap();
        drop(rx_dead);

        registry.broadcast("alice_bob", "hi").await;

        assert_eq!(rx_live.recv().await.unwrap(), "hi");
        assert_eq!(registry.connection_count("alice_bob").await, 1);
    }
}
