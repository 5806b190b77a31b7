//! Communication sessions and event fan-out
//!
//! This module is the transport seam of the core: the [`Tunnel`] trait
//! abstracts one bidirectional client connection, and the [`Broadcaster`]
//! owns the set of active tunnels and fans events out to them. The core has
//! no dependency on any specific transport technology; implementations might
//! use WebSockets, Server-Sent Events, or an in-process channel in tests.

use std::{collections::HashMap, fmt::Display, str::FromStr};

use serde_with::{DeserializeFromStr, SerializeDisplay};
use uuid::Uuid;

use super::events::{SyncMessage, UpdateMessage};

/// A unique handle for one client connection
///
/// The transport layer allocates one per connection and keeps it stable for
/// the connection's lifetime; a reconnecting participant gets a fresh handle.
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, DeserializeFromStr, SerializeDisplay,
)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    /// Creates a new random connection handle
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for ConnectionId {
    type Err = uuid::Error;

    /// Parses a connection handle from a UUID string
    ///
    /// # Errors
    ///
    /// Returns a `uuid::Error` if the string is not a valid UUID.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::from_str(s)?))
    }
}

/// Trait for sending messages through one client connection
///
/// Delivery is best effort: implementations must swallow their own transport
/// failures rather than surface them, so one slow or broken client can never
/// fail delivery to the others or stall the lobby.
pub trait Tunnel {
    /// Sends an update event to the client
    fn send_message(&self, message: &UpdateMessage);

    /// Sends a state synchronization message to the client
    fn send_state(&self, state: &SyncMessage);

    /// Closes the connection
    fn close(self);
}

/// Fan-out of lobby events to all active connections
///
/// The broadcaster's only state is the active session set. The transport
/// layer attaches a tunnel when a connection opens and detaches it when the
/// connection closes; the lobby addresses connections by [`ConnectionId`].
#[derive(Debug, Default)]
pub struct Broadcaster<T: Tunnel> {
    tunnels: HashMap<ConnectionId, T>,
}

impl<T: Tunnel> Broadcaster<T> {
    /// Creates an empty broadcaster
    pub fn new() -> Self {
        Self {
            tunnels: HashMap::new(),
        }
    }

    /// Registers the tunnel for a newly opened connection
    ///
    /// An existing tunnel under the same handle is closed and replaced.
    pub fn attach(&mut self, connection: ConnectionId, tunnel: T) {
        if let Some(previous) = self.tunnels.insert(connection, tunnel) {
            previous.close();
        }
    }

    /// Removes and closes the tunnel for a connection
    pub fn detach(&mut self, connection: ConnectionId) {
        if let Some(tunnel) = self.tunnels.remove(&connection) {
            tunnel.close();
        }
    }

    /// Number of active connections
    pub fn len(&self) -> usize {
        self.tunnels.len()
    }

    /// Whether no connections are active
    pub fn is_empty(&self) -> bool {
        self.tunnels.is_empty()
    }

    /// Sends an update event to a single connection
    ///
    /// A missing tunnel means the connection already closed; the send is
    /// silently skipped.
    pub fn send_to_one(&self, connection: ConnectionId, message: &UpdateMessage) {
        if let Some(tunnel) = self.tunnels.get(&connection) {
            tunnel.send_message(message);
        }
    }

    /// Sends a state synchronization message to a single connection
    pub fn send_state_to(&self, connection: ConnectionId, state: &SyncMessage) {
        if let Some(tunnel) = self.tunnels.get(&connection) {
            tunnel.send_state(state);
        }
    }

    /// Sends an update event to every active connection
    ///
    /// # Arguments
    ///
    /// * `message` - The event to fan out
    /// * `excluding` - Optional connection to skip, for "everyone else" events
    pub fn send_to_all(&self, message: &UpdateMessage, excluding: Option<ConnectionId>) {
        for (connection, tunnel) in &self.tunnels {
            if Some(*connection) == excluding {
                continue;
            }
            tunnel.send_message(message);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::VecDeque,
        sync::{Arc, Mutex},
    };

    use super::*;

    #[derive(Debug, Clone, Default)]
    struct MockTunnel {
        messages: Arc<Mutex<VecDeque<UpdateMessage>>>,
        closed: Arc<Mutex<bool>>,
    }

    impl Tunnel for MockTunnel {
        fn send_message(&self, message: &UpdateMessage) {
            self.messages.lock().unwrap().push_back(message.clone());
        }

        fn send_state(&self, _state: &SyncMessage) {}

        fn close(self) {
            *self.closed.lock().unwrap() = true;
        }
    }

    fn count(tunnel: &MockTunnel) -> usize {
        tunnel.messages.lock().unwrap().len()
    }

    #[test]
    fn send_to_all_skips_excluded_connection() {
        let mut broadcaster = Broadcaster::new();
        let (a, b) = (ConnectionId::new(), ConnectionId::new());
        let (tunnel_a, tunnel_b) = (MockTunnel::default(), MockTunnel::default());
        broadcaster.attach(a, tunnel_a.clone());
        broadcaster.attach(b, tunnel_b.clone());

        broadcaster.send_to_all(
            &UpdateMessage::PlayerAnswered {
                name: "ada".to_owned(),
            },
            Some(a),
        );

        assert_eq!(count(&tunnel_a), 0);
        assert_eq!(count(&tunnel_b), 1);
    }

    #[test]
    fn send_to_one_ignores_unknown_connection() {
        let broadcaster: Broadcaster<MockTunnel> = Broadcaster::new();
        broadcaster.send_to_one(
            ConnectionId::new(),
            &UpdateMessage::Error {
                message: "nope".to_owned(),
            },
        );
    }

    #[test]
    fn detach_closes_the_tunnel() {
        let mut broadcaster = Broadcaster::new();
        let connection = ConnectionId::new();
        let tunnel = MockTunnel::default();
        broadcaster.attach(connection, tunnel.clone());

        broadcaster.detach(connection);

        assert!(*tunnel.closed.lock().unwrap());
        assert!(broadcaster.is_empty());
    }

    #[test]
    fn attach_replaces_and_closes_previous_tunnel() {
        let mut broadcaster = Broadcaster::new();
        let connection = ConnectionId::new();
        let first = MockTunnel::default();
        broadcaster.attach(connection, first.clone());
        broadcaster.attach(connection, MockTunnel::default());

        assert!(*first.closed.lock().unwrap());
        assert_eq!(broadcaster.len(), 1);
    }

    #[test]
    fn connection_id_round_trips_through_string() {
        let id = ConnectionId::new();
        let parsed: ConnectionId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }
}
