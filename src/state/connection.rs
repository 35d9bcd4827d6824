//! Connection state management.
//!
//! Tracks the session-scoped data the transport lets us attach to each
//! connection: which room (if any) the connection currently belongs to.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Transport-assigned connection identifier, stable for the connection's
/// lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Session data for a single connection.
#[derive(Debug, Clone)]
pub struct ConnectionSession {
    pub connection_id: ConnectionId,

    /// Code of the room this connection is in
    room_code: Option<String>,
}

impl ConnectionSession {
    pub fn new(connection_id: ConnectionId) -> Self {
        Self {
            connection_id,
            room_code: None,
        }
    }

    pub fn room_code(&self) -> Option<&str> {
        self.room_code.as_deref()
    }

    pub fn is_in_room(&self) -> bool {
        self.room_code.is_some()
    }
}

/// Connection registry - session data for every live connection.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    sessions: HashMap<ConnectionId, ConnectionSession>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the session for a connection, creating it on first sight.
    pub fn connect(&mut self, connection_id: ConnectionId) -> &mut ConnectionSession {
        self.sessions
            .entry(connection_id)
            .or_insert_with(|| ConnectionSession::new(connection_id))
    }

    pub fn get(&self, connection_id: ConnectionId) -> Option<&ConnectionSession> {
        self.sessions.get(&connection_id)
    }

    /// Room code the connection is currently in.
    pub fn room_of(&self, connection_id: ConnectionId) -> Option<&str> {
        self.sessions
            .get(&connection_id)
            .and_then(|s| s.room_code())
    }

    /// Associate a connection with a room.
    pub fn enter_room(&mut self, connection_id: ConnectionId, code: String) {
        self.connect(connection_id).room_code = Some(code);
    }

    /// Drop a connection's room association, returning the old code.
    pub fn leave_room(&mut self, connection_id: ConnectionId) -> Option<String> {
        self.sessions
            .get_mut(&connection_id)
            .and_then(|s| s.room_code.take())
    }

    /// Forget a connection entirely. Unknown connections are ignored.
    pub fn disconnect(&mut self, connection_id: ConnectionId) -> Option<ConnectionSession> {
        self.sessions.remove(&connection_id)
    }

    pub fn count(&self) -> usize {
        self.sessions.len()
    }
}
