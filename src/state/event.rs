//! Wire events and transport effects.
//!
//! Inbound and outbound events are closed enums encoded as
//! `{"event": "<name>", "data": <payload>}`. The coordinator never touches a
//! socket; it returns [`Effect`]s that a [`Transport`] carries out.

use serde::{Deserialize, Serialize};

use super::bracket::{MatchDefinition, MatchId, Slot};
use super::connection::ConnectionId;

/// Payload of `joinRoom`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct JoinRoom {
    pub code: String,
    pub name: String,
}

/// Payload of `startGame`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartGame {
    /// Entrant names, shown alongside the bracket
    #[serde(default)]
    pub participants: Vec<String>,

    pub matches: Vec<MatchDefinition>,

    /// Whether the admin votes and counts toward the threshold
    #[serde(default)]
    pub admin_participates: bool,
}

/// Payload of `vote` and `instantWin`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchChoice {
    pub match_id: MatchId,
    pub player_num: Slot,
}

/// Events arriving from a connection.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ClientEvent {
    /// Create a room; payload is the creator's display name
    CreateRoom(String),
    /// Ask whether a room code exists
    CheckRoom(String),
    JoinRoom(JoinRoom),
    UpdateName { name: String },
    StartGame(StartGame),
    Vote(MatchChoice),
    /// Admin override for a match
    InstantWin(MatchChoice),
    ResetGame,
    /// Connection closed (raised by the transport, not the client)
    Disconnect,
}

impl ClientEvent {
    /// Decode an event envelope.
    pub fn from_json(text: &str) -> Result<Self, EventParseError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::CreateRoom(_) => "createRoom",
            Self::CheckRoom(_) => "checkRoom",
            Self::JoinRoom(_) => "joinRoom",
            Self::UpdateName { .. } => "updateName",
            Self::StartGame(_) => "startGame",
            Self::Vote(_) => "vote",
            Self::InstantWin(_) => "instantWin",
            Self::ResetGame => "resetGame",
            Self::Disconnect => "disconnect",
        }
    }
}

/// A malformed inbound event.
#[derive(Debug, thiserror::Error)]
#[error("malformed event: {0}")]
pub struct EventParseError(#[from] serde_json::Error);

/// Events sent to connections.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ServerEvent {
    #[serde(rename_all = "camelCase")]
    RoomCreated {
        code: String,
        is_admin: bool,
        name: String,
    },
    /// Reply to `checkRoom`
    RoomChecked(bool),
    #[serde(rename_all = "camelCase")]
    JoinedSuccess {
        code: String,
        is_admin: bool,
        game_state: serde_json::Value,
    },
    /// Ordered participant list
    UpdateLobby(serde_json::Value),
    GameStarted(serde_json::Value),
    UpdateState(serde_json::Value),
    /// Participant list after a reset
    ReturnToLobby(serde_json::Value),
    YouAreAdmin,
    ErrorMsg(String),
}

impl ServerEvent {
    pub fn to_json(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::to_value(self)
    }
}

/// Something the transport must do on the coordinator's behalf.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Send to the connection that raised the event
    Reply(ServerEvent),
    /// Send to one other connection
    Direct {
        to: ConnectionId,
        event: ServerEvent,
    },
    /// Send to every connection in a room's group
    Broadcast { room: String, event: ServerEvent },
    /// Subscribe a connection to a room's broadcasts
    JoinGroup {
        connection: ConnectionId,
        room: String,
    },
    /// Unsubscribe a connection from a room's broadcasts
    LeaveGroup {
        connection: ConnectionId,
        room: String,
    },
}

impl Effect {
    /// Carry out this effect. `origin` is the connection that raised the
    /// event being answered.
    pub fn apply<T: Transport + ?Sized>(&self, origin: ConnectionId, transport: &mut T) {
        match self {
            Self::Reply(event) => transport.send(origin, event),
            Self::Direct { to, event } => transport.send(*to, event),
            Self::Broadcast { room, event } => transport.broadcast(room, event),
            Self::JoinGroup { connection, room } => transport.join_group(*connection, room),
            Self::LeaveGroup { connection, room } => transport.leave_group(*connection, room),
        }
    }
}

/// Real-time transport: point-to-point sends plus room-scoped groups.
pub trait Transport {
    fn send(&mut self, to: ConnectionId, event: &ServerEvent);
    fn broadcast(&mut self, room: &str, event: &ServerEvent);
    fn join_group(&mut self, connection: ConnectionId, room: &str);
    fn leave_group(&mut self, connection: ConnectionId, room: &str);
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_decode_simple_events() {
        assert_eq!(
            ClientEvent::from_json(r#"{"event":"createRoom","data":"Ann"}"#).unwrap(),
            ClientEvent::CreateRoom("Ann".to_string())
        );
        assert_eq!(
            ClientEvent::from_json(r#"{"event":"joinRoom","data":{"code":"1234","name":"Ben"}}"#)
                .unwrap(),
            ClientEvent::JoinRoom(JoinRoom {
                code: "1234".to_string(),
                name: "Ben".to_string(),
            })
        );
        assert_eq!(
            ClientEvent::from_json(r#"{"event":"resetGame"}"#).unwrap(),
            ClientEvent::ResetGame
        );
    }

    #[test]
    fn test_decode_vote() {
        let event =
            ClientEvent::from_json(r#"{"event":"vote","data":{"matchId":3,"playerNum":2}}"#)
                .unwrap();
        assert_eq!(
            event,
            ClientEvent::Vote(MatchChoice {
                match_id: MatchId(3),
                player_num: Slot::Two,
            })
        );
        assert_eq!(event.name(), "vote");
    }

    #[test]
    fn test_decode_rejects_bad_slot() {
        let result =
            ClientEvent::from_json(r#"{"event":"instantWin","data":{"matchId":3,"playerNum":5}}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_decode_rejects_unknown_event() {
        assert!(ClientEvent::from_json(r#"{"event":"launchRockets","data":null}"#).is_err());
    }

    #[test]
    fn test_decode_start_game() {
        let text = r#"{
            "event": "startGame",
            "data": {
                "participants": ["Ada", "Bo"],
                "matches": [{"id": 1, "competitor1": "Ada", "competitor2": "Bo"}],
                "adminParticipates": true
            }
        }"#;
        let ClientEvent::StartGame(start) = ClientEvent::from_json(text).unwrap() else {
            panic!("expected startGame");
        };
        assert_eq!(start.participants, vec!["Ada", "Bo"]);
        assert_eq!(start.matches, vec![MatchDefinition::new(1).with_competitors("Ada", "Bo")]);
        assert!(start.admin_participates);
    }

    #[test]
    fn test_encode_server_events() {
        let created = ServerEvent::RoomCreated {
            code: "1234".to_string(),
            is_admin: true,
            name: "Ann".to_string(),
        };
        assert_eq!(
            created.to_json().unwrap(),
            serde_json::json!({
                "event": "roomCreated",
                "data": {"code": "1234", "isAdmin": true, "name": "Ann"}
            })
        );

        assert_eq!(
            ServerEvent::RoomChecked(false).to_json().unwrap(),
            serde_json::json!({"event": "roomChecked", "data": false})
        );
        assert_eq!(
            ServerEvent::YouAreAdmin.to_json().unwrap(),
            serde_json::json!({"event": "youAreAdmin"})
        );
    }

    #[derive(Default)]
    struct Log(Vec<String>);

    impl Transport for Log {
        fn send(&mut self, to: ConnectionId, _event: &ServerEvent) {
            self.0.push(format!("send {}", to));
        }
        fn broadcast(&mut self, room: &str, _event: &ServerEvent) {
            self.0.push(format!("broadcast {}", room));
        }
        fn join_group(&mut self, connection: ConnectionId, room: &str) {
            self.0.push(format!("join {} {}", connection, room));
        }
        fn leave_group(&mut self, connection: ConnectionId, room: &str) {
            self.0.push(format!("leave {} {}", connection, room));
        }
    }

    #[test]
    fn test_apply_routes_effects() {
        let mut log = Log::default();
        let origin = ConnectionId(1);

        Effect::Reply(ServerEvent::YouAreAdmin).apply(origin, &mut log);
        Effect::Direct {
            to: ConnectionId(2),
            event: ServerEvent::YouAreAdmin,
        }
        .apply(origin, &mut log);
        Effect::Broadcast {
            room: "1234".to_string(),
            event: ServerEvent::YouAreAdmin,
        }
        .apply(origin, &mut log);
        Effect::JoinGroup {
            connection: origin,
            room: "1234".to_string(),
        }
        .apply(origin, &mut log);

        assert_eq!(
            log.0,
            vec!["send conn-1", "send conn-2", "broadcast 1234", "join conn-1 1234"]
        );
    }
}
