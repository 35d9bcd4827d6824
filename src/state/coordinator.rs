//! Session coordinator.
//!
//! Maps each inbound [`ClientEvent`] to operations on the room and bracket
//! state, then decides who hears about the result. Every event runs to
//! completion against `&mut self`; hosts that dispatch from several threads
//! wrap the coordinator in a single mutex or drive it from one task.
//!
//! Failures are typed internally ([`SessionError`]) but, on the wire, almost
//! all of them are silent: the event is dropped with no state change and no
//! reply. The only exception is joining a room that does not exist, which
//! answers the sender with an `errorMsg`.

use tracing::{debug, info};

use super::bracket::BracketError;
use super::connection::{ConnectionId, ConnectionRegistry};
use super::event::{ClientEvent, Effect, JoinRoom, MatchChoice, ServerEvent, StartGame, Transport};
use super::room::{RandomRoomCodes, Room, RoomCodeGenerator, RoomError, RoomRegistry};
use crate::config::CoordinatorConfig;

/// Coordinator errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// The connection is not in any room
    #[error("Not in a room")]
    NotInRoom,

    #[error(transparent)]
    Room(#[from] RoomError),

    #[error(transparent)]
    Bracket(#[from] BracketError),
}

impl SessionError {
    pub fn is_room_not_found(&self) -> bool {
        matches!(self, Self::Room(RoomError::NotFound(_)))
    }
}

/// Owns all rooms and connection sessions for one process.
#[derive(Debug)]
pub struct Coordinator {
    config: CoordinatorConfig,
    rooms: RoomRegistry,
    connections: ConnectionRegistry,
}

impl Coordinator {
    /// Create a coordinator that draws random room codes.
    pub fn new(config: CoordinatorConfig) -> Self {
        let codes = RandomRoomCodes::new(config.room_code_digits);
        Self::with_code_generator(config, codes)
    }

    pub fn with_code_generator(
        config: CoordinatorConfig,
        codes: impl RoomCodeGenerator + Send + 'static,
    ) -> Self {
        Self {
            config,
            rooms: RoomRegistry::new(codes),
            connections: ConnectionRegistry::new(),
        }
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    pub fn rooms(&self) -> &RoomRegistry {
        &self.rooms
    }

    pub fn connections(&self) -> &ConnectionRegistry {
        &self.connections
    }

    /// Room the connection is currently in.
    pub fn room_of(&self, origin: ConnectionId) -> Option<&Room> {
        self.connections
            .room_of(origin)
            .and_then(|code| self.rooms.get(code))
    }

    /// Handle an event and return the effects to carry out.
    ///
    /// Rejected events produce no effects, except a join to a missing room,
    /// which replies with an error message.
    pub fn handle(&mut self, origin: ConnectionId, event: ClientEvent) -> Vec<Effect> {
        let name = event.name();
        let is_join = matches!(event, ClientEvent::JoinRoom(_));

        match self.try_handle(origin, event) {
            Ok(effects) => effects,
            Err(err) if is_join && err.is_room_not_found() => {
                debug!(connection = %origin, "join for unknown room");
                vec![Effect::Reply(ServerEvent::ErrorMsg(err.to_string()))]
            }
            Err(err) => {
                debug!(connection = %origin, event = name, error = %err, "event discarded");
                Vec::new()
            }
        }
    }

    /// Handle an event and apply its effects to a transport.
    pub fn dispatch<T: Transport + ?Sized>(
        &mut self,
        origin: ConnectionId,
        event: ClientEvent,
        transport: &mut T,
    ) {
        for effect in self.handle(origin, event) {
            effect.apply(origin, transport);
        }
    }

    /// Handle an event, surfacing why it was rejected.
    pub fn try_handle(
        &mut self,
        origin: ConnectionId,
        event: ClientEvent,
    ) -> Result<Vec<Effect>, SessionError> {
        if !matches!(event, ClientEvent::Disconnect) {
            self.connections.connect(origin);
        }

        match event {
            ClientEvent::CreateRoom(name) => self.create_room(origin, &name),
            ClientEvent::CheckRoom(code) => Ok(vec![Effect::Reply(ServerEvent::RoomChecked(
                self.rooms.contains(&code),
            ))]),
            ClientEvent::JoinRoom(join) => self.join_room(origin, join),
            ClientEvent::UpdateName { name } => self.rename(origin, &name),
            ClientEvent::StartGame(start) => self.start_game(origin, start),
            ClientEvent::Vote(choice) => self.vote(origin, choice),
            ClientEvent::InstantWin(choice) => self.instant_win(origin, choice),
            ClientEvent::ResetGame => self.reset_game(origin),
            ClientEvent::Disconnect => Ok(self.disconnect(origin)),
        }
    }

    fn create_room(&mut self, origin: ConnectionId, name: &str) -> Result<Vec<Effect>, SessionError> {
        let name = self.config.normalize_name(name);

        // Only a create that can succeed takes the sender out of their room
        let code = self.rooms.free_code()?;
        let mut effects = self.leave_current_room(origin);

        self.rooms.create_room_with_code(code.clone(), origin, name.clone());
        self.connections.enter_room(origin, code.clone());

        effects.push(Effect::JoinGroup {
            connection: origin,
            room: code.clone(),
        });
        effects.push(Effect::Reply(ServerEvent::RoomCreated {
            code,
            is_admin: true,
            name,
        }));
        Ok(effects)
    }

    fn join_room(&mut self, origin: ConnectionId, join: JoinRoom) -> Result<Vec<Effect>, SessionError> {
        let JoinRoom { code, name } = join;
        let name = self.config.normalize_name(&name);

        if !self.rooms.contains(&code) {
            return Err(RoomError::NotFound(code).into());
        }

        // Rejoining the current room only renames
        let mut effects = if self.connections.room_of(origin) == Some(code.as_str()) {
            Vec::new()
        } else {
            self.leave_current_room(origin)
        };

        self.rooms.join(&code, origin, name)?;
        self.connections.enter_room(origin, code.clone());
        let room = self.rooms.get(&code).ok_or_else(|| RoomError::NotFound(code.clone()))?;
        info!(code = %code, connection = %origin, "participant joined");

        effects.push(Effect::JoinGroup {
            connection: origin,
            room: code.clone(),
        });
        effects.push(Effect::Reply(ServerEvent::JoinedSuccess {
            code: code.clone(),
            is_admin: room.is_admin(origin),
            game_state: room.bracket().to_json(),
        }));
        effects.push(Effect::Broadcast {
            room: code,
            event: ServerEvent::UpdateLobby(room.participants_json()),
        });
        Ok(effects)
    }

    fn rename(&mut self, origin: ConnectionId, name: &str) -> Result<Vec<Effect>, SessionError> {
        let name = self.config.normalize_name(name);
        let room = self.current_room_mut(origin)?;
        if !room.rename(origin, name) {
            return Err(RoomError::NotMember.into());
        }

        Ok(vec![Effect::Broadcast {
            room: room.code.clone(),
            event: ServerEvent::UpdateLobby(room.participants_json()),
        }])
    }

    fn start_game(&mut self, origin: ConnectionId, start: StartGame) -> Result<Vec<Effect>, SessionError> {
        let room = self.admin_room_mut(origin)?;
        room.start_bracket(start.participants, start.matches, start.admin_participates)?;
        info!(code = %room.code, "game started");

        Ok(vec![Effect::Broadcast {
            room: room.code.clone(),
            event: ServerEvent::GameStarted(room.bracket().to_json()),
        }])
    }

    fn vote(&mut self, origin: ConnectionId, choice: MatchChoice) -> Result<Vec<Effect>, SessionError> {
        let room = self.current_room_mut(origin)?;
        let outcome = room.vote(origin, choice.match_id, choice.player_num)?;
        debug!(code = %room.code, connection = %origin, ?outcome, "vote accepted");

        Ok(vec![Effect::Broadcast {
            room: room.code.clone(),
            event: ServerEvent::UpdateState(room.bracket().to_json()),
        }])
    }

    fn instant_win(&mut self, origin: ConnectionId, choice: MatchChoice) -> Result<Vec<Effect>, SessionError> {
        let room = self.admin_room_mut(origin)?;
        room.force_win(choice.match_id, choice.player_num)?;

        Ok(vec![Effect::Broadcast {
            room: room.code.clone(),
            event: ServerEvent::UpdateState(room.bracket().to_json()),
        }])
    }

    fn reset_game(&mut self, origin: ConnectionId) -> Result<Vec<Effect>, SessionError> {
        let room = self.admin_room_mut(origin)?;
        room.reset_bracket();
        info!(code = %room.code, "game reset");

        Ok(vec![Effect::Broadcast {
            room: room.code.clone(),
            event: ServerEvent::ReturnToLobby(room.participants_json()),
        }])
    }

    /// Drop the connection and everything it held. Safe to repeat.
    fn disconnect(&mut self, origin: ConnectionId) -> Vec<Effect> {
        let effects = self.leave_current_room(origin);
        self.connections.disconnect(origin);
        effects
    }

    /// Take the connection out of its current room, if any.
    ///
    /// Deletes the room when it empties; otherwise tells the remaining
    /// members and any newly promoted admin.
    fn leave_current_room(&mut self, origin: ConnectionId) -> Vec<Effect> {
        let Some(code) = self.connections.leave_room(origin) else {
            return Vec::new();
        };
        let mut effects = vec![Effect::LeaveGroup {
            connection: origin,
            room: code.clone(),
        }];

        let Some(room) = self.rooms.get_mut(&code) else {
            return effects;
        };
        let Some(departure) = room.leave(origin) else {
            return effects;
        };
        info!(code = %code, connection = %origin, "participant left");

        if room.is_empty() {
            self.rooms.delete_if_empty(&code);
            return effects;
        }

        let lobby = room.participants_json();
        effects.push(Effect::Broadcast {
            room: code,
            event: ServerEvent::UpdateLobby(lobby),
        });
        if let Some(new_admin) = departure.promoted {
            effects.push(Effect::Direct {
                to: new_admin,
                event: ServerEvent::YouAreAdmin,
            });
        }
        effects
    }

    fn current_room_mut(&mut self, origin: ConnectionId) -> Result<&mut Room, SessionError> {
        let code = self
            .connections
            .room_of(origin)
            .ok_or(SessionError::NotInRoom)?;
        self.rooms
            .get_mut(code)
            .ok_or_else(|| RoomError::NotFound(code.to_string()).into())
    }

    fn admin_room_mut(&mut self, origin: ConnectionId) -> Result<&mut Room, SessionError> {
        let room = self.current_room_mut(origin)?;
        if !room.is_admin(origin) {
            return Err(RoomError::NotAdmin.into());
        }
        Ok(room)
    }
}
