//! Room state management.
//!
//! A room is an isolated session keyed by a short numeric code. It holds an
//! ordered participant list (join order) and one bracket. Exactly one
//! participant is admin while the room is non-empty; when the admin leaves,
//! the earliest-joined remaining participant takes over.

use std::collections::HashMap;
use std::fmt;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::info;

use super::bracket::{Bracket, BracketError, MatchDefinition, MatchId, Slot, VoteOutcome};
use super::connection::ConnectionId;

/// How many codes the registry draws before giving up on a free one.
pub const MAX_CODE_ATTEMPTS: usize = 64;

/// A participant's state within a room.
#[derive(Debug, Clone)]
pub struct Participant {
    pub connection_id: ConnectionId,

    /// Display name, not unique within a room
    pub name: String,

    pub is_admin: bool,
}

impl Participant {
    pub fn new(connection_id: ConnectionId, name: String) -> Self {
        Self {
            connection_id,
            name,
            is_admin: false,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "id": self.connection_id,
            "name": self.name,
            "isAdmin": self.is_admin
        })
    }
}

/// What happened when a participant left.
#[derive(Debug, Clone)]
pub struct Departure {
    pub participant: Participant,

    /// Connection promoted to admin, if the admin left a non-empty room
    pub promoted: Option<ConnectionId>,
}

/// Room state.
#[derive(Debug, Clone)]
pub struct Room {
    /// Shareable room code
    pub code: String,

    /// Current admin connection
    admin_id: ConnectionId,

    /// Participants in join order
    participants: Vec<Participant>,

    bracket: Bracket,

    /// When room was created
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl Room {
    /// Create a room whose first participant is its admin.
    pub fn new(code: String, admin_id: ConnectionId, admin_name: String) -> Self {
        let mut admin = Participant::new(admin_id, admin_name);
        admin.is_admin = true;
        Self {
            code,
            admin_id,
            participants: vec![admin],
            bracket: Bracket::new(),
            created_at: chrono::Utc::now(),
        }
    }

    /// Add a non-admin participant.
    ///
    /// A connection that is already here keeps its place and is renamed.
    pub fn join(&mut self, connection_id: ConnectionId, name: String) -> &Participant {
        if let Some(pos) = self.position(connection_id) {
            self.participants[pos].name = name;
            return &self.participants[pos];
        }
        self.participants.push(Participant::new(connection_id, name));
        &self.participants[self.participants.len() - 1]
    }

    /// Rename a participant. Returns false if the connection is not here.
    pub fn rename(&mut self, connection_id: ConnectionId, name: String) -> bool {
        match self.get_participant_mut(connection_id) {
            Some(p) => {
                p.name = name;
                true
            }
            None => false,
        }
    }

    /// Remove a participant, promoting a new admin if needed.
    ///
    /// When this returns, either the room is empty (the caller must delete
    /// it) or exactly one admin remains.
    pub fn leave(&mut self, connection_id: ConnectionId) -> Option<Departure> {
        let pos = self.position(connection_id)?;
        let participant = self.participants.remove(pos);

        let mut promoted = None;
        if participant.is_admin {
            if let Some(next) = self.participants.first_mut() {
                next.is_admin = true;
                self.admin_id = next.connection_id;
                promoted = Some(next.connection_id);
                info!(code = %self.code, admin = %next.connection_id, "admin transferred");
            }
        }

        Some(Departure {
            participant,
            promoted,
        })
    }

    fn position(&self, connection_id: ConnectionId) -> Option<usize> {
        self.participants
            .iter()
            .position(|p| p.connection_id == connection_id)
    }

    pub fn get_participant(&self, connection_id: ConnectionId) -> Option<&Participant> {
        self.participants
            .iter()
            .find(|p| p.connection_id == connection_id)
    }

    fn get_participant_mut(&mut self, connection_id: ConnectionId) -> Option<&mut Participant> {
        self.participants
            .iter_mut()
            .find(|p| p.connection_id == connection_id)
    }

    pub fn has_participant(&self, connection_id: ConnectionId) -> bool {
        self.position(connection_id).is_some()
    }

    /// Participants in join order.
    pub fn participants(&self) -> &[Participant] {
        &self.participants
    }

    pub fn participant_count(&self) -> usize {
        self.participants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }

    pub fn admin_id(&self) -> ConnectionId {
        self.admin_id
    }

    pub fn is_admin(&self, connection_id: ConnectionId) -> bool {
        !self.is_empty() && self.admin_id == connection_id
    }

    pub fn bracket(&self) -> &Bracket {
        &self.bracket
    }

    /// Start the bracket with the current membership as the electorate.
    pub fn start_bracket(
        &mut self,
        entrants: Vec<String>,
        definitions: Vec<MatchDefinition>,
        admin_participates: bool,
    ) -> Result<(), BracketError> {
        let count = self.participants.len();
        self.bracket
            .start(count, entrants, definitions, admin_participates)
    }

    pub fn vote(
        &mut self,
        voter: ConnectionId,
        match_id: MatchId,
        slot: Slot,
    ) -> Result<VoteOutcome, BracketError> {
        let admin_id = self.admin_id;
        self.bracket.vote(voter, admin_id, match_id, slot)
    }

    pub fn force_win(
        &mut self,
        match_id: MatchId,
        winner: Slot,
    ) -> Result<Option<MatchId>, BracketError> {
        self.bracket.force_win(match_id, winner)
    }

    /// Return to the lobby. Participants and admin are untouched.
    pub fn reset_bracket(&mut self) {
        self.bracket.reset();
    }

    /// Ordered participant list for clients.
    pub fn participants_json(&self) -> serde_json::Value {
        let participants: Vec<serde_json::Value> =
            self.participants.iter().map(|p| p.to_json()).collect();
        serde_json::Value::Array(participants)
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "code": self.code,
            "adminId": self.admin_id,
            "participants": self.participants_json(),
            "gameState": self.bracket.to_json(),
            "createdAt": self.created_at
        })
    }
}

/// Room errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RoomError {
    #[error("Room not found")]
    NotFound(String),
    #[error("Not a member of this room")]
    NotMember,
    #[error("Not the room admin")]
    NotAdmin,
    #[error("No free room code after {0} attempts")]
    CodesExhausted(usize),
}

/// Source of room codes.
///
/// Codes are opaque keys; generators need not avoid collisions themselves.
pub trait RoomCodeGenerator: fmt::Debug {
    fn generate(&mut self) -> String;
}

/// Random fixed-width numeric codes, e.g. `1000`-`9999` for four digits.
#[derive(Debug)]
pub struct RandomRoomCodes {
    digits: usize,
    rng: StdRng,
}

impl RandomRoomCodes {
    pub fn new(digits: usize) -> Self {
        Self {
            digits: digits.max(1),
            rng: StdRng::from_entropy(),
        }
    }

    /// Reproducible codes for tests and replays.
    pub fn seeded(digits: usize, seed: u64) -> Self {
        Self {
            digits: digits.max(1),
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl RoomCodeGenerator for RandomRoomCodes {
    fn generate(&mut self) -> String {
        let mut code = String::with_capacity(self.digits);
        code.push(char::from(b'0' + self.rng.gen_range(1..=9u8)));
        for _ in 1..self.digits {
            code.push(char::from(b'0' + self.rng.gen_range(0..=9u8)));
        }
        code
    }
}

/// Consecutive codes starting from a fixed number.
#[derive(Debug, Clone)]
pub struct SequentialRoomCodes {
    next: u64,
}

impl SequentialRoomCodes {
    pub fn starting_at(first: u64) -> Self {
        Self { next: first }
    }
}

impl RoomCodeGenerator for SequentialRoomCodes {
    fn generate(&mut self) -> String {
        let code = self.next.to_string();
        self.next += 1;
        code
    }
}

/// Room registry - owns every live room, keyed by code.
#[derive(Debug)]
pub struct RoomRegistry {
    rooms: HashMap<String, Room>,
    codes: Box<dyn RoomCodeGenerator + Send>,
}

impl RoomRegistry {
    pub fn new(codes: impl RoomCodeGenerator + Send + 'static) -> Self {
        Self {
            rooms: HashMap::new(),
            codes: Box::new(codes),
        }
    }

    /// Create a room with `admin_id` as its admin and only participant.
    pub fn create_room(
        &mut self,
        admin_id: ConnectionId,
        admin_name: String,
    ) -> Result<&Room, RoomError> {
        let code = self.free_code()?;
        Ok(self.create_room_with_code(code, admin_id, admin_name))
    }

    /// Create a room under a code from [`free_code`](Self::free_code).
    ///
    /// Removing rooms never takes a code back out of the free set, so a code
    /// drawn before other rooms were deleted is still safe to use.
    pub fn create_room_with_code(
        &mut self,
        code: String,
        admin_id: ConnectionId,
        admin_name: String,
    ) -> &Room {
        info!(code = %code, admin = %admin_id, "room created");

        let room = Room::new(code.clone(), admin_id, admin_name);
        self.rooms.entry(code).or_insert(room)
    }

    /// Draw codes until one is not in use, so a collision never clobbers a
    /// live room.
    pub fn free_code(&mut self) -> Result<String, RoomError> {
        for _ in 0..MAX_CODE_ATTEMPTS {
            let code = self.codes.generate();
            if !self.rooms.contains_key(&code) {
                return Ok(code);
            }
        }
        Err(RoomError::CodesExhausted(MAX_CODE_ATTEMPTS))
    }

    pub fn get(&self, code: &str) -> Option<&Room> {
        self.rooms.get(code)
    }

    pub fn get_mut(&mut self, code: &str) -> Option<&mut Room> {
        self.rooms.get_mut(code)
    }

    pub fn contains(&self, code: &str) -> bool {
        self.rooms.contains_key(code)
    }

    /// Add a participant to an existing room.
    pub fn join(
        &mut self,
        code: &str,
        connection_id: ConnectionId,
        name: String,
    ) -> Result<&Participant, RoomError> {
        let room = self
            .rooms
            .get_mut(code)
            .ok_or_else(|| RoomError::NotFound(code.to_string()))?;
        Ok(room.join(connection_id, name))
    }

    /// Remove the room if nobody is left in it. Returns true if removed.
    pub fn delete_if_empty(&mut self, code: &str) -> bool {
        match self.rooms.get(code) {
            Some(room) if room.is_empty() => {
                self.rooms.remove(code);
                info!(code = %code, "room deleted");
                true
            }
            _ => false,
        }
    }

    pub fn count(&self) -> usize {
        self.rooms.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn three_person_room() -> Room {
        let mut room = Room::new("1000".to_string(), ConnectionId(1), "Ann".to_string());
        room.join(ConnectionId(2), "Ben".to_string());
        room.join(ConnectionId(3), "Cat".to_string());
        room
    }

    fn admin_count(room: &Room) -> usize {
        room.participants().iter().filter(|p| p.is_admin).count()
    }

    #[test]
    fn test_room_new() {
        let room = Room::new("1000".to_string(), ConnectionId(1), "Ann".to_string());
        assert_eq!(room.participant_count(), 1);
        assert!(room.is_admin(ConnectionId(1)));
        assert_eq!(admin_count(&room), 1);
        assert!(!room.bracket().is_running());
    }

    #[test]
    fn test_join_appends_non_admin() {
        let room = three_person_room();
        let names: Vec<&str> = room.participants().iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["Ann", "Ben", "Cat"]);
        assert!(!room.get_participant(ConnectionId(2)).unwrap().is_admin);
        assert_eq!(admin_count(&room), 1);
    }

    #[test]
    fn test_duplicate_names_allowed() {
        let mut room = three_person_room();
        room.join(ConnectionId(4), "Ben".to_string());
        assert_eq!(room.participant_count(), 4);
    }

    #[test]
    fn test_rejoin_keeps_place() {
        let mut room = three_person_room();
        room.join(ConnectionId(2), "Benny".to_string());

        assert_eq!(room.participant_count(), 3);
        assert_eq!(room.participants()[1].name, "Benny");
    }

    #[test]
    fn test_rename() {
        let mut room = three_person_room();
        assert!(room.rename(ConnectionId(3), "Kit".to_string()));
        assert_eq!(room.get_participant(ConnectionId(3)).unwrap().name, "Kit");

        assert!(!room.rename(ConnectionId(99), "Ghost".to_string()));
        assert_eq!(room.participant_count(), 3);
    }

    #[test]
    fn test_admin_leave_promotes_earliest() {
        let mut room = three_person_room();

        let departure = room.leave(ConnectionId(1)).unwrap();
        assert_eq!(departure.participant.name, "Ann");
        assert_eq!(departure.promoted, Some(ConnectionId(2)));

        assert!(room.is_admin(ConnectionId(2)));
        assert_eq!(room.admin_id(), ConnectionId(2));
        assert_eq!(admin_count(&room), 1);
    }

    #[test]
    fn test_non_admin_leave() {
        let mut room = three_person_room();

        let departure = room.leave(ConnectionId(2)).unwrap();
        assert_eq!(departure.promoted, None);
        assert!(room.is_admin(ConnectionId(1)));

        // Leaving twice is a no-op
        assert!(room.leave(ConnectionId(2)).is_none());
    }

    #[test]
    fn test_last_leave_empties_room() {
        let mut room = Room::new("1000".to_string(), ConnectionId(1), "Ann".to_string());
        let departure = room.leave(ConnectionId(1)).unwrap();

        assert_eq!(departure.promoted, None);
        assert!(room.is_empty());
        assert!(!room.is_admin(ConnectionId(1)));
    }

    #[test]
    fn test_one_admin_through_churn() {
        let mut room = three_person_room();
        room.join(ConnectionId(4), "Dee".to_string());

        for leaving in [1, 3, 2] {
            room.leave(ConnectionId(leaving));
            assert_eq!(admin_count(&room), 1);
            assert!(room.is_admin(room.admin_id()));
        }
        assert_eq!(room.admin_id(), ConnectionId(4));
    }

    #[test]
    fn test_vote_uses_current_admin() {
        let mut room = three_person_room();
        room.start_bracket(vec![], vec![MatchDefinition::new(1).with_competitors("X", "Y")], false)
            .unwrap();
        assert_eq!(room.bracket().voters_required(), 2);

        room.leave(ConnectionId(1));

        // Ben is admin now and cannot vote; Cat can
        assert!(room.vote(ConnectionId(2), MatchId(1), Slot::One).is_err());
        assert!(room.vote(ConnectionId(3), MatchId(1), Slot::One).is_ok());
    }

    #[test]
    fn test_reset_keeps_members() {
        let mut room = three_person_room();
        room.start_bracket(vec![], vec![MatchDefinition::new(1)], true)
            .unwrap();

        room.reset_bracket();

        assert!(!room.bracket().is_running());
        assert_eq!(room.bracket().match_count(), 0);
        assert_eq!(room.participant_count(), 3);
        assert!(room.is_admin(ConnectionId(1)));
    }

    #[test]
    fn test_participants_json() {
        let mut room = Room::new("1000".to_string(), ConnectionId(1), "Ann".to_string());
        room.join(ConnectionId(2), "Ben".to_string());

        assert_eq!(
            room.participants_json(),
            serde_json::json!([
                {"id": 1, "name": "Ann", "isAdmin": true},
                {"id": 2, "name": "Ben", "isAdmin": false}
            ])
        );
    }

    #[test]
    fn test_room_json() {
        let room = Room::new("1000".to_string(), ConnectionId(1), "Ann".to_string());
        let json = room.to_json();

        assert_eq!(json["code"], "1000");
        assert_eq!(json["adminId"], 1);
        assert_eq!(json["participants"], room.participants_json());
        assert_eq!(json["gameState"]["isRunning"], false);
        assert_eq!(json["createdAt"], serde_json::json!(room.created_at));
    }

    #[test]
    fn test_random_codes() {
        let mut codes = RandomRoomCodes::seeded(4, 7);
        for _ in 0..100 {
            let code = codes.generate();
            assert_eq!(code.len(), 4);
            let n: u32 = code.parse().unwrap();
            assert!((1000..=9999).contains(&n));
        }
    }

    #[test]
    fn test_registry_create_and_delete() {
        let mut registry = RoomRegistry::new(SequentialRoomCodes::starting_at(1000));

        let code = registry
            .create_room(ConnectionId(1), "Ann".to_string())
            .unwrap()
            .code
            .clone();
        assert_eq!(code, "1000");
        assert!(registry.contains("1000"));

        // Not empty, stays
        assert!(!registry.delete_if_empty("1000"));

        registry.get_mut("1000").unwrap().leave(ConnectionId(1));
        assert!(registry.delete_if_empty("1000"));
        assert!(registry.get("1000").is_none());
        assert!(!registry.delete_if_empty("1000"));
    }

    #[test]
    fn test_registry_join_missing_room() {
        let mut registry = RoomRegistry::new(SequentialRoomCodes::starting_at(1000));
        let result = registry.join("4242", ConnectionId(2), "Ben".to_string());
        assert_eq!(result.err(), Some(RoomError::NotFound("4242".to_string())));
    }

    #[derive(Debug)]
    struct StuckCodes;

    impl RoomCodeGenerator for StuckCodes {
        fn generate(&mut self) -> String {
            "7777".to_string()
        }
    }

    #[test]
    fn test_registry_skips_used_codes() {
        let mut registry = RoomRegistry::new(StuckCodes);
        registry
            .create_room(ConnectionId(1), "Ann".to_string())
            .unwrap();

        let result = registry.create_room(ConnectionId(2), "Ben".to_string());
        assert_eq!(
            result.err(),
            Some(RoomError::CodesExhausted(MAX_CODE_ATTEMPTS))
        );

        // The first room is untouched
        assert!(registry.get("7777").unwrap().is_admin(ConnectionId(1)));
        assert_eq!(registry.count(), 1);
    }
}
