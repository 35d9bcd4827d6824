//! State management module for BracketVote.
//!
//! This module provides the core state types and managers:
//!
//! - `connection` - Per-connection session data (which room am I in?)
//! - `room` - Rooms, participants, admin transfer, the room registry
//! - `bracket` - Matches, votes, resolution and winner propagation
//! - `event` - Wire events, transport effects and the transport seam
//! - `coordinator` - Routes inbound events and decides who hears about them
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                            Coordinator                                │
//! │                                                                       │
//! │  ┌────────────────────┐        ┌───────────────────────────────────┐ │
//! │  │ ConnectionRegistry │        │           RoomRegistry            │ │
//! │  │                    │        │                                   │ │
//! │  │ connection_id →    │  code  │ code → Room                       │ │
//! │  │   room code  ──────┼───────▶│   participants (join order)       │ │
//! │  │                    │        │   admin_id                        │ │
//! │  └────────────────────┘        │   Bracket                         │ │
//! │                                │     matches ──next──▶ matches     │ │
//! │                                └───────────────────────────────────┘ │
//! │                                                                       │
//! │   ClientEvent ──▶ handle() ──▶ Vec<Effect> ──▶ Transport              │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use bracketvote_state::state::{
//!     bracket::{Bracket, MatchDefinition, MatchId, Slot},
//!     connection::ConnectionId,
//! };
//!
//! let mut bracket = Bracket::new();
//! bracket.start(3, vec![], vec![MatchDefinition::new(1).with_competitors("A", "B")], false)?;
//! bracket.vote(ConnectionId(2), ConnectionId(1), MatchId(1), Slot::One)?;
//! ```

pub mod bracket;
pub mod connection;
pub mod coordinator;
pub mod event;
pub mod room;

// Re-export commonly used types
pub use bracket::{
    Bracket, BracketError, InvalidSlot, Match, MatchDefinition, MatchId, Slot, VoteOutcome,
    VoteRejection,
};
pub use connection::{ConnectionId, ConnectionRegistry, ConnectionSession};
pub use coordinator::{Coordinator, SessionError};
pub use event::{
    ClientEvent, Effect, EventParseError, JoinRoom, MatchChoice, ServerEvent, StartGame,
    Transport,
};
pub use room::{
    Departure, Participant, RandomRoomCodes, Room, RoomCodeGenerator, RoomError, RoomRegistry,
    SequentialRoomCodes, MAX_CODE_ATTEMPTS,
};
