//! BracketVote State Library
//!
//! This crate provides room membership and bracket voting state for
//! BracketVote sessions.
//!
//! # Overview
//!
//! Participants join a shared room by code. The room's admin starts a
//! single-elimination bracket; everyone else votes on each head-to-head
//! match, and winners advance into the next match automatically.
//!
//! - **Room Registry** - Code to room mapping; rooms are deleted when empty.
//!
//! - **Membership** - Ordered participants with exactly one admin; the
//!   earliest-joined participant takes over when the admin leaves.
//!
//! - **Bracket Engine** - Match graph, exactly-once voting, threshold
//!   resolution and one-hop winner propagation.
//!
//! - **Session Coordinator** - Turns inbound events into state changes and
//!   the replies/broadcasts the transport should send.
//!
//! # Design Principles
//!
//! 1. **No networking** - This crate is pure state. A transport feeds it
//!    events and carries out the returned effects.
//!
//! 2. **Typed failures, quiet wire** - Every rejection is a typed error
//!    internally; almost all of them are dropped silently on the wire.
//!
//! 3. **Serialization-ready** - Snapshots are JSON for clients.
//!
//! # Example
//!
//! ```rust
//! use bracketvote_state::{
//!     ClientEvent, ConnectionId, Coordinator, CoordinatorConfig, Effect, JoinRoom,
//!     SequentialRoomCodes, ServerEvent,
//! };
//!
//! let mut app = Coordinator::with_code_generator(
//!     CoordinatorConfig::default(),
//!     SequentialRoomCodes::starting_at(1000),
//! );
//!
//! // Admin creates a room
//! let effects = app.handle(ConnectionId(1), ClientEvent::CreateRoom("Alice".to_string()));
//! assert!(effects.contains(&Effect::Reply(ServerEvent::RoomCreated {
//!     code: "1000".to_string(),
//!     is_admin: true,
//!     name: "Alice".to_string(),
//! })));
//!
//! // Someone else joins by code
//! app.handle(
//!     ConnectionId(2),
//!     ClientEvent::JoinRoom(JoinRoom {
//!         code: "1000".to_string(),
//!         name: "Bob".to_string(),
//!     }),
//! );
//! assert_eq!(app.rooms().get("1000").unwrap().participant_count(), 2);
//! ```

pub mod config;
pub mod state;

pub use config::{ConfigError, CoordinatorConfig};

// Re-export everything from state module at crate root
pub use state::*;
