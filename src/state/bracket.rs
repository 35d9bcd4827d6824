//! Bracket state management.
//!
//! A bracket is the set of head-to-head matches for one run of the game.
//! Each match may feed its winner into one slot of a successor match, so the
//! whole bracket forms a forest of in-trees converging on a final.
//!
//! Matches are resolved by vote (once the shared voter threshold is reached
//! and one slot holds a strict majority) or by an admin override. Resolution
//! writes the winner's name into the successor slot exactly one hop ahead;
//! nothing further down the tree is touched.

use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::info;

use super::connection::ConnectionId;

/// One of the two competitor slots of a match.
///
/// On the wire a slot is the number `1` or `2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Slot {
    One,
    Two,
}

impl Slot {
    pub fn number(self) -> u8 {
        match self {
            Self::One => 1,
            Self::Two => 2,
        }
    }
}

impl TryFrom<u8> for Slot {
    type Error = InvalidSlot;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::One),
            2 => Ok(Self::Two),
            other => Err(InvalidSlot(other)),
        }
    }
}

impl From<Slot> for u8 {
    fn from(slot: Slot) -> Self {
        slot.number()
    }
}

/// A slot number other than 1 or 2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("slot must be 1 or 2, got {0}")]
pub struct InvalidSlot(pub u8);

/// Match identifier, supplied by the admin's bracket definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MatchId(pub u32);

impl fmt::Display for MatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Admin-supplied description of one match, including its wiring.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchDefinition {
    pub id: MatchId,

    /// Competitor names; unset slots are filled in by propagation
    #[serde(default)]
    pub competitor1: Option<String>,
    #[serde(default)]
    pub competitor2: Option<String>,

    /// Successor match that receives this match's winner
    #[serde(default)]
    pub next_match_id: Option<MatchId>,

    /// Which slot of the successor this match feeds
    #[serde(default)]
    pub source_slot_in_next: Option<Slot>,
}

impl MatchDefinition {
    pub fn new(id: u32) -> Self {
        Self {
            id: MatchId(id),
            competitor1: None,
            competitor2: None,
            next_match_id: None,
            source_slot_in_next: None,
        }
    }

    pub fn with_competitors(mut self, first: &str, second: &str) -> Self {
        self.competitor1 = Some(first.to_string());
        self.competitor2 = Some(second.to_string());
        self
    }

    /// Wire this match's winner into `slot` of match `next`.
    pub fn feeds(mut self, next: u32, slot: Slot) -> Self {
        self.next_match_id = Some(MatchId(next));
        self.source_slot_in_next = Some(slot);
        self
    }
}

/// A single head-to-head match.
#[derive(Debug, Clone)]
pub struct Match {
    pub id: MatchId,
    competitor1: Option<String>,
    competitor2: Option<String>,
    votes1: u32,
    votes2: u32,

    /// Connections that have voted on this match
    voters: HashSet<ConnectionId>,

    winner: Option<Slot>,
    pub next_match_id: Option<MatchId>,
    pub source_slot_in_next: Option<Slot>,
}

impl Match {
    fn from_definition(def: MatchDefinition) -> Self {
        let non_empty = |name: Option<String>| name.filter(|n| !n.trim().is_empty());
        Self {
            id: def.id,
            competitor1: non_empty(def.competitor1),
            competitor2: non_empty(def.competitor2),
            votes1: 0,
            votes2: 0,
            voters: HashSet::new(),
            winner: None,
            next_match_id: def.next_match_id,
            source_slot_in_next: def.source_slot_in_next,
        }
    }

    /// Competitor name in a slot, if known yet.
    pub fn competitor(&self, slot: Slot) -> Option<&str> {
        match slot {
            Slot::One => self.competitor1.as_deref(),
            Slot::Two => self.competitor2.as_deref(),
        }
    }

    fn set_competitor(&mut self, slot: Slot, name: String) {
        match slot {
            Slot::One => self.competitor1 = Some(name),
            Slot::Two => self.competitor2 = Some(name),
        }
    }

    pub fn votes(&self, slot: Slot) -> u32 {
        match slot {
            Slot::One => self.votes1,
            Slot::Two => self.votes2,
        }
    }

    pub fn total_votes(&self) -> u32 {
        self.votes1 + self.votes2
    }

    pub fn has_voted(&self, connection_id: ConnectionId) -> bool {
        self.voters.contains(&connection_id)
    }

    pub fn voter_count(&self) -> usize {
        self.voters.len()
    }

    pub fn winner(&self) -> Option<Slot> {
        self.winner
    }

    pub fn is_resolved(&self) -> bool {
        self.winner.is_some()
    }

    /// Name of the winning competitor, if resolved.
    pub fn winner_name(&self) -> Option<&str> {
        self.winner.and_then(|slot| self.competitor(slot))
    }

    fn record_vote(&mut self, connection_id: ConnectionId, slot: Slot) {
        self.voters.insert(connection_id);
        match slot {
            Slot::One => self.votes1 += 1,
            Slot::Two => self.votes2 += 1,
        }
    }

    /// Slot holding a strict majority once `threshold` votes are in.
    ///
    /// A tie at or past the threshold yields `None`; there is no tie-break.
    pub fn decided_slot(&self, threshold: u32) -> Option<Slot> {
        if self.total_votes() < threshold {
            return None;
        }
        match self.votes1.cmp(&self.votes2) {
            std::cmp::Ordering::Greater => Some(Slot::One),
            std::cmp::Ordering::Less => Some(Slot::Two),
            std::cmp::Ordering::Equal => None,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "id": self.id,
            "competitor1": self.competitor1,
            "competitor2": self.competitor2,
            "votes1": self.votes1,
            "votes2": self.votes2,
            "voterCount": self.voters.len(),
            "winner": self.winner,
            "nextMatchId": self.next_match_id,
            "sourceSlotInNext": self.source_slot_in_next
        })
    }
}

/// Result of an accepted vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteOutcome {
    /// Vote counted, match still open
    Recorded { match_id: MatchId },

    /// Vote counted and the match resolved
    Resolved {
        match_id: MatchId,
        winner: Slot,
        /// Match that received the winner's name, if any
        advanced_to: Option<MatchId>,
    },
}

impl VoteOutcome {
    pub fn is_resolved(&self) -> bool {
        matches!(self, Self::Resolved { .. })
    }
}

/// Why a vote was not counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum VoteRejection {
    #[error("bracket is not running")]
    NotRunning,
    #[error("unknown match {0}")]
    UnknownMatch(MatchId),
    #[error("already voted on this match")]
    AlreadyVoted,
    #[error("admin does not vote in this bracket")]
    AdminExcluded,
}

/// Bracket errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BracketError {
    #[error("invalid vote: {0}")]
    InvalidVote(#[from] VoteRejection),

    #[error("malformed bracket: {0}")]
    MalformedBracket(String),

    #[error("match {0} not found")]
    MatchNotFound(MatchId),
}

/// Bracket state for one room.
#[derive(Debug, Clone)]
pub struct Bracket {
    /// Matches in definition order
    matches: Vec<Match>,

    /// Match ID to position in `matches`
    index: HashMap<MatchId, usize>,

    /// Admin-supplied entrant names, for display
    entrants: Vec<String>,

    /// Votes needed to resolve any match, fixed at start
    voters_required: u32,

    admin_participates: bool,
    is_running: bool,
    pub started_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl Default for Bracket {
    fn default() -> Self {
        Self::new()
    }
}

impl Bracket {
    /// Create an empty, idle bracket.
    pub fn new() -> Self {
        Self {
            matches: Vec::new(),
            index: HashMap::new(),
            entrants: Vec::new(),
            voters_required: 1,
            admin_participates: false,
            is_running: false,
            started_at: None,
        }
    }

    /// Start the bracket from admin-supplied definitions.
    ///
    /// `participant_count` is the room's membership at start time. The admin
    /// is left out of the voter threshold unless `admin_participates` is set.
    /// Starting a running bracket replaces it.
    pub fn start(
        &mut self,
        participant_count: usize,
        entrants: Vec<String>,
        definitions: Vec<MatchDefinition>,
        admin_participates: bool,
    ) -> Result<(), BracketError> {
        let index = validate_definitions(&definitions)?;

        let excluded = if admin_participates { 0 } else { 1 };
        let voters = participant_count.saturating_sub(excluded).max(1);

        self.matches = definitions.into_iter().map(Match::from_definition).collect();
        self.index = index;
        self.entrants = entrants;
        self.voters_required = u32::try_from(voters).unwrap_or(u32::MAX);
        self.admin_participates = admin_participates;
        self.is_running = true;
        self.started_at = Some(chrono::Utc::now());

        info!(
            matches = self.matches.len(),
            voters_required = self.voters_required,
            admin_participates,
            "bracket started"
        );
        Ok(())
    }

    /// Record a vote and resolve the match if the threshold is reached.
    ///
    /// `admin_id` is the room's current admin; their votes count only when
    /// the bracket was started with `admin_participates`.
    pub fn vote(
        &mut self,
        voter: ConnectionId,
        admin_id: ConnectionId,
        match_id: MatchId,
        slot: Slot,
    ) -> Result<VoteOutcome, BracketError> {
        if !self.is_running {
            return Err(VoteRejection::NotRunning.into());
        }
        if voter == admin_id && !self.admin_participates {
            return Err(VoteRejection::AdminExcluded.into());
        }
        let idx = self
            .position(match_id)
            .ok_or(VoteRejection::UnknownMatch(match_id))?;

        let m = &mut self.matches[idx];
        if m.has_voted(voter) {
            return Err(VoteRejection::AlreadyVoted.into());
        }
        m.record_vote(voter, slot);

        match self.check_winner(idx) {
            Some(winner) => {
                let advanced_to = self.advance_winner(idx, winner);
                Ok(VoteOutcome::Resolved {
                    match_id,
                    winner,
                    advanced_to,
                })
            }
            None => Ok(VoteOutcome::Recorded { match_id }),
        }
    }

    /// Admin override: resolve a match regardless of its tally.
    ///
    /// May be applied to an already-resolved match. The new winner overwrites
    /// the successor slot, but matches further down that already took the
    /// old winner keep the old name.
    pub fn force_win(
        &mut self,
        match_id: MatchId,
        winner: Slot,
    ) -> Result<Option<MatchId>, BracketError> {
        let idx = self
            .position(match_id)
            .ok_or(BracketError::MatchNotFound(match_id))?;
        info!(match_id = %match_id, winner = winner.number(), "match won by override");
        Ok(self.advance_winner(idx, winner))
    }

    /// Clear all matches and return to the lobby.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    fn check_winner(&self, idx: usize) -> Option<Slot> {
        self.matches[idx].decided_slot(self.voters_required)
    }

    /// Set the winner and write their name one hop forward.
    ///
    /// Returns the successor that was updated; a successor that does not
    /// exist is treated as the end of the bracket. A winning slot with no
    /// name yet leaves the successor as it was.
    fn advance_winner(&mut self, idx: usize, winner: Slot) -> Option<MatchId> {
        let m = &mut self.matches[idx];
        m.winner = Some(winner);
        info!(match_id = %m.id, winner = winner.number(), "match resolved");

        let name = m.competitor(winner)?.to_owned();
        let next_id = m.next_match_id?;
        let slot = m.source_slot_in_next?;
        let next_idx = self.position(next_id)?;
        self.matches[next_idx].set_competitor(slot, name);
        Some(next_id)
    }

    fn position(&self, match_id: MatchId) -> Option<usize> {
        self.index.get(&match_id).copied()
    }

    pub fn get_match(&self, match_id: MatchId) -> Option<&Match> {
        self.position(match_id).map(|idx| &self.matches[idx])
    }

    pub fn matches(&self) -> &[Match] {
        &self.matches
    }

    pub fn match_count(&self) -> usize {
        self.matches.len()
    }

    pub fn entrants(&self) -> &[String] {
        &self.entrants
    }

    pub fn voters_required(&self) -> u32 {
        self.voters_required
    }

    pub fn admin_participates(&self) -> bool {
        self.admin_participates
    }

    pub fn is_running(&self) -> bool {
        self.is_running
    }

    /// Full game state snapshot for clients.
    pub fn to_json(&self) -> serde_json::Value {
        let matches: Vec<serde_json::Value> = self.matches.iter().map(|m| m.to_json()).collect();

        serde_json::json!({
            "isRunning": self.is_running,
            "votersRequired": self.voters_required,
            "adminParticipates": self.admin_participates,
            "participants": self.entrants,
            "matches": matches,
            "startedAt": self.started_at
        })
    }
}

/// Check match wiring and build the ID index.
///
/// Rejects duplicate IDs, successors without a target slot, and any cycle in
/// the successor chain. A successor ID that names no match is allowed and
/// ends the chain.
fn validate_definitions(
    definitions: &[MatchDefinition],
) -> Result<HashMap<MatchId, usize>, BracketError> {
    let mut index = HashMap::with_capacity(definitions.len());

    for (i, def) in definitions.iter().enumerate() {
        if index.insert(def.id, i).is_some() {
            return Err(BracketError::MalformedBracket(format!(
                "duplicate match id {}",
                def.id
            )));
        }
        if def.next_match_id.is_some() && def.source_slot_in_next.is_none() {
            return Err(BracketError::MalformedBracket(format!(
                "match {} has a next match but no target slot",
                def.id
            )));
        }
    }

    for def in definitions {
        let mut seen = HashSet::from([def.id]);
        let mut next = def.next_match_id;
        while let Some(id) = next {
            if !seen.insert(id) {
                return Err(BracketError::MalformedBracket(format!(
                    "match {} leads into a cycle at match {}",
                    def.id, id
                )));
            }
            next = index.get(&id).and_then(|&i| definitions[i].next_match_id);
        }
    }

    Ok(index)
}
