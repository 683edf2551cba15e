//! Game State Definitions
//!
//! Session, player and invite records. Uses BTreeMap-friendly ordered ids so
//! the manager's registries iterate deterministically.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::token::InviteToken;

// =============================================================================
// IDENTIFIERS
// =============================================================================

/// Opaque numeric player identity supplied by the transport.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub i64);

impl PlayerId {
    /// Create from a raw id.
    pub const fn new(id: i64) -> Self {
        Self(id)
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Session identity, derived from the inviting player's id.
///
/// Stable across rematches: a rematch is a new session instance under the
/// same id (distinguished by [`Session::epoch`]).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub i64);

impl From<PlayerId> for SessionId {
    fn from(inviter: PlayerId) -> Self {
        Self(inviter.0)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// MOVES
// =============================================================================

/// One of the two moves available each round.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Choice {
    /// Cooperate with the other player.
    Cooperate,
    /// Defect against the other player.
    Defect,
}

impl Choice {
    /// Past-tense verb, for outcome text.
    pub fn verb(self) -> &'static str {
        match self {
            Choice::Cooperate => "cooperated",
            Choice::Defect => "defected",
        }
    }
}

impl fmt::Display for Choice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Choice::Cooperate => f.write_str("cooperate"),
            Choice::Defect => f.write_str("defect"),
        }
    }
}

/// Which seat a player occupies. A is always the inviter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    /// The inviting player.
    A,
    /// The accepting player.
    B,
}

impl Side {
    /// The opposite seat.
    pub fn other(self) -> Side {
        match self {
            Side::A => Side::B,
            Side::B => Side::A,
        }
    }
}

// =============================================================================
// PLAYER
// =============================================================================

/// A participant in a session.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Player {
    /// Player identity
    pub id: PlayerId,

    /// Display name supplied by the transport
    pub name: String,

    /// Cumulative score for this session
    pub score: u32,

    /// Move submitted for the current round, if any
    pub choice: Option<Choice>,

    /// When the last move was submitted
    pub last_move_at: Option<DateTime<Utc>>,

    /// Rematch preference (only meaningful once finished)
    pub wants_rematch: bool,
}

impl Player {
    /// Create a player with a zero score and no pending move.
    pub fn new(id: PlayerId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            score: 0,
            choice: None,
            last_move_at: None,
            wants_rematch: false,
        }
    }

    /// Has this player submitted a move for the current round?
    #[inline]
    pub fn has_chosen(&self) -> bool {
        self.choice.is_some()
    }
}

// =============================================================================
// ROUND HISTORY
// =============================================================================

/// Record of a completed round. Never mutated once appended.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundResult {
    /// 1-based round index
    pub round: u32,
    /// Player A's move
    pub choice_a: Choice,
    /// Player B's move
    pub choice_b: Choice,
    /// Points awarded to player A
    pub delta_a: u32,
    /// Points awarded to player B
    pub delta_b: u32,
    /// When the round was resolved
    pub completed_at: DateTime<Utc>,
}

impl RoundResult {
    /// Moves seen from one side: (own, opponent's).
    pub fn choices_for(&self, side: Side) -> (Choice, Choice) {
        match side {
            Side::A => (self.choice_a, self.choice_b),
            Side::B => (self.choice_b, self.choice_a),
        }
    }
}

// =============================================================================
// SESSION
// =============================================================================

/// Session lifecycle state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Rounds are being played.
    InProgress,
    /// Match over (round limit, forfeit or timeout).
    Finished,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::InProgress => f.write_str("in progress"),
            SessionState::Finished => f.write_str("finished"),
        }
    }
}

/// Final standing of a session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MatchStanding {
    /// One player has the higher score.
    Winner {
        /// The leading player
        player_id: PlayerId,
    },
    /// Scores are level.
    Draw,
}

/// A match between exactly two players.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Session {
    /// Stable identity (the inviter's id)
    pub id: SessionId,

    /// Process-unique instance serial; a rematch gets a new one
    pub epoch: u64,

    /// Inviting player
    pub player_a: Player,

    /// Accepting player
    pub player_b: Player,

    /// Rounds configured at invite time
    pub total_rounds: u32,

    /// Current round (1-based)
    pub current_round: u32,

    /// Lifecycle state
    pub state: SessionState,

    /// Completed rounds, oldest first
    pub history: Vec<RoundResult>,

    /// When the pending round is force-resolved (None once finished)
    pub turn_deadline: Option<DateTime<Utc>>,

    /// When this instance started
    pub started_at: DateTime<Utc>,

    /// When this instance finished
    pub finished_at: Option<DateTime<Utc>>,
}

impl Session {
    /// Start a new session at round 1.
    pub fn new(
        id: SessionId,
        epoch: u64,
        player_a: Player,
        player_b: Player,
        total_rounds: u32,
        now: DateTime<Utc>,
        turn_timeout: Duration,
    ) -> Self {
        Self {
            id,
            epoch,
            player_a,
            player_b,
            total_rounds,
            current_round: 1,
            state: SessionState::InProgress,
            history: Vec::new(),
            turn_deadline: Some(deadline_after(now, turn_timeout)),
            started_at: now,
            finished_at: None,
        }
    }

    /// Fresh instance with the same id and players for a rematch.
    pub fn rematch(&self, epoch: u64, now: DateTime<Utc>, turn_timeout: Duration) -> Self {
        Self::new(
            self.id,
            epoch,
            Player::new(self.player_a.id, self.player_a.name.clone()),
            Player::new(self.player_b.id, self.player_b.name.clone()),
            self.total_rounds,
            now,
            turn_timeout,
        )
    }

    /// Seat occupied by a player.
    pub fn side_of(&self, player_id: &PlayerId) -> Option<Side> {
        if self.player_a.id == *player_id {
            Some(Side::A)
        } else if self.player_b.id == *player_id {
            Some(Side::B)
        } else {
            None
        }
    }

    /// Player in a seat.
    pub fn player(&self, side: Side) -> &Player {
        match side {
            Side::A => &self.player_a,
            Side::B => &self.player_b,
        }
    }

    /// Mutable player in a seat.
    pub fn player_mut(&mut self, side: Side) -> &mut Player {
        match side {
            Side::A => &mut self.player_a,
            Side::B => &mut self.player_b,
        }
    }

    /// The other participant.
    pub fn opponent_of(&self, player_id: &PlayerId) -> Option<&Player> {
        self.side_of(player_id).map(|side| self.player(side.other()))
    }

    /// Check if rounds are still being played.
    #[inline]
    pub fn is_in_progress(&self) -> bool {
        self.state == SessionState::InProgress
    }

    /// Check if the match is over.
    #[inline]
    pub fn is_finished(&self) -> bool {
        self.state == SessionState::Finished
    }

    /// Both players have a pending move.
    pub fn both_chosen(&self) -> bool {
        self.player_a.has_chosen() && self.player_b.has_chosen()
    }

    /// Both players asked for a rematch.
    pub fn both_want_rematch(&self) -> bool {
        self.player_a.wants_rematch && self.player_b.wants_rematch
    }

    /// Number of resolved rounds.
    pub fn rounds_played(&self) -> usize {
        self.history.len()
    }

    /// Move the session to `Finished`.
    pub fn finish(&mut self, now: DateTime<Utc>) {
        self.state = SessionState::Finished;
        self.turn_deadline = None;
        if self.finished_at.is_none() {
            self.finished_at = Some(now);
        }
    }

    /// Current standing by score.
    pub fn standing(&self) -> MatchStanding {
        match self.player_a.score.cmp(&self.player_b.score) {
            std::cmp::Ordering::Greater => MatchStanding::Winner { player_id: self.player_a.id },
            std::cmp::Ordering::Less => MatchStanding::Winner { player_id: self.player_b.id },
            std::cmp::Ordering::Equal => MatchStanding::Draw,
        }
    }

    /// Player with the higher score, or None on a draw.
    pub fn leader(&self) -> Option<&Player> {
        match self.standing() {
            MatchStanding::Winner { player_id } => {
                self.side_of(&player_id).map(|side| self.player(side))
            }
            MatchStanding::Draw => None,
        }
    }

    /// Sum of history deltas per side: (A, B).
    pub fn history_totals(&self) -> (u32, u32) {
        self.history.iter().fold((0, 0), |(a, b), round| {
            (a + round.delta_a, b + round.delta_b)
        })
    }

    /// Previous rounds from one player's point of view.
    ///
    /// Returns `None` if the player is not in this session.
    pub fn history_summary(&self, player_id: &PlayerId) -> Option<String> {
        let side = self.side_of(player_id)?;

        if self.history.is_empty() {
            return Some("No previous rounds.".to_string());
        }

        let mut summary = String::from("Previous rounds:");
        for round in &self.history {
            let (own, theirs) = round.choices_for(side);
            summary.push_str(&format!(
                "\nR{}: you {}, they {}",
                round.round,
                own.verb(),
                theirs.verb(),
            ));
        }
        Some(summary)
    }
}

// =============================================================================
// INVITES
// =============================================================================

/// Unconsumed offer to start a session.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PendingInvite {
    /// Token handed to the inviter
    pub token: InviteToken,
    /// Inviting player
    pub inviter_id: PlayerId,
    /// Inviter display name
    pub inviter_name: String,
    /// Requested round count
    pub rounds: u32,
    /// When the invite was issued
    pub created_at: DateTime<Utc>,
}

impl PendingInvite {
    /// Check whether the invite outlived `ttl`. `None` never expires.
    pub fn is_expired(&self, now: DateTime<Utc>, ttl: Option<Duration>) -> bool {
        match ttl {
            Some(ttl) => now >= deadline_after(self.created_at, ttl),
            None => false,
        }
    }
}

/// `now + timeout`, saturating at the latest representable instant.
pub fn deadline_after(now: DateTime<Utc>, timeout: Duration) -> DateTime<Utc> {
    let millis = i64::try_from(timeout.as_millis()).unwrap_or(i64::MAX);
    chrono::Duration::try_milliseconds(millis)
        .and_then(|delta| now.checked_add_signed(delta))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}
