//! Session Events
//!
//! State-transition signals for the presentation layer. The manager emits
//! one of these for every transition; the transport maps them to
//! user-facing messages and action menus.

use serde::{Deserialize, Serialize};

use crate::game::state::{PlayerId, RoundResult, SessionId};

/// Why a session finished.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// The configured number of rounds was played.
    RoundLimit,
    /// A player quit.
    Forfeit,
    /// A player missed the turn deadline.
    Timeout,
}

/// A lifecycle transition.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    /// An invite was issued.
    InviteCreated {
        inviter_id: PlayerId,
        rounds: u32,
    },

    /// A session (or rematch) started at round 1.
    GameStarted {
        session_id: SessionId,
        player_a: PlayerId,
        player_b: PlayerId,
        total_rounds: u32,
        rematch: bool,
    },

    /// A player submitted a move.
    ChoiceRecorded {
        session_id: SessionId,
        player_id: PlayerId,
        round: u32,
        both_submitted: bool,
    },

    /// A round was scored.
    RoundResolved {
        session_id: SessionId,
        result: RoundResult,
        total_rounds: u32,
        score_a: u32,
        score_b: u32,
    },

    /// The match is over.
    GameFinished {
        session_id: SessionId,
        reason: FinishReason,
        /// None on a draw
        winner: Option<PlayerId>,
        score_a: u32,
        score_b: u32,
    },

    /// A player missed the turn deadline.
    TimedOut {
        session_id: SessionId,
        timed_out: PlayerId,
        active: PlayerId,
    },

    /// A player quit mid-match.
    Forfeited {
        session_id: SessionId,
        quitter: PlayerId,
        winner: PlayerId,
    },

    /// Both players asked for a rematch.
    RematchAccepted {
        session_id: SessionId,
    },

    /// A player turned down the rematch; both players were released.
    RematchDeclined {
        session_id: SessionId,
        decliner: PlayerId,
    },

    /// A finished session was removed.
    SessionRetired {
        session_id: SessionId,
    },
}

impl SessionEvent {
    /// Session the event belongs to (None for invites).
    pub fn session_id(&self) -> Option<SessionId> {
        match self {
            SessionEvent::InviteCreated { .. } => None,
            SessionEvent::GameStarted { session_id, .. }
            | SessionEvent::ChoiceRecorded { session_id, .. }
            | SessionEvent::RoundResolved { session_id, .. }
            | SessionEvent::GameFinished { session_id, .. }
            | SessionEvent::TimedOut { session_id, .. }
            | SessionEvent::Forfeited { session_id, .. }
            | SessionEvent::RematchAccepted { session_id }
            | SessionEvent::RematchDeclined { session_id, .. }
            | SessionEvent::SessionRetired { session_id } => Some(*session_id),
        }
    }

    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_is_tagged() {
        let event = SessionEvent::RematchDeclined {
            session_id: SessionId(10),
            decliner: PlayerId(20),
        };
        let json = event.to_json().unwrap();
        assert!(json.contains("\"type\":\"rematch_declined\""));
        assert!(json.contains("\"decliner\":20"));
        assert_eq!(SessionEvent::from_json(&json).unwrap(), event);
    }

    #[test]
    fn test_finish_reason_encoding() {
        let event = SessionEvent::GameFinished {
            session_id: SessionId(1),
            reason: FinishReason::Timeout,
            winner: None,
            score_a: 1,
            score_b: 1,
        };
        let json = event.to_json().unwrap();
        assert!(json.contains("\"reason\":\"timeout\""));
        assert!(json.contains("\"winner\":null"));
    }

    #[test]
    fn test_session_id_accessor() {
        let invite = SessionEvent::InviteCreated { inviter_id: PlayerId(1), rounds: 10 };
        assert_eq!(invite.session_id(), None);

        let retired = SessionEvent::SessionRetired { session_id: SessionId(3) };
        assert_eq!(retired.session_id(), Some(SessionId(3)));
    }
}
