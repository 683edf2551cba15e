//! Session Errors
//!
//! Every failure is local and recoverable; the display text is meant to be
//! shown to the player who triggered it.

use thiserror::Error;

use crate::game::state::SessionId;

/// Why an operation was refused by the session's lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StateConflict {
    /// Operation needs a match that is still being played.
    #[error("the game is not in progress")]
    NotInProgress,
    /// Operation needs a finished match.
    #[error("the game has not finished yet")]
    NotFinished,
    /// Both moves for this round are already in.
    #[error("this round is already complete")]
    RoundComplete,
    /// Round cannot be scored until both moves are in.
    #[error("both players have not moved yet")]
    AwaitingMoves,
    /// Rematch requested before both players agreed.
    #[error("both players must agree to a rematch")]
    RematchNotAgreed,
}

/// Session manager errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GameError {
    /// Caller has no active session.
    #[error("you are not in an active game")]
    NotInGame,

    /// Unknown, consumed or expired invite token.
    #[error("this invite is invalid or has expired")]
    InvalidInvite,

    /// Inviter tried to accept their own invite.
    #[error("you cannot accept your own invite")]
    SelfInvite,

    /// Caller is already bound to a session.
    #[error("you are already in a game")]
    AlreadyInGame,

    /// Round count must be positive.
    #[error("a game needs at least one round")]
    InvalidRounds,

    /// Session is in the wrong lifecycle state.
    #[error("{0}")]
    WrongState(#[from] StateConflict),

    /// Referenced session does not exist.
    #[error("session {0} not found")]
    NotFound(SessionId),

    /// Randomness source unavailable.
    #[error("could not generate invite token: {0}")]
    Generation(String),
}

impl From<rand::Error> for GameError {
    fn from(err: rand::Error) -> Self {
        GameError::Generation(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_conflict_displays_reason() {
        let err = GameError::from(StateConflict::NotFinished);
        assert_eq!(err.to_string(), "the game has not finished yet");
    }

    #[test]
    fn test_not_found_names_session() {
        assert_eq!(GameError::NotFound(SessionId(42)).to_string(), "session 42 not found");
    }
}
