//! Round Application
//!
//! Turns two pending moves into a history entry, score changes and a state
//! transition. Pure with respect to the session it is given; the caller
//! holds whatever lock protects it.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::game::payoff::{describe, payoff};
use crate::game::state::{deadline_after, RoundResult, Session};

/// What happened when a round was applied.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RoundResolution {
    /// The appended history entry
    pub result: RoundResult,
    /// Outcome text for player A
    pub outcome_a: String,
    /// Outcome text for player B
    pub outcome_b: String,
    /// Whether this round ended the match
    pub finished: bool,
}

/// Resolve the current round.
///
/// Returns `None` (leaving the session untouched) unless the session is in
/// progress and both players have a pending move. Otherwise scores are
/// credited, the round is recorded, moves are cleared and the round index
/// advances. Passing the configured total finishes the session; otherwise
/// the turn deadline moves to `now + turn_timeout`.
pub fn resolve_round(
    session: &mut Session,
    now: DateTime<Utc>,
    turn_timeout: Duration,
) -> Option<RoundResolution> {
    if !session.is_in_progress() {
        return None;
    }

    let choice_a = session.player_a.choice?;
    let choice_b = session.player_b.choice?;
    let points = payoff(choice_a, choice_b);

    session.player_a.score += points.a;
    session.player_b.score += points.b;

    let result = RoundResult {
        round: session.current_round,
        choice_a,
        choice_b,
        delta_a: points.a,
        delta_b: points.b,
        completed_at: now,
    };
    session.history.push(result.clone());

    let (outcome_a, outcome_b) = describe(
        &session.player_a.name,
        &session.player_b.name,
        choice_a,
        choice_b,
    );

    session.current_round += 1;
    session.player_a.choice = None;
    session.player_b.choice = None;

    let finished = session.current_round > session.total_rounds;
    if finished {
        session.finish(now);
    } else {
        session.turn_deadline = Some(deadline_after(now, turn_timeout));
    }

    Some(RoundResolution {
        result,
        outcome_a,
        outcome_b,
        finished,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::state::{Choice, Player, PlayerId, SessionId, SessionState};
    use proptest::prelude::*;

    const TIMEOUT: Duration = Duration::from_secs(120);

    fn session_with_rounds(total_rounds: u32) -> Session {
        Session::new(
            SessionId(1),
            0,
            Player::new(PlayerId(1), "alice"),
            Player::new(PlayerId(2), "bob"),
            total_rounds,
            Utc::now(),
            TIMEOUT,
        )
    }

    fn choice() -> impl Strategy<Value = Choice> {
        prop_oneof![Just(Choice::Cooperate), Just(Choice::Defect)]
    }

    #[test]
    fn test_single_round_mutual_cooperation_finishes() {
        let mut session = session_with_rounds(1);
        session.player_a.choice = Some(Choice::Cooperate);
        session.player_b.choice = Some(Choice::Cooperate);

        let resolution = resolve_round(&mut session, Utc::now(), TIMEOUT).unwrap();

        assert!(resolution.finished);
        assert_eq!(session.state, SessionState::Finished);
        assert_eq!(session.player_a.score, 3);
        assert_eq!(session.player_b.score, 3);
        assert_eq!(session.history.len(), 1);

        let round = &session.history[0];
        assert_eq!(round.round, 1);
        assert_eq!((round.choice_a, round.choice_b), (Choice::Cooperate, Choice::Cooperate));
        assert_eq!((round.delta_a, round.delta_b), (3, 3));
    }

    #[test]
    fn test_missing_choice_leaves_session_untouched() {
        let mut session = session_with_rounds(3);
        session.player_a.choice = Some(Choice::Defect);

        assert!(resolve_round(&mut session, Utc::now(), TIMEOUT).is_none());
        assert_eq!(session.current_round, 1);
        assert_eq!(session.player_a.choice, Some(Choice::Defect));
        assert!(session.history.is_empty());
    }

    #[test]
    fn test_mid_match_round_moves_deadline() {
        let mut session = session_with_rounds(3);
        session.player_a.choice = Some(Choice::Defect);
        session.player_b.choice = Some(Choice::Cooperate);

        let later = Utc::now() + chrono::Duration::seconds(30);
        let resolution = resolve_round(&mut session, later, TIMEOUT).unwrap();

        assert!(!resolution.finished);
        assert_eq!(session.current_round, 2);
        assert!(session.player_a.choice.is_none());
        assert!(session.player_b.choice.is_none());
        assert_eq!(session.turn_deadline, Some(deadline_after(later, TIMEOUT)));
        assert_eq!((session.player_a.score, session.player_b.score), (5, 0));
    }

    #[test]
    fn test_finished_session_is_not_resolved() {
        let mut session = session_with_rounds(3);
        session.player_a.choice = Some(Choice::Defect);
        session.player_b.choice = Some(Choice::Defect);
        session.finish(Utc::now());

        assert!(resolve_round(&mut session, Utc::now(), TIMEOUT).is_none());
        assert!(session.history.is_empty());
    }

    proptest! {
        #[test]
        fn prop_scores_track_history(
            total in 1u32..12,
            moves in proptest::collection::vec((choice(), choice()), 0..20),
        ) {
            let mut session = session_with_rounds(total);

            for (a, b) in moves {
                session.player_a.choice = Some(a);
                session.player_b.choice = Some(b);
                let _ = resolve_round(&mut session, Utc::now(), TIMEOUT);

                let (sum_a, sum_b) = session.history_totals();
                prop_assert_eq!(session.player_a.score, sum_a);
                prop_assert_eq!(session.player_b.score, sum_b);
                prop_assert!(session.history.len() as u32 <= total);
                prop_assert_eq!(session.is_finished(), session.history.len() as u32 == total);
            }
        }
    }
}
