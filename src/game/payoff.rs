//! Payoff Matrix
//!
//! The fixed 2x2 scoring policy:
//!
//! | A         | B         | A pts | B pts |
//! |-----------|-----------|-------|-------|
//! | cooperate | cooperate |   3   |   3   |
//! | cooperate | defect    |   0   |   5   |
//! | defect    | cooperate |   5   |   0   |
//! | defect    | defect    |   1   |   1   |

use serde::{Deserialize, Serialize};

use crate::game::state::Choice;

/// Both cooperate.
pub const REWARD: u32 = 3;
/// Defected against a cooperator.
pub const TEMPTATION: u32 = 5;
/// Cooperated against a defector.
pub const SUCKER: u32 = 0;
/// Both defect.
pub const PUNISHMENT: u32 = 1;

/// Points awarded to each side for one round.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payoff {
    /// Points for player A
    pub a: u32,
    /// Points for player B
    pub b: u32,
}

impl Payoff {
    /// Same payoff seen with the seats swapped.
    pub fn swapped(self) -> Self {
        Self { a: self.b, b: self.a }
    }
}

/// Score a pair of moves.
pub const fn payoff(a: Choice, b: Choice) -> Payoff {
    match (a, b) {
        (Choice::Cooperate, Choice::Cooperate) => Payoff { a: REWARD, b: REWARD },
        (Choice::Cooperate, Choice::Defect) => Payoff { a: SUCKER, b: TEMPTATION },
        (Choice::Defect, Choice::Cooperate) => Payoff { a: TEMPTATION, b: SUCKER },
        (Choice::Defect, Choice::Defect) => Payoff { a: PUNISHMENT, b: PUNISHMENT },
    }
}

/// Outcome text for both players: (A's view, B's view).
pub fn describe(name_a: &str, name_b: &str, a: Choice, b: Choice) -> (String, String) {
    let points = payoff(a, b);
    let (headline_a, headline_b) = match (a, b) {
        (Choice::Cooperate, Choice::Cooperate) => {
            let both = "You both cooperated.".to_string();
            (both.clone(), both)
        }
        (Choice::Defect, Choice::Defect) => {
            let both = "You both defected.".to_string();
            (both.clone(), both)
        }
        (Choice::Cooperate, Choice::Defect) => (
            format!("You cooperated, but {} defected.", name_b),
            format!("You defected while {} cooperated.", name_a),
        ),
        (Choice::Defect, Choice::Cooperate) => (
            format!("You defected while {} cooperated.", name_b),
            format!("You cooperated, but {} defected.", name_a),
        ),
    };

    (
        format!("{}\nYou got {} points. Your opponent got {} points.", headline_a, points.a, points.b),
        format!("{}\nYou got {} points. Your opponent got {} points.", headline_b, points.b, points.a),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [Choice; 2] = [Choice::Cooperate, Choice::Defect];

    #[test]
    fn test_payoff_table() {
        assert_eq!(payoff(Choice::Cooperate, Choice::Cooperate), Payoff { a: 3, b: 3 });
        assert_eq!(payoff(Choice::Cooperate, Choice::Defect), Payoff { a: 0, b: 5 });
        assert_eq!(payoff(Choice::Defect, Choice::Cooperate), Payoff { a: 5, b: 0 });
        assert_eq!(payoff(Choice::Defect, Choice::Defect), Payoff { a: 1, b: 1 });
    }

    #[test]
    fn test_payoff_symmetric_under_swap() {
        for a in ALL {
            for b in ALL {
                assert_eq!(payoff(a, b).swapped(), payoff(b, a), "{a} vs {b}");
            }
        }
    }

    #[test]
    fn test_describe_mentions_opponent_and_points() {
        let (text_a, text_b) = describe("alice", "bob", Choice::Cooperate, Choice::Defect);
        assert!(text_a.starts_with("You cooperated, but bob defected."));
        assert!(text_a.contains("You got 0 points. Your opponent got 5 points."));
        assert!(text_b.starts_with("You defected while alice cooperated."));
        assert!(text_b.contains("You got 5 points. Your opponent got 0 points."));
    }

    #[test]
    fn test_describe_mutual_moves_share_headline() {
        let (text_a, text_b) = describe("alice", "bob", Choice::Defect, Choice::Defect);
        assert_eq!(text_a, text_b);
        assert!(text_a.starts_with("You both defected."));
    }
}
