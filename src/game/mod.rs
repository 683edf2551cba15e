//! Match Model
//!
//! Plain data and pure functions. Nothing in here locks, sleeps, or spawns;
//! the `session` module owns all concurrency.
//!
//! ## Module Structure
//!
//! - `state`: Players, sessions, invites, round history
//! - `payoff`: Payoff matrix and outcome descriptions
//! - `round`: Applying a completed round to a session
//! - `events`: Transition signals for collaborators

pub mod state;
pub mod payoff;
pub mod round;
pub mod events;

// Re-export key types
pub use state::{Choice, Player, PlayerId, RoundResult, Session, SessionId, SessionState, Side};
pub use payoff::{payoff, Payoff};
pub use round::{resolve_round, RoundResolution};
pub use events::SessionEvent;
