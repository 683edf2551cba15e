//! # Dilemma Session Server
//!
//! Session manager for two-player iterated Prisoner's Dilemma matches.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    DILEMMA SERVER                            │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/           - Leaf utilities                            │
//! │  └── token.rs    - Random invite tokens                      │
//! │                                                              │
//! │  game/           - Match model (pure, no locking)            │
//! │  ├── state.rs    - Players, sessions, invites, history       │
//! │  ├── payoff.rs   - 2x2 payoff matrix and outcome text        │
//! │  ├── round.rs    - Applying a resolved round to a session    │
//! │  └── events.rs   - Transition signals for collaborators      │
//! │                                                              │
//! │  session/        - Concurrency (registry, locks, timers)     │
//! │  ├── manager.rs  - Invite, move, round, rematch operations   │
//! │  ├── timer.rs    - Turn deadlines and session retirement     │
//! │  ├── config.rs   - Manager configuration                     │
//! │  └── error.rs    - Error taxonomy                            │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Lifecycle
//!
//! An invite is created and handed out as an opaque token. Accepting it
//! starts a session; both players submit moves, the round resolves once
//! both are in, and the session finishes at its round limit, on forfeit,
//! or when a player misses the turn deadline. Finished sessions may be
//! restarted as a rematch, otherwise they are retired after a grace period.
//!
//! All state is memory-resident and lost on restart.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod core;
pub mod game;
pub mod session;

// Re-export commonly used types
pub use core::token::InviteToken;
pub use game::events::SessionEvent;
pub use game::state::{
    Choice, MatchStanding, PendingInvite, Player, PlayerId, RoundResult, Session, SessionId,
    SessionState, Side,
};
pub use session::config::ManagerConfig;
pub use session::error::{GameError, StateConflict};
pub use session::manager::{RoundReport, SessionManager, SharedSession, TimeoutReport};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default turn deadline (seconds).
pub const TURN_TIMEOUT_SECS: u64 = 120;

/// Default retention of finished sessions before removal (seconds).
pub const RETENTION_SECS: u64 = 300;

/// Minimum number of random bytes in an invite token.
pub const MIN_TOKEN_BYTES: usize = 8;
