//! Session Layer
//!
//! Owns every live session and pending invite. This layer is the only
//! place with locks, spawned tasks and wall-clock time; all scoring runs
//! through `game/`.

pub mod config;
pub mod error;
pub mod manager;
pub mod timer;

pub use config::ManagerConfig;
pub use error::{GameError, StateConflict};
pub use manager::{RoundReport, SessionManager, SharedSession, TimeoutReport};
