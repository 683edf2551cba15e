//! Leaf utilities with no knowledge of sessions or locking.

pub mod token;

pub use token::{generate_token, InviteToken};
