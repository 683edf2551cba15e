//! Invite Tokens
//!
//! Opaque, unguessable tokens handed to the inviting player and embedded by
//! the transport in whatever deep-link format it uses. The core never parses
//! link formats; it only compares tokens.

use std::fmt;

use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::MIN_TOKEN_BYTES;

/// Opaque invite token (lower-case hex of random bytes).
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InviteToken(String);

impl InviteToken {
    /// Wrap a token received from a collaborator.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Borrow the token text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InviteToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for InviteToken {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Generate a token from the operating system's randomness source.
///
/// `len` is clamped to at least [`MIN_TOKEN_BYTES`]. The returned token is
/// twice as many hex characters long.
pub fn generate_token(len: usize) -> Result<InviteToken, rand::Error> {
    generate_token_with(&mut OsRng, len)
}

/// Generate a token from an explicit source.
pub fn generate_token_with<R: RngCore + ?Sized>(
    rng: &mut R,
    len: usize,
) -> Result<InviteToken, rand::Error> {
    let mut bytes = vec![0u8; len.max(MIN_TOKEN_BYTES)];
    rng.try_fill_bytes(&mut bytes)?;
    Ok(InviteToken(hex::encode(bytes)))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct BrokenSource;

    impl RngCore for BrokenSource {
        fn next_u32(&mut self) -> u32 {
            0
        }

        fn next_u64(&mut self) -> u64 {
            0
        }

        fn fill_bytes(&mut self, dest: &mut [u8]) {
            dest.fill(0);
        }

        fn try_fill_bytes(&mut self, _dest: &mut [u8]) -> Result<(), rand::Error> {
            Err(rand::Error::new("entropy source unavailable"))
        }
    }

    #[test]
    fn test_token_is_hex_of_requested_length() {
        let token = generate_token(12).unwrap();
        assert_eq!(token.as_str().len(), 24);
        assert!(token.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_token_length_is_clamped() {
        let token = generate_token(2).unwrap();
        assert_eq!(token.as_str().len(), MIN_TOKEN_BYTES * 2);
    }

    #[test]
    fn test_tokens_differ() {
        let a = generate_token(8).unwrap();
        let b = generate_token(8).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_unavailable_source_is_reported() {
        let result = generate_token_with(&mut BrokenSource, 8);
        assert!(result.is_err());
    }

    #[test]
    fn test_display_matches_inner_text() {
        let token = InviteToken::from("abcdef0123456789");
        assert_eq!(token.to_string(), "abcdef0123456789");
    }
}
