//! Manager Configuration

use std::time::Duration;

use crate::{MIN_TOKEN_BYTES, RETENTION_SECS, TURN_TIMEOUT_SECS};

/// Default lifetime of an unaccepted invite (24 hours).
pub const INVITE_TTL_SECS: u64 = 24 * 60 * 60;

/// Configuration for a [`SessionManager`](crate::session::manager::SessionManager).
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Time a player has to move before the round is force-resolved.
    pub turn_timeout: Duration,
    /// How long a finished session stays reachable before removal.
    pub retention: Duration,
    /// Lifetime of an unaccepted invite. None keeps invites forever.
    pub invite_ttl: Option<Duration>,
    /// Random bytes per invite token (at least 8).
    pub token_bytes: usize,
    /// Capacity of the event broadcast channel.
    pub event_capacity: usize,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            turn_timeout: Duration::from_secs(TURN_TIMEOUT_SECS),
            retention: Duration::from_secs(RETENTION_SECS),
            invite_ttl: Some(Duration::from_secs(INVITE_TTL_SECS)),
            token_bytes: MIN_TOKEN_BYTES,
            event_capacity: 256,
        }
    }
}

impl ManagerConfig {
    /// Create config from environment variables, falling back to defaults.
    ///
    /// `DILEMMA_INVITE_TTL_SECS=0` disables invite expiry.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let secs = |key: &str| lookup(key).and_then(|v| v.trim().parse::<u64>().ok());

        Self {
            turn_timeout: secs("DILEMMA_TURN_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.turn_timeout),
            retention: secs("DILEMMA_RETENTION_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.retention),
            invite_ttl: match secs("DILEMMA_INVITE_TTL_SECS") {
                Some(0) => None,
                Some(ttl) => Some(Duration::from_secs(ttl)),
                None => defaults.invite_ttl,
            },
            token_bytes: lookup("DILEMMA_INVITE_TOKEN_BYTES")
                .and_then(|v| v.trim().parse::<usize>().ok())
                .map(|n| n.max(MIN_TOKEN_BYTES))
                .unwrap_or(defaults.token_bytes),
            event_capacity: lookup("DILEMMA_EVENT_CAPACITY")
                .and_then(|v| v.trim().parse::<usize>().ok())
                .filter(|n| *n > 0)
                .unwrap_or(defaults.event_capacity),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: BTreeMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ManagerConfig::default();
        assert_eq!(config.turn_timeout, Duration::from_secs(120));
        assert_eq!(config.retention, Duration::from_secs(300));
        assert_eq!(config.token_bytes, 8);
    }

    #[test]
    fn test_env_overrides() {
        let config = ManagerConfig::from_lookup(lookup_from(&[
            ("DILEMMA_TURN_TIMEOUT_SECS", "30"),
            ("DILEMMA_RETENTION_SECS", "60"),
            ("DILEMMA_INVITE_TTL_SECS", "0"),
            ("DILEMMA_INVITE_TOKEN_BYTES", "16"),
        ]));

        assert_eq!(config.turn_timeout, Duration::from_secs(30));
        assert_eq!(config.retention, Duration::from_secs(60));
        assert_eq!(config.invite_ttl, None);
        assert_eq!(config.token_bytes, 16);
    }

    #[test]
    fn test_bad_values_fall_back() {
        let config = ManagerConfig::from_lookup(lookup_from(&[
            ("DILEMMA_TURN_TIMEOUT_SECS", "soon"),
            ("DILEMMA_INVITE_TOKEN_BYTES", "4"),
            ("DILEMMA_EVENT_CAPACITY", "0"),
        ]));

        assert_eq!(config.turn_timeout, Duration::from_secs(120));
        assert_eq!(config.token_bytes, MIN_TOKEN_BYTES);
        assert_eq!(config.event_capacity, 256);
    }
}
