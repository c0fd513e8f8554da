//! Identity collaborator. Session management is external; the engine only
//! needs an opaque, well-formed user id.

use std::fmt;

use serde::Serialize;

const MAX_USER_ID_LEN: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct UserId(pub String);

impl UserId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Well-formed: non-empty, at most 64 bytes, `[A-Za-z0-9_-]` only.
    pub fn is_well_formed(&self) -> bool {
        !self.0.is_empty()
            && self.0.len() <= MAX_USER_ID_LEN
            && self
                .0
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        UserId(s.to_string())
    }
}

pub trait AuthProvider: Send + Sync {
    fn current_user(&self) -> Option<UserId>;
}

/// Session user from the environment (ops and manual-test entry points).
pub struct EnvAuth;

impl AuthProvider for EnvAuth {
    fn current_user(&self) -> Option<UserId> {
        std::env::var("BUZZ_USER").ok().map(UserId)
    }
}

/// Fixed identity for tests and simulation.
pub struct StaticAuth(pub UserId);

impl AuthProvider for StaticAuth {
    fn current_user(&self) -> Option<UserId> {
        Some(self.0.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_well_formed_ids() {
        assert!(UserId::from("u-123").is_well_formed());
        assert!(UserId::from("Ana_Garcia").is_well_formed());
        assert!(UserId::from(&"a".repeat(64)[..]).is_well_formed());
    }

    #[test]
    fn test_malformed_ids() {
        assert!(!UserId::from("").is_well_formed());
        assert!(!UserId::from("user with spaces").is_well_formed());
        assert!(!UserId::from("semi;colon").is_well_formed());
        assert!(!UserId::from(&"a".repeat(65)[..]).is_well_formed());
    }

    #[test]
    fn test_static_auth_returns_user() {
        let auth = StaticAuth(UserId::from("u-1"));
        assert_eq!(auth.current_user().unwrap().as_str(), "u-1");
    }
}
