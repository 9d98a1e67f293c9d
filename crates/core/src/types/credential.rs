//! Opaque bearer credentials.
//!
//! The engine never parses a credential; it only forwards it to the backend
//! and checks whether one is present.

use serde::{Deserialize, Serialize};

/// A bearer credential issued by the authentication collaborator.
///
/// Implements `Debug` manually so the token never reaches logs.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Credential(String);

impl Credential {
    /// Wrap a bearer token. Returns `None` for an empty or blank token, which
    /// the engine treats as "no credential".
    #[must_use]
    pub fn new(token: impl Into<String>) -> Option<Self> {
        let token = token.into();
        if token.trim().is_empty() {
            None
        } else {
            Some(Self(token))
        }
    }

    /// The raw token, for building an `Authorization` header.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Credential([REDACTED])")
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_is_absent() {
        assert!(Credential::new("").is_none());
        assert!(Credential::new("   ").is_none());
    }

    #[test]
    fn test_debug_redacts() {
        let credential = Credential::new("s3cr3t-token").unwrap();
        let debug = format!("{credential:?}");
        assert!(!debug.contains("s3cr3t"));
        assert_eq!(credential.expose(), "s3cr3t-token");
    }
}
