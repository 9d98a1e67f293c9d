//! Push-notification device tokens.

use core::fmt;

use serde::{Deserialize, Serialize};

/// An opaque push token handed out by the notification provider.
///
/// Providers may rotate tokens, so a device can see several over its life.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceToken(String);

impl DeviceToken {
    /// Wrap a token. Returns `None` for an empty token.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Option<Self> {
        let token = token.into();
        if token.is_empty() { None } else { Some(Self(token)) }
    }

    /// The token string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Tokens are long; the prefix is enough to correlate log lines.
        let prefix: String = self.0.chars().take(8).collect();
        write!(f, "{prefix}…")
    }
}

/// Where a device is in the registration lifecycle.
///
/// ```text
/// Unregistered ──(grant, signed out)──▶ PendingAuthentication
///      │                                       │
///      └──(grant, signed in)──▶ Registered ◀──(sign-in, delivered)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationState {
    #[default]
    Unregistered,
    PendingAuthentication,
    Registered,
}
