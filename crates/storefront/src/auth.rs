//! Shopper identity as seen by the engine.
//!
//! The authentication collaborator owns sign-in; the engine only observes the
//! current credential through an [`AuthChannel`] and reacts to changes.

use shopfront_core::Credential;
use tokio::sync::watch;

/// Who is operating the cart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Shopper {
    /// No credential: carts live on the device.
    Anonymous,
    /// Signed in: carts live on the backend.
    Authenticated(Credential),
}

impl Shopper {
    /// The shopper's credential, if signed in.
    #[must_use]
    pub const fn credential(&self) -> Option<&Credential> {
        match self {
            Self::Anonymous => None,
            Self::Authenticated(credential) => Some(credential),
        }
    }

    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated(_))
    }
}

impl From<Option<Credential>> for Shopper {
    fn from(credential: Option<Credential>) -> Self {
        credential.map_or(Self::Anonymous, Self::Authenticated)
    }
}

/// Broadcasts the current shopper to every interested task.
///
/// Receivers see the latest value only; a sign-in immediately followed by a
/// sign-out may be observed as the sign-out alone.
#[derive(Debug, Clone)]
pub struct AuthChannel {
    tx: watch::Sender<Shopper>,
}

impl AuthChannel {
    /// Start anonymous.
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(Shopper::Anonymous);
        Self { tx }
    }

    /// Record a sign-in.
    pub fn sign_in(&self, credential: Credential) {
        tracing::info!("Shopper signed in");
        self.tx.send_replace(Shopper::Authenticated(credential));
    }

    /// Record a sign-out.
    pub fn sign_out(&self) {
        tracing::info!("Shopper signed out");
        self.tx.send_replace(Shopper::Anonymous);
    }

    /// The current shopper.
    #[must_use]
    pub fn current(&self) -> Shopper {
        self.tx.borrow().clone()
    }

    /// Subscribe to changes. The receiver starts with the current value
    /// marked as seen.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Shopper> {
        self.tx.subscribe()
    }
}

impl Default for AuthChannel {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sign_in_notifies_subscribers() {
        let auth = AuthChannel::new();
        let mut rx = auth.subscribe();
        assert!(!auth.current().is_authenticated());

        auth.sign_in(Credential::new("token").unwrap());
        rx.changed().await.unwrap();
        assert!(rx.borrow_and_update().is_authenticated());

        auth.sign_out();
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), Shopper::Anonymous);
    }

    #[test]
    fn test_shopper_from_credential() {
        assert_eq!(Shopper::from(None), Shopper::Anonymous);
        let shopper = Shopper::from(Credential::new("t"));
        assert_eq!(shopper.credential().unwrap().expose(), "t");
    }
}
