//! Reacts to sign-in events.

use shopfront_core::{Credential, StoreId};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::auth::Shopper;
use crate::cart::{CartReconciler, MergeReport};
use crate::notifications::NotificationTokenManager;

/// Runs the cart merge and the token hook whenever the shopper signs in.
pub struct SessionDriver {
    reconciler: CartReconciler,
    tokens: NotificationTokenManager,
    store_id: StoreId,
}

impl SessionDriver {
    #[must_use]
    pub const fn new(
        reconciler: CartReconciler,
        tokens: NotificationTokenManager,
        store_id: StoreId,
    ) -> Self {
        Self {
            reconciler,
            tokens,
            store_id,
        }
    }

    /// Handle one sign-in: merge the local cart, then send any pending
    /// device token. Failures are logged; lines and tokens that did not make
    /// it stay on the device for the next sign-in.
    pub async fn on_sign_in(&self, credential: &Credential) -> Option<MergeReport> {
        let report = match self
            .reconciler
            .merge_on_authentication(credential, self.store_id)
            .await
        {
            Ok(report) => Some(report),
            Err(err) => {
                warn!(store_id = %self.store_id, error = %err, "Cart merge failed");
                None
            }
        };

        match self.tokens.on_authenticated(credential).await {
            Ok(state) => debug!(?state, "Device token state after sign-in"),
            Err(err) => warn!(error = %err, "Device token hook failed"),
        }

        report
    }

    /// Watch `shopper` until the channel closes.
    ///
    /// A shopper who is already signed in when the driver starts is treated
    /// as a fresh sign-in, and so is a switch to another credential.
    pub fn spawn(self, mut shopper: watch::Receiver<Shopper>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut handled: Option<Credential> = None;
            loop {
                let current = shopper.borrow_and_update().clone();
                match current {
                    Shopper::Authenticated(credential) if handled.as_ref() != Some(&credential) => {
                        info!(store_id = %self.store_id, "Sign-in observed");
                        self.on_sign_in(&credential).await;
                        handled = Some(credential);
                    }
                    Shopper::Authenticated(_) => {}
                    Shopper::Anonymous => handled = None,
                }
                if shopper.changed().await.is_err() {
                    break;
                }
            }
            debug!("Auth channel closed; session driver stopped");
        })
    }
}
