//! Push notification token registration.
//!
//! A device token is only sent to the backend once the shopper is signed in.
//! Until then it waits under [`PENDING_FCM_TOKEN`]. The value under
//! [`FCM_TOKEN_REGISTERED`] is the last token the backend accepted; the same
//! token is never sent twice.
//!
//! | stored state                      | [`RegistrationState`]   |
//! |-----------------------------------|-------------------------|
//! | pending token present             | `PendingAuthentication` |
//! | registered token, nothing pending | `Registered`            |
//! | neither                           | `Unregistered`          |

use std::sync::Arc;
use std::time::Duration;

use shopfront_core::{Credential, DeviceToken, RegistrationState};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::auth::Shopper;
use crate::error::EngineError;
use crate::kv::{self, FCM_TOKEN_REGISTERED, KeyValueStore, PENDING_FCM_TOKEN};
use crate::remote::DeviceTokenApi;

/// A notification delivered while the app is in the foreground.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForegroundMessage {
    pub title: String,
    pub body: String,
}

/// Displays foreground notifications.
pub trait NotificationSink: Send + Sync {
    fn render(&self, title: &str, body: &str);
}

/// Sink that writes notifications to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl NotificationSink for LogSink {
    fn render(&self, title: &str, body: &str) {
        info!(title, body, "Foreground notification");
    }
}

/// Drives a device through `Unregistered → PendingAuthentication →
/// Registered`.
///
/// Cheap to clone.
#[derive(Clone)]
pub struct NotificationTokenManager {
    inner: Arc<ManagerInner>,
}

struct ManagerInner {
    kv: Arc<dyn KeyValueStore>,
    api: Arc<dyn DeviceTokenApi>,
    sink: Arc<dyn NotificationSink>,
    retry_delay: Duration,
    gate: Mutex<()>,
    retry: Mutex<Option<JoinHandle<()>>>,
}

impl NotificationTokenManager {
    /// Manager that logs foreground notifications.
    #[must_use]
    pub fn new(
        kv: Arc<dyn KeyValueStore>,
        api: Arc<dyn DeviceTokenApi>,
        retry_delay: Duration,
    ) -> Self {
        Self::with_sink(kv, api, retry_delay, Arc::new(LogSink))
    }

    #[must_use]
    pub fn with_sink(
        kv: Arc<dyn KeyValueStore>,
        api: Arc<dyn DeviceTokenApi>,
        retry_delay: Duration,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            inner: Arc::new(ManagerInner {
                kv,
                api,
                sink,
                retry_delay,
                gate: Mutex::new(()),
                retry: Mutex::new(None),
            }),
        }
    }

    /// Current state, derived from persisted values.
    ///
    /// # Errors
    ///
    /// Returns an error if local storage cannot be read.
    pub async fn state(&self) -> Result<RegistrationState, EngineError> {
        let _guard = self.inner.gate.lock().await;
        self.read_state().await
    }

    /// Notification permission was granted and the provider issued `token`.
    ///
    /// Signed-in shoppers register immediately; otherwise the token waits
    /// for the next sign-in.
    ///
    /// # Errors
    ///
    /// Returns an error if local storage fails. Backend failures leave the
    /// device in `PendingAuthentication`.
    #[instrument(skip_all, fields(token = %token))]
    pub async fn on_permission_granted(
        &self,
        token: DeviceToken,
        shopper: &Shopper,
    ) -> Result<RegistrationState, EngineError> {
        let _guard = self.inner.gate.lock().await;

        if self.registered_token().await?.as_ref() == Some(&token) {
            debug!("Token already registered");
            self.inner.kv.delete(PENDING_FCM_TOKEN).await?;
            return Ok(RegistrationState::Registered);
        }

        match shopper {
            Shopper::Authenticated(credential) => self.deliver(token, credential).await,
            Shopper::Anonymous => {
                kv::write_json(self.inner.kv.as_ref(), PENDING_FCM_TOKEN, &token).await?;
                info!("Token cached until sign-in");
                Ok(RegistrationState::PendingAuthentication)
            }
        }
    }

    /// The shopper signed in; send any pending token.
    ///
    /// # Errors
    ///
    /// Returns an error if local storage fails.
    #[instrument(skip_all)]
    pub async fn on_authenticated(
        &self,
        credential: &Credential,
    ) -> Result<RegistrationState, EngineError> {
        let _guard = self.inner.gate.lock().await;

        let Some(token) = self.pending_token().await? else {
            return self.read_state().await;
        };

        if self.registered_token().await?.as_ref() == Some(&token) {
            self.inner.kv.delete(PENDING_FCM_TOKEN).await?;
            return Ok(RegistrationState::Registered);
        }

        self.deliver(token, credential).await
    }

    /// Show a foreground notification. Does not affect registration.
    pub fn on_foreground_message(&self, message: &ForegroundMessage) {
        self.inner.sink.render(&message.title, &message.body);
    }

    /// Wait for a scheduled retry, if any, to finish.
    #[cfg(test)]
    pub(crate) async fn join_retry(&self) {
        let handle = self.inner.retry.lock().await.take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }

    async fn read_state(&self) -> Result<RegistrationState, EngineError> {
        if self.pending_token().await?.is_some() {
            Ok(RegistrationState::PendingAuthentication)
        } else if self.registered_token().await?.is_some() {
            Ok(RegistrationState::Registered)
        } else {
            Ok(RegistrationState::Unregistered)
        }
    }

    async fn registered_token(&self) -> Result<Option<DeviceToken>, EngineError> {
        kv::read_json(self.inner.kv.as_ref(), FCM_TOKEN_REGISTERED).await
    }

    async fn pending_token(&self) -> Result<Option<DeviceToken>, EngineError> {
        kv::read_json(self.inner.kv.as_ref(), PENDING_FCM_TOKEN).await
    }

    async fn mark_registered(&self, token: &DeviceToken) -> Result<(), EngineError> {
        kv::write_json(self.inner.kv.as_ref(), FCM_TOKEN_REGISTERED, token).await?;
        self.inner.kv.delete(PENDING_FCM_TOKEN).await?;
        info!(token = %token, "Device token registered");
        Ok(())
    }

    /// Send `token` once. Must be called with the gate held.
    async fn deliver(
        &self,
        token: DeviceToken,
        credential: &Credential,
    ) -> Result<RegistrationState, EngineError> {
        match self.inner.api.register_device(Some(credential), &token).await {
            Ok(()) => {
                self.mark_registered(&token).await?;
                Ok(RegistrationState::Registered)
            }
            Err(err) => {
                kv::write_json(self.inner.kv.as_ref(), PENDING_FCM_TOKEN, &token).await?;
                let err = EngineError::from(err);
                if err.is_transient() {
                    warn!(error = %err, delay = ?self.inner.retry_delay, "Token registration failed; retrying once");
                    self.schedule_retry(token, credential.clone()).await;
                } else {
                    warn!(error = %err, "Token registration rejected; kept pending");
                }
                Ok(RegistrationState::PendingAuthentication)
            }
        }
    }

    async fn schedule_retry(&self, token: DeviceToken, credential: Credential) {
        let this = self.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(this.inner.retry_delay).await;
            if let Err(err) = this.retry(&token, &credential).await {
                warn!(error = %err, "Token registration retry failed");
            }
        });
        *self.inner.retry.lock().await = Some(handle);
    }

    async fn retry(&self, token: &DeviceToken, credential: &Credential) -> Result<(), EngineError> {
        let _guard = self.inner.gate.lock().await;
        if self.pending_token().await?.as_ref() != Some(token) {
            debug!("Pending token changed before retry");
            return Ok(());
        }
        match self.inner.api.register_device(Some(credential), token).await {
            Ok(()) => self.mark_registered(token).await,
            Err(err) => {
                warn!(error = %err, "Token registration retry failed; waiting for next sign-in");
                Ok(())
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use std::sync::Mutex as StdMutex;

    use super::*;
    use crate::kv::MemoryKeyValueStore;
    use crate::testing::{Failure, FakeBackend, credential};

    fn token(value: &str) -> DeviceToken {
        DeviceToken::new(value).unwrap()
    }

    fn manager() -> (Arc<FakeBackend>, Arc<MemoryKeyValueStore>, NotificationTokenManager) {
        let backend = Arc::new(FakeBackend::new());
        let kv = Arc::new(MemoryKeyValueStore::new());
        let manager =
            NotificationTokenManager::new(kv.clone(), backend.clone(), Duration::from_secs(30));
        (backend, kv, manager)
    }

    #[tokio::test]
    async fn test_anonymous_grant_waits_for_sign_in() {
        let (backend, kv, manager) = manager();
        assert_eq!(manager.state().await.unwrap(), RegistrationState::Unregistered);

        let state = manager
            .on_permission_granted(token("device-a"), &Shopper::Anonymous)
            .await
            .unwrap();
        assert_eq!(state, RegistrationState::PendingAuthentication);
        assert!(backend.registrations().is_empty());
        assert!(kv.get(PENDING_FCM_TOKEN).await.unwrap().is_some());

        let state = manager.on_authenticated(&credential("alice")).await.unwrap();
        assert_eq!(state, RegistrationState::Registered);
        assert_eq!(backend.registrations().len(), 1);
        assert_eq!(kv.get(PENDING_FCM_TOKEN).await.unwrap(), None);
        assert_eq!(
            kv.get(FCM_TOKEN_REGISTERED).await.unwrap().as_deref(),
            Some("\"device-a\"")
        );
    }

    #[tokio::test]
    async fn test_signed_in_grant_registers_immediately() {
        let (backend, _kv, manager) = manager();
        let shopper = Shopper::Authenticated(credential("alice"));
        let state = manager
            .on_permission_granted(token("device-a"), &shopper)
            .await
            .unwrap();
        assert_eq!(state, RegistrationState::Registered);

        let registrations = backend.registrations();
        assert_eq!(registrations.len(), 1);
        assert_eq!(registrations[0].0.as_deref(), Some("alice"));
    }

    #[tokio::test]
    async fn test_registered_token_not_sent_again() {
        let (backend, _kv, manager) = manager();
        let shopper = Shopper::Authenticated(credential("alice"));
        manager
            .on_permission_granted(token("device-a"), &shopper)
            .await
            .unwrap();
        manager
            .on_permission_granted(token("device-a"), &shopper)
            .await
            .unwrap();
        manager.on_authenticated(&credential("alice")).await.unwrap();
        assert_eq!(backend.registrations().len(), 1);

        // A rotated token is a new registration.
        manager
            .on_permission_granted(token("device-b"), &shopper)
            .await
            .unwrap();
        assert_eq!(backend.registrations().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failure_retried_once() {
        let (backend, _kv, manager) = manager();
        manager
            .on_permission_granted(token("device-a"), &Shopper::Anonymous)
            .await
            .unwrap();

        backend.fail_next(Failure::Unavailable);
        let state = manager.on_authenticated(&credential("alice")).await.unwrap();
        assert_eq!(state, RegistrationState::PendingAuthentication);

        manager.join_retry().await;
        assert_eq!(manager.state().await.unwrap(), RegistrationState::Registered);
        assert_eq!(backend.registrations().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_retry_stays_pending() {
        let (backend, _kv, manager) = manager();
        manager
            .on_permission_granted(token("device-a"), &Shopper::Anonymous)
            .await
            .unwrap();

        backend.fail_next(Failure::Timeout);
        backend.fail_next(Failure::Timeout);
        manager.on_authenticated(&credential("alice")).await.unwrap();
        manager.join_retry().await;

        assert_eq!(
            manager.state().await.unwrap(),
            RegistrationState::PendingAuthentication
        );
        assert!(backend.registrations().is_empty());

        // The next sign-in tries again.
        let state = manager.on_authenticated(&credential("alice")).await.unwrap();
        assert_eq!(state, RegistrationState::Registered);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejection_not_retried() {
        let (backend, _kv, manager) = manager();
        manager
            .on_permission_granted(token("device-a"), &Shopper::Anonymous)
            .await
            .unwrap();

        backend.fail_next(Failure::BadRequest);
        let state = manager.on_authenticated(&credential("alice")).await.unwrap();
        assert_eq!(state, RegistrationState::PendingAuthentication);
        manager.join_retry().await;
        assert!(backend.registrations().is_empty());
    }

    #[tokio::test]
    async fn test_sign_in_without_token_is_noop() {
        let (backend, _kv, manager) = manager();
        let state = manager.on_authenticated(&credential("alice")).await.unwrap();
        assert_eq!(state, RegistrationState::Unregistered);
        assert!(backend.registrations().is_empty());
    }

    #[derive(Default)]
    struct RecordingSink(StdMutex<Vec<(String, String)>>);

    impl NotificationSink for RecordingSink {
        fn render(&self, title: &str, body: &str) {
            self.0
                .lock()
                .unwrap()
                .push((title.to_string(), body.to_string()));
        }
    }

    #[tokio::test]
    async fn test_foreground_message_rendered_without_state_change() {
        let sink = Arc::new(RecordingSink::default());
        let manager = NotificationTokenManager::with_sink(
            Arc::new(MemoryKeyValueStore::new()),
            Arc::new(FakeBackend::new()),
            Duration::from_secs(30),
            sink.clone(),
        );
        manager.on_foreground_message(&ForegroundMessage {
            title: "Back in stock".to_string(),
            body: "Your item is available".to_string(),
        });
        assert_eq!(sink.0.lock().unwrap().len(), 1);
        assert_eq!(manager.state().await.unwrap(), RegistrationState::Unregistered);
    }
}
