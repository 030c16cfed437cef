//! Session state holder
//!
//! Tracks whether the app has a signed-in user and publishes every
//! transition through a `watch` channel, so UI layers can re-render on change.
//!
//! ```text
//! Loading ──restore──▶ Unauthenticated | Authenticated
//!    ▲
//!    └── sign_in / sign_up / sign_in_with_external_provider ──▶ Authenticated | Error
//! any ──sign_out──▶ Unauthenticated
//! ```
//!
//! Operations on one session run one at a time, so the published state always
//! matches the provider's actual session.

use crate::auth::types::User;
use crate::auth::IdentityProvider;
use crate::error::ClientError;
use async_stream::stream;
use futures::Stream;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tracing::{debug, warn};

/// Authentication status
#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    /// Startup check or an auth call is in progress
    Loading,
    /// No user is signed in
    Unauthenticated,
    /// A user is signed in
    Authenticated(Arc<User>),
    /// The last auth call failed
    Error(String),
}

impl SessionState {
    /// Signed-in user, if any
    pub fn user(&self) -> Option<&Arc<User>> {
        match self {
            Self::Authenticated(user) => Some(user),
            _ => None,
        }
    }

    /// Whether a user is signed in
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated(_))
    }
}

/// Session state holder
///
/// Cheap to clone; clones share state and the operation lock.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    provider: Arc<dyn IdentityProvider>,
    state_tx: watch::Sender<SessionState>,
    op_lock: Mutex<()>,
}

impl Session {
    /// Create a holder in the `Loading` state
    ///
    /// Call [`Session::restore`] once to resolve the initial state.
    pub fn new(provider: Arc<dyn IdentityProvider>) -> Self {
        let (state_tx, _) = watch::channel(SessionState::Loading);
        Self {
            inner: Arc::new(SessionInner {
                provider,
                state_tx,
                op_lock: Mutex::new(()),
            }),
        }
    }

    /// Resolve the initial `Loading` state from the provider's persisted user
    ///
    /// Has no effect once any operation has already moved the state on.
    pub async fn restore(&self) -> SessionState {
        let _guard = self.inner.op_lock.lock().await;
        if self.state() != SessionState::Loading {
            return self.state();
        }

        let next = match self.inner.provider.current_user().await {
            Some(user) => SessionState::Authenticated(user),
            None => SessionState::Unauthenticated,
        };
        self.publish(next.clone());
        next
    }

    /// Current state
    pub fn state(&self) -> SessionState {
        self.inner.state_tx.borrow().clone()
    }

    /// Receiver that observes every published state
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.inner.state_tx.subscribe()
    }

    /// Stream of states: the current one first, then each change
    ///
    /// A slow consumer sees the latest state, not every intermediate one.
    pub fn state_changes(&self) -> Pin<Box<dyn Stream<Item = SessionState> + Send>> {
        let mut rx = self.subscribe();

        Box::pin(stream! {
            let current = rx.borrow_and_update().clone();
            yield current;

            while rx.changed().await.is_ok() {
                let next = rx.borrow_and_update().clone();
                yield next;
            }
        })
    }

    /// Sign in with email and password
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Arc<User>, ClientError> {
        let provider = Arc::clone(&self.inner.provider);
        self.authenticate("Sign in failed", async move {
            provider.sign_in_with_email(email, password).await
        })
        .await
    }

    /// Create an account with email and password
    pub async fn sign_up(&self, email: &str, password: &str) -> Result<Arc<User>, ClientError> {
        let provider = Arc::clone(&self.inner.provider);
        self.authenticate("Sign up failed", async move {
            provider.sign_up_with_email(email, password).await
        })
        .await
    }

    /// Exchange an ID token from the external (Google) sign-in flow
    pub async fn sign_in_with_external_provider(&self, id_token: &str) -> Result<Arc<User>, ClientError> {
        let provider = Arc::clone(&self.inner.provider);
        self.authenticate("Google sign-in failed", async move {
            provider.sign_in_with_external_token(id_token).await
        })
        .await
    }

    /// Sign out
    ///
    /// Always ends in `Unauthenticated`; provider failures are logged only.
    pub async fn sign_out(&self) {
        let _guard = self.inner.op_lock.lock().await;
        if let Err(err) = self.inner.provider.sign_out().await {
            warn!(error = %err, "provider sign-out failed; clearing local session anyway");
        }
        self.publish(SessionState::Unauthenticated);
    }

    async fn authenticate<F>(&self, fallback: &str, call: F) -> Result<Arc<User>, ClientError>
    where
        F: Future<Output = Result<Arc<User>, ClientError>>,
    {
        let _guard = self.inner.op_lock.lock().await;
        self.publish(SessionState::Loading);

        match call.await {
            Ok(user) => {
                self.publish(SessionState::Authenticated(Arc::clone(&user)));
                Ok(user)
            }
            Err(err) => {
                self.publish(SessionState::Error(err.user_message(fallback)));
                Err(err)
            }
        }
    }

    fn publish(&self, state: SessionState) {
        debug!(?state, "session state");
        self.inner.state_tx.send_replace(state);
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session").field("state", &self.state()).finish()
    }
}
