use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::api::{is_session_expired, ApiClient, Result};
use crate::models::{AccessCredential, SessionUser};

/// Coarse lifecycle position of the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SessionPhase {
    Initializing,
    Authenticated,
    Anonymous,
}

/// Snapshot of the session as seen by UI consumers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionState {
    /// True only while the startup refresh is in flight
    pub loading: bool,
    pub access_token: Option<AccessCredential>,
    pub user: Option<SessionUser>,
}

impl SessionState {
    pub fn phase(&self) -> SessionPhase {
        if self.loading {
            SessionPhase::Initializing
        } else if self.access_token.is_some() {
            SessionPhase::Authenticated
        } else {
            SessionPhase::Anonymous
        }
    }

    /// Route guard rule: no credential and not still starting up.
    pub fn requires_login(&self) -> bool {
        !self.loading && self.access_token.is_none()
    }
}

/// Process-wide session state with a single writer.
///
/// Readers either take snapshots with [`state`](Self::state) or follow
/// changes through [`subscribe`](Self::subscribe). State only moves through
/// `initialize`, `login`, `logout`, and `refresh`.
pub struct SessionContext {
    client: ApiClient,
    state: watch::Sender<SessionState>,
    disposed: CancellationToken,
}

impl SessionContext {
    /// Create a context in the `Initializing` phase. Whatever credential the
    /// store already holds is mirrored until startup settles.
    pub fn new(client: ApiClient) -> Self {
        let stored = client.credentials().get().unwrap_or_else(|e| {
            warn!(error = %e, "Could not read stored credential");
            None
        });
        let (state, _) = watch::channel(SessionState {
            loading: true,
            access_token: stored,
            user: None,
        });
        Self {
            client,
            state,
            disposed: CancellationToken::new(),
        }
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn phase(&self) -> SessionPhase {
        self.state.borrow().phase()
    }

    pub fn loading(&self) -> bool {
        self.state.borrow().loading
    }

    pub fn access_token(&self) -> Option<AccessCredential> {
        self.state.borrow().access_token.clone()
    }

    pub fn user(&self) -> Option<SessionUser> {
        self.state.borrow().user.clone()
    }

    /// Startup: try to resume a session from the session cookie.
    ///
    /// Never fails. Any error clears the store and lands in `Anonymous`. If
    /// the context is disposed before startup settles, the outcome is
    /// dropped: state is left untouched and the store is put back the way it
    /// was.
    pub async fn initialize(&self) -> SessionPhase {
        let previous = self.client.credentials().get().unwrap_or_else(|e| {
            warn!(error = %e, "Could not read stored credential");
            None
        });

        let renewed = tokio::select! {
            _ = self.disposed.cancelled() => None,
            result = self.client.renew_access() => Some(result),
        };
        let outcome = match renewed {
            // Not raced against dispose: adopt either completes or rolls back
            Some(Ok(access)) if !self.is_disposed() => {
                Some(self.adopt(&access).await.map(|user| (access, user)))
            }
            Some(Err(e)) => Some(Err(e)),
            _ => None,
        };

        if self.is_disposed() {
            debug!("Session disposed during initialization, discarding result");
            if matches!(outcome, Some(Ok(_))) {
                self.restore(previous);
            }
            return self.phase();
        }
        let Some(outcome) = outcome else {
            return self.phase();
        };

        match outcome {
            Ok((access, user)) => {
                info!(user = %user.email, "Session resumed");
                self.publish(false, Some(access), Some(user));
            }
            Err(e) => {
                if is_session_expired(&e) {
                    info!("No active session, starting anonymous");
                } else {
                    warn!(error = %e, "Session resume failed, starting anonymous");
                }
                if let Err(e) = self.client.credentials().clear() {
                    warn!(error = %e, "Failed to clear stored credential");
                }
                self.publish(false, None, None);
            }
        }
        self.phase()
    }

    /// Run [`initialize`](Self::initialize) on the runtime, the way a UI
    /// kicks off startup without awaiting it.
    pub fn spawn_initialize(self: &Arc<Self>) -> JoinHandle<SessionPhase> {
        let session = Arc::clone(self);
        tokio::spawn(async move { session.initialize().await })
    }

    /// Log in with email and password.
    ///
    /// On failure the error is returned and neither the store nor the
    /// published state changes.
    pub async fn login(&self, email: &str, password: &str) -> Result<()> {
        let access = self.client.login(email, password).await?;
        let user = self.adopt(&access).await?;
        info!(user = %user.email, "Logged in");
        self.publish(false, Some(access), Some(user));
        Ok(())
    }

    /// Force a credential rotation and reload the user.
    pub async fn refresh(&self) -> Result<()> {
        let (access, user) = self.resume().await?;
        debug!("Session refreshed");
        self.publish(false, Some(access), Some(user));
        Ok(())
    }

    /// End the session. Always succeeds locally; a failed server-side
    /// invalidation is only logged.
    pub async fn logout(&self) {
        if let Err(e) = self.client.logout().await {
            warn!(error = %e, "Server-side logout failed, clearing local session anyway");
        }
        if let Err(e) = self.client.credentials().clear() {
            warn!(error = %e, "Failed to clear stored credential");
        }
        info!("Logged out");
        self.state.send_modify(|state| {
            state.access_token = None;
            state.user = None;
        });
    }

    /// Tear the context down. An in-flight initialization discards its result.
    pub fn dispose(&self) {
        self.disposed.cancel();
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.is_cancelled()
    }

    /// Handshake, refresh, store, fetch user.
    async fn resume(&self) -> Result<(AccessCredential, SessionUser)> {
        let access = self.client.renew_access().await?;
        let user = self.adopt(&access).await?;
        Ok((access, user))
    }

    /// Make `access` the stored credential and load the user with it. If the
    /// user can't be loaded the previous credential is put back.
    async fn adopt(&self, access: &AccessCredential) -> Result<SessionUser> {
        let credentials = self.client.credentials();
        let previous = credentials.get()?;
        credentials.set(access)?;

        match self.client.fetch_me().await {
            Ok(user) => Ok(user),
            Err(e) => {
                self.restore(previous);
                Err(e)
            }
        }
    }

    fn restore(&self, previous: Option<AccessCredential>) {
        let credentials = self.client.credentials();
        let restored = match previous {
            Some(ref prev) => credentials.set(prev),
            None => credentials.clear(),
        };
        if let Err(e) = restored {
            warn!(error = %e, "Failed to restore previous credential");
        }
    }

    pub(crate) fn publish(&self, loading: bool, access_token: Option<AccessCredential>, user: Option<SessionUser>) {
        self.state.send_replace(SessionState {
            loading,
            access_token,
            user,
        });
    }
}
