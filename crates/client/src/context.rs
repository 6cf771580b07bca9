// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Client-side session state for one execution context.
//!
//! The session itself is never persisted: only the credentials are. On load
//! the context reconstructs its [`Session`] from `GET /me`; on sign-in it takes
//! the claims returned by `POST /sessions`.

use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::broadcast::{Reload, SessionBroadcaster, SessionChannel};
use crate::claims::Session;
use crate::client::{ApiClient, ApiClientBuilder, ApiRequest, SignOutHook};
use crate::error::ApiError;
use crate::gate::{self, AccessRequirement};
use crate::store::{self, CredentialStore, Credentials};

/// Endpoint creating a session from email and password.
pub const SESSIONS_PATH: &str = "/sessions";

/// Endpoint returning the claims of the current session.
pub const ME_PATH: &str = "/me";

/// Sign-in form payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignInCredentials {
    pub email: String,
    pub password: String,
}

/// `POST /sessions` response.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionResponse {
    token: String,
    refresh_token: String,
    #[serde(default)]
    permissions: Vec<String>,
    #[serde(default)]
    roles: Vec<String>,
}

type SharedSession = Arc<RwLock<Option<Arc<Session>>>>;

/// Sign-out hook of a context's client: the client has already dropped its
/// bearer, so only the session and the other contexts are left to reset.
struct SessionReset {
    session: SharedSession,
    broadcaster: Arc<SessionBroadcaster>,
}

impl SignOutHook for SessionReset {
    fn sign_out(&self) {
        self.session.write().take();
        self.broadcaster.signal_signed_out();
    }
}

/// Session state, API client, and broadcaster of one execution context.
pub struct AuthContext {
    api: ApiClient,
    broadcaster: Arc<SessionBroadcaster>,
    session: SharedSession,
}

impl AuthContext {
    /// Wire a context. An unrecoverable credential failure on any request
    /// signs the whole context out.
    pub fn new(
        client: ApiClientBuilder,
        store: Arc<dyn CredentialStore>,
        channel: Arc<dyn SessionChannel>,
        reload: Arc<dyn Reload>,
    ) -> Result<Self, ApiError> {
        let broadcaster = Arc::new(SessionBroadcaster::new(channel, Arc::clone(&store), reload));
        let session: SharedSession = Arc::new(RwLock::new(None));
        let hook =
            Arc::new(SessionReset { session: Arc::clone(&session), broadcaster: Arc::clone(&broadcaster) });
        let api = client.store(store).sign_out(hook).build()?;
        Ok(Self { api, broadcaster, session })
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn broadcaster(&self) -> &Arc<SessionBroadcaster> {
        &self.broadcaster
    }

    /// Start reacting to sibling contexts' sign-in/sign-out.
    pub fn listen(&self, shutdown: CancellationToken) {
        if self.broadcaster.listen(shutdown).is_none() {
            info!("no inter-context channel, session sync disabled");
        }
    }

    pub fn session(&self) -> Option<Arc<Session>> {
        self.session.read().clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.read().is_some()
    }

    /// Client-side counterpart of the page guard, for conditional rendering.
    pub fn can(&self, required: &AccessRequirement) -> bool {
        let session = self.session();
        gate::has_access(session.as_deref(), required)
    }

    /// Authenticate with email and password.
    ///
    /// Bypasses refresh handling: there is no credential to refresh yet, and
    /// a wrong password must not end a session.
    pub async fn sign_in(&self, credentials: &SignInCredentials) -> Result<Arc<Session>, ApiError> {
        let body = serde_json::json!({
            "email": credentials.email,
            "password": credentials.password,
        });
        let resp = self.api.execute_public(&ApiRequest::post(SESSIONS_PATH, body)).await?;
        let data: SessionResponse = resp.json().await?;

        let pair = Credentials { token: data.token, refresh_token: data.refresh_token };
        store::write_credentials(self.api.store().as_ref(), &pair);
        self.api.set_default_token(Some(pair.token));

        let session = Arc::new(Session::new(&credentials.email, data.permissions, data.roles));
        *self.session.write() = Some(Arc::clone(&session));
        info!(email = %session.email, "signed in");
        self.broadcaster.signal_signed_in();
        Ok(session)
    }

    /// Rebuild the session from stored credentials.
    ///
    /// Returns `Ok(None)` without a stored token. Any failure leaves the
    /// context signed out.
    pub async fn restore(&self) -> Result<Option<Arc<Session>>, ApiError> {
        if store::access_token(self.api.store().as_ref()).is_none() {
            return Ok(None);
        }
        match self.api.get_json::<Session>(ME_PATH).await {
            Ok(session) => {
                let session = Arc::new(session);
                *self.session.write() = Some(Arc::clone(&session));
                Ok(Some(session))
            }
            Err(e) => {
                warn!(err = %e, "failed to restore session");
                // Still holding credentials means the sign-out hook did not run.
                if store::access_token(self.api.store().as_ref()).is_some() {
                    self.sign_out();
                }
                Err(e)
            }
        }
    }

    /// Drop the session and sign out every context.
    pub fn sign_out(&self) {
        self.session.write().take();
        self.api.set_default_token(None);
        self.broadcaster.signal_signed_out();
    }
}

#[cfg(test)]
#[path = "context_tests.rs"]
mod tests;
