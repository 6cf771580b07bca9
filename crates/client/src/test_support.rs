// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Mock backend API and token helpers for tests.
//!
//! [`MockApi`] serves `/sessions`, `/me`, `/refresh` and `/boom` on an
//! ephemeral port, issuing JWT-shaped tokens whose claims decode with
//! [`crate::claims::decode_claims`]. Access tokens can be expired or revoked
//! on demand to drive the refresh paths.

use std::collections::HashMap;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::json;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::error::TOKEN_EXPIRED_CODE;
use crate::store::Credentials;

static MINTED: AtomicU64 = AtomicU64::new(0);

/// Mint a unique unsigned JWT-shaped token carrying the given claims.
pub fn mint_token(email: &str, permissions: &[&str], roles: &[&str]) -> String {
    let jti = MINTED.fetch_add(1, Ordering::Relaxed);
    let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"none","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(
        json!({ "sub": email, "permissions": permissions, "roles": roles, "jti": jti }).to_string(),
    );
    format!("{header}.{payload}.sig{jti}")
}

/// Poll `cond` until it holds or `timeout` elapses.
pub async fn wait_until(timeout: Duration, cond: impl Fn() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if cond() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

#[derive(Debug, Clone)]
struct MockUser {
    password: String,
    permissions: Vec<String>,
    roles: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TokenState {
    Valid,
    Expired,
}

#[derive(Default)]
struct MockState {
    users: Mutex<HashMap<String, MockUser>>,
    /// Access token -> (owner, state). Unknown tokens are invalid.
    access: Mutex<HashMap<String, (String, TokenState)>>,
    /// Refresh token -> owner. Consumed on use.
    refresh: Mutex<HashMap<String, String>>,
    refresh_calls: AtomicU32,
    fail_refresh: AtomicBool,
    refresh_delay: Mutex<Duration>,
    me_bearers: Mutex<Vec<Option<String>>>,
    refresh_bearers: Mutex<Vec<Option<String>>>,
}

impl MockState {
    fn issue(&self, email: &str) -> Credentials {
        let (permissions, roles) = match self.users.lock().get(email) {
            Some(u) => (u.permissions.clone(), u.roles.clone()),
            None => (vec![], vec![]),
        };
        let perms: Vec<&str> = permissions.iter().map(String::as_str).collect();
        let roles: Vec<&str> = roles.iter().map(String::as_str).collect();
        let token = mint_token(email, &perms, &roles);
        let refresh_token = format!("refresh-{}", MINTED.fetch_add(1, Ordering::Relaxed));
        self.access.lock().insert(token.clone(), (email.to_owned(), TokenState::Valid));
        self.refresh.lock().insert(refresh_token.clone(), email.to_owned());
        Credentials { token, refresh_token }
    }

    fn session_body(&self, email: &str, credentials: Option<&Credentials>) -> serde_json::Value {
        let (permissions, roles) = match self.users.lock().get(email) {
            Some(u) => (u.permissions.clone(), u.roles.clone()),
            None => (vec![], vec![]),
        };
        match credentials {
            Some(c) => json!({
                "token": c.token,
                "refreshToken": c.refresh_token,
                "permissions": permissions,
                "roles": roles,
            }),
            None => json!({ "email": email, "permissions": permissions, "roles": roles }),
        }
    }
}

fn bearer(headers: &HeaderMap) -> Option<String> {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::to_owned)
}

fn unauthorized(code: &str) -> Response {
    (StatusCode::UNAUTHORIZED, Json(json!({ "error": true, "code": code }))).into_response()
}

#[derive(Deserialize)]
struct SignInBody {
    email: String,
    password: String,
}

async fn sessions(State(s): State<Arc<MockState>>, Json(body): Json<SignInBody>) -> Response {
    let matches =
        s.users.lock().get(&body.email).is_some_and(|u| u.password == body.password);
    if !matches {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": true, "message": "E-mail or password incorrect." })),
        )
            .into_response();
    }
    let credentials = s.issue(&body.email);
    Json(s.session_body(&body.email, Some(&credentials))).into_response()
}

async fn me(State(s): State<Arc<MockState>>, headers: HeaderMap) -> Response {
    let token = bearer(&headers);
    s.me_bearers.lock().push(token.clone());
    let entry = token.and_then(|t| s.access.lock().get(&t).cloned());
    match entry {
        Some((email, TokenState::Valid)) => Json(s.session_body(&email, None)).into_response(),
        Some((_, TokenState::Expired)) => unauthorized(TOKEN_EXPIRED_CODE),
        None => unauthorized("token.invalid"),
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshBody {
    refresh_token: String,
}

async fn refresh(
    State(s): State<Arc<MockState>>,
    headers: HeaderMap,
    Json(body): Json<RefreshBody>,
) -> Response {
    s.refresh_calls.fetch_add(1, Ordering::SeqCst);
    s.refresh_bearers.lock().push(bearer(&headers));
    let delay = *s.refresh_delay.lock();
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
    if s.fail_refresh.load(Ordering::SeqCst) {
        return unauthorized("refresh_token.invalid");
    }
    let owner = s.refresh.lock().remove(&body.refresh_token);
    match owner {
        Some(email) => {
            let credentials = s.issue(&email);
            Json(s.session_body(&email, Some(&credentials))).into_response()
        }
        None => unauthorized("refresh_token.invalid"),
    }
}

async fn boom() -> Response {
    (StatusCode::INTERNAL_SERVER_ERROR, "boom").into_response()
}

/// Backend API double bound on `127.0.0.1`. Stops serving when dropped.
pub struct MockApi {
    addr: SocketAddr,
    state: Arc<MockState>,
    shutdown: CancellationToken,
}

impl MockApi {
    pub async fn start() -> anyhow::Result<Self> {
        crate::client::install_crypto_provider();
        let state = Arc::new(MockState::default());
        let app = Router::new()
            .route("/sessions", post(sessions))
            .route("/me", get(me))
            .route("/refresh", post(refresh))
            .route("/boom", get(boom))
            .with_state(Arc::clone(&state));

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let shutdown = CancellationToken::new();
        let sd = shutdown.clone();
        tokio::spawn(async move {
            axum::serve(listener, app).with_graceful_shutdown(sd.cancelled_owned()).await.ok();
        });
        Ok(Self { addr, state, shutdown })
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Register a user that can sign in with `password`.
    pub fn add_user(&self, email: &str, password: &str, permissions: &[&str], roles: &[&str]) {
        self.state.users.lock().insert(
            email.to_owned(),
            MockUser {
                password: password.to_owned(),
                permissions: permissions.iter().map(|p| (*p).to_owned()).collect(),
                roles: roles.iter().map(|r| (*r).to_owned()).collect(),
            },
        );
    }

    /// Issue a credential pair for `email` without going through sign-in.
    pub fn issue(&self, email: &str) -> Credentials {
        self.state.issue(email)
    }

    /// Make `token` answer `401 token.expired` from now on.
    pub fn expire(&self, token: &str) {
        if let Some(entry) = self.state.access.lock().get_mut(token) {
            entry.1 = TokenState::Expired;
        }
    }

    /// Forget `token` entirely so it answers `401 token.invalid`.
    pub fn revoke(&self, token: &str) {
        self.state.access.lock().remove(token);
    }

    pub fn fail_refresh(&self, fail: bool) {
        self.state.fail_refresh.store(fail, Ordering::SeqCst);
    }

    /// Hold each `/refresh` response for `delay`.
    pub fn set_refresh_delay(&self, delay: Duration) {
        *self.state.refresh_delay.lock() = delay;
    }

    pub fn refresh_calls(&self) -> u32 {
        self.state.refresh_calls.load(Ordering::SeqCst)
    }

    /// Bearer tokens presented to `/me`, in arrival order.
    pub fn me_bearers(&self) -> Vec<Option<String>> {
        self.state.me_bearers.lock().clone()
    }

    /// Bearer tokens presented to `/refresh`, in arrival order.
    pub fn refresh_bearers(&self) -> Vec<Option<String>> {
        self.state.refresh_bearers.lock().clone()
    }
}

impl Drop for MockApi {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// Run `f` concurrently `n` times and collect the results in spawn order.
pub async fn concurrently<T, F, Fut>(n: usize, f: F) -> Vec<T>
where
    F: Fn(usize) -> Fut,
    Fut: Future<Output = T>,
{
    futures_util::future::join_all((0..n).map(f)).await
}
