// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! API client with transparent access-token refresh.
//!
//! Every request carries the current access token. When the backend answers
//! 401 with `code = "token.expired"`, the request waits on a single shared
//! refresh call and is re-issued once with the new token. Any other 401 is
//! terminal: the bearer is dropped, the sign-out hook runs (when the context
//! has one) and the caller gets [`ApiError::InvalidCredential`].
//!
//! All refresh state (in-flight flight, default credential) is owned by one
//! [`ApiClient`] instance; clones share it.

use std::sync::{Arc, Once};
use std::time::Duration;

use parking_lot::RwLock;
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::error::{ApiError, TOKEN_EXPIRED_CODE};
use crate::singleflight::SingleFlight;
use crate::store::{self, CredentialStore, Credentials, MemoryStore};

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Endpoint exchanging a refresh token for a new credential pair.
pub const REFRESH_PATH: &str = "/refresh";

static CRYPTO_PROVIDER: Once = Once::new();

/// Install the ring rustls provider as the process default, unless another
/// provider is already installed. reqwest panics without one, even for
/// plain-HTTP clients.
pub fn install_crypto_provider() {
    CRYPTO_PROVIDER.call_once(|| {
        if rustls::crypto::CryptoProvider::get_default().is_none() {
            let _ = rustls::crypto::ring::default_provider().install_default();
        }
    });
}

/// Side effect run when the session can no longer be recovered.
///
/// Installed only in contexts that can react to it (a browser-like context);
/// server-side clients leave it unset and surface the error instead.
pub trait SignOutHook: Send + Sync {
    fn sign_out(&self);
}

/// A re-issuable request description.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub body: Option<serde_json::Value>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self { method, path: path.into(), body: None }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>, body: serde_json::Value) -> Self {
        Self { method: Method::POST, path: path.into(), body: Some(body) }
    }
}

/// 401 response body carrying the error discriminator.
#[derive(Debug, Deserialize)]
struct UnauthorizedBody {
    #[serde(default)]
    code: Option<String>,
}

/// Classified response.
enum Reply {
    Ok(reqwest::Response),
    Expired,
    Unauthorized,
}

/// Builder for [`ApiClient`].
pub struct ApiClientBuilder {
    base_url: String,
    timeout: Duration,
    http: Option<reqwest::Client>,
    store: Option<Arc<dyn CredentialStore>>,
    sign_out: Option<Arc<dyn SignOutHook>>,
}

impl ApiClientBuilder {
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Reuse a connection pool; `timeout` is then the pool's own.
    pub fn http(mut self, client: reqwest::Client) -> Self {
        self.http = Some(client);
        self
    }

    /// Credential store shared with the rest of the execution context.
    pub fn store(mut self, store: Arc<dyn CredentialStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn sign_out(mut self, hook: Arc<dyn SignOutHook>) -> Self {
        self.sign_out = Some(hook);
        self
    }

    /// Fails only when a new connection pool cannot be built.
    pub fn build(self) -> Result<ApiClient, ApiError> {
        let store = self.store.unwrap_or_else(|| Arc::new(MemoryStore::new()));
        let default_token = store::access_token(store.as_ref());
        let http = match self.http {
            Some(http) => http,
            None => {
                install_crypto_provider();
                reqwest::Client::builder().timeout(self.timeout).build()?
            }
        };
        Ok(ApiClient {
            inner: Arc::new(Inner {
                base_url: self.base_url.trim_end_matches('/').to_owned(),
                http,
                store,
                default_token: RwLock::new(default_token),
                sign_out: self.sign_out,
                refresh: SingleFlight::new(),
            }),
        })
    }
}

/// Session-aware HTTP client for the backend API.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<Inner>,
}

struct Inner {
    base_url: String,
    http: reqwest::Client,
    store: Arc<dyn CredentialStore>,
    /// Bearer credential attached to newly issued requests.
    default_token: RwLock<Option<String>>,
    sign_out: Option<Arc<dyn SignOutHook>>,
    refresh: SingleFlight<String, ApiError>,
}

impl ApiClient {
    pub fn builder(base_url: impl Into<String>) -> ApiClientBuilder {
        ApiClientBuilder {
            base_url: base_url.into(),
            timeout: DEFAULT_TIMEOUT,
            http: None,
            store: None,
            sign_out: None,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.inner.base_url
    }

    pub fn store(&self) -> &Arc<dyn CredentialStore> {
        &self.inner.store
    }

    /// Bearer credential currently attached to new requests.
    pub fn default_token(&self) -> Option<String> {
        self.inner.default_token()
    }

    /// Replace the bearer credential (after sign-in).
    pub fn set_default_token(&self, token: Option<String>) {
        *self.inner.default_token.write() = token;
    }

    /// Whether a refresh call is outstanding.
    pub fn refresh_in_flight(&self) -> bool {
        self.inner.refresh.in_flight()
    }

    /// Number of refresh calls issued by this client.
    pub fn refresh_count(&self) -> u64 {
        self.inner.refresh.started()
    }

    /// Issue `request`, refreshing the access token and retrying once if it
    /// has expired.
    pub async fn execute(&self, request: &ApiRequest) -> Result<reqwest::Response, ApiError> {
        let issued_with = self.inner.default_token();
        let resp = self.inner.send(request, issued_with.as_deref()).await?;
        match classify(resp).await? {
            Reply::Ok(resp) => Ok(resp),
            Reply::Unauthorized => Err(self.inner.reject()),
            Reply::Expired => {
                let token = self.inner.fresh_token(issued_with.as_deref()).await?;
                debug!(method = %request.method, path = %request.path, "re-issuing with refreshed token");
                let resp = self.inner.send(request, Some(&token)).await?;
                match classify(resp).await? {
                    Reply::Ok(resp) => Ok(resp),
                    Reply::Expired => Err(ApiError::ExpiredCredential),
                    Reply::Unauthorized => Err(self.inner.reject()),
                }
            }
        }
    }

    /// Issue `request` without a credential and without refresh handling.
    pub async fn execute_public(&self, request: &ApiRequest) -> Result<reqwest::Response, ApiError> {
        let resp = self.inner.send(request, None).await?;
        ensure_success(resp).await
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let resp = self.execute(&ApiRequest::get(path)).await?;
        Ok(resp.json().await?)
    }

    pub async fn post_json<T: DeserializeOwned>(
        &self,
        path: &str,
        body: serde_json::Value,
    ) -> Result<T, ApiError> {
        let resp = self.execute(&ApiRequest::post(path, body)).await?;
        Ok(resp.json().await?)
    }
}

impl Inner {
    fn default_token(&self) -> Option<String> {
        self.default_token.read().clone()
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn send(
        &self,
        request: &ApiRequest,
        token: Option<&str>,
    ) -> Result<reqwest::Response, ApiError> {
        let mut req = self.http.request(request.method.clone(), self.url(&request.path));
        if let Some(token) = token {
            req = req.bearer_auth(token);
        }
        if let Some(ref body) = request.body {
            req = req.json(body);
        }
        Ok(req.send().await?)
    }

    /// Terminal 401: drop the bearer, run the sign-out hook and produce the
    /// error callers see.
    fn reject(&self) -> ApiError {
        self.default_token.write().take();
        match self.sign_out {
            Some(ref hook) => {
                info!("credential rejected, signing out");
                hook.sign_out();
            }
            None => debug!("credential rejected"),
        }
        ApiError::InvalidCredential
    }

    /// Obtain a token newer than `stale`, joining or starting the shared refresh.
    async fn fresh_token(self: &Arc<Self>, stale: Option<&str>) -> Result<String, ApiError> {
        if let Some(current) = self.default_token() {
            if stale != Some(current.as_str()) {
                debug!("credential rotated since request was issued, skipping refresh");
                return Ok(current);
            }
        }

        let inner = Arc::clone(self);
        let (result, leader) = self.refresh.run(move || async move { inner.refresh().await }).await;
        if !leader {
            debug!(ok = result.is_ok(), "joined in-flight refresh");
        }
        result
    }

    /// The one refresh call of a flight. Store writes complete before any
    /// waiter observes the new token.
    async fn refresh(&self) -> Result<String, ApiError> {
        info!("access token expired, refreshing");
        match self.request_refresh().await {
            Ok(credentials) => {
                store::write_credentials(self.store.as_ref(), &credentials);
                *self.default_token.write() = Some(credentials.token.clone());
                info!("access token refreshed");
                Ok(credentials.token)
            }
            Err(e) => {
                warn!(err = %e, "token refresh failed");
                self.default_token.write().take();
                if let Some(ref hook) = self.sign_out {
                    hook.sign_out();
                }
                Err(ApiError::RefreshFailed(Arc::new(e)))
            }
        }
    }

    async fn request_refresh(&self) -> Result<Credentials, ApiError> {
        let refresh_token =
            store::refresh_token(self.store.as_ref()).ok_or(ApiError::InvalidCredential)?;
        let request =
            ApiRequest::post(REFRESH_PATH, serde_json::json!({ "refreshToken": refresh_token }));
        let bearer = self.default_token();
        let resp = self.send(&request, bearer.as_deref()).await?;
        let resp = ensure_success(resp).await?;
        Ok(resp.json().await?)
    }
}

/// Split a response into success, expired credential, or rejected credential.
async fn classify(resp: reqwest::Response) -> Result<Reply, ApiError> {
    if resp.status() != StatusCode::UNAUTHORIZED {
        return ensure_success(resp).await.map(Reply::Ok);
    }
    let body = resp.text().await?;
    let code = serde_json::from_str::<UnauthorizedBody>(&body).ok().and_then(|b| b.code);
    if code.as_deref() == Some(TOKEN_EXPIRED_CODE) {
        Ok(Reply::Expired)
    } else {
        debug!(code = code.as_deref().unwrap_or("<none>"), "unauthorized response");
        Ok(Reply::Unauthorized)
    }
}

async fn ensure_success(resp: reqwest::Response) -> Result<reqwest::Response, ApiError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(ApiError::Status { status: status.as_u16(), body })
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
