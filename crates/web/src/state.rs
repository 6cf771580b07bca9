// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;

use axum_extra::extract::cookie::CookieJar;

use authgate::broadcast::NoopChannel;
use authgate::client::{self, ApiClient};
use authgate::context::AuthContext;
use authgate::ApiError;

use crate::config::WebConfig;
use crate::cookies::CookieStore;

/// Shared state for all page handlers.
pub struct AppState {
    pub config: WebConfig,
    /// Connection pool shared by every request-scoped [`ApiClient`].
    pub http: reqwest::Client,
}

impl AppState {
    pub fn new(config: WebConfig) -> anyhow::Result<Self> {
        client::install_crypto_provider();
        let http = reqwest::Client::builder().timeout(config.api_timeout()).build()?;
        Ok(Self { config, http })
    }

    /// Credential store over this request's cookies.
    pub fn cookie_store(&self, jar: CookieJar) -> Arc<CookieStore> {
        Arc::new(CookieStore::new(jar, self.config.secure_cookies))
    }

    /// Server-side client: no sign-out hook, refresh writes go to `store`.
    pub fn api_client(&self, store: &Arc<CookieStore>) -> Result<ApiClient, ApiError> {
        ApiClient::builder(&self.config.api_url)
            .http(self.http.clone())
            .store(Arc::clone(store) as _)
            .build()
    }

    /// Session context for form handlers. Rendering happens server-side, so
    /// there are no sibling contexts to notify and nothing to reload.
    pub fn auth_context(&self, store: &Arc<CookieStore>) -> Result<AuthContext, ApiError> {
        AuthContext::new(
            ApiClient::builder(&self.config.api_url).http(self.http.clone()),
            Arc::clone(store) as _,
            Arc::new(NoopChannel),
            Arc::new(|| {}),
        )
    }
}
