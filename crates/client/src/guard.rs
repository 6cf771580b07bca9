// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pre-render access control for server-rendered pages.
//!
//! Per navigation:
//!
//! ```text
//! no token                        -> Redirect(/)
//! token, requirement not met      -> Redirect(/dashboard)
//! token, page fails on credential -> clear tokens, Redirect(/)
//! token, page fails otherwise     -> Redirect(/error)
//! token, page succeeds            -> Render
//! ```
//!
//! Expected paths are values, not errors: the guard always returns a
//! [`PageOutcome`].

use std::fmt;
use std::future::Future;

use tracing::{debug, warn};

use crate::claims;
use crate::error::ApiError;
use crate::gate::{self, AccessRequirement, Denial};
use crate::store::{self, CredentialStore};
use crate::{ERROR_ROUTE, LANDING_ROUTE, LOGIN_ROUTE};

/// Why a navigation was redirected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedirectReason {
    /// No access token stored.
    Unauthenticated,
    /// Authenticated but the page requirement is not met.
    Forbidden(Denial),
    /// The stored credential was rejected; tokens were cleared.
    CredentialRejected,
    /// The page logic failed for an unrelated reason.
    PageFailed,
    /// Guest-only page visited with a stored token.
    AlreadyAuthenticated,
}

/// Redirect descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirect {
    pub destination: String,
    pub permanent: bool,
    pub reason: RedirectReason,
}

impl Redirect {
    /// Non-permanent redirect to `destination`.
    pub fn to(destination: impl Into<String>, reason: RedirectReason) -> Self {
        Self { destination: destination.into(), permanent: false, reason }
    }
}

/// Result of guarding a page render.
#[derive(Debug, PartialEq, Eq)]
pub enum PageOutcome<T> {
    Render(T),
    Redirect(Redirect),
}

impl<T> PageOutcome<T> {
    pub fn redirect(&self) -> Option<&Redirect> {
        match self {
            Self::Redirect(r) => Some(r),
            Self::Render(_) => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> PageOutcome<U> {
        match self {
            Self::Render(t) => PageOutcome::Render(f(t)),
            Self::Redirect(r) => PageOutcome::Redirect(r),
        }
    }
}

/// Failure raised by wrapped page logic.
#[derive(Debug)]
pub enum PageError {
    /// The credential is invalid or expired beyond recovery.
    Credential(ApiError),
    Other(anyhow::Error),
}

impl PageError {
    pub fn other(e: impl Into<anyhow::Error>) -> Self {
        Self::Other(e.into())
    }
}

impl fmt::Display for PageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Credential(e) => write!(f, "credential rejected: {e}"),
            Self::Other(e) => write!(f, "{e:#}"),
        }
    }
}

impl std::error::Error for PageError {}

impl From<ApiError> for PageError {
    fn from(e: ApiError) -> Self {
        if e.is_credential_failure() {
            Self::Credential(e)
        } else {
            Self::Other(anyhow::Error::new(e))
        }
    }
}

/// Guard for pages that require an authenticated user.
#[derive(Debug, Clone, Default)]
pub struct AccessGuard {
    requirement: Option<AccessRequirement>,
}

impl AccessGuard {
    /// Any authenticated user.
    pub fn authenticated() -> Self {
        Self { requirement: None }
    }

    /// Authenticated users satisfying `requirement`.
    pub fn requiring(requirement: AccessRequirement) -> Self {
        Self { requirement: Some(requirement) }
    }

    pub fn requirement(&self) -> Option<&AccessRequirement> {
        self.requirement.as_ref()
    }

    /// Decide whether `page` may render, running it when it may.
    pub async fn run<T, F, Fut>(&self, store: &dyn CredentialStore, page: F) -> PageOutcome<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, PageError>>,
    {
        let Some(token) = store::access_token(store) else {
            debug!("no access token, redirecting to login");
            return PageOutcome::Redirect(Redirect::to(LOGIN_ROUTE, RedirectReason::Unauthenticated));
        };

        if let Some(ref requirement) = self.requirement {
            let session = match claims::decode_session(&token) {
                Ok(session) => session,
                Err(e) => {
                    warn!(err = %e, "undecodable access token, clearing credentials");
                    store::clear_credentials(store);
                    return PageOutcome::Redirect(Redirect::to(
                        LOGIN_ROUTE,
                        RedirectReason::CredentialRejected,
                    ));
                }
            };
            if let Err(denial) = gate::check(Some(&session), requirement) {
                debug!(email = %session.email, %denial, "requirement not met");
                return PageOutcome::Redirect(Redirect::to(
                    LANDING_ROUTE,
                    RedirectReason::Forbidden(denial),
                ));
            }
        }

        match page().await {
            Ok(props) => PageOutcome::Render(props),
            Err(PageError::Credential(e)) => {
                debug!(err = %e, "page rejected credential, clearing tokens");
                store::clear_credentials(store);
                PageOutcome::Redirect(Redirect::to(LOGIN_ROUTE, RedirectReason::CredentialRejected))
            }
            Err(PageError::Other(e)) => {
                warn!(err = %format!("{e:#}"), "page failed");
                PageOutcome::Redirect(Redirect::to(ERROR_ROUTE, RedirectReason::PageFailed))
            }
        }
    }
}

/// Guard for pages only guests may see (sign-in): authenticated users are
/// sent to the landing page, everyone else gets `page` unchanged.
pub async fn guest_only<T, F, Fut>(store: &dyn CredentialStore, page: F) -> PageOutcome<T>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = PageOutcome<T>>,
{
    if store::access_token(store).is_some() {
        debug!("access token present, redirecting guest page to landing");
        return PageOutcome::Redirect(Redirect::to(
            LANDING_ROUTE,
            RedirectReason::AlreadyAuthenticated,
        ));
    }
    page().await
}

#[cfg(test)]
#[path = "guard_tests.rs"]
mod tests;
