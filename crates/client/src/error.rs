// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::fmt;
use std::sync::Arc;

/// Discriminator value on a 401 body that selects the refresh path.
pub const TOKEN_EXPIRED_CODE: &str = "token.expired";

/// Failure of a request issued through [`crate::ApiClient`].
///
/// `Clone` so that a single refresh failure can be delivered identically to
/// every caller that was waiting on it.
#[derive(Debug, Clone)]
pub enum ApiError {
    /// The access token expired and the retried request was rejected again.
    ExpiredCredential,
    /// 401 with any discriminator other than `token.expired`. Terminal.
    InvalidCredential,
    /// The shared refresh call failed. Terminal for every request waiting on it.
    RefreshFailed(Arc<ApiError>),
    /// Any other non-success status, passed through untouched.
    Status { status: u16, body: String },
    /// Connection, timeout, or body decoding failure.
    Transport(Arc<reqwest::Error>),
}

impl ApiError {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ExpiredCredential => "EXPIRED_CREDENTIAL",
            Self::InvalidCredential => "INVALID_CREDENTIAL",
            Self::RefreshFailed(_) => "REFRESH_FAILED",
            Self::Status { .. } => "STATUS",
            Self::Transport(_) => "TRANSPORT",
        }
    }

    /// Whether this failure means the stored credentials can no longer be used.
    pub fn is_credential_failure(&self) -> bool {
        matches!(self, Self::ExpiredCredential | Self::InvalidCredential | Self::RefreshFailed(_))
    }

    /// HTTP status of the response that caused this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::ExpiredCredential | Self::InvalidCredential => Some(401),
            Self::Status { status, .. } => Some(*status),
            Self::RefreshFailed(inner) => inner.status(),
            Self::Transport(e) => e.status().map(|s| s.as_u16()),
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ExpiredCredential => f.write_str("access token expired"),
            Self::InvalidCredential => f.write_str("error with authentication token"),
            Self::RefreshFailed(inner) => write!(f, "token refresh failed: {inner}"),
            Self::Status { status, body } if body.is_empty() => write!(f, "HTTP {status}"),
            Self::Status { status, body } => write!(f, "HTTP {status}: {body}"),
            Self::Transport(e) => write!(f, "transport error: {e}"),
        }
    }
}

impl std::error::Error for ApiError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::RefreshFailed(inner) => Some(inner.as_ref()),
            Self::Transport(e) => Some(e.as_ref()),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        Self::Transport(Arc::new(e))
    }
}
