// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session claims and token payload decoding.
//!
//! Decoding only extracts the payload of a JWT-shaped token. No signature or
//! expiry verification is performed: the result is suitable for presentation
//! and for gating page renders whose data is itself authorized by the backend.

use std::collections::BTreeSet;
use std::fmt;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};

/// Authenticated user as seen by one execution context.
///
/// Replaced wholesale on sign-in or claims fetch, never mutated in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub email: String,
    #[serde(default)]
    pub permissions: BTreeSet<String>,
    #[serde(default)]
    pub roles: BTreeSet<String>,
}

impl Session {
    pub fn new<P, R>(email: impl Into<String>, permissions: P, roles: R) -> Self
    where
        P: IntoIterator,
        P::Item: Into<String>,
        R: IntoIterator,
        R::Item: Into<String>,
    {
        Self {
            email: email.into(),
            permissions: permissions.into_iter().map(Into::into).collect(),
            roles: roles.into_iter().map(Into::into).collect(),
        }
    }

    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.contains(permission)
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }
}

/// Payload of an access token issued by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject: the user's email.
    pub sub: String,
    #[serde(default)]
    pub permissions: Vec<String>,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<u64>,
}

impl From<TokenClaims> for Session {
    fn from(claims: TokenClaims) -> Self {
        Session::new(claims.sub, claims.permissions, claims.roles)
    }
}

/// Why a token payload could not be extracted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimsError {
    /// Not three dot-separated segments.
    Malformed,
    /// Payload segment is not base64url.
    Encoding,
    /// Payload is not the expected JSON object.
    Json(String),
}

impl fmt::Display for ClaimsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Malformed => f.write_str("token is not a three-segment JWT"),
            Self::Encoding => f.write_str("token payload is not base64url"),
            Self::Json(msg) => write!(f, "token payload is not valid claims: {msg}"),
        }
    }
}

impl std::error::Error for ClaimsError {}

/// Extract the claims from a token without verifying it.
pub fn decode_claims(token: &str) -> Result<TokenClaims, ClaimsError> {
    let mut segments = token.split('.');
    let (Some(_header), Some(payload), Some(_signature), None) =
        (segments.next(), segments.next(), segments.next(), segments.next())
    else {
        return Err(ClaimsError::Malformed);
    };

    let bytes =
        URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).map_err(|_| ClaimsError::Encoding)?;
    serde_json::from_slice(&bytes).map_err(|e| ClaimsError::Json(e.to_string()))
}

/// Decode a token straight into a [`Session`].
pub fn decode_session(token: &str) -> Result<Session, ClaimsError> {
    decode_claims(token).map(Session::from)
}

#[cfg(test)]
#[path = "claims_tests.rs"]
mod tests;
