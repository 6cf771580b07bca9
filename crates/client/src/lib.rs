// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Authgate: session-aware API client and access control.
//!
//! Consumes access/refresh tokens issued by an external backend. The
//! [`client::ApiClient`] makes token expiry transparent by coalescing
//! concurrent refreshes into a single call, [`gate`] decides whether a
//! session satisfies a permission/role requirement, [`broadcast`] keeps
//! sibling execution contexts in the same signed-in state, and [`guard`]
//! authorizes server-rendered pages.

pub mod broadcast;
pub mod claims;
pub mod client;
pub mod context;
pub mod error;
pub mod gate;
pub mod guard;
pub mod singleflight;
pub mod store;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use claims::Session;
pub use client::ApiClient;
pub use error::ApiError;
pub use gate::{has_access, AccessRequirement};
pub use guard::{AccessGuard, PageError, PageOutcome, Redirect};
pub use store::{CredentialStore, Credentials};

/// Route of the default authenticated landing page.
pub const LANDING_ROUTE: &str = "/dashboard";

/// Route of the sign-in page (the unauthenticated default).
pub const LOGIN_ROUTE: &str = "/";

/// Route of the generic error page.
pub const ERROR_ROUTE: &str = "/error";
