// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Permission/role evaluation shared by page guards and conditional rendering.
//!
//! Two policies with different strictness:
//! - permissions are fine-grained capabilities, every required one must be held;
//! - roles are coarse identities, holding any one of the required roles suffices.
//!
//! Both checks must pass when both are specified. An empty list is no
//! requirement at all.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::claims::Session;

/// Access requirement attached to a page or UI element.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessRequirement {
    #[serde(default)]
    pub permissions: Vec<String>,
    #[serde(default)]
    pub roles: Vec<String>,
}

impl AccessRequirement {
    pub fn new() -> Self {
        Self::default()
    }

    /// Require all of `permissions`.
    pub fn permissions<I>(mut self, permissions: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.permissions = permissions.into_iter().map(Into::into).collect();
        self
    }

    /// Require at least one of `roles`.
    pub fn roles<I>(mut self, roles: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.roles = roles.into_iter().map(Into::into).collect();
        self
    }

    pub fn is_empty(&self) -> bool {
        self.permissions.is_empty() && self.roles.is_empty()
    }
}

/// Reason a session fails a requirement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Denial {
    Unauthenticated,
    /// Required permissions the session does not hold.
    MissingPermissions(Vec<String>),
    /// None of the listed roles is held.
    NoMatchingRole(Vec<String>),
}

impl fmt::Display for Denial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unauthenticated => f.write_str("not authenticated"),
            Self::MissingPermissions(missing) => {
                write!(f, "missing permissions: {}", missing.join(", "))
            }
            Self::NoMatchingRole(roles) => write!(f, "requires one of roles: {}", roles.join(", ")),
        }
    }
}

/// Evaluate `required` against `session`, reporting why access is denied.
pub fn check(session: Option<&Session>, required: &AccessRequirement) -> Result<(), Denial> {
    let Some(session) = session else {
        return Err(Denial::Unauthenticated);
    };

    let missing: Vec<String> =
        required.permissions.iter().filter(|p| !session.has_permission(p)).cloned().collect();
    if !missing.is_empty() {
        return Err(Denial::MissingPermissions(missing));
    }

    if !required.roles.is_empty() && !required.roles.iter().any(|r| session.has_role(r)) {
        return Err(Denial::NoMatchingRole(required.roles.clone()));
    }

    Ok(())
}

/// Whether `session` satisfies `required`. Always false without a session.
pub fn has_access(session: Option<&Session>, required: &AccessRequirement) -> bool {
    check(session, required).is_ok()
}

#[cfg(test)]
#[path = "gate_tests.rs"]
mod tests;
