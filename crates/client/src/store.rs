// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Credential storage: the access/refresh token pair behind a key-value store.
//!
//! The same [`CredentialStore`] contract is implemented by a request-scoped
//! cookie jar on the server and by [`MemoryStore`] for a browser-like
//! execution context.

use std::collections::HashMap;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Store key of the access token.
pub const TOKEN_KEY: &str = "nextauth.token";

/// Store key of the refresh token.
pub const REFRESH_TOKEN_KEY: &str = "nextauth.refreshToken";

/// Validity window of both stored credentials (30 days).
pub const CREDENTIAL_MAX_AGE: Duration = Duration::from_secs(60 * 60 * 24 * 30);

/// Path scope of both stored credentials.
pub const CREDENTIAL_PATH: &str = "/";

/// Attributes attached to a stored value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreOptions {
    pub max_age: Duration,
    pub path: String,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self { max_age: CREDENTIAL_MAX_AGE, path: CREDENTIAL_PATH.to_owned() }
    }
}

/// String key-value store holding the credential pair.
///
/// Implementations use interior mutability: a store is shared by every
/// request issued from one execution context.
pub trait CredentialStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str, options: &StoreOptions);
    fn remove(&self, key: &str);
}

/// Access/refresh token pair as returned by `/sessions` and `/refresh`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credentials {
    pub token: String,
    pub refresh_token: String,
}

/// Read the stored access token, treating an empty value as absent.
pub fn access_token(store: &dyn CredentialStore) -> Option<String> {
    store.get(TOKEN_KEY).filter(|t| !t.is_empty())
}

/// Read the stored refresh token, treating an empty value as absent.
pub fn refresh_token(store: &dyn CredentialStore) -> Option<String> {
    store.get(REFRESH_TOKEN_KEY).filter(|t| !t.is_empty())
}

/// Persist both credentials with the standard validity window and path.
pub fn write_credentials(store: &dyn CredentialStore, credentials: &Credentials) {
    let options = StoreOptions::default();
    store.set(TOKEN_KEY, &credentials.token, &options);
    store.set(REFRESH_TOKEN_KEY, &credentials.refresh_token, &options);
}

/// Remove both credentials.
pub fn clear_credentials(store: &dyn CredentialStore) {
    store.remove(TOKEN_KEY);
    store.remove(REFRESH_TOKEN_KEY);
}

/// A stored value together with the attributes it was written with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredValue {
    pub value: String,
    pub options: StoreOptions,
}

/// In-memory store for a single execution context.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, StoredValue>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store already holding `credentials`.
    pub fn with_credentials(credentials: &Credentials) -> Self {
        let store = Self::new();
        write_credentials(&store, credentials);
        store
    }

    /// Inspect a value along with its attributes.
    pub fn entry(&self, key: &str) -> Option<StoredValue> {
        self.values.lock().get(key).cloned()
    }
}

impl CredentialStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.lock().get(key).map(|v| v.value.clone())
    }

    fn set(&self, key: &str, value: &str, options: &StoreOptions) {
        self.values
            .lock()
            .insert(key.to_owned(), StoredValue { value: value.to_owned(), options: options.clone() });
    }

    fn remove(&self, key: &str) {
        self.values.lock().remove(key);
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
