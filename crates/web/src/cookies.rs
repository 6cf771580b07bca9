// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Request-scoped credential store backed by the request's cookies.
//!
//! Reads see the incoming `Cookie` header plus any change made while handling
//! the request; changes go back to the browser as `Set-Cookie` once the jar is
//! returned from the handler.

use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use parking_lot::Mutex;

use authgate::store::{CredentialStore, StoreOptions};

pub struct CookieStore {
    jar: Mutex<CookieJar>,
    secure: bool,
}

impl CookieStore {
    pub fn new(jar: CookieJar, secure: bool) -> Self {
        Self { jar: Mutex::new(jar), secure }
    }

    /// Snapshot of the jar, including pending changes.
    pub fn jar(&self) -> CookieJar {
        self.jar.lock().clone()
    }

    fn update(&self, f: impl FnOnce(CookieJar) -> CookieJar) {
        let mut jar = self.jar.lock();
        let current = std::mem::take(&mut *jar);
        *jar = f(current);
    }
}

impl CredentialStore for CookieStore {
    fn get(&self, key: &str) -> Option<String> {
        self.jar.lock().get(key).map(|c| c.value().to_owned())
    }

    fn set(&self, key: &str, value: &str, options: &StoreOptions) {
        let max_age = i64::try_from(options.max_age.as_secs()).unwrap_or(i64::MAX);
        let cookie = Cookie::build((key.to_owned(), value.to_owned()))
            .path(options.path.clone())
            .max_age(cookie::time::Duration::seconds(max_age))
            .same_site(SameSite::Lax)
            .secure(self.secure)
            .build();
        self.update(|jar| jar.add(cookie));
    }

    fn remove(&self, key: &str) {
        let cookie = Cookie::build((key.to_owned(), "")).path(authgate::store::CREDENTIAL_PATH).build();
        self.update(|jar| jar.remove(cookie));
    }
}

#[cfg(test)]
#[path = "cookies_tests.rs"]
mod tests;
