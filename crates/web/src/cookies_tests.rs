// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use axum::http::header::SET_COOKIE;
use axum::response::IntoResponse;

use super::*;
use authgate::store::{self, Credentials, REFRESH_TOKEN_KEY, TOKEN_KEY};

fn set_cookies(store: &CookieStore) -> Vec<String> {
    let resp = store.jar().into_response();
    resp.headers()
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok().map(str::to_owned))
        .collect()
}

fn incoming() -> CookieJar {
    CookieJar::new()
        .add(Cookie::new(TOKEN_KEY, "T1"))
        .add(Cookie::new(REFRESH_TOKEN_KEY, "R1"))
}

#[test]
fn reads_incoming_cookies_without_echoing_them() {
    let store = CookieStore::new(incoming(), false);
    assert_eq!(store.get(TOKEN_KEY).as_deref(), Some("T1"));
    assert_eq!(store::refresh_token(&store).as_deref(), Some("R1"));
    assert!(set_cookies(&store).is_empty());
}

#[test]
fn writes_become_set_cookie_headers() {
    let store = CookieStore::new(incoming(), false);
    store::write_credentials(&store, &Credentials { token: "T2".into(), refresh_token: "R2".into() });

    assert_eq!(store.get(TOKEN_KEY).as_deref(), Some("T2"));
    let headers = set_cookies(&store);
    assert_eq!(headers.len(), 2);
    let token = headers.iter().find(|h| h.starts_with("nextauth.token=T2"));
    assert!(token.is_some(), "{headers:?}");
    for header in &headers {
        assert!(header.contains("Max-Age=2592000"), "{header}");
        assert!(header.contains("Path=/"), "{header}");
        assert!(!header.contains("Secure"), "{header}");
    }
}

#[test]
fn secure_flag_follows_config() {
    let store = CookieStore::new(CookieJar::new(), true);
    store::write_credentials(&store, &Credentials { token: "T".into(), refresh_token: "R".into() });
    assert!(set_cookies(&store).iter().all(|h| h.contains("Secure")));
}

#[test]
fn clearing_expires_both_cookies() {
    let store = CookieStore::new(incoming(), false);
    store::clear_credentials(&store);

    assert!(store.get(TOKEN_KEY).is_none());
    assert!(store::access_token(&store).is_none());
    let headers = set_cookies(&store);
    assert_eq!(headers.len(), 2);
    assert!(headers.iter().all(|h| h.contains("Max-Age=0")), "{headers:?}");
}
