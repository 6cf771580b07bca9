// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Integration tests for the guarded pages.
//!
//! The router runs in-process through `axum_test::TestServer`; page logic
//! talks to a real mock backend API over loopback.

use std::sync::Arc;

use axum::http::header::{LOCATION, SET_COOKIE};
use axum::http::StatusCode;
use axum_test::{TestResponse, TestServer};
use cookie::Cookie;

use authgate::store::{REFRESH_TOKEN_KEY, TOKEN_KEY};
use authgate::test_support::{mint_token, MockApi};
use authgate::Credentials;
use authgate_web::build_router;
use authgate_web::config::WebConfig;
use authgate_web::state::AppState;

const ADMIN: &str = "admin@example.com";
const EDITOR: &str = "editor@example.com";
const PASSWORD: &str = "secret";

async fn setup() -> anyhow::Result<(MockApi, TestServer)> {
    let api = MockApi::start().await?;
    api.add_user(ADMIN, PASSWORD, &["metrics.list", "users.list"], &["administrator"]);
    api.add_user(EDITOR, PASSWORD, &["metrics.list"], &["editor"]);
    let state = Arc::new(AppState::new(WebConfig::for_api(api.base_url()))?);
    let server = TestServer::new(build_router(state))?;
    Ok((api, server))
}

fn location(resp: &TestResponse) -> Option<String> {
    resp.headers().get(LOCATION).and_then(|v| v.to_str().ok()).map(str::to_owned)
}

fn set_cookies(resp: &TestResponse) -> Vec<String> {
    resp.headers()
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok().map(str::to_owned))
        .collect()
}

fn set_cookie_for<'a>(headers: &'a [String], key: &str) -> Option<&'a str> {
    let prefix = format!("{key}=");
    headers.iter().find(|h| h.starts_with(&prefix)).map(String::as_str)
}

fn token_cookie(token: &str) -> Cookie<'static> {
    Cookie::new(TOKEN_KEY, token.to_owned())
}

fn refresh_cookie(token: &str) -> Cookie<'static> {
    Cookie::new(REFRESH_TOKEN_KEY, token.to_owned())
}

#[tokio::test]
async fn health_reports_running() -> anyhow::Result<()> {
    let (_api, server) = setup().await?;
    let resp = server.get("/health").await;
    resp.assert_status_ok();
    let body: serde_json::Value = resp.json();
    assert_eq!(body, serde_json::json!({ "status": "running" }));
    Ok(())
}

#[tokio::test]
async fn login_page_renders_for_guests() -> anyhow::Result<()> {
    let (_api, server) = setup().await?;
    let resp = server.get("/").await;
    resp.assert_status_ok();
    assert!(resp.text().contains("<form"));
    Ok(())
}

#[tokio::test]
async fn login_page_redirects_signed_in_users() -> anyhow::Result<()> {
    let (_api, server) = setup().await?;
    let resp = server.get("/").add_cookie(token_cookie("anything")).await;
    resp.assert_status(StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(location(&resp).as_deref(), Some("/dashboard"));
    Ok(())
}

#[tokio::test]
async fn dashboard_requires_a_token() -> anyhow::Result<()> {
    let (_api, server) = setup().await?;
    let resp = server.get("/dashboard").await;
    resp.assert_status(StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(location(&resp).as_deref(), Some("/"));
    Ok(())
}

#[tokio::test]
async fn dashboard_renders_claims_email() -> anyhow::Result<()> {
    let (_api, server) = setup().await?;
    let token = mint_token(EDITOR, &[], &["editor"]);
    let resp = server.get("/dashboard").add_cookie(token_cookie(&token)).await;
    resp.assert_status_ok();
    assert!(resp.text().contains("Dashboard: editor@example.com"));
    Ok(())
}

#[tokio::test]
async fn metrics_renders_for_administrators() -> anyhow::Result<()> {
    let (api, server) = setup().await?;
    let creds = api.issue(ADMIN);
    let resp = server
        .get("/metrics")
        .add_cookie(token_cookie(&creds.token))
        .add_cookie(refresh_cookie(&creds.refresh_token))
        .await;
    resp.assert_status_ok();
    let text = resp.text();
    assert!(text.contains("Metrics!"));
    assert!(text.contains(ADMIN));
    assert_eq!(api.me_bearers(), vec![Some(creds.token)]);
    assert!(set_cookies(&resp).is_empty());
    Ok(())
}

#[tokio::test]
async fn metrics_sends_other_roles_to_dashboard_without_backend_call() -> anyhow::Result<()> {
    let (api, server) = setup().await?;
    let creds = api.issue(EDITOR);
    let resp = server.get("/metrics").add_cookie(token_cookie(&creds.token)).await;
    resp.assert_status(StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(location(&resp).as_deref(), Some("/dashboard"));
    assert!(api.me_bearers().is_empty());
    Ok(())
}

#[tokio::test]
async fn metrics_refreshes_expired_token_and_sets_cookies() -> anyhow::Result<()> {
    let (api, server) = setup().await?;
    let creds = api.issue(ADMIN);
    api.expire(&creds.token);

    let resp = server
        .get("/metrics")
        .add_cookie(token_cookie(&creds.token))
        .add_cookie(refresh_cookie(&creds.refresh_token))
        .await;
    resp.assert_status_ok();
    assert_eq!(api.refresh_calls(), 1);

    let headers = set_cookies(&resp);
    let token = set_cookie_for(&headers, TOKEN_KEY);
    assert!(token.is_some_and(|h| !h.starts_with(&format!("{TOKEN_KEY}={};", creds.token))), "{headers:?}");
    assert!(token.is_some_and(|h| h.contains("Max-Age=2592000") && h.contains("Path=/")));
    assert!(set_cookie_for(&headers, REFRESH_TOKEN_KEY).is_some());
    Ok(())
}

#[tokio::test]
async fn metrics_with_rejected_token_clears_cookies_and_redirects_to_login() -> anyhow::Result<()> {
    let (api, server) = setup().await?;
    let creds = api.issue(ADMIN);
    api.revoke(&creds.token);

    let resp = server
        .get("/metrics")
        .add_cookie(token_cookie(&creds.token))
        .add_cookie(refresh_cookie(&creds.refresh_token))
        .await;
    resp.assert_status(StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(location(&resp).as_deref(), Some("/"));

    let headers = set_cookies(&resp);
    for key in [TOKEN_KEY, REFRESH_TOKEN_KEY] {
        assert!(set_cookie_for(&headers, key).is_some_and(|h| h.contains("Max-Age=0")), "{headers:?}");
    }
    Ok(())
}

#[tokio::test]
async fn metrics_with_failed_refresh_clears_cookies_and_redirects_to_login() -> anyhow::Result<()> {
    let (api, server) = setup().await?;
    let creds = api.issue(ADMIN);
    api.expire(&creds.token);
    api.fail_refresh(true);

    let resp = server
        .get("/metrics")
        .add_cookie(token_cookie(&creds.token))
        .add_cookie(refresh_cookie(&creds.refresh_token))
        .await;
    resp.assert_status(StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(location(&resp).as_deref(), Some("/"));
    assert_eq!(api.refresh_calls(), 1);
    let headers = set_cookies(&resp);
    assert!(set_cookie_for(&headers, TOKEN_KEY).is_some_and(|h| h.contains("Max-Age=0")));
    Ok(())
}

#[tokio::test]
async fn sign_in_sets_cookies_and_redirects_to_dashboard() -> anyhow::Result<()> {
    let (_api, server) = setup().await?;
    let resp = server.post("/").form(&[("email", ADMIN), ("password", PASSWORD)]).await;
    resp.assert_status(StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(location(&resp).as_deref(), Some("/dashboard"));

    let headers = set_cookies(&resp);
    assert!(set_cookie_for(&headers, TOKEN_KEY).is_some(), "{headers:?}");
    assert!(set_cookie_for(&headers, REFRESH_TOKEN_KEY).is_some(), "{headers:?}");
    Ok(())
}

#[tokio::test]
async fn sign_in_with_wrong_password_re_renders_form() -> anyhow::Result<()> {
    let (_api, server) = setup().await?;
    let resp = server.post("/").form(&[("email", ADMIN), ("password", "nope")]).await;
    resp.assert_status(StatusCode::UNAUTHORIZED);
    assert!(resp.text().contains("Invalid e-mail or password."));
    assert!(set_cookies(&resp).is_empty());
    Ok(())
}

#[tokio::test]
async fn sign_out_clears_cookies() -> anyhow::Result<()> {
    let (api, server) = setup().await?;
    let Credentials { token, refresh_token } = api.issue(ADMIN);
    let resp = server
        .post("/signout")
        .add_cookie(token_cookie(&token))
        .add_cookie(refresh_cookie(&refresh_token))
        .await;
    resp.assert_status(StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(location(&resp).as_deref(), Some("/"));
    let headers = set_cookies(&resp);
    assert!(set_cookie_for(&headers, TOKEN_KEY).is_some_and(|h| h.contains("Max-Age=0")));
    Ok(())
}

#[tokio::test]
async fn error_page_renders() -> anyhow::Result<()> {
    let (_api, server) = setup().await?;
    let resp = server.get("/error").await;
    resp.assert_status_ok();
    assert!(resp.text().contains("Something went wrong"));
    Ok(())
}
