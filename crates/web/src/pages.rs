// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Page handlers. Each guarded page runs its logic inside an
//! [`AccessGuard`] and turns the outcome into a response carrying the
//! request's cookie changes.

use std::sync::Arc;

use axum::extract::{Form, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::Json;
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;
use tracing::{info, warn};

use authgate::claims::{self, Session};
use authgate::context::{SignInCredentials, ME_PATH};
use authgate::guard::{self, PageOutcome, Redirect};
use authgate::store;
use authgate::{AccessGuard, AccessRequirement, ApiError, PageError, LANDING_ROUTE, LOGIN_ROUTE};

use crate::cookies::CookieStore;
use crate::state::AppState;

/// Requirement of the metrics page.
pub fn metrics_requirement() -> AccessRequirement {
    AccessRequirement::new().permissions(["metrics.list"]).roles(["administrator"])
}

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

fn page(title: &str, body: &str) -> Html<String> {
    Html(format!(
        "<!doctype html>\n<html><head><meta charset=\"utf-8\"><title>{title}</title></head>\
         <body><main>{body}</main></body></html>\n"
    ))
}

fn login_page(error: Option<&str>) -> Html<String> {
    let error = error.map(|e| format!("<p class=\"error\">{}</p>", escape(e))).unwrap_or_default();
    page(
        "Sign in",
        &format!(
            "{error}<form method=\"post\" action=\"/\">\
             <input type=\"email\" name=\"email\">\
             <input type=\"password\" name=\"password\">\
             <button type=\"submit\">Sign in</button></form>"
        ),
    )
}

/// Attach the request's cookie changes to `outcome`.
fn respond<T: IntoResponse>(store: &CookieStore, outcome: PageOutcome<T>) -> Response {
    let jar = store.jar();
    match outcome {
        PageOutcome::Render(body) => (jar, body).into_response(),
        PageOutcome::Redirect(redirect) => (jar, redirect_response(&redirect)).into_response(),
    }
}

/// Redirect after a form submission, carrying the request's cookie changes.
fn form_redirect(store: &CookieStore, destination: &str) -> Response {
    (store.jar(), axum::response::Redirect::temporary(destination)).into_response()
}

fn redirect_response(redirect: &Redirect) -> axum::response::Redirect {
    if redirect.permanent {
        axum::response::Redirect::permanent(&redirect.destination)
    } else {
        axum::response::Redirect::temporary(&redirect.destination)
    }
}

/// `GET /`: sign-in form, guests only.
pub async fn login(State(state): State<Arc<AppState>>, jar: CookieJar) -> Response {
    let store = state.cookie_store(jar);
    let outcome =
        guard::guest_only(&*store, || async { PageOutcome::Render(login_page(None)) }).await;
    respond(&store, outcome)
}

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

/// `POST /`: exchange the form credentials for a session.
pub async fn submit_login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Form(form): Form<LoginForm>,
) -> Response {
    let store = state.cookie_store(jar);
    let credentials = SignInCredentials { email: form.email, password: form.password };
    let result = match state.auth_context(&store) {
        Ok(ctx) => ctx.sign_in(&credentials).await,
        Err(e) => Err(e),
    };
    match result {
        Ok(_) => form_redirect(&store, LANDING_ROUTE),
        Err(ApiError::Status { status: 401, .. }) => {
            info!(email = %credentials.email, "sign-in rejected");
            let page = login_page(Some("Invalid e-mail or password."));
            (StatusCode::UNAUTHORIZED, store.jar(), page).into_response()
        }
        Err(e) => {
            warn!(err = %e, "sign-in failed");
            let page = login_page(Some("Sign-in is unavailable."));
            (StatusCode::BAD_GATEWAY, store.jar(), page).into_response()
        }
    }
}

/// `POST /signout`: clear credentials and return to the sign-in page.
pub async fn sign_out(State(state): State<Arc<AppState>>, jar: CookieJar) -> Response {
    let store = state.cookie_store(jar);
    match state.auth_context(&store) {
        Ok(ctx) => ctx.sign_out(),
        Err(e) => {
            warn!(err = %e, "no session context, clearing cookies only");
            store::clear_credentials(&*store);
        }
    }
    form_redirect(&store, LOGIN_ROUTE)
}

/// Session from the stored token's claims.
fn token_session(store: &CookieStore) -> Result<Session, PageError> {
    let token = store::access_token(store).ok_or(PageError::Credential(ApiError::InvalidCredential))?;
    claims::decode_session(&token).map_err(|e| {
        warn!(err = %e, "undecodable access token");
        PageError::Credential(ApiError::InvalidCredential)
    })
}

/// `GET /dashboard`: any authenticated user.
pub async fn dashboard(State(state): State<Arc<AppState>>, jar: CookieJar) -> Response {
    let store = state.cookie_store(jar);
    let outcome = AccessGuard::authenticated()
        .run(&*store, || async {
            let session = token_session(&store)?;
            Ok(page("Dashboard", &format!("<h1>Dashboard: {}</h1>", escape(&session.email))))
        })
        .await;
    respond(&store, outcome)
}

/// `GET /metrics`: administrators holding `metrics.list`.
pub async fn metrics(State(state): State<Arc<AppState>>, jar: CookieJar) -> Response {
    let store = state.cookie_store(jar);
    let outcome = AccessGuard::requiring(metrics_requirement())
        .run(&*store, || async {
            let api = state.api_client(&store)?;
            let session: Session = api.get_json(ME_PATH).await?;
            let listing = if authgate::has_access(
                Some(&session),
                &AccessRequirement::new().permissions(["metrics.list"]),
            ) {
                "<div>Metrics!</div>"
            } else {
                ""
            };
            Ok(page(
                "Metrics",
                &format!("<h1>Metrics</h1><p>{}</p>{listing}", escape(&session.email)),
            ))
        })
        .await;
    respond(&store, outcome)
}

/// `GET /error`
pub async fn error_page() -> Html<String> {
    page("Error", "<h1>Something went wrong</h1><p><a href=\"/\">Back</a></p>")
}

/// `GET /health`
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "running" }))
}

#[cfg(test)]
#[path = "pages_tests.rs"]
mod tests;
