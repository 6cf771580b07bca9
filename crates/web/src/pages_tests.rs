// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use axum::http::header::LOCATION;

use super::*;
use authgate::guard::RedirectReason;

#[yare::parameterized(
    plain     = { "ada@example.com", "ada@example.com" },
    markup    = { "<b>&</b>", "&lt;b&gt;&amp;&lt;/b&gt;" },
    quotes    = { r#""x'"#, "&quot;x&#39;" },
)]
fn escapes_html(input: &str, expected: &str) {
    assert_eq!(escape(input), expected);
}

#[yare::parameterized(
    temporary = { false, 307 },
    permanent = { true, 308 },
)]
fn redirect_status(permanent: bool, status: u16) {
    let redirect = Redirect {
        destination: "/dashboard".into(),
        permanent,
        reason: RedirectReason::AlreadyAuthenticated,
    };
    let resp = redirect_response(&redirect).into_response();
    assert_eq!(resp.status().as_u16(), status);
    assert_eq!(resp.headers().get(LOCATION).and_then(|v| v.to_str().ok()), Some("/dashboard"));
}

#[test]
fn metrics_requires_permission_and_admin_role() {
    let requirement = metrics_requirement();
    let admin = Session::new("a@x.io", ["metrics.list"], ["administrator"]);
    let editor = Session::new("e@x.io", ["metrics.list"], ["editor"]);
    assert!(authgate::has_access(Some(&admin), &requirement));
    assert!(!authgate::has_access(Some(&editor), &requirement));
}
