// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::time::Duration;

use clap::Parser;

/// Server-rendered pages guarded by backend-issued credentials.
#[derive(Debug, Clone, Parser)]
#[command(name = "authgate-web", version, about)]
pub struct WebConfig {
    /// Host to bind on.
    #[arg(long, default_value = "127.0.0.1", env = "AUTHGATE_HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(long, default_value_t = 3000, env = "AUTHGATE_PORT")]
    pub port: u16,

    /// Base URL of the backend API issuing credentials.
    #[arg(long, default_value = "http://localhost:3333", env = "AUTHGATE_API_URL")]
    pub api_url: String,

    /// Backend request timeout in milliseconds.
    #[arg(long, default_value_t = 10_000, env = "AUTHGATE_API_TIMEOUT_MS")]
    pub api_timeout_ms: u64,

    /// Log format (json or text).
    #[arg(long, env = "AUTHGATE_LOG_FORMAT", default_value = "text")]
    pub log_format: String,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, env = "AUTHGATE_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Mark credential cookies `Secure` (serve over HTTPS).
    #[arg(long, env = "AUTHGATE_SECURE_COOKIES")]
    pub secure_cookies: bool,
}

impl WebConfig {
    /// Validate the configuration after parsing.
    pub fn validate(&self) -> anyhow::Result<()> {
        if !self.api_url.starts_with("http://") && !self.api_url.starts_with("https://") {
            anyhow::bail!("--api-url must be an http(s) URL: {}", self.api_url);
        }
        if self.api_timeout_ms == 0 {
            anyhow::bail!("--api-timeout-ms must be positive");
        }
        match self.log_format.as_str() {
            "json" | "text" => Ok(()),
            other => anyhow::bail!("invalid --log-format: {other}"),
        }
    }

    pub fn api_timeout(&self) -> Duration {
        Duration::from_millis(self.api_timeout_ms)
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Config for tests and embedding: defaults pointed at `api_url`.
    pub fn for_api(api_url: impl Into<String>) -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
            api_url: api_url.into(),
            api_timeout_ms: 10_000,
            log_format: "text".into(),
            log_level: "info".into(),
            secure_cookies: false,
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
