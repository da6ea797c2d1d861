// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use clap::Parser;

use crate::guard::AuthEndpoints;

/// Transport configuration for the marketplace API client.
///
/// Fixed for the lifetime of an [`crate::client::HttpClient`].
#[derive(Debug, Clone, clap::Args)]
pub struct ClientConfig {
    /// Base URL every relative request path is joined to.
    #[arg(long, env = "MARKET_API_URL", default_value = "http://127.0.0.1:5000/api")]
    pub base_url: String,

    /// Path of the login endpoint (never refreshed).
    #[arg(long, env = "MARKET_LOGIN_PATH", default_value = "/auth/login")]
    pub login_path: String,

    /// Path of the session refresh endpoint.
    #[arg(long, env = "MARKET_REFRESH_PATH", default_value = "/auth/refresh-token")]
    pub refresh_path: String,

    /// Where to send the user when the session cannot be refreshed.
    #[arg(long, env = "MARKET_LOGIN_LOCATION", default_value = "/login")]
    pub login_location: String,

    /// Include session cookies on every request.
    #[arg(
        long,
        env = "MARKET_WITH_CREDENTIALS",
        default_value_t = true,
        action = clap::ArgAction::Set
    )]
    pub with_credentials: bool,

    /// Session cookie to seed the jar with (`name=value`).
    #[arg(long, env = "MARKET_SESSION_COOKIE")]
    pub session_cookie: Option<String>,
}

impl ClientConfig {
    /// Defaults for everything but the base URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            login_path: "/auth/login".to_owned(),
            refresh_path: "/auth/refresh-token".to_owned(),
            login_location: "/login".to_owned(),
            with_credentials: true,
            session_cookie: None,
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        let base = reqwest::Url::parse(&self.base_url)
            .map_err(|e| anyhow::anyhow!("invalid --base-url {:?}: {e}", self.base_url))?;
        if !matches!(base.scheme(), "http" | "https") {
            anyhow::bail!("--base-url must be http or https, got {}", base.scheme());
        }
        if !self.login_path.starts_with('/') {
            anyhow::bail!("--login-path must start with '/'");
        }
        if !self.refresh_path.starts_with('/') {
            anyhow::bail!("--refresh-path must start with '/'");
        }
        if self.login_path == self.refresh_path {
            anyhow::bail!("--login-path and --refresh-path must differ");
        }
        if let Some(ref cookie) = self.session_cookie {
            if !cookie.contains('=') {
                anyhow::bail!("--session-cookie must be name=value");
            }
        }
        Ok(())
    }

    pub fn auth_endpoints(&self) -> AuthEndpoints {
        AuthEndpoints::new(&self.login_path, &self.refresh_path)
    }
}

/// One-shot request tool for the marketplace API.
#[derive(Debug, Parser)]
#[command(name = "marketclient", version, about)]
pub struct Cli {
    #[command(flatten)]
    pub client: ClientConfig,

    /// Log format (json or text).
    #[arg(long, env = "MARKET_LOG_FORMAT", default_value = "text")]
    pub log_format: String,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, env = "MARKET_LOG_LEVEL", default_value = "warn")]
    pub log_level: String,

    /// JSON request body.
    #[arg(long, short = 'd')]
    pub data: Option<String>,

    /// Extra request header (`Name: value`), repeatable.
    #[arg(long = "header", short = 'H')]
    pub headers: Vec<String>,

    /// HTTP method.
    pub method: String,

    /// Request path relative to the base URL, or an absolute URL.
    pub path: String,
}

impl Cli {
    pub fn validate(&self) -> anyhow::Result<()> {
        self.client.validate()?;
        reqwest::Method::from_bytes(self.method.to_uppercase().as_bytes())
            .map_err(|_| anyhow::anyhow!("invalid method: {}", self.method))?;
        if let Some(ref data) = self.data {
            serde_json::from_str::<serde_json::Value>(data)
                .map_err(|e| anyhow::anyhow!("--data is not valid JSON: {e}"))?;
        }
        for header in &self.headers {
            parse_header(header)?;
        }
        match self.log_format.as_str() {
            "json" | "text" => Ok(()),
            other => anyhow::bail!("invalid log format: {other}"),
        }
    }
}

/// Split `Name: value` into its parts.
pub fn parse_header(raw: &str) -> anyhow::Result<(String, String)> {
    let (name, value) =
        raw.split_once(':').ok_or_else(|| anyhow::anyhow!("header must be 'Name: value': {raw}"))?;
    let name = name.trim();
    if name.is_empty() {
        anyhow::bail!("header name is empty: {raw}");
    }
    Ok((name.to_owned(), value.trim().to_owned()))
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
