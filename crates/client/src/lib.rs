// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Marketclient: authenticated HTTP client for the service-marketplace API.
//!
//! Every call goes through one pipeline that refreshes an expired session at
//! most once (shared across concurrent failures), replays the original call,
//! and hands off to caller-supplied teardown and navigation hooks when the
//! session cannot be recovered.

pub mod classify;
pub mod client;
pub mod config;
pub mod error;
pub mod guard;
pub mod refresh;
pub mod request;
pub mod session;
pub mod test_support;

use std::io::Write;
use std::sync::Once;

use reqwest::header::{HeaderName, HeaderValue};
use tracing::info;

use crate::client::HttpClient;
use crate::config::{parse_header, Cli};
use crate::request::RequestDescriptor;

static CRYPTO_INIT: Once = Once::new();

/// Install the ring crypto provider for reqwest/rustls.
/// Safe to call multiple times; only the first call has effect.
pub fn ensure_crypto() {
    CRYPTO_INIT.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}

/// Process exit codes for the `marketclient` binary.
pub mod exit {
    pub const OK: i32 = 0;
    pub const REQUEST_FAILED: i32 = 1;
    pub const INVALID_CONFIG: i32 = 2;
    pub const SESSION_ENDED: i32 = 3;
}

/// Send the request described by `cli` and print the outcome.
///
/// Returns the process exit code. The response body goes to stdout; on
/// failure the error envelope is printed there instead.
pub async fn run(cli: Cli) -> anyhow::Result<i32> {
    let client = HttpClient::new(
        &cli.client,
        || info!("local session state cleared"),
        |location: &str| eprintln!("login required: {location}"),
    )?;
    info!(base = %client.base_url(), login = %cli.client.login_location, "client ready");

    let method = reqwest::Method::from_bytes(cli.method.to_uppercase().as_bytes())?;
    let mut req = RequestDescriptor::new(method, cli.path.as_str());
    for raw in &cli.headers {
        let (name, value) = parse_header(raw)?;
        req = req.header(HeaderName::try_from(name)?, HeaderValue::try_from(value)?);
    }
    if let Some(ref data) = cli.data {
        let value: serde_json::Value = serde_json::from_str(data)?;
        req = req.json(&value)?;
    }

    match client.send(req).await {
        Ok(resp) => {
            let body = resp.bytes().await?;
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(&body)?;
            writeln!(stdout)?;
            Ok(exit::OK)
        }
        Err(e) => {
            let mut stdout = std::io::stdout().lock();
            writeln!(stdout, "{}", serde_json::to_string(&e.to_error_body())?)?;
            if e.is_session_ended() {
                Ok(exit::SESSION_ENDED)
            } else {
                Ok(exit::REQUEST_FAILED)
            }
        }
    }
}
