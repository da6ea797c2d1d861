// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::fmt;

use bytes::Bytes;
use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::classify::ErrorClass;

/// A non-2xx response, captured as the transport delivered it.
///
/// `body_error` is set when the status line arrived but the body could not
/// be read in full; `body` is then empty.
#[derive(Debug, Clone)]
pub struct HttpFailure {
    pub status: StatusCode,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub body_error: Option<String>,
}

impl HttpFailure {
    /// Drain a failed response into an owned value.
    pub async fn read(resp: reqwest::Response) -> Self {
        let status = resp.status();
        let url = resp.url().to_string();
        let headers = resp.headers().clone();
        let (body, body_error) = match resp.bytes().await {
            Ok(body) => (body, None),
            Err(e) => {
                warn!(%status, url = %url, err = %e, "failed to read error response body");
                (Bytes::new(), Some(e.to_string()))
            }
        };
        Self { status, url, headers, body, body_error }
    }

    /// Body as lossy UTF-8, for messages and logs.
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Everything that can go wrong between a caller and the marketplace API.
#[derive(Debug)]
pub enum ClientError {
    /// The server answered with a non-success status.
    Status(HttpFailure),
    /// The request never produced a response (connect, TLS, I/O).
    Transport(reqwest::Error),
    /// The descriptor could not be turned into a request.
    InvalidRequest(String),
    /// A success body did not decode into the requested type.
    Decode(serde_json::Error),
}

impl ClientError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Status(failure) => Some(failure.status),
            Self::Transport(e) => e.status(),
            Self::InvalidRequest(_) | Self::Decode(_) => None,
        }
    }
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Status(failure) => {
                write!(f, "request to {} failed with status {}", failure.url, failure.status)?;
                if let Some(ref e) = failure.body_error {
                    write!(f, " (body unreadable: {e})")?;
                }
                Ok(())
            }
            Self::Transport(e) => write!(f, "transport error: {e}"),
            Self::InvalidRequest(msg) => write!(f, "invalid request: {msg}"),
            Self::Decode(e) => write!(f, "failed to decode response body: {e}"),
        }
    }
}

impl std::error::Error for ClientError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Transport(e) => Some(e),
            Self::Decode(e) => Some(e),
            Self::Status(_) | Self::InvalidRequest(_) => None,
        }
    }
}

/// The rejection every caller of [`crate::client::HttpClient::send`] sees.
///
/// Wraps the original [`ClientError`] untouched. `session_ended` is set when
/// the failure triggered a session teardown (refresh failed).
#[derive(Debug)]
pub struct ClassifiedError {
    class: ErrorClass,
    error: ClientError,
    session_ended: bool,
}

impl ClassifiedError {
    pub fn new(class: ErrorClass, error: ClientError) -> Self {
        Self { class, error, session_ended: false }
    }

    pub(crate) fn session_ended(class: ErrorClass, error: ClientError) -> Self {
        Self { class, error, session_ended: true }
    }

    pub fn class(&self) -> ErrorClass {
        self.class
    }

    pub fn error(&self) -> &ClientError {
        &self.error
    }

    pub fn into_inner(self) -> ClientError {
        self.error
    }

    pub fn status(&self) -> Option<StatusCode> {
        self.error.status()
    }

    /// True when the session was torn down and the login surface requested.
    pub fn is_session_ended(&self) -> bool {
        self.session_ended
    }

    pub fn to_error_body(&self) -> ErrorBody {
        ErrorBody {
            code: self.class.as_str().to_owned(),
            status: self.status().map(|s| s.as_u16()),
            message: self.error.to_string(),
        }
    }
}

impl fmt::Display for ClassifiedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.class, self.error)
    }
}

impl std::error::Error for ClassifiedError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

/// Error envelope with a machine-readable code and a human-readable message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    pub message: String,
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
