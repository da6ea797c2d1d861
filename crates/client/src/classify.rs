// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Failure taxonomy for marketplace API calls.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use crate::error::ClientError;

/// Bucket a failed call falls into. Only `AuthExpired` is recoverable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorClass {
    AuthExpired,
    BadRequest,
    Forbidden,
    NotFound,
    ServerError,
    Unclassified,
}

impl ErrorClass {
    pub fn from_status(status: u16) -> Self {
        match status {
            401 => Self::AuthExpired,
            400 => Self::BadRequest,
            403 => Self::Forbidden,
            404 => Self::NotFound,
            500 => Self::ServerError,
            _ => Self::Unclassified,
        }
    }

    /// Classify without logging. Failures with no status are `Unclassified`.
    pub fn of(error: &ClientError) -> Self {
        match error {
            ClientError::Status(failure) => Self::from_status(failure.status.as_u16()),
            ClientError::Transport(_) | ClientError::InvalidRequest(_) | ClientError::Decode(_) => {
                Self::Unclassified
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AuthExpired => "AUTH_EXPIRED",
            Self::BadRequest => "BAD_REQUEST",
            Self::Forbidden => "FORBIDDEN",
            Self::NotFound => "NOT_FOUND",
            Self::ServerError => "SERVER_ERROR",
            Self::Unclassified => "UNCLASSIFIED",
        }
    }
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify a failure and log it. The error itself is left as-is.
///
/// 4xx classes log at warn, 5xx and status-less failures at error.
pub fn classify(err: &ClientError) -> ErrorClass {
    let class = ErrorClass::of(err);
    let status = err.status().map(|s| s.as_u16());
    match class {
        ErrorClass::AuthExpired => warn!(%class, ?status, "unauthorized: session may have expired"),
        ErrorClass::BadRequest => warn!(%class, ?status, err = %err, "bad request"),
        ErrorClass::Forbidden => warn!(%class, ?status, err = %err, "forbidden"),
        ErrorClass::NotFound => warn!(%class, ?status, err = %err, "resource not found"),
        ErrorClass::ServerError => error!(%class, ?status, err = %err, "internal server error"),
        ErrorClass::Unclassified => match status {
            Some(code) if (400..500).contains(&code) => {
                warn!(%class, status = code, err = %err, "request failed");
            }
            _ => error!(%class, ?status, err = %err, "request failed"),
        },
    }
    class
}

#[cfg(test)]
#[path = "classify_tests.rs"]
mod tests;
