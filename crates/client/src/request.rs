// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Outgoing request values and the decorator that turns them into transport
//! requests.

use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::{Method, Url};
use serde::Serialize;
use tracing::error;

use crate::error::ClientError;

/// Header carrying a per-request correlation id.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// One outgoing call: method, URL, headers and body.
///
/// `url` is either a path relative to the configured base URL or an absolute
/// `http(s)://` URL.
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
}

impl RequestDescriptor {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self { method, url: url.into(), headers: HeaderMap::new(), body: None }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::POST, url)
    }

    pub fn put(url: impl Into<String>) -> Self {
        Self::new(Method::PUT, url)
    }

    pub fn patch(url: impl Into<String>) -> Self {
        Self::new(Method::PATCH, url)
    }

    pub fn delete(url: impl Into<String>) -> Self {
        Self::new(Method::DELETE, url)
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Raw body bytes. Content type is left to the caller.
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Serialize `value` as the JSON body and set `content-type`.
    pub fn json<T: Serialize + ?Sized>(mut self, value: &T) -> Result<Self, serde_json::Error> {
        let bytes = serde_json::to_vec(value)?;
        self.headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        self.body = Some(Bytes::from(bytes));
        Ok(self)
    }

    /// The `x-request-id` of this call, stamping a fresh UUID if it has none.
    /// A replay reuses the descriptor, so it carries the same id.
    pub fn ensure_request_id(&mut self) -> String {
        if let Some(existing) = self.headers.get(REQUEST_ID_HEADER).and_then(|v| v.to_str().ok()) {
            return existing.to_owned();
        }
        let id = uuid::Uuid::new_v4().to_string();
        if let Ok(value) = HeaderValue::from_str(&id) {
            self.headers.insert(REQUEST_ID_HEADER, value);
        }
        id
    }

    /// Path component of the URL, without query string or fragment.
    pub fn path(&self) -> &str {
        let rest = match self.url.split_once("://") {
            Some((_, after_scheme)) => match after_scheme.find('/') {
                Some(idx) => &after_scheme[idx..],
                None => "/",
            },
            None => self.url.as_str(),
        };
        let end = rest.find(['?', '#']).unwrap_or(rest.len());
        &rest[..end]
    }
}

/// Per-call retry bookkeeping, threaded alongside the descriptor.
///
/// Built fresh for every `send`. `attempted` only ever goes from false to
/// true; once set, the call is not eligible for another refresh cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RequestContext {
    attempted: bool,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attempted(&self) -> bool {
        self.attempted
    }

    pub fn mark_attempted(self) -> Self {
        Self { attempted: true }
    }
}

/// Resolve a descriptor URL against the base URL.
///
/// Absolute URLs pass through. Relative ones are joined to the base with a
/// single `/`, keeping any path prefix the base carries.
pub fn resolve_url(base_url: &str, url: &str) -> Result<Url, ClientError> {
    let joined = if url.starts_with("http://") || url.starts_with("https://") {
        url.to_owned()
    } else if url.is_empty() {
        base_url.to_owned()
    } else {
        format!("{}/{}", base_url.trim_end_matches('/'), url.trim_start_matches('/'))
    };
    let parsed = Url::parse(&joined)
        .map_err(|e| ClientError::InvalidRequest(format!("cannot resolve URL {joined:?}: {e}")))?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        other => Err(ClientError::InvalidRequest(format!("unsupported URL scheme: {other}"))),
    }
}

/// Attach transport options to a descriptor and build the request.
///
/// Credential inclusion lives on the shared `reqwest::Client` (its cookie
/// jar), so every builder made here carries it. Descriptors that cannot be
/// resolved are rejected here and never reach the transport.
pub fn decorate(
    http: &reqwest::Client,
    base_url: &str,
    req: &RequestDescriptor,
) -> Result<reqwest::RequestBuilder, ClientError> {
    let url = resolve_url(base_url, &req.url).inspect_err(|e| {
        error!(method = %req.method, url = %req.url, err = %e, "malformed request descriptor");
    })?;

    let mut builder = http.request(req.method.clone(), url).headers(req.headers.clone());
    if let Some(ref body) = req.body {
        builder = builder.body(body.clone());
    }
    Ok(builder)
}

#[cfg(test)]
#[path = "request_tests.rs"]
mod tests;
