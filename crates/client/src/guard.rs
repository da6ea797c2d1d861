// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use crate::request::RequestDescriptor;

/// The endpoints that implement authentication itself.
///
/// Failures on these are never refreshed or replayed; refreshing on a failed
/// refresh would recurse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthEndpoints {
    login: String,
    refresh: String,
}

impl AuthEndpoints {
    pub fn new(login: impl Into<String>, refresh: impl Into<String>) -> Self {
        let (login, refresh): (String, String) = (login.into(), refresh.into());
        Self { login: normalize(&login).to_owned(), refresh: normalize(&refresh).to_owned() }
    }

    pub fn login(&self) -> &str {
        &self.login
    }

    pub fn refresh(&self) -> &str {
        &self.refresh
    }

    /// True iff the request path ends with the login or refresh path on a
    /// segment boundary. Query strings, fragments and a trailing `/` are
    /// ignored.
    pub fn is_auth_endpoint(&self, req: &RequestDescriptor) -> bool {
        let path = normalize(req.path());
        [self.login.as_str(), self.refresh.as_str()]
            .into_iter()
            .any(|endpoint| matches_endpoint(path, endpoint))
    }
}

impl Default for AuthEndpoints {
    fn default() -> Self {
        Self::new("/auth/login", "/auth/refresh-token")
    }
}

fn normalize(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        "/"
    } else {
        trimmed
    }
}

fn matches_endpoint(path: &str, endpoint: &str) -> bool {
    let endpoint = endpoint.trim_start_matches('/');
    if endpoint.is_empty() {
        return false;
    }
    match path.strip_suffix(endpoint) {
        Some("") => true,
        Some(prefix) => prefix.ends_with('/'),
        None => false,
    }
}

#[cfg(test)]
#[path = "guard_tests.rs"]
mod tests;
