// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Hooks the client calls when a session cannot be recovered.

use std::sync::Arc;

use tracing::{info, warn};

/// Clears whatever local state the caller keeps for the current session.
pub trait TeardownSession: Send + Sync {
    fn teardown_session(&self);
}

/// Sends the user to the login surface.
pub trait NavigateToLogin: Send + Sync {
    fn navigate_to_login(&self, location: &str);
}

impl<F> TeardownSession for F
where
    F: Fn() + Send + Sync,
{
    fn teardown_session(&self) {
        self()
    }
}

impl<F> NavigateToLogin for F
where
    F: Fn(&str) + Send + Sync,
{
    fn navigate_to_login(&self, location: &str) {
        self(location)
    }
}

/// Bundles the caller-supplied teardown and navigation hooks.
#[derive(Clone)]
pub struct SessionBridge {
    teardown: Arc<dyn TeardownSession>,
    navigator: Arc<dyn NavigateToLogin>,
    login_location: Arc<str>,
}

impl SessionBridge {
    pub fn new(
        teardown: impl TeardownSession + 'static,
        navigator: impl NavigateToLogin + 'static,
        login_location: impl Into<Arc<str>>,
    ) -> Self {
        Self {
            teardown: Arc::new(teardown),
            navigator: Arc::new(navigator),
            login_location: login_location.into(),
        }
    }

    pub fn login_location(&self) -> &str {
        &self.login_location
    }

    /// Tear the session down, then navigate to login. Terminal.
    pub fn end_session(&self, reason: &str) {
        warn!(reason, "session could not be refreshed, tearing down");
        self.teardown.teardown_session();
        info!(location = %self.login_location, "redirecting to login");
        self.navigator.navigate_to_login(&self.login_location);
    }
}

impl std::fmt::Debug for SessionBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionBridge").field("login_location", &self.login_location).finish()
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
