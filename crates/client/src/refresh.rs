// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Single-flight session refresh.
//!
//! At most one refresh call is in flight at any time. Requests that fail with
//! an expired session while it runs attach to the same shared future and
//! observe the same outcome. Each completed refresh bumps a generation
//! counter, so a request that was dispatched before the latest refresh
//! finished reuses that outcome instead of starting another one.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures_util::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use reqwest::{StatusCode, Url};
use tracing::{debug, info, warn};

use crate::session::SessionBridge;

/// Result of one refresh call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// The server renewed the session.
    Succeeded,
    /// The session is unrecoverable.
    Failed { reason: String },
}

impl RefreshOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded)
    }
}

/// Observable coordinator state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshPhase {
    Idle,
    RefreshInFlight,
    RefreshSucceeded,
    RefreshFailed,
}

type SharedRefresh = Shared<BoxFuture<'static, RefreshOutcome>>;

struct Slot {
    phase: RefreshPhase,
    generation: u64,
    in_flight: Option<SharedRefresh>,
    last: Option<RefreshOutcome>,
}

/// Owns the refresh call and the shared in-flight future.
pub struct RefreshCoordinator {
    http: reqwest::Client,
    refresh_url: Url,
    bridge: SessionBridge,
    slot: Arc<Mutex<Slot>>,
    issued: Arc<AtomicU64>,
}

impl RefreshCoordinator {
    pub fn new(http: reqwest::Client, refresh_url: Url, bridge: SessionBridge) -> Self {
        Self {
            http,
            refresh_url,
            bridge,
            slot: Arc::new(Mutex::new(Slot {
                phase: RefreshPhase::Idle,
                generation: 0,
                in_flight: None,
                last: None,
            })),
            issued: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Number of completed refresh cycles. Snapshot this before dispatching a
    /// request and pass it to [`Self::refresh_after`] if the request fails.
    pub fn generation(&self) -> u64 {
        self.slot.lock().generation
    }

    pub fn phase(&self) -> RefreshPhase {
        self.slot.lock().phase
    }

    /// Refresh calls actually sent to the server.
    pub fn refresh_count(&self) -> u64 {
        self.issued.load(Ordering::Relaxed)
    }

    /// Obtain a refresh outcome for a request dispatched at generation `seen`.
    ///
    /// Joins the in-flight refresh whenever there is one, regardless of
    /// `seen`. With nothing in flight, reuses the latest outcome if a refresh
    /// completed since `seen`, and otherwise starts a new one.
    pub async fn refresh_after(&self, seen: u64) -> RefreshOutcome {
        let pending = {
            let mut slot = self.slot.lock();
            if let Some(fut) = slot.in_flight.clone() {
                debug!(seen, generation = slot.generation, "joining in-flight session refresh");
                fut
            } else if let (true, Some(outcome)) = (slot.generation > seen, slot.last.clone()) {
                debug!(seen, generation = slot.generation, "refresh completed since dispatch");
                return outcome;
            } else {
                let fut = self.start();
                slot.in_flight = Some(fut.clone());
                slot.phase = RefreshPhase::RefreshInFlight;
                fut
            }
        };
        pending.await
    }

    fn start(&self) -> SharedRefresh {
        self.issued.fetch_add(1, Ordering::Relaxed);
        let http = self.http.clone();
        let url = self.refresh_url.clone();
        let bridge = self.bridge.clone();
        let slot = Arc::clone(&self.slot);

        async move {
            info!(url = %url, "refreshing session");
            let outcome = request_refresh(&http, url).await;
            match outcome {
                RefreshOutcome::Succeeded => info!("session refreshed"),
                RefreshOutcome::Failed { ref reason } => bridge.end_session(reason),
            }
            {
                let mut slot = slot.lock();
                slot.generation += 1;
                slot.in_flight = None;
                slot.phase = if outcome.is_success() {
                    RefreshPhase::RefreshSucceeded
                } else {
                    RefreshPhase::RefreshFailed
                };
                slot.last = Some(outcome.clone());
            }
            outcome
        }
        .boxed()
        .shared()
    }
}

impl std::fmt::Debug for RefreshCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshCoordinator")
            .field("refresh_url", &self.refresh_url.as_str())
            .field("phase", &self.phase())
            .field("issued", &self.refresh_count())
            .finish()
    }
}

/// POST to the refresh endpoint. Only a 200 counts as success.
async fn request_refresh(http: &reqwest::Client, url: Url) -> RefreshOutcome {
    match http.post(url).send().await {
        Ok(resp) if resp.status() == StatusCode::OK => RefreshOutcome::Succeeded,
        Ok(resp) => {
            let status = resp.status();
            warn!(%status, "session refresh rejected");
            RefreshOutcome::Failed { reason: format!("refresh rejected ({status})") }
        }
        Err(e) => {
            warn!(err = %e, "session refresh failed");
            RefreshOutcome::Failed { reason: format!("refresh failed: {e}") }
        }
    }
}

#[cfg(test)]
#[path = "refresh_tests.rs"]
mod tests;
