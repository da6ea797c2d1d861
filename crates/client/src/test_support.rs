// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test infrastructure: an in-process marketplace API and recording
//! session hooks.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU16, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::header::SET_COOKIE;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::session::{NavigateToLogin, TeardownSession};

const SESSION_COOKIE: &str = "session=mock-session; Path=/; HttpOnly";

/// Server-side state of the mock API.
pub struct MockState {
    session_valid: AtomicBool,
    refresh_status: AtomicU16,
    refresh_delay_ms: AtomicU64,
    refresh_calls: AtomicU32,
    login_calls: AtomicU32,
    booking_calls: AtomicU32,
}

/// A marketplace API served from `127.0.0.1:0`, mounted under `/api`.
///
/// Routes:
/// - `POST /api/auth/login`: 200 and a valid session for password `secret`,
///   401 otherwise.
/// - `POST /api/auth/refresh-token`: waits the configured delay, then answers
///   with the configured status (200 revalidates the session).
/// - `GET|POST /api/bookings`: 401 unless the session is valid.
/// - `GET /api/admin/audit`: always 401.
/// - `GET /api/status/{code}`: answers with `code`.
///
/// The server stops when the value is dropped.
pub struct MockApi {
    addr: SocketAddr,
    state: Arc<MockState>,
    shutdown: CancellationToken,
}

impl MockApi {
    pub async fn start() -> anyhow::Result<Self> {
        let state = Arc::new(MockState {
            session_valid: AtomicBool::new(true),
            refresh_status: AtomicU16::new(200),
            refresh_delay_ms: AtomicU64::new(0),
            refresh_calls: AtomicU32::new(0),
            login_calls: AtomicU32::new(0),
            booking_calls: AtomicU32::new(0),
        });

        let router = Router::new()
            .route("/api/auth/login", post(login))
            .route("/api/auth/refresh-token", post(refresh_token))
            .route("/api/bookings", get(list_bookings).post(create_booking))
            .route("/api/admin/audit", get(admin_audit))
            .route("/api/status/{code}", get(fixed_status))
            .with_state(Arc::clone(&state));

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let shutdown = CancellationToken::new();
        let token = shutdown.clone();
        tokio::spawn(async move {
            let _ = axum::serve(listener, router).with_graceful_shutdown(token.cancelled_owned()).await;
        });

        Ok(Self { addr, state, shutdown })
    }

    /// Base URL including the `/api` prefix.
    pub fn base_url(&self) -> String {
        format!("http://{}/api", self.addr)
    }

    pub fn expire_session(&self) {
        self.state.session_valid.store(false, Ordering::SeqCst);
    }

    pub fn is_session_valid(&self) -> bool {
        self.state.session_valid.load(Ordering::SeqCst)
    }

    pub fn set_refresh_status(&self, status: u16) {
        self.state.refresh_status.store(status, Ordering::SeqCst);
    }

    pub fn set_refresh_delay(&self, delay: Duration) {
        let ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self.state.refresh_delay_ms.store(ms, Ordering::SeqCst);
    }

    pub fn refresh_calls(&self) -> u32 {
        self.state.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn login_calls(&self) -> u32 {
        self.state.login_calls.load(Ordering::SeqCst)
    }

    pub fn booking_calls(&self) -> u32 {
        self.state.booking_calls.load(Ordering::SeqCst)
    }
}

impl Drop for MockApi {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

fn unauthorized(message: &str) -> Response {
    (StatusCode::UNAUTHORIZED, Json(json!({ "message": message }))).into_response()
}

async fn login(State(s): State<Arc<MockState>>, Json(body): Json<Value>) -> Response {
    s.login_calls.fetch_add(1, Ordering::SeqCst);
    if body["password"] != "secret" {
        return unauthorized("invalid credentials");
    }
    s.session_valid.store(true, Ordering::SeqCst);
    ([(SET_COOKIE, SESSION_COOKIE)], Json(json!({ "user": body["email"] }))).into_response()
}

async fn refresh_token(State(s): State<Arc<MockState>>) -> Response {
    s.refresh_calls.fetch_add(1, Ordering::SeqCst);
    let delay = s.refresh_delay_ms.load(Ordering::SeqCst);
    if delay > 0 {
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }
    let status = StatusCode::from_u16(s.refresh_status.load(Ordering::SeqCst))
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    if status != StatusCode::OK {
        return (status, Json(json!({ "message": "refresh token invalid" }))).into_response();
    }
    s.session_valid.store(true, Ordering::SeqCst);
    ([(SET_COOKIE, SESSION_COOKIE)], Json(json!({ "refreshed": true }))).into_response()
}

async fn list_bookings(State(s): State<Arc<MockState>>) -> Response {
    s.booking_calls.fetch_add(1, Ordering::SeqCst);
    if !s.session_valid.load(Ordering::SeqCst) {
        return unauthorized("session expired");
    }
    Json(json!({ "bookings": [{ "id": 1, "service": "plumbing", "status": "confirmed" }] }))
        .into_response()
}

async fn create_booking(State(s): State<Arc<MockState>>, Json(body): Json<Value>) -> Response {
    s.booking_calls.fetch_add(1, Ordering::SeqCst);
    if !s.session_valid.load(Ordering::SeqCst) {
        return unauthorized("session expired");
    }
    (StatusCode::CREATED, Json(json!({ "created": body }))).into_response()
}

async fn admin_audit() -> Response {
    unauthorized("admin session required")
}

async fn fixed_status(Path(code): Path<u16>) -> Response {
    let status = StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(json!({ "error": format!("status {code}"), "code": code }))).into_response()
}

/// Records every teardown and navigation the client performs.
#[derive(Clone, Default)]
pub struct RecordingHooks {
    teardowns: Arc<AtomicU32>,
    locations: Arc<Mutex<Vec<String>>>,
}

impl RecordingHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn teardown(&self) -> impl TeardownSession + 'static {
        let count = Arc::clone(&self.teardowns);
        move || {
            count.fetch_add(1, Ordering::SeqCst);
        }
    }

    pub fn navigator(&self) -> impl NavigateToLogin + 'static {
        let locations = Arc::clone(&self.locations);
        move |location: &str| locations.lock().push(location.to_owned())
    }

    pub fn teardown_count(&self) -> u32 {
        self.teardowns.load(Ordering::SeqCst)
    }

    pub fn navigation_count(&self) -> usize {
        self.locations.lock().len()
    }

    pub fn navigations(&self) -> Vec<String> {
        self.locations.lock().clone()
    }
}
