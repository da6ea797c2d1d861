// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end tests for the authenticated request pipeline against an
//! in-process marketplace API.

use std::time::Duration;

use reqwest::StatusCode;
use serde_json::{json, Value};

use marketclient::classify::ErrorClass;
use marketclient::client::HttpClient;
use marketclient::config::ClientConfig;
use marketclient::error::ClientError;
use marketclient::refresh::RefreshPhase;
use marketclient::request::RequestDescriptor;
use marketclient::test_support::{MockApi, RecordingHooks};

fn client_for(api: &MockApi, hooks: &RecordingHooks) -> anyhow::Result<HttpClient> {
    let config = ClientConfig::new(api.base_url());
    HttpClient::new(&config, hooks.teardown(), hooks.navigator())
}

// -- Happy path ---------------------------------------------------------------

#[tokio::test]
async fn valid_session_passes_through() -> anyhow::Result<()> {
    let api = MockApi::start().await?;
    let hooks = RecordingHooks::new();
    let client = client_for(&api, &hooks)?;

    let body: Value = client.send_json(RequestDescriptor::get("/bookings")).await?;

    assert_eq!(body["bookings"][0]["service"], "plumbing");
    assert_eq!(api.refresh_calls(), 0);
    assert_eq!(client.refresh_phase(), RefreshPhase::Idle);
    Ok(())
}

// -- Scenario 1: 401 → refresh 200 → replay 200 --------------------------------

#[tokio::test]
async fn expired_session_is_refreshed_and_replayed() -> anyhow::Result<()> {
    let api = MockApi::start().await?;
    api.expire_session();
    let hooks = RecordingHooks::new();
    let client = client_for(&api, &hooks)?;

    let resp = client.get("/bookings").await?;

    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await?;
    assert_eq!(body["bookings"][0]["status"], "confirmed");
    assert_eq!(api.refresh_calls(), 1);
    assert_eq!(api.booking_calls(), 2);
    assert_eq!(client.refresh_count(), 1);
    assert_eq!(client.refresh_phase(), RefreshPhase::RefreshSucceeded);
    assert_eq!(hooks.teardown_count(), 0);
    Ok(())
}

#[tokio::test]
async fn replay_resends_the_original_body() -> anyhow::Result<()> {
    let api = MockApi::start().await?;
    api.expire_session();
    let hooks = RecordingHooks::new();
    let client = client_for(&api, &hooks)?;

    let resp = client.post_json("/bookings", &json!({ "service": "cleaning", "slot": "09:00" })).await?;

    assert_eq!(resp.status(), StatusCode::CREATED);
    let body: Value = resp.json().await?;
    assert_eq!(body["created"]["service"], "cleaning");
    assert_eq!(body["created"]["slot"], "09:00");
    assert_eq!(api.refresh_calls(), 1);
    Ok(())
}

// -- Scenario 2: 401 → refresh 400 → teardown ---------------------------------

#[tokio::test]
async fn failed_refresh_tears_down_and_rejects() -> anyhow::Result<()> {
    let api = MockApi::start().await?;
    api.expire_session();
    api.set_refresh_status(400);
    let hooks = RecordingHooks::new();
    let client = client_for(&api, &hooks)?;

    let err = match client.get("/bookings").await {
        Ok(resp) => anyhow::bail!("expected rejection, got {}", resp.status()),
        Err(e) => e,
    };

    assert_eq!(err.class(), ErrorClass::AuthExpired);
    assert!(err.is_session_ended());
    assert_eq!(err.status(), Some(StatusCode::UNAUTHORIZED));
    assert_eq!(hooks.teardown_count(), 1);
    assert_eq!(hooks.navigations(), vec!["/login".to_owned()]);
    assert_eq!(api.refresh_calls(), 1);
    assert_eq!(api.booking_calls(), 1);
    assert_eq!(client.refresh_phase(), RefreshPhase::RefreshFailed);
    Ok(())
}

// -- Scenario 3: concurrent 401s share one refresh ----------------------------

#[tokio::test]
async fn concurrent_expiries_share_one_refresh() -> anyhow::Result<()> {
    let api = MockApi::start().await?;
    api.expire_session();
    api.set_refresh_delay(Duration::from_millis(200));
    let hooks = RecordingHooks::new();
    let client = client_for(&api, &hooks)?;

    let body = json!({ "service": "gardening" });
    let (a, b, c) = tokio::join!(
        client.get("/bookings"),
        client.get("/bookings"),
        client.post_json("/bookings", &body),
    );

    assert_eq!(a?.status(), StatusCode::OK);
    assert_eq!(b?.status(), StatusCode::OK);
    assert_eq!(c?.status(), StatusCode::CREATED);
    assert_eq!(api.refresh_calls(), 1);
    assert_eq!(api.booking_calls(), 6);
    Ok(())
}

#[tokio::test]
async fn concurrent_expiries_share_one_failure() -> anyhow::Result<()> {
    let api = MockApi::start().await?;
    api.expire_session();
    api.set_refresh_status(401);
    api.set_refresh_delay(Duration::from_millis(200));
    let hooks = RecordingHooks::new();
    let client = client_for(&api, &hooks)?;

    let (a, b) = tokio::join!(client.get("/bookings"), client.get("/bookings"));

    for result in [a, b] {
        match result {
            Ok(resp) => anyhow::bail!("expected rejection, got {}", resp.status()),
            Err(e) => assert!(e.is_session_ended()),
        }
    }
    assert_eq!(api.refresh_calls(), 1);
    assert_eq!(hooks.teardown_count(), 1);
    assert_eq!(hooks.navigation_count(), 1);
    Ok(())
}

// -- Scenario 4: auth endpoints never refresh ---------------------------------

#[tokio::test]
async fn login_failure_is_not_refreshed() -> anyhow::Result<()> {
    let api = MockApi::start().await?;
    let hooks = RecordingHooks::new();
    let client = client_for(&api, &hooks)?;

    let result = client
        .post_json("/auth/login", &json!({ "email": "pat@market.test", "password": "wrong" }))
        .await;

    let err = match result {
        Ok(resp) => anyhow::bail!("expected rejection, got {}", resp.status()),
        Err(e) => e,
    };
    assert_eq!(err.class(), ErrorClass::AuthExpired);
    assert!(!err.is_session_ended());
    assert_eq!(api.login_calls(), 1);
    assert_eq!(api.refresh_calls(), 0);
    assert_eq!(hooks.teardown_count(), 0);
    Ok(())
}

#[tokio::test]
async fn refresh_endpoint_failure_is_not_refreshed() -> anyhow::Result<()> {
    let api = MockApi::start().await?;
    api.set_refresh_status(401);
    let hooks = RecordingHooks::new();
    let client = client_for(&api, &hooks)?;

    let result = client.send(RequestDescriptor::post("/auth/refresh-token")).await;

    assert!(result.is_err());
    assert_eq!(api.refresh_calls(), 1);
    assert_eq!(client.refresh_count(), 0);
    assert_eq!(hooks.teardown_count(), 0);
    Ok(())
}

#[tokio::test]
async fn login_success_establishes_session() -> anyhow::Result<()> {
    let api = MockApi::start().await?;
    api.expire_session();
    let hooks = RecordingHooks::new();
    let client = client_for(&api, &hooks)?;

    let resp = client
        .post_json("/auth/login", &json!({ "email": "pat@market.test", "password": "secret" }))
        .await?;
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = client.get("/bookings").await?;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(api.refresh_calls(), 0);
    Ok(())
}

// -- Scenario 5: non-auth failures pass through untouched ---------------------

#[tokio::test]
async fn server_error_is_passed_through() -> anyhow::Result<()> {
    let api = MockApi::start().await?;
    let hooks = RecordingHooks::new();
    let client = client_for(&api, &hooks)?;

    let err = match client.get("/status/500").await {
        Ok(resp) => anyhow::bail!("expected rejection, got {}", resp.status()),
        Err(e) => e,
    };

    assert_eq!(err.class(), ErrorClass::ServerError);
    assert!(!err.is_session_ended());
    match err.into_inner() {
        ClientError::Status(failure) => {
            assert_eq!(failure.status, StatusCode::INTERNAL_SERVER_ERROR);
            let body: Value = serde_json::from_slice(&failure.body)?;
            assert_eq!(body, json!({ "error": "status 500", "code": 500 }));
            assert!(failure.url.ends_with("/api/status/500"));
        }
        other => anyhow::bail!("expected status error, got {other:?}"),
    }
    assert_eq!(api.refresh_calls(), 0);
    Ok(())
}

#[tokio::test]
async fn each_status_maps_to_its_class() -> anyhow::Result<()> {
    let api = MockApi::start().await?;
    let hooks = RecordingHooks::new();
    let client = client_for(&api, &hooks)?;

    let cases = [
        (400, ErrorClass::BadRequest),
        (403, ErrorClass::Forbidden),
        (404, ErrorClass::NotFound),
        (500, ErrorClass::ServerError),
        (409, ErrorClass::Unclassified),
        (503, ErrorClass::Unclassified),
    ];
    for (code, class) in cases {
        match client.get(&format!("/status/{code}")).await {
            Ok(resp) => anyhow::bail!("{code}: expected rejection, got {}", resp.status()),
            Err(e) => {
                assert_eq!(e.class(), class, "status {code}");
                assert_eq!(e.status().map(|s| s.as_u16()), Some(code));
            }
        }
    }
    assert_eq!(api.refresh_calls(), 0);
    Ok(())
}

#[tokio::test]
async fn transport_failure_is_unclassified() -> anyhow::Result<()> {
    let addr = {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        listener.local_addr()?
    };
    let hooks = RecordingHooks::new();
    let client = HttpClient::new(
        &ClientConfig::new(format!("http://{addr}/api")),
        hooks.teardown(),
        hooks.navigator(),
    )?;

    let err = match client.get("/bookings").await {
        Ok(resp) => anyhow::bail!("expected rejection, got {}", resp.status()),
        Err(e) => e,
    };

    assert_eq!(err.class(), ErrorClass::Unclassified);
    assert!(matches!(err.error(), ClientError::Transport(_)));
    assert_eq!(client.refresh_count(), 0);
    Ok(())
}

#[tokio::test]
async fn malformed_descriptor_is_rejected_before_sending() -> anyhow::Result<()> {
    let api = MockApi::start().await?;
    let hooks = RecordingHooks::new();
    let client = client_for(&api, &hooks)?;

    let err = match client.get("http://[::1").await {
        Ok(resp) => anyhow::bail!("expected rejection, got {}", resp.status()),
        Err(e) => e,
    };

    assert_eq!(err.class(), ErrorClass::Unclassified);
    assert!(matches!(err.error(), ClientError::InvalidRequest(_)));
    assert_eq!(api.booking_calls(), 0);
    Ok(())
}

// -- Scenario 6: replayed request fails 401 again -----------------------------

#[tokio::test]
async fn second_401_after_replay_is_terminal() -> anyhow::Result<()> {
    let api = MockApi::start().await?;
    let hooks = RecordingHooks::new();
    let client = client_for(&api, &hooks)?;

    let err = match client.get("/admin/audit").await {
        Ok(resp) => anyhow::bail!("expected rejection, got {}", resp.status()),
        Err(e) => e,
    };

    assert_eq!(err.class(), ErrorClass::AuthExpired);
    assert!(!err.is_session_ended());
    assert_eq!(api.refresh_calls(), 1);
    assert_eq!(client.refresh_count(), 1);
    assert_eq!(hooks.teardown_count(), 0);
    Ok(())
}

#[tokio::test]
async fn each_call_gets_its_own_retry_budget() -> anyhow::Result<()> {
    let api = MockApi::start().await?;
    let hooks = RecordingHooks::new();
    let client = client_for(&api, &hooks)?;

    for _ in 0..3 {
        assert!(client.get("/admin/audit").await.is_err());
    }

    assert_eq!(api.refresh_calls(), 3);
    Ok(())
}

#[tokio::test]
async fn decode_failure_is_unclassified() -> anyhow::Result<()> {
    let api = MockApi::start().await?;
    let hooks = RecordingHooks::new();
    let client = client_for(&api, &hooks)?;

    let result: Result<Vec<u32>, _> = client.send_json(RequestDescriptor::get("/bookings")).await;

    let err = match result {
        Ok(v) => anyhow::bail!("expected decode error, got {v:?}"),
        Err(e) => e,
    };
    assert_eq!(err.class(), ErrorClass::Unclassified);
    assert!(matches!(err.error(), ClientError::Decode(_)));
    Ok(())
}

#[tokio::test]
async fn truncated_error_body_is_reported() -> anyhow::Result<()> {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    // Promises 64 body bytes, sends 5, then hangs up.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        if let Ok((mut sock, _)) = listener.accept().await {
            let mut buf = [0u8; 1024];
            let _ = sock.read(&mut buf).await;
            let _ = sock
                .write_all(b"HTTP/1.1 500 Internal Server Error\r\ncontent-length: 64\r\n\r\n{\"err")
                .await;
            let _ = sock.shutdown().await;
        }
    });
    let hooks = RecordingHooks::new();
    let client = HttpClient::new(
        &ClientConfig::new(format!("http://{addr}/api")),
        hooks.teardown(),
        hooks.navigator(),
    )?;

    let err = match client.get("/bookings").await {
        Ok(resp) => anyhow::bail!("expected rejection, got {}", resp.status()),
        Err(e) => e,
    };

    assert_eq!(err.class(), ErrorClass::ServerError);
    assert_eq!(err.status(), Some(StatusCode::INTERNAL_SERVER_ERROR));
    let ClientError::Status(failure) = err.error() else {
        anyhow::bail!("expected status error, got {}", err.error());
    };
    assert!(failure.body.is_empty());
    assert!(failure.body_error.is_some());
    assert!(err.to_string().contains("body unreadable"), "{err}");
    Ok(())
}
