// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The authenticated request pipeline.

use std::sync::Arc;

use reqwest::cookie::Jar;
use serde::de::DeserializeOwned;
use tracing::{debug, info_span, Instrument};

use crate::classify::{classify, ErrorClass};
use crate::config::ClientConfig;
use crate::error::{ClassifiedError, ClientError, HttpFailure};
use crate::guard::AuthEndpoints;
use crate::refresh::{RefreshCoordinator, RefreshOutcome, RefreshPhase};
use crate::request::{decorate, resolve_url, RequestContext, RequestDescriptor};
use crate::session::{NavigateToLogin, SessionBridge, TeardownSession};

/// Shared client for the marketplace API.
///
/// Every call goes through [`HttpClient::send`]. A 401 on a non-auth endpoint
/// triggers one session refresh (shared with any other request failing at the
/// same time) and one replay. If the refresh fails, the session bridge hooks
/// run and the original error is returned.
pub struct HttpClient {
    http: reqwest::Client,
    base_url: String,
    endpoints: AuthEndpoints,
    refresh: RefreshCoordinator,
}

impl HttpClient {
    pub fn new(
        config: &ClientConfig,
        teardown: impl TeardownSession + 'static,
        navigator: impl NavigateToLogin + 'static,
    ) -> anyhow::Result<Self> {
        crate::ensure_crypto();
        config.validate()?;

        let mut builder = reqwest::Client::builder();
        if config.with_credentials {
            let jar = Arc::new(Jar::default());
            if let Some(ref cookie) = config.session_cookie {
                let origin = reqwest::Url::parse(&config.base_url)?;
                jar.add_cookie_str(cookie, &origin);
            }
            builder = builder.cookie_provider(jar);
        }
        let http = builder.build()?;

        let refresh_url = resolve_url(&config.base_url, &config.refresh_path)?;
        let bridge = SessionBridge::new(teardown, navigator, config.login_location.as_str());

        Ok(Self {
            refresh: RefreshCoordinator::new(http.clone(), refresh_url, bridge),
            http,
            base_url: config.base_url.clone(),
            endpoints: config.auth_endpoints(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn endpoints(&self) -> &AuthEndpoints {
        &self.endpoints
    }

    pub fn refresh_phase(&self) -> RefreshPhase {
        self.refresh.phase()
    }

    /// Refresh calls sent since construction.
    pub fn refresh_count(&self) -> u64 {
        self.refresh.refresh_count()
    }

    /// Send a request through the pipeline.
    ///
    /// Success returns the transport response. Failures come back classified,
    /// wrapping the transport's error unchanged. At most one replay happens
    /// per call.
    pub async fn send(
        &self,
        mut req: RequestDescriptor,
    ) -> Result<reqwest::Response, ClassifiedError> {
        let request_id = req.ensure_request_id();
        let span = info_span!("request", method = %req.method, url = %req.url, %request_id);
        self.run(req, RequestContext::new()).instrument(span).await
    }

    /// Send and decode a JSON success body.
    pub async fn send_json<T: DeserializeOwned>(
        &self,
        req: RequestDescriptor,
    ) -> Result<T, ClassifiedError> {
        let resp = self.send(req).await?;
        let bytes = resp.bytes().await.map_err(|e| {
            ClassifiedError::new(ErrorClass::Unclassified, ClientError::Transport(e))
        })?;
        serde_json::from_slice(&bytes)
            .map_err(|e| ClassifiedError::new(ErrorClass::Unclassified, ClientError::Decode(e)))
    }

    pub async fn get(&self, path: &str) -> Result<reqwest::Response, ClassifiedError> {
        self.send(RequestDescriptor::get(path)).await
    }

    pub async fn delete(&self, path: &str) -> Result<reqwest::Response, ClassifiedError> {
        self.send(RequestDescriptor::delete(path)).await
    }

    pub async fn post_json<B: serde::Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<reqwest::Response, ClassifiedError> {
        let req = RequestDescriptor::post(path).json(body).map_err(|e| {
            ClassifiedError::new(ErrorClass::Unclassified, ClientError::InvalidRequest(e.to_string()))
        })?;
        self.send(req).await
    }

    async fn run(
        &self,
        req: RequestDescriptor,
        mut ctx: RequestContext,
    ) -> Result<reqwest::Response, ClassifiedError> {
        loop {
            let seen = self.refresh.generation();
            let err = match self.dispatch(&req).await {
                Ok(resp) => return Ok(resp),
                Err(e) => e,
            };

            let class = classify(&err);
            if class != ErrorClass::AuthExpired {
                return Err(ClassifiedError::new(class, err));
            }
            if ctx.attempted() {
                debug!("already replayed once, giving up");
                return Err(ClassifiedError::new(class, err));
            }
            if self.endpoints.is_auth_endpoint(&req) {
                debug!("auth endpoint failure is not refreshed");
                return Err(ClassifiedError::new(class, err));
            }

            ctx = ctx.mark_attempted();
            match self.refresh.refresh_after(seen).await {
                RefreshOutcome::Succeeded => {
                    debug!("replaying after session refresh");
                }
                RefreshOutcome::Failed { .. } => {
                    return Err(ClassifiedError::session_ended(class, err));
                }
            }
        }
    }

    async fn dispatch(&self, req: &RequestDescriptor) -> Result<reqwest::Response, ClientError> {
        let builder = decorate(&self.http, &self.base_url, req)?;
        let resp = builder.send().await.map_err(ClientError::Transport)?;
        if resp.status().is_success() {
            return Ok(resp);
        }
        Err(ClientError::Status(HttpFailure::read(resp).await))
    }
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("base_url", &self.base_url)
            .field("endpoints", &self.endpoints)
            .field("refresh", &self.refresh)
            .finish()
    }
}
