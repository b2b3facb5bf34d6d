//! Shared fixtures for the integration tests: a routed mock transport that
//! records every request, and a counting credential source.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use reqwest::Method;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use watchbridge_core::api::auth::{ProfileData, TokenData};
use watchbridge_core::api::credentials::{CredentialSource, Credentials, ProfilePayload};
use watchbridge_core::api::transport::{HttpRequest, HttpResponse, Transport};
use watchbridge_core::clock::{Clock, ManualClock};
use watchbridge_core::error::Result;
use watchbridge_core::{ClientConfig, StreamClient};

pub const BASE_URL: &str = "https://svc.test";
pub const PLAYBACK_URL: &str = "https://play.test";
pub const ACCOUNT: &str = "acc-1";

struct Route {
    method: Method,
    path: String,
    responses: VecDeque<HttpResponse>,
}

/// Answers by exact method + path; the last queued response of a route
/// repeats. Unrouted requests get a 404.
#[derive(Default)]
pub struct MockTransport {
    routes: Mutex<Vec<Route>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl MockTransport {
    pub fn on(&self, method: Method, path: &str, status: u16, body: Value) -> &Self {
        let response = HttpResponse::new(status, if body.is_null() { String::new() } else { body.to_string() });
        let mut routes = self.routes.lock().unwrap();
        match routes.iter_mut().find(|r| r.method == method && r.path == path) {
            Some(route) => route.responses.push_back(response),
            None => routes.push(Route {
                method,
                path: path.to_string(),
                responses: VecDeque::from([response]),
            }),
        }
        self
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn count(&self, method: Method, path: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.method == method && r.url.path() == path)
            .count()
    }

    pub fn urls_for(&self, path: &str) -> Vec<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.url.path() == path)
            .map(|r| r.url.to_string())
            .collect()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let response = {
            let mut routes = self.routes.lock().unwrap();
            routes
                .iter_mut()
                .find(|r| r.method == request.method && r.path == request.url.path())
                .map(|route| {
                    if route.responses.len() > 1 {
                        route.responses.pop_front().unwrap()
                    } else {
                        route.responses[0].clone()
                    }
                })
                .unwrap_or_else(|| HttpResponse::new(404, r#"{"error":"no route"}"#))
        };
        self.requests.lock().unwrap().push(request);
        Ok(response)
    }
}

/// Hands out the same credentials every time and counts the requests
pub struct StubSource {
    pub calls: AtomicUsize,
    credentials: Mutex<Option<Credentials>>,
    delay: Duration,
}

impl StubSource {
    pub fn new(credentials: Option<Credentials>, delay: Duration) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            credentials: Mutex::new(credentials),
            delay,
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CredentialSource for StubSource {
    async fn request_credentials(&self, _retries: u32) -> Option<Credentials> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.credentials.lock().unwrap().clone()
    }
}

pub fn credentials(clock: &dyn Clock) -> Credentials {
    Credentials {
        token_data: TokenData {
            access_token: "token-1".to_string(),
            account_id: Some(ACCOUNT.to_string()),
            expires_at: clock.now() + chrono::Duration::hours(1),
            country: Some("US".to_string()),
        },
        profile_data: Some(ProfilePayload::Single(ProfileData {
            profile_id: "prof-1".to_string(),
            account_id: Some(ACCOUNT.to_string()),
            is_selected: true,
        })),
    }
}

pub struct Harness {
    pub client: StreamClient,
    pub transport: Arc<MockTransport>,
    pub source: Arc<StubSource>,
    pub clock: Arc<ManualClock>,
}

/// Client on a mock transport, clock frozen at 2025-01-15 12:00 UTC
pub fn harness() -> Harness {
    harness_with_delay(Duration::ZERO)
}

pub fn harness_with_delay(delay: Duration) -> Harness {
    let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2025, 1, 15, 12, 0, 0).unwrap()));
    let transport = Arc::new(MockTransport::default());
    let source = Arc::new(StubSource::new(Some(credentials(clock.as_ref())), delay));

    let config = ClientConfig::builder()
        .base_url(BASE_URL)
        .playback_base_url(PLAYBACK_URL)
        .build();
    let client = StreamClient::builder(config)
        .transport(transport.clone())
        .credential_source(source.clone())
        .clock(clock.clone())
        .build()
        .unwrap();

    Harness {
        client,
        transport,
        source,
        clock,
    }
}

/// `n` browse-style items with ids `prefix-0..n`
pub fn items(prefix: &str, n: usize) -> Vec<Value> {
    (0..n)
        .map(|i| serde_json::json!({"id": format!("{}-{}", prefix, i), "title": format!("Title {}", i)}))
        .collect()
}
