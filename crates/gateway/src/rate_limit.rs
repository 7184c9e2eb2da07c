//! Per-client request throttling for the gateway.
//!
//! Each client (remote IP, or `anonymous` without connection info) gets a
//! sliding window of recent request instants. A request over the limit is
//! answered with 429 and a `Retry-After` hint. `/health` is never throttled.

use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::{
    Json,
    extract::ConnectInfo,
    http::{HeaderValue, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::warn;

use crate::api_v1::ErrorResponse;

/// Clients idle for a full window are forgotten once this many are tracked.
const SWEEP_THRESHOLD: usize = 10_000;

pub(crate) struct RequestThrottle {
    limit: usize,
    window: Duration,
    windows: Mutex<HashMap<String, VecDeque<Instant>>>,
}

impl RequestThrottle {
    pub(crate) fn per_minute(limit: usize) -> Self {
        Self::new(limit, Duration::from_secs(60))
    }

    pub(crate) fn new(limit: usize, window: Duration) -> Self {
        Self {
            limit,
            window,
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Record a request from `client` at `now`.
    ///
    /// Returns how long the client must wait when the request is over the limit.
    fn admit_at(&self, client: &str, now: Instant) -> Result<(), Duration> {
        let mut windows = self.windows.lock().unwrap_or_else(|e| e.into_inner());

        if windows.len() >= SWEEP_THRESHOLD {
            let window = self.window;
            windows.retain(|_, seen| seen.back().is_some_and(|t| now.duration_since(*t) < window));
        }

        let seen = windows.entry(client.to_owned()).or_default();
        while seen.front().is_some_and(|t| now.duration_since(*t) >= self.window) {
            seen.pop_front();
        }

        if seen.len() >= self.limit {
            let wait = seen
                .front()
                .map_or(self.window, |oldest| self.window - now.duration_since(*oldest));
            return Err(wait);
        }

        seen.push_back(now);
        Ok(())
    }

    fn admit(&self, client: &str) -> Result<(), Duration> {
        self.admit_at(client, Instant::now())
    }
}

fn client_key(req: &axum::extract::Request) -> String {
    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "anonymous".to_owned())
}

pub(crate) async fn throttle(
    throttle: Arc<RequestThrottle>,
    req: axum::extract::Request,
    next: Next,
) -> Response {
    if req.uri().path() == "/health" {
        return next.run(req).await;
    }

    let client = client_key(&req);
    match throttle.admit(&client) {
        Ok(()) => next.run(req).await,
        Err(wait) => {
            warn!(client = %client, retry_after_secs = wait.as_secs(), "Rate limit exceeded");
            let mut response = (
                StatusCode::TOO_MANY_REQUESTS,
                Json(ErrorResponse {
                    error: "Too many requests, please slow down".into(),
                }),
            )
                .into_response();
            let secs = wait.as_secs().max(1);
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
            response
        }
    }
}
