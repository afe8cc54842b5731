use std::{
    collections::HashMap,
    net::{IpAddr, SocketAddr},
    sync::Arc,
    time::{Duration, Instant},
};

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderName, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use parkbase_core::AppConfig;
use tokio::sync::Mutex;

use super::request_id_of;
use crate::api::ApiError;

pub const RATE_LIMIT_MESSAGE: &str = "Too many requests from this IP, please try again in an hour!";

const LIMIT_HEADER: HeaderName = HeaderName::from_static("x-ratelimit-limit");
const REMAINING_HEADER: HeaderName = HeaderName::from_static("x-ratelimit-remaining");

#[derive(Debug, Clone)]
struct RateLimitWindow {
    started_at: Instant,
    count: usize,
}

/// Outcome of counting one request against its client's window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allowed { remaining: usize },
    Limited { retry_after: Duration },
}

/// Fixed-window limiter keyed by client address. Requests without a known
/// peer address share one window.
#[derive(Debug, Clone)]
pub struct RateLimitState {
    max_requests: usize,
    window: Duration,
    clients: Arc<Mutex<HashMap<Option<IpAddr>, RateLimitWindow>>>,
}

impl RateLimitState {
    #[must_use]
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            clients: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    #[must_use]
    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            config.rate_limit_max,
            Duration::from_secs(config.rate_limit_window_secs),
        )
    }

    #[must_use]
    pub fn max_requests(&self) -> usize {
        self.max_requests
    }

    pub async fn check(&self, client: Option<IpAddr>, now: Instant) -> Decision {
        let mut clients = self.clients.lock().await;
        let window = clients.entry(client).or_insert(RateLimitWindow {
            started_at: now,
            count: 0,
        });

        let elapsed = now.saturating_duration_since(window.started_at);
        if elapsed >= self.window {
            window.started_at = now;
            window.count = 0;
        }

        if window.count >= self.max_requests {
            let retry_after = self
                .window
                .saturating_sub(now.saturating_duration_since(window.started_at));
            return Decision::Limited { retry_after };
        }

        window.count += 1;
        Decision::Allowed {
            remaining: self.max_requests - window.count,
        }
    }

    /// Drop windows that have expired. Returns how many were removed.
    pub async fn prune(&self, now: Instant) -> usize {
        let mut clients = self.clients.lock().await;
        let before = clients.len();
        clients.retain(|_, w| now.saturating_duration_since(w.started_at) < self.window);
        before - clients.len()
    }
}

fn is_limited_path(path: &str) -> bool {
    path == "/api" || path.starts_with("/api/")
}

fn set_header(res: &mut Response, name: HeaderName, value: usize) {
    if let Ok(value) = HeaderValue::from_str(&value.to_string()) {
        res.headers_mut().insert(name, value);
    }
}

/// Middleware enforcing the per-client request limit on `/api` routes.
pub async fn enforce_rate_limit(
    State(rate_limit): State<RateLimitState>,
    req: Request,
    next: Next,
) -> Response {
    if !is_limited_path(req.uri().path()) {
        return next.run(req).await;
    }

    let client = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0.ip());

    match rate_limit.check(client, Instant::now()).await {
        Decision::Allowed { remaining } => {
            let mut res = next.run(req).await;
            set_header(&mut res, LIMIT_HEADER, rate_limit.max_requests);
            set_header(&mut res, REMAINING_HEADER, remaining);
            res
        }
        Decision::Limited { retry_after } => {
            tracing::warn!(client = ?client, "rate limit exceeded");
            let mut res =
                ApiError::new(request_id_of(&req), "rate_limited", RATE_LIMIT_MESSAGE).into_response();
            let secs = usize::try_from(retry_after.as_secs().max(1)).unwrap_or(usize::MAX);
            set_header(&mut res, axum::http::header::RETRY_AFTER, secs);
            set_header(&mut res, LIMIT_HEADER, rate_limit.max_requests);
            set_header(&mut res, REMAINING_HEADER, 0);
            res
        }
    }
}
