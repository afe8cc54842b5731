//! The request pipeline.
//!
//! Stages run in the order of [`PIPELINE`], outermost first. Two positions
//! are load-bearing: the webhook route must be mounted before body
//! ingestion so it still sees the raw bytes it verifies, and sanitization
//! must come after ingestion so it has a parsed body to clean.

use std::path::PathBuf;

use axum::{
    extract::Request,
    middleware::{from_fn, from_fn_with_state},
    response::IntoResponse,
    routing::post,
    Router,
};
use parkbase_core::AppConfig;
use tower_http::{
    compression::CompressionLayer,
    services::{ServeDir, ServeFile},
    trace::TraceLayer,
};

use crate::api::{api_router, ApiError, AppState};
use crate::middleware::{
    enforce_rate_limit, ingest_body, request_id, request_id_of, sanitize, BodyLimit,
    RateLimitState,
};
use crate::webhook::webhook_checkout;

pub const WEBHOOK_PATH: &str = "/webhook-checkout";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    RequestId,
    RequestLog,
    RateLimit,
    WebhookRawBody,
    BodyIngestion,
    Sanitize,
    Compression,
}

pub const PIPELINE: [Stage; 7] = [
    Stage::RequestId,
    Stage::RequestLog,
    Stage::RateLimit,
    Stage::WebhookRawBody,
    Stage::BodyIngestion,
    Stage::Sanitize,
    Stage::Compression,
];

const fn position(stage: Stage) -> usize {
    let mut i = 0;
    while i < PIPELINE.len() {
        if PIPELINE[i] as u8 == stage as u8 {
            return i;
        }
        i += 1;
    }
    usize::MAX
}

const _: () = assert!(position(Stage::RateLimit) < position(Stage::WebhookRawBody));
const _: () = assert!(position(Stage::WebhookRawBody) < position(Stage::BodyIngestion));
const _: () = assert!(position(Stage::BodyIngestion) < position(Stage::Sanitize));
const _: () = assert!(position(Stage::Sanitize) < position(Stage::Compression));

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub body_limit_bytes: usize,
    pub rate_limit: RateLimitState,
    pub log_requests: bool,
    /// Client bundle served for unmatched paths. `None` answers them with
    /// a JSON `not_found`.
    pub client_dir: Option<PathBuf>,
}

impl PipelineConfig {
    #[must_use]
    pub fn from_app_config(config: &AppConfig, rate_limit: RateLimitState) -> Self {
        Self {
            body_limit_bytes: config.body_limit_bytes,
            rate_limit,
            log_requests: config.env.logs_requests(),
            client_dir: config
                .env
                .serves_client()
                .then(|| config.client_build_dir.clone()),
        }
    }
}

async fn not_found(req: Request) -> impl IntoResponse {
    let path = req.uri().path().to_string();
    ApiError::new(
        request_id_of(&req),
        "not_found",
        format!("Can't find {path} on this server!"),
    )
}

fn with_fallback(router: Router<AppState>, client_dir: Option<&PathBuf>) -> Router<AppState> {
    match client_dir {
        Some(dir) => router.fallback_service(
            ServeDir::new(dir).not_found_service(ServeFile::new(dir.join("index.html"))),
        ),
        None => router.fallback(not_found),
    }
}

/// Build the full application: the API routes wrapped in every stage of
/// [`PIPELINE`].
pub fn build_app(state: AppState, config: PipelineConfig) -> Router {
    let mut app = with_fallback(api_router(), config.client_dir.as_ref());

    for stage in PIPELINE.iter().rev() {
        app = match stage {
            Stage::Compression => app.layer(CompressionLayer::new()),
            Stage::Sanitize => app.layer(from_fn(sanitize)),
            Stage::BodyIngestion => app.layer(from_fn_with_state(
                BodyLimit(config.body_limit_bytes),
                ingest_body,
            )),
            Stage::WebhookRawBody => Router::new()
                .route(WEBHOOK_PATH, post(webhook_checkout))
                .merge(app),
            Stage::RateLimit => app.layer(from_fn_with_state(
                config.rate_limit.clone(),
                enforce_rate_limit,
            )),
            Stage::RequestLog if config.log_requests => app.layer(TraceLayer::new_for_http()),
            Stage::RequestLog => app,
            Stage::RequestId => app.layer(from_fn(request_id)),
        };
    }

    app.with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_stage_appears_once() {
        for stage in PIPELINE {
            assert_eq!(
                PIPELINE.iter().filter(|s| **s == stage).count(),
                1,
                "{stage:?}"
            );
        }
    }

    #[test]
    fn webhook_is_mounted_between_rate_limit_and_ingestion() {
        assert!(position(Stage::RateLimit) < position(Stage::WebhookRawBody));
        assert_eq!(
            position(Stage::WebhookRawBody) + 1,
            position(Stage::BodyIngestion)
        );
    }
}
