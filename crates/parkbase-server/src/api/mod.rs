mod bookings;
mod listings;
mod reviews;
mod users;

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use parkbase_core::CoreError;
use parkbase_db::{BookingStore, DbError, ListingError, Listings, ReviewStore, UserDirectory};
use serde::Serialize;
use uuid::Uuid;

use crate::middleware::RequestId;
use crate::webhook::CheckoutWebhook;

#[derive(Clone)]
pub struct AppState {
    pub listings: Listings,
    pub users: Arc<dyn UserDirectory>,
    pub reviews: Arc<dyn ReviewStore>,
    pub bookings: Arc<dyn BookingStore>,
    pub webhook: CheckoutWebhook,
}

impl AppState {
    /// Wire every collaborator to the same backing store.
    pub fn from_store<S>(store: Arc<S>, webhook_secret: Option<String>) -> Self
    where
        S: parkbase_db::ListingStore + UserDirectory + ReviewStore + BookingStore + 'static,
    {
        let listings = Listings::new(store.clone(), store.clone(), store.clone());
        Self {
            listings,
            users: store.clone(),
            reviews: store.clone(),
            bookings: store.clone(),
            webhook: CheckoutWebhook::new(webhook_secret, store),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub data: T,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ResponseMeta {
    pub request_id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: ErrorBody,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
struct HealthData {
    status: &'static str,
    database: &'static str,
}

impl ResponseMeta {
    pub(crate) fn new(request_id: String) -> Self {
        Self {
            request_id,
            timestamp: Utc::now(),
            results: None,
        }
    }

    pub(crate) fn counted(request_id: String, results: usize) -> Self {
        Self {
            results: Some(results),
            ..Self::new(request_id)
        }
    }
}

impl ApiError {
    pub fn new(
        request_id: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            error: ErrorBody {
                code: code.into(),
                message: message.into(),
                details: None,
            },
            meta: ResponseMeta::new(request_id.into()),
        }
    }

    #[must_use]
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.error.details = Some(details);
        self
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = match self.error.code.as_str() {
            "not_found" => StatusCode::NOT_FOUND,
            "unauthorized" => StatusCode::UNAUTHORIZED,
            "bad_request" | "validation_error" => StatusCode::BAD_REQUEST,
            "payload_too_large" => StatusCode::PAYLOAD_TOO_LARGE,
            "rate_limited" => StatusCode::TOO_MANY_REQUESTS,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(self)).into_response()
    }
}

pub(crate) fn map_db_error(request_id: String, error: &DbError) -> ApiError {
    tracing::error!(error = %error, "database query failed");
    ApiError::new(request_id, "internal_error", "database query failed")
}

pub(crate) fn map_core_error(request_id: String, error: &CoreError) -> ApiError {
    ApiError::new(request_id, "bad_request", error.to_string())
}

pub(crate) fn map_listing_error(request_id: String, error: ListingError) -> ApiError {
    match error {
        ListingError::Validation(e) => {
            let details = serde_json::to_value(&e.violations).unwrap_or_default();
            ApiError::new(request_id, "validation_error", e.to_string()).with_details(details)
        }
        ListingError::NotFound(_) => {
            ApiError::new(request_id, "not_found", "No listing found with that ID")
        }
        ListingError::DataAccess(e) => map_db_error(request_id, &e),
    }
}

pub(crate) fn parse_id(request_id: &str, raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| {
        ApiError::new(request_id, "bad_request", format!("invalid id: {raw}"))
    })
}

/// Every route behind the body ingestion stage.
pub fn api_router() -> Router<AppState> {
    Router::new()
        .route("/api/health", get(health))
        .merge(listings::routes())
        .route("/api/users", get(users::list_users))
        .route("/api/users/{id}", get(users::get_user))
        .route("/api/reviews", get(reviews::list_reviews))
        .route("/api/bookings", get(bookings::list_bookings))
}

async fn health(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> impl IntoResponse {
    let meta = ResponseMeta::new(req_id.0);

    match state.listings.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(ApiResponse {
                data: HealthData {
                    status: "ok",
                    database: "ok",
                },
                meta,
            }),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "health check: database unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ApiResponse {
                    data: HealthData {
                        status: "degraded",
                        database: "unavailable",
                    },
                    meta,
                }),
            )
        }
    }
}
