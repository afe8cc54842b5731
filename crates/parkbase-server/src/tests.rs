//! Router-level tests: the full pipeline over the in-memory store.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::{to_bytes, Body},
    http::{header, HeaderMap, Request, StatusCode},
    Router,
};
use chrono::Utc;
use parkbase_core::{Role, User};
use parkbase_db::{BookingStore, MemoryStore};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use crate::api::AppState;
use crate::middleware::RateLimitState;
use crate::pipeline::{build_app, PipelineConfig, WEBHOOK_PATH};
use crate::webhook::{SignatureVerifier, SIGNATURE_HEADER};

const BODY_LIMIT: usize = 10 * 1024;
const SECRET: &str = "whsec_test_secret";

fn app_with(store: Arc<MemoryStore>, max_requests: usize) -> Router {
    let state = AppState::from_store(store, Some(SECRET.to_string()));
    build_app(
        state,
        PipelineConfig {
            body_limit_bytes: BODY_LIMIT,
            rate_limit: RateLimitState::new(max_requests, Duration::from_secs(3600)),
            log_requests: false,
            client_dir: None,
        },
    )
}

fn app() -> (Arc<MemoryStore>, Router) {
    let store = Arc::new(MemoryStore::new());
    (store.clone(), app_with(store, 100))
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, HeaderMap, Value) {
    let response = app.clone().oneshot(req).await.expect("response");
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body bytes");
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("json body")
    };
    (status, headers, json)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .body(Body::empty())
        .expect("request")
}

fn json_request(method: &str, uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_vec(body).expect("encode")))
        .expect("request")
}

fn payload(name: &str) -> Value {
    json!({
        "name": name,
        "duration": 5,
        "maxGroupSize": 10,
        "difficulty": "easy",
        "price": 100,
        "summary": "x",
        "imageCover": "y"
    })
}

fn guide(name: &str) -> User {
    User {
        id: Uuid::new_v4(),
        name: name.to_string(),
        email: format!("{}@example.com", name.to_lowercase()),
        photo: None,
        role: Role::LeadGuide,
        active: true,
        version: 7,
        password_changed_at: Some(Utc::now()),
    }
}

fn checkout_event(listing: Uuid, padding: usize) -> Vec<u8> {
    serde_json::to_vec(&json!({
        "type": "checkout.session.completed",
        "data": {
            "object": {
                "client_reference_id": listing,
                "customer_email": "camper@example.com",
                "amount_total": 49_700,
                "metadata": {
                    "$where": "<script>alert(1)</script>",
                    "note": "n".repeat(padding)
                }
            }
        }
    }))
    .expect("encode event")
}

fn signed_webhook(body: Vec<u8>) -> Request<Body> {
    let signature = SignatureVerifier::new(SECRET)
        .sign(&body, Utc::now().timestamp())
        .expect("sign");
    Request::builder()
        .method("POST")
        .uri(WEBHOOK_PATH)
        .header(header::CONTENT_TYPE, "application/json")
        .header(SIGNATURE_HEADER, signature)
        .body(Body::from(body))
        .expect("request")
}

// ---------------------------------------------------------------------------
// Rate limiting
// ---------------------------------------------------------------------------

#[tokio::test]
async fn hundred_and_first_request_is_limited() {
    let (_, app) = app();
    for _ in 0..100 {
        let (status, headers, _) = send(&app, get("/api/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(headers.contains_key("x-ratelimit-remaining"));
    }

    let (status, headers, body) = send(&app, get("/api/health")).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert!(headers.contains_key(header::RETRY_AFTER));
    assert_eq!(body["error"]["code"], "rate_limited");
    assert_eq!(
        body["error"]["message"],
        "Too many requests from this IP, please try again in an hour!"
    );
}

#[tokio::test]
async fn non_api_paths_are_not_counted() {
    let store = Arc::new(MemoryStore::new());
    let app = app_with(store, 1);
    for _ in 0..3 {
        let (status, _, _) = send(&app, get("/not-an-api-path")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
    let (status, _, _) = send(&app, get("/api/health")).await;
    assert_eq!(status, StatusCode::OK);
}

// ---------------------------------------------------------------------------
// Webhook raw body
// ---------------------------------------------------------------------------

#[tokio::test]
async fn webhook_verifies_raw_bytes_untouched_by_sanitization() {
    let (store, app) = app();
    let listing = Uuid::new_v4();
    let body = checkout_event(listing, 5 * 1024);

    let (status, _, json) = send(&app, signed_webhook(body)).await;
    assert_eq!(status, StatusCode::OK, "{json}");
    assert_eq!(json, json!({ "received": true }));

    let bookings = store.bookings().await.expect("bookings");
    assert_eq!(bookings.len(), 1);
    assert_eq!(bookings[0].park.id(), listing);
    assert!(bookings[0].paid);
    assert!((bookings[0].price - 497.0).abs() < f64::EPSILON);
}

#[tokio::test]
async fn webhook_body_is_exempt_from_ingestion_limit() {
    let (store, app) = app();
    let body = checkout_event(Uuid::new_v4(), 11 * 1024);
    assert!(body.len() > BODY_LIMIT);

    let (status, _, _) = send(&app, signed_webhook(body)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(store.bookings().await.expect("bookings").len(), 1);
}

#[tokio::test]
async fn webhook_rejects_bad_signature() {
    let (store, app) = app();
    let req = Request::builder()
        .method("POST")
        .uri(WEBHOOK_PATH)
        .header(header::CONTENT_TYPE, "application/json")
        .header(SIGNATURE_HEADER, format!("t={},v1=00ff", Utc::now().timestamp()))
        .body(Body::from(checkout_event(Uuid::new_v4(), 0)))
        .expect("request");

    let (status, _, json) = send(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["code"], "bad_request");
    assert!(store.bookings().await.expect("bookings").is_empty());
}

// ---------------------------------------------------------------------------
// Body ingestion and sanitization
// ---------------------------------------------------------------------------

#[tokio::test]
async fn oversized_structured_body_is_rejected() {
    let (_, app) = app();
    let mut body = payload("Oversized Camp Listing");
    body["description"] = json!("d".repeat(11 * 1024));

    let (status, _, json) = send(&app, json_request("POST", "/api/parks", &body)).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(json["error"]["code"], "payload_too_large");
}

#[tokio::test]
async fn markup_is_escaped_and_operator_keys_dropped() {
    let (_, app) = app();
    let mut body = payload("Markup Escape Camp");
    body["summary"] = json!("<b>bold</b>");
    body["$where"] = json!("1 == 1");

    let (status, _, json) = send(&app, json_request("POST", "/api/parks", &body)).await;
    assert_eq!(status, StatusCode::CREATED, "{json}");
    assert_eq!(json["data"]["summary"], "&lt;b&gt;bold&lt;/b&gt;");
    assert!(json["data"].get("$where").is_none());
}

#[tokio::test]
async fn form_body_creates_a_listing() {
    let (_, app) = app();
    let req = Request::builder()
        .method("POST")
        .uri("/api/parks")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(
            "name=Forest+Edge+Camp+Site&duration=5&maxGroupSize=10&difficulty=easy\
             &price=100&summary=x&imageCover=y&images[]=a.jpg&images[]=b.jpg",
        ))
        .expect("request");

    let (status, _, json) = send(&app, req).await;
    assert_eq!(status, StatusCode::CREATED, "{json}");
    assert_eq!(json["data"]["slug"], "forest-edge-camp-site");
    assert_eq!(json["data"]["images"], json!(["a.jpg", "b.jpg"]));
}

async fn assert_no_listings(app: &Router) {
    let (status, _, json) = send(app, get("/api/parks")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["meta"]["results"], 0);
}

#[tokio::test]
async fn malformed_json_body_stops_at_ingestion() {
    let (_, app) = app();
    let req = Request::builder()
        .method("POST")
        .uri("/api/parks")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"name": "Broken Json Camp", "price": "#))
        .expect("request");

    let (status, headers, json) = send(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["code"], "bad_request");
    assert!(json["error"]["message"]
        .as_str()
        .is_some_and(|m| m.starts_with("malformed body")));
    assert!(headers.contains_key("x-request-id"));
    assert_no_listings(&app).await;
}

#[tokio::test]
async fn malformed_form_body_stops_at_ingestion() {
    let (_, app) = app();
    let req = Request::builder()
        .method("POST")
        .uri("/api/parks")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(
            "name=%FF%FE+Camp+Site+Name&duration=5&maxGroupSize=10&difficulty=easy\
             &price=100&summary=x&imageCover=y",
        ))
        .expect("request");

    let (status, _, json) = send(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["code"], "bad_request");
    assert!(json["error"]["message"]
        .as_str()
        .is_some_and(|m| m.starts_with("malformed body")));
    assert_no_listings(&app).await;
}

#[tokio::test]
async fn operator_in_route_parameter_is_rejected() {
    let (_, app) = app();
    let (status, _, json) = send(&app, get("/api/parks/%24where")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["code"], "bad_request");
}

#[tokio::test]
async fn operator_query_keys_are_dropped_before_parsing() {
    let (_, app) = app();
    let (status, _, json) = send(&app, get("/api/parks?price%5B%24gt%5D=0")).await;
    assert_eq!(status, StatusCode::OK, "{json}");
}

#[tokio::test]
async fn unknown_route_returns_json_not_found() {
    let (_, app) = app();
    let (status, headers, json) = send(&app, get("/nowhere")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"]["code"], "not_found");
    assert!(headers.contains_key("x-request-id"));
}

// ---------------------------------------------------------------------------
// Listing routes
// ---------------------------------------------------------------------------

#[tokio::test]
async fn list_hides_secret_listings_and_populates_guides() {
    let (store, app) = app();
    let lead = guide("Lourdes");
    store.add_user(lead.clone()).await;

    for i in 0..10 {
        let mut body = payload(&format!("Lakeside Camp Number {i}"));
        body["guides"] = json!([lead.id]);
        body["secretListing"] = json!(i < 2);
        let (status, _, json) = send(&app, json_request("POST", "/api/parks", &body)).await;
        assert_eq!(status, StatusCode::CREATED, "{json}");
    }

    let (status, _, json) = send(&app, get("/api/parks")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["meta"]["results"], 8);
    let data = json["data"].as_array().expect("data array");
    assert_eq!(data.len(), 8);
    for doc in data {
        assert_eq!(doc["secretListing"], false);
        assert_eq!(doc["guides"][0]["name"], "Lourdes");
        assert_eq!(doc["guides"][0]["role"], "lead-guide");
        assert!(doc["guides"][0].get("version").is_none());
        assert!(doc.get("createdAt").is_none());
    }
}

#[tokio::test]
async fn secret_listing_is_still_reachable_by_id() {
    let (_, app) = app();
    let mut body = payload("Hidden Ridge Camp");
    body["secretListing"] = json!(true);
    let (_, _, created) = send(&app, json_request("POST", "/api/parks", &body)).await;
    let id = created["data"]["id"].as_str().expect("id").to_string();

    let (status, _, json) = send(&app, get(&format!("/api/parks/{id}"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["secretListing"], true);
    assert_eq!(json["data"]["reviews"], json!([]));

    let (status, _, _) = send(&app, get("/api/parks/slug/hidden-ridge-camp")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn validation_failure_lists_every_field() {
    let (_, app) = app();
    let (status, _, json) =
        send(&app, json_request("POST", "/api/parks", &json!({ "name": "short" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["code"], "validation_error");
    let fields: Vec<&str> = json["error"]["details"]
        .as_array()
        .expect("details")
        .iter()
        .filter_map(|v| v["field"].as_str())
        .collect();
    for field in ["name", "duration", "maxGroupSize", "price", "summary"] {
        assert!(fields.contains(&field), "missing {field} in {fields:?}");
    }
}

#[tokio::test]
async fn price_filter_and_top_cheap_alias() {
    let (_, app) = app();
    for (name, price) in [
        ("Budget Meadow Camp", 100),
        ("Midrange River Camp", 300),
        ("Luxury Summit Lodge", 700),
    ] {
        let mut body = payload(name);
        body["price"] = json!(price);
        send(&app, json_request("POST", "/api/parks", &body)).await;
    }

    let (status, _, json) = send(&app, get("/api/parks?price%5Blt%5D=500&sort=price")).await;
    assert_eq!(status, StatusCode::OK, "{json}");
    let names: Vec<&str> = json["data"]
        .as_array()
        .expect("data")
        .iter()
        .filter_map(|d| d["name"].as_str())
        .collect();
    assert_eq!(names, vec!["Budget Meadow Camp", "Midrange River Camp"]);

    let (status, _, json) = send(&app, get("/api/parks/top-5-cheap?limit=50")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"][0]["name"], "Budget Meadow Camp");
    assert!(json["data"].as_array().expect("data").len() <= 5);
}

#[tokio::test]
async fn unknown_query_field_is_a_bad_request() {
    let (_, app) = app();
    let (status, _, json) = send(&app, get("/api/parks?colour=red")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["code"], "bad_request");
}

#[tokio::test]
async fn put_creates_then_replaces_and_delete_removes() {
    let (_, app) = app();
    let id = Uuid::new_v4();
    let uri = format!("/api/parks/{id}");

    let (status, _, json) =
        send(&app, json_request("PUT", &uri, &payload("Canyon View Campground"))).await;
    assert_eq!(status, StatusCode::CREATED, "{json}");
    assert_eq!(json["data"]["id"], id.to_string());

    let (status, _, json) =
        send(&app, json_request("PUT", &uri, &payload("Canyon View Camp Renamed"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["slug"], "canyon-view-camp-renamed");

    let (status, _, json) =
        send(&app, json_request("PATCH", &uri, &json!({ "name": "Canyon Patched Name" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["name"], "Canyon Patched Name");
    assert_eq!(json["data"]["slug"], "canyon-view-camp-renamed");

    let req = Request::builder()
        .method("DELETE")
        .uri(&uri)
        .body(Body::empty())
        .expect("request");
    let (status, _, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _, json) = send(&app, get(&uri)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"]["message"], "No listing found with that ID");
}

#[tokio::test]
async fn health_reports_store_outage() {
    let (store, app) = app();
    store.set_offline::<parkbase_core::Listing>(true);
    let (status, _, json) = send(&app, get("/api/health")).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json["data"]["database"], "unavailable");
}
