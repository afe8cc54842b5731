//! Payment-provider webhook: verifies the signature over the raw request
//! bytes and records a booking for completed checkouts.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::HeaderMap,
    Extension, Json,
};
use chrono::Utc;
use hmac::{Hmac, Mac};
use parkbase_core::{Booking, Ref};
use parkbase_db::{BookingStore, DbError};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use thiserror::Error;
use uuid::Uuid;

use crate::api::{ApiError, AppState};
use crate::middleware::RequestId;

pub const SIGNATURE_HEADER: &str = "stripe-signature";
pub const DEFAULT_TOLERANCE_SECS: i64 = 300;
pub const CHECKOUT_COMPLETED: &str = "checkout.session.completed";

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("missing {SIGNATURE_HEADER} header")]
    MissingSignature,
    #[error("malformed signature header")]
    MalformedSignature,
    #[error("signature does not match payload")]
    SignatureMismatch,
    #[error("signature timestamp outside tolerance")]
    Expired,
    #[error("invalid event payload: {0}")]
    Payload(#[from] serde_json::Error),
    #[error(transparent)]
    Store(#[from] DbError),
}

/// HMAC-SHA256 signature check over `"{timestamp}." + body`.
#[derive(Clone)]
pub struct SignatureVerifier {
    secret: String,
    tolerance_secs: i64,
}

impl std::fmt::Debug for SignatureVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignatureVerifier")
            .field("secret", &"[redacted]")
            .field("tolerance_secs", &self.tolerance_secs)
            .finish()
    }
}

impl SignatureVerifier {
    #[must_use]
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            tolerance_secs: DEFAULT_TOLERANCE_SECS,
        }
    }

    fn digest(&self, timestamp: &str, body: &[u8]) -> Result<String, WebhookError> {
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .map_err(|_| WebhookError::MalformedSignature)?;
        mac.update(timestamp.as_bytes());
        mac.update(b".");
        mac.update(body);
        Ok(mac
            .finalize()
            .into_bytes()
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect())
    }

    /// Header value for `body` signed at `timestamp`.
    ///
    /// # Errors
    ///
    /// Only fails if the MAC cannot be keyed.
    pub fn sign(&self, body: &[u8], timestamp: i64) -> Result<String, WebhookError> {
        let t = timestamp.to_string();
        Ok(format!("t={t},v1={}", self.digest(&t, body)?))
    }

    /// # Errors
    ///
    /// Returns the reason the header does not authenticate `body` at `now`
    /// (unix seconds).
    pub fn verify(&self, header: &str, body: &[u8], now: i64) -> Result<(), WebhookError> {
        let mut timestamp = None;
        let mut candidates = Vec::new();
        for item in header.split(',') {
            match item.trim().split_once('=') {
                Some(("t", value)) => timestamp = Some(value),
                Some(("v1", value)) => candidates.push(value),
                _ => {}
            }
        }
        let timestamp = timestamp.ok_or(WebhookError::MalformedSignature)?;
        if candidates.is_empty() {
            return Err(WebhookError::MalformedSignature);
        }
        let signed_at: i64 = timestamp
            .parse()
            .map_err(|_| WebhookError::MalformedSignature)?;
        if (now - signed_at).abs() > self.tolerance_secs {
            return Err(WebhookError::Expired);
        }

        let expected = self.digest(timestamp, body)?;
        let matched = candidates
            .iter()
            .any(|c| bool::from(expected.as_bytes().ct_eq(c.as_bytes())));
        if matched {
            Ok(())
        } else {
            Err(WebhookError::SignatureMismatch)
        }
    }
}

#[derive(Debug, Deserialize)]
struct Event {
    #[serde(rename = "type")]
    kind: String,
    data: EventData,
}

#[derive(Debug, Deserialize)]
struct EventData {
    object: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct CheckoutSession {
    client_reference_id: Uuid,
    customer_email: String,
    amount_total: i64,
}

/// Receives checkout events. Without a secret, signatures are not checked.
#[derive(Clone)]
pub struct CheckoutWebhook {
    verifier: Option<SignatureVerifier>,
    bookings: Arc<dyn BookingStore>,
}

impl std::fmt::Debug for CheckoutWebhook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CheckoutWebhook")
            .field("verifier", &self.verifier)
            .finish_non_exhaustive()
    }
}

impl CheckoutWebhook {
    #[must_use]
    pub fn new(secret: Option<String>, bookings: Arc<dyn BookingStore>) -> Self {
        if secret.is_none() {
            tracing::warn!("STRIPE_WEBHOOK_SECRET not set; webhook signatures are not verified (development only)");
        }
        Self {
            verifier: secret.map(SignatureVerifier::new),
            bookings,
        }
    }

    /// Verify and process one delivery. Returns the booking recorded, if
    /// the event was a completed checkout.
    ///
    /// # Errors
    ///
    /// Signature failures, undecodable payloads and store failures.
    pub async fn receive(
        &self,
        signature: Option<&str>,
        body: &[u8],
    ) -> Result<Option<Booking>, WebhookError> {
        if let Some(verifier) = &self.verifier {
            let header = signature.ok_or(WebhookError::MissingSignature)?;
            verifier.verify(header, body, Utc::now().timestamp())?;
        }

        let event: Event = serde_json::from_slice(body)?;
        if event.kind != CHECKOUT_COMPLETED {
            tracing::debug!(kind = %event.kind, "webhook event ignored");
            return Ok(None);
        }

        let session: CheckoutSession = serde_json::from_value(event.data.object)?;
        #[allow(clippy::cast_precision_loss)]
        let price = session.amount_total as f64 / 100.0;
        let booking = Booking {
            id: Uuid::new_v4(),
            park: Ref::new(session.client_reference_id),
            user_email: session.customer_email,
            price,
            paid: true,
            created_at: Utc::now(),
        };
        self.bookings.record(&booking).await?;
        tracing::info!(booking = %booking.id, park = %booking.park.id(), "booking recorded from checkout");
        Ok(Some(booking))
    }
}

#[derive(Debug, Serialize)]
pub struct Received {
    pub received: bool,
}

/// `POST /webhook-checkout`. Takes the raw body; this route sits outside
/// the ingestion and sanitization stages.
pub async fn webhook_checkout(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Received>, ApiError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok());
    match state.webhook.receive(signature, &body).await {
        Ok(_) => Ok(Json(Received { received: true })),
        Err(WebhookError::Store(e)) => Err(crate::api::map_db_error(req_id.0, &e)),
        Err(e) => {
            tracing::warn!(error = %e, "webhook rejected");
            Err(ApiError::new(req_id.0, "bad_request", format!("Webhook error: {e}")))
        }
    }
}
