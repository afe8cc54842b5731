use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::listing::Listing;
use crate::reference::{Ref, Referent};

/// A paid reservation, recorded once the payment provider confirms checkout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub id: Uuid,
    pub park: Ref<Listing>,
    pub user_email: String,
    pub price: f64,
    pub paid: bool,
    pub created_at: DateTime<Utc>,
}

impl Referent for Booking {
    const COLLECTION: &'static str = "bookings";
}
