use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::listing::Listing;
use crate::reference::{Ref, Referent};
use crate::user::User;

/// A review left by a user on a listing. The listing side of the relation is
/// virtual: listings never store their reviews.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub id: Uuid,
    pub review: String,
    pub rating: f64,
    pub created_at: DateTime<Utc>,
    pub park: Ref<Listing>,
    pub user: Ref<User>,
}

impl Referent for Review {
    const COLLECTION: &'static str = "reviews";
}
