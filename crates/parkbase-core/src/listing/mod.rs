//! The Listing entity: a bookable campsite or tour.

pub mod derive;
pub mod document;
pub mod geo;
pub mod input;
pub mod validate;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::reference::{Ref, Referent};
use crate::user::User;

pub use derive::{round_rating, slugify};
pub use document::ListingDocument;
pub use geo::{DistanceUnit, GeoPoint, LatLng, PointKind, Stop};
pub use input::{FieldTransform, ListingInput, ListingPatch, PATCH_TRANSFORMS};
pub use validate::{
    build_listing, build_patch, FieldViolation, Identity, SaveRules, ValidationError, Violations,
};

pub const DEFAULT_RATINGS_AVERAGE: f64 = 4.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Difficult,
}

impl Difficulty {
    pub const ALL: [Difficulty; 3] = [Difficulty::Easy, Difficulty::Medium, Difficulty::Difficult];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Difficult => "difficult",
        }
    }

    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|d| d.as_str() == raw)
    }
}

impl std::fmt::Display for Difficulty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stored listing document.
///
/// `slug` and `ratings_average` are derived: they are only ever written by
/// the derivation stage (see [`derive::apply_derivations`]) or the
/// field-level rating transform, never copied from caller input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Listing {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub duration: i32,
    pub max_group_size: i32,
    pub difficulty: Difficulty,
    pub ratings_average: f64,
    pub ratings_quantity: i32,
    pub price: f64,
    pub price_discount: Option<f64>,
    pub summary: String,
    pub description: Option<String>,
    pub image_cover: String,
    pub images: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub start_dates: Vec<DateTime<Utc>>,
    pub secret_listing: bool,
    pub start_location: Option<GeoPoint>,
    pub locations: Vec<Stop>,
    pub guides: Vec<Ref<User>>,
}

impl Referent for Listing {
    const COLLECTION: &'static str = "listings";
}

impl Listing {
    /// Length of the listing in weeks. Virtual, never stored.
    #[must_use]
    pub fn duration_weeks(&self) -> f64 {
        f64::from(self.duration) / 7.0
    }

    /// Guide identifiers in stored order.
    #[must_use]
    pub fn guide_ids(&self) -> Vec<Uuid> {
        self.guides.iter().map(Ref::id).collect()
    }
}
