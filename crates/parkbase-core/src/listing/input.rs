//! Caller-supplied listing payloads.
//!
//! There are two write entry points with deliberately different semantics:
//!
//! - create-or-replace takes a [`ListingInput`] through full validation and
//!   the derivation stage (slug and rating are recomputed);
//! - patch turns a [`ListingInput`] into a [`ListingPatch`], running only the
//!   per-field validators and the transforms listed in [`PATCH_TRANSFORMS`].
//!   A patch that renames a listing therefore leaves its slug untouched.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::derive::round_rating;
use super::geo::{GeoPoint, Stop};
use super::{Difficulty, Listing};
use crate::reference::Ref;
use crate::user::User;

/// Wire shape of a listing write. Every field is optional so that validation
/// can report all missing and invalid fields at once. Fields the caller may
/// not set (`id`, `slug`, `createdAt`) are not part of the shape and are
/// ignored if present.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingInput {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub duration: Option<f64>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub max_group_size: Option<f64>,
    pub difficulty: Option<String>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub ratings_average: Option<f64>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub ratings_quantity: Option<f64>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub price: Option<f64>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub price_discount: Option<f64>,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub image_cover: Option<String>,
    pub images: Option<Vec<String>>,
    pub start_dates: Option<Vec<DateTime<Utc>>>,
    #[serde(default, deserialize_with = "lenient::flag")]
    pub secret_listing: Option<bool>,
    pub start_location: Option<GeoPoint>,
    pub locations: Option<Vec<Stop>>,
    pub guides: Option<Vec<Ref<User>>>,
}

/// Form-encoded bodies carry every scalar as text; numbers and flags are
/// accepted in either form.
mod lenient {
    use serde::{de::Error, Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrText {
        Number(f64),
        Text(String),
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum FlagOrText {
        Flag(bool),
        Text(String),
    }

    pub(super) fn number<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
        match Option::<NumberOrText>::deserialize(d)? {
            None => Ok(None),
            Some(NumberOrText::Number(n)) => Ok(Some(n)),
            Some(NumberOrText::Text(t)) => t
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|n| n.is_finite())
                .map(Some)
                .ok_or_else(|| D::Error::custom(format!("expected a number, got '{t}'"))),
        }
    }

    pub(super) fn flag<'de, D: Deserializer<'de>>(d: D) -> Result<Option<bool>, D::Error> {
        match Option::<FlagOrText>::deserialize(d)? {
            None => Ok(None),
            Some(FlagOrText::Flag(b)) => Ok(Some(b)),
            Some(FlagOrText::Text(t)) => match t.trim() {
                "true" => Ok(Some(true)),
                "false" => Ok(Some(false)),
                _ => Err(D::Error::custom(format!("expected true or false, got '{t}'"))),
            },
        }
    }
}

/// Field-level transforms a patch is allowed to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldTransform {
    /// Round `ratingsAverage` to one decimal.
    RoundRating,
    /// Trim surrounding whitespace from `name`, `summary` and `description`.
    TrimText,
}

/// The complete set of transforms applied on the patch path. Slug derivation
/// is intentionally absent.
pub const PATCH_TRANSFORMS: [FieldTransform; 2] =
    [FieldTransform::RoundRating, FieldTransform::TrimText];

/// A validated partial update. `None` means "leave the stored value alone".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListingPatch {
    pub name: Option<String>,
    pub duration: Option<i32>,
    pub max_group_size: Option<i32>,
    pub difficulty: Option<Difficulty>,
    pub ratings_average: Option<f64>,
    pub ratings_quantity: Option<i32>,
    pub price: Option<f64>,
    pub price_discount: Option<f64>,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub image_cover: Option<String>,
    pub images: Option<Vec<String>>,
    pub start_dates: Option<Vec<DateTime<Utc>>>,
    pub secret_listing: Option<bool>,
    pub start_location: Option<GeoPoint>,
    pub locations: Option<Vec<Stop>>,
    pub guides: Option<Vec<Ref<User>>>,
}

impl ListingPatch {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Run one whitelisted transform over the fields it owns.
    pub fn apply_transform(&mut self, transform: FieldTransform) {
        match transform {
            FieldTransform::RoundRating => {
                self.ratings_average = self.ratings_average.map(round_rating);
            }
            FieldTransform::TrimText => {
                for field in [&mut self.name, &mut self.summary, &mut self.description] {
                    if let Some(value) = field {
                        *value = value.trim().to_string();
                    }
                }
            }
        }
    }

    /// Copy every present field onto `listing`. Derived fields other than the
    /// already-rounded rating are not recomputed.
    pub fn apply_to(&self, listing: &mut Listing) {
        fn set<T: Clone>(target: &mut T, value: Option<&T>) {
            if let Some(v) = value {
                *target = v.clone();
            }
        }

        set(&mut listing.name, self.name.as_ref());
        set(&mut listing.duration, self.duration.as_ref());
        set(&mut listing.max_group_size, self.max_group_size.as_ref());
        set(&mut listing.difficulty, self.difficulty.as_ref());
        set(&mut listing.ratings_average, self.ratings_average.as_ref());
        set(&mut listing.ratings_quantity, self.ratings_quantity.as_ref());
        set(&mut listing.price, self.price.as_ref());
        set(&mut listing.summary, self.summary.as_ref());
        set(&mut listing.image_cover, self.image_cover.as_ref());
        set(&mut listing.images, self.images.as_ref());
        set(&mut listing.start_dates, self.start_dates.as_ref());
        set(&mut listing.secret_listing, self.secret_listing.as_ref());
        set(&mut listing.locations, self.locations.as_ref());
        set(&mut listing.guides, self.guides.as_ref());
        if let Some(discount) = self.price_discount {
            listing.price_discount = Some(discount);
        }
        if let Some(description) = &self.description {
            listing.description = Some(description.clone());
        }
        if let Some(point) = &self.start_location {
            listing.start_location = Some(point.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listing::fixtures;

    #[test]
    fn caller_supplied_slug_and_id_are_ignored() {
        let input: ListingInput = serde_json::from_value(serde_json::json!({
            "id": "not-even-a-uuid",
            "slug": "hand-written",
            "name": "Mountain Retreat Base"
        }))
        .expect("unknown fields are ignored");
        assert_eq!(input.name.as_deref(), Some("Mountain Retreat Base"));
    }

    #[test]
    fn numbers_and_flags_may_arrive_as_text() {
        let input: ListingInput = serde_json::from_value(serde_json::json!({
            "duration": "5",
            "price": 99.5,
            "secretListing": "true"
        }))
        .expect("lenient scalars");
        assert_eq!(input.duration, Some(5.0));
        assert_eq!(input.price, Some(99.5));
        assert_eq!(input.secret_listing, Some(true));
        assert!(input.max_group_size.is_none());

        let bad = serde_json::from_value::<ListingInput>(serde_json::json!({ "price": "cheap" }));
        assert!(bad.is_err());
    }

    #[test]
    fn non_finite_text_numbers_are_rejected() {
        for raw in ["NaN", "inf", "-infinity", "Infinity"] {
            let parsed = serde_json::from_value::<ListingInput>(
                serde_json::json!({ "ratingsAverage": raw }),
            );
            assert!(parsed.is_err(), "{raw} was accepted");
        }
    }

    #[test]
    fn patch_transforms_round_and_trim() {
        let mut patch = ListingPatch {
            ratings_average: Some(4.666),
            name: Some("  Desert Star Camp  ".to_string()),
            ..ListingPatch::default()
        };
        for transform in PATCH_TRANSFORMS {
            patch.apply_transform(transform);
        }
        assert_eq!(patch.ratings_average, Some(4.7));
        assert_eq!(patch.name.as_deref(), Some("Desert Star Camp"));
    }

    #[test]
    fn applying_a_rename_keeps_the_old_slug() {
        let mut listing = fixtures::listing("Mountain Retreat Base");
        let patch = ListingPatch {
            name: Some("Valley Retreat Base".to_string()),
            price: Some(80.0),
            ..ListingPatch::default()
        };
        patch.apply_to(&mut listing);
        assert_eq!(listing.name, "Valley Retreat Base");
        assert_eq!(listing.slug, "mountain-retreat-base");
        assert!((listing.price - 80.0).abs() < f64::EPSILON);
    }

    #[test]
    fn empty_patch_is_detected() {
        assert!(ListingPatch::default().is_empty());
        let patch = ListingPatch {
            secret_listing: Some(true),
            ..ListingPatch::default()
        };
        assert!(!patch.is_empty());
    }
}
