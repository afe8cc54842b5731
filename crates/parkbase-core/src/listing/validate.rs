//! Listing validation.
//!
//! Validation never stops at the first problem: every failing field is
//! collected into one [`ValidationError`].

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use super::derive::{apply_derivations, round_rating, slugify};
use super::geo::{GeoPoint, Stop};
use super::input::{ListingInput, ListingPatch, PATCH_TRANSFORMS};
use super::{Difficulty, Listing, DEFAULT_RATINGS_AVERAGE};

pub const NAME_MIN_CHARS: usize = 10;
pub const NAME_MAX_CHARS: usize = 40;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldViolation {
    pub field: String,
    pub reason: String,
}

/// Every field that failed validation, in field order.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("invalid listing: {}", describe(.violations))]
pub struct ValidationError {
    pub violations: Vec<FieldViolation>,
}

fn describe(violations: &[FieldViolation]) -> String {
    violations
        .iter()
        .map(|v| format!("{}: {}", v.field, v.reason))
        .collect::<Vec<_>>()
        .join("; ")
}

impl ValidationError {
    #[must_use]
    pub fn single(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            violations: vec![FieldViolation {
                field: field.into(),
                reason: reason.into(),
            }],
        }
    }

    #[must_use]
    pub fn has_field(&self, field: &str) -> bool {
        self.violations.iter().any(|v| v.field == field)
    }

    #[must_use]
    pub fn fields(&self) -> Vec<&str> {
        self.violations.iter().map(|v| v.field.as_str()).collect()
    }
}

/// Accumulates violations while a payload is checked.
#[derive(Debug, Default)]
pub struct Violations(Vec<FieldViolation>);

impl Violations {
    pub fn push(&mut self, field: impl Into<String>, reason: impl Into<String>) {
        self.0.push(FieldViolation {
            field: field.into(),
            reason: reason.into(),
        });
    }

    pub fn extend(&mut self, other: ValidationError) {
        self.0.extend(other.violations);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn into_error(self) -> ValidationError {
        ValidationError { violations: self.0 }
    }

    /// # Errors
    ///
    /// Returns the collected violations if there are any.
    pub fn finish(self) -> Result<(), ValidationError> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { violations: self.0 })
        }
    }
}

/// Which save-time rules apply to a full-document write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaveRules {
    /// Enforce `priceDiscount < price`.
    pub check_discount: bool,
}

impl Default for SaveRules {
    fn default() -> Self {
        Self {
            check_discount: true,
        }
    }
}

/// Identity fields of a document that the caller cannot choose.
#[derive(Debug, Clone, Copy)]
pub struct Identity {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
}

impl Identity {
    #[must_use]
    pub fn fresh() -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
        }
    }
}

/// Validate a full listing payload and run the derivation stage on it.
///
/// # Errors
///
/// Returns a [`ValidationError`] naming every invalid or missing field.
pub fn build_listing(
    input: ListingInput,
    identity: Identity,
    rules: SaveRules,
) -> Result<Listing, ValidationError> {
    let mut v = Violations::default();

    let name = required(&mut v, "name", input.name.as_deref().map(str::trim))
        .and_then(|n| check_name(&mut v, n));
    let duration = required(&mut v, "duration", input.duration)
        .and_then(|d| check_int(&mut v, "duration", d, 0));
    let max_group_size = required(&mut v, "maxGroupSize", input.max_group_size)
        .and_then(|n| check_int(&mut v, "maxGroupSize", n, 1));
    let difficulty = required(&mut v, "difficulty", input.difficulty.as_deref())
        .and_then(|d| check_difficulty(&mut v, d));
    let ratings_average = check_rating(
        &mut v,
        input.ratings_average.unwrap_or(DEFAULT_RATINGS_AVERAGE),
    );
    let ratings_quantity = check_int(
        &mut v,
        "ratingsQuantity",
        input.ratings_quantity.unwrap_or(0.0),
        0,
    );
    let price = required(&mut v, "price", input.price).and_then(|p| check_price(&mut v, p));
    if let (Some(discount), Some(price)) = (input.price_discount, price) {
        if !discount.is_finite() || (rules.check_discount && discount >= price) {
            v.push(
                "priceDiscount",
                format!("discount price ({discount}) should be below regular price"),
            );
        }
    }
    let summary = required(&mut v, "summary", non_blank(input.summary.as_deref()));
    let image_cover = required(&mut v, "imageCover", non_blank(input.image_cover.as_deref()));
    if let Some(point) = &input.start_location {
        check_point(&mut v, "startLocation", point);
    }
    let locations = input.locations.unwrap_or_default();
    check_stops(&mut v, &locations);

    let (
        Some(name),
        Some(duration),
        Some(max_group_size),
        Some(difficulty),
        Some(ratings_average),
        Some(ratings_quantity),
        Some(price),
        Some(summary),
        Some(image_cover),
    ) = (
        name,
        duration,
        max_group_size,
        difficulty,
        ratings_average,
        ratings_quantity,
        price,
        summary,
        image_cover,
    )
    else {
        return Err(v.into_error());
    };
    v.finish()?;

    let mut listing = Listing {
        id: identity.id,
        name,
        slug: String::new(),
        duration,
        max_group_size,
        difficulty,
        ratings_average,
        ratings_quantity,
        price,
        price_discount: input.price_discount,
        summary,
        description: non_blank(input.description.as_deref()),
        image_cover,
        images: input.images.unwrap_or_default(),
        created_at: identity.created_at,
        start_dates: input.start_dates.unwrap_or_default(),
        secret_listing: input.secret_listing.unwrap_or(false),
        start_location: input.start_location,
        locations,
        guides: input.guides.unwrap_or_default(),
    };
    apply_derivations(&mut listing);
    Ok(listing)
}

/// Validate the fields present in a partial update and apply the patch
/// transforms. Cross-field save rules (`priceDiscount < price`) do not run.
///
/// # Errors
///
/// Returns a [`ValidationError`] naming every invalid field.
pub fn build_patch(input: ListingInput) -> Result<ListingPatch, ValidationError> {
    let mut v = Violations::default();

    let mut patch = ListingPatch {
        name: input
            .name
            .as_deref()
            .and_then(|n| check_name(&mut v, n.trim())),
        duration: input
            .duration
            .and_then(|d| check_int(&mut v, "duration", d, 0)),
        max_group_size: input
            .max_group_size
            .and_then(|n| check_int(&mut v, "maxGroupSize", n, 1)),
        difficulty: input
            .difficulty
            .as_deref()
            .and_then(|d| check_difficulty(&mut v, d)),
        ratings_average: input.ratings_average.and_then(|r| check_rating(&mut v, r)),
        ratings_quantity: input
            .ratings_quantity
            .and_then(|q| check_int(&mut v, "ratingsQuantity", q, 0)),
        price: input.price.and_then(|p| check_price(&mut v, p)),
        price_discount: input.price_discount.filter(|d| {
            let finite = d.is_finite();
            if !finite {
                v.push("priceDiscount", "discount price must be a number");
            }
            finite
        }),
        summary: match input.summary.as_deref() {
            Some(s) => required(&mut v, "summary", non_blank(Some(s))),
            None => None,
        },
        description: input.description,
        image_cover: match input.image_cover.as_deref() {
            Some(s) => required(&mut v, "imageCover", non_blank(Some(s))),
            None => None,
        },
        images: input.images,
        start_dates: input.start_dates,
        secret_listing: input.secret_listing,
        start_location: input.start_location,
        locations: input.locations,
        guides: input.guides,
    };
    if let Some(point) = &patch.start_location {
        check_point(&mut v, "startLocation", point);
    }
    if let Some(stops) = &patch.locations {
        check_stops(&mut v, stops);
    }

    v.finish()?;

    for transform in PATCH_TRANSFORMS {
        patch.apply_transform(transform);
    }
    Ok(patch)
}

fn required<T>(v: &mut Violations, field: &str, value: Option<T>) -> Option<T> {
    if value.is_none() {
        v.push(field, format!("{field} is required"));
    }
    value
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToOwned::to_owned)
}

fn check_name(v: &mut Violations, name: &str) -> Option<String> {
    let chars = name.chars().count();
    if chars < NAME_MIN_CHARS {
        v.push(
            "name",
            format!("a listing name must have at least {NAME_MIN_CHARS} characters"),
        );
        None
    } else if chars > NAME_MAX_CHARS {
        v.push(
            "name",
            format!("a listing name must have at most {NAME_MAX_CHARS} characters"),
        );
        None
    } else if slugify(name).is_empty() {
        v.push(
            "name",
            "a listing name must contain at least one letter or digit",
        );
        None
    } else {
        Some(name.to_string())
    }
}

#[allow(clippy::cast_possible_truncation)]
fn check_int(v: &mut Violations, field: &str, value: f64, min: i32) -> Option<i32> {
    if value.fract() != 0.0 || value < f64::from(i32::MIN) || value > f64::from(i32::MAX) {
        v.push(field, format!("{field} must be a whole number"));
        return None;
    }
    let value = value as i32;
    if value < min {
        v.push(field, format!("{field} must be at least {min}"));
        return None;
    }
    Some(value)
}

fn check_difficulty(v: &mut Violations, raw: &str) -> Option<Difficulty> {
    let parsed = Difficulty::parse(raw);
    if parsed.is_none() {
        v.push("difficulty", "difficulty is either: easy, medium, difficult");
    }
    parsed
}

/// Rounding happens before the range check, as it does on every write.
fn check_rating(v: &mut Violations, raw: f64) -> Option<f64> {
    let rating = round_rating(raw);
    if !rating.is_finite() {
        v.push("ratingsAverage", "rating must be a number");
        None
    } else if rating < 1.0 {
        v.push("ratingsAverage", "rating must be at least 1.0");
        None
    } else if rating > 5.0 {
        v.push("ratingsAverage", "rating must be at most 5.0");
        None
    } else {
        Some(rating)
    }
}

fn check_price(v: &mut Violations, price: f64) -> Option<f64> {
    if price.is_finite() && price > 0.0 {
        Some(price)
    } else {
        v.push("price", "price must be greater than 0");
        None
    }
}

fn check_point(v: &mut Violations, field: &str, point: &GeoPoint) {
    if !point.position().is_valid() {
        v.push(
            format!("{field}.coordinates"),
            "coordinates must be [longitude, latitude] within range",
        );
    }
}

fn check_stops(v: &mut Violations, stops: &[Stop]) {
    for (i, stop) in stops.iter().enumerate() {
        check_point(v, &format!("locations[{i}]"), &stop.point);
        if stop.day.is_some_and(|d| d < 0) {
            v.push(format!("locations[{i}].day"), "day must not be negative");
        }
    }
}
