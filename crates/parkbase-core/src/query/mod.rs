//! Store-independent description of a listing read: filter, sort,
//! projection and pagination.
//!
//! Store adapters translate these types (to SQL, or to in-memory
//! predicates via [`Filter::matches`]); they never see raw request input.

mod parse;

use std::cmp::Ordering;

use chrono::{DateTime, Utc};

use crate::listing::{Difficulty, LatLng, Listing};

pub use parse::{parse_listing_query, REPEATABLE_PARAMS, RESERVED_PARAMS};

pub const DEFAULT_PAGE_LIMIT: u32 = 100;
pub const MAX_PAGE_LIMIT: u32 = 100;

/// Value type of a listing field, which decides how filter values are
/// parsed and which comparisons are allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Number,
    Bool,
    Difficulty,
    Timestamp,
    /// Arrays and sub-documents: selectable, not filterable or sortable.
    Composite,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListingField {
    Id,
    Name,
    Slug,
    Duration,
    MaxGroupSize,
    Difficulty,
    RatingsAverage,
    RatingsQuantity,
    Price,
    PriceDiscount,
    Summary,
    Description,
    ImageCover,
    Images,
    CreatedAt,
    StartDates,
    SecretListing,
    StartLocation,
    Locations,
    Guides,
}

impl ListingField {
    pub const ALL: [ListingField; 20] = [
        ListingField::Id,
        ListingField::Name,
        ListingField::Slug,
        ListingField::Duration,
        ListingField::MaxGroupSize,
        ListingField::Difficulty,
        ListingField::RatingsAverage,
        ListingField::RatingsQuantity,
        ListingField::Price,
        ListingField::PriceDiscount,
        ListingField::Summary,
        ListingField::Description,
        ListingField::ImageCover,
        ListingField::Images,
        ListingField::CreatedAt,
        ListingField::StartDates,
        ListingField::SecretListing,
        ListingField::StartLocation,
        ListingField::Locations,
        ListingField::Guides,
    ];

    /// Name of the field in the JSON representation.
    #[must_use]
    pub fn api_name(self) -> &'static str {
        match self {
            ListingField::Id => "id",
            ListingField::Name => "name",
            ListingField::Slug => "slug",
            ListingField::Duration => "duration",
            ListingField::MaxGroupSize => "maxGroupSize",
            ListingField::Difficulty => "difficulty",
            ListingField::RatingsAverage => "ratingsAverage",
            ListingField::RatingsQuantity => "ratingsQuantity",
            ListingField::Price => "price",
            ListingField::PriceDiscount => "priceDiscount",
            ListingField::Summary => "summary",
            ListingField::Description => "description",
            ListingField::ImageCover => "imageCover",
            ListingField::Images => "images",
            ListingField::CreatedAt => "createdAt",
            ListingField::StartDates => "startDates",
            ListingField::SecretListing => "secretListing",
            ListingField::StartLocation => "startLocation",
            ListingField::Locations => "locations",
            ListingField::Guides => "guides",
        }
    }

    #[must_use]
    pub fn from_api_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.api_name() == name)
    }

    #[must_use]
    pub fn kind(self) -> FieldKind {
        match self {
            ListingField::Id
            | ListingField::Name
            | ListingField::Slug
            | ListingField::Summary
            | ListingField::Description
            | ListingField::ImageCover => FieldKind::Text,
            ListingField::Duration
            | ListingField::MaxGroupSize
            | ListingField::RatingsAverage
            | ListingField::RatingsQuantity
            | ListingField::Price
            | ListingField::PriceDiscount => FieldKind::Number,
            ListingField::Difficulty => FieldKind::Difficulty,
            ListingField::CreatedAt => FieldKind::Timestamp,
            ListingField::SecretListing => FieldKind::Bool,
            ListingField::Images
            | ListingField::StartDates
            | ListingField::StartLocation
            | ListingField::Locations
            | ListingField::Guides => FieldKind::Composite,
        }
    }

    #[must_use]
    pub fn is_scalar(self) -> bool {
        self.kind() != FieldKind::Composite
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl Comparison {
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "eq" => Some(Comparison::Eq),
            "ne" => Some(Comparison::Ne),
            "gt" => Some(Comparison::Gt),
            "gte" => Some(Comparison::Gte),
            "lt" => Some(Comparison::Lt),
            "lte" => Some(Comparison::Lte),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_range(self) -> bool {
        !matches!(self, Comparison::Eq | Comparison::Ne)
    }

    #[must_use]
    pub fn sql_operator(self) -> &'static str {
        match self {
            Comparison::Eq => "=",
            Comparison::Ne => "<>",
            Comparison::Gt => ">",
            Comparison::Gte => ">=",
            Comparison::Lt => "<",
            Comparison::Lte => "<=",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    Text(String),
    Number(f64),
    Bool(bool),
    Difficulty(Difficulty),
    Timestamp(DateTime<Utc>),
}

impl FilterValue {
    fn compare(&self, other: &FilterValue) -> Option<Ordering> {
        match (self, other) {
            (FilterValue::Text(a), FilterValue::Text(b)) => Some(a.cmp(b)),
            (FilterValue::Number(a), FilterValue::Number(b)) => a.partial_cmp(b),
            (FilterValue::Bool(a), FilterValue::Bool(b)) => Some(a.cmp(b)),
            (FilterValue::Difficulty(a), FilterValue::Difficulty(b)) => {
                Some((*a as u8).cmp(&(*b as u8)))
            }
            (FilterValue::Timestamp(a), FilterValue::Timestamp(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Compare {
        field: ListingField,
        op: Comparison,
        value: FilterValue,
    },
    AnyOf {
        field: ListingField,
        values: Vec<FilterValue>,
    },
    /// `startLocation` lies within `radius` radians of `center`.
    Within { center: LatLng, radius: f64 },
}

impl Condition {
    fn matches(&self, listing: &Listing) -> bool {
        match self {
            Condition::Compare { field, op, value } => {
                let actual = listing.field_value(*field);
                let ordering = actual.as_ref().and_then(|a| a.compare(value));
                match op {
                    // Absent values are "not equal", as in the document store.
                    Comparison::Eq => ordering == Some(Ordering::Equal),
                    Comparison::Ne => ordering != Some(Ordering::Equal),
                    Comparison::Gt => ordering == Some(Ordering::Greater),
                    Comparison::Gte => {
                        matches!(ordering, Some(Ordering::Greater | Ordering::Equal))
                    }
                    Comparison::Lt => ordering == Some(Ordering::Less),
                    Comparison::Lte => matches!(ordering, Some(Ordering::Less | Ordering::Equal)),
                }
            }
            Condition::AnyOf { field, values } => listing.field_value(*field).is_some_and(|a| {
                values
                    .iter()
                    .any(|v| a.compare(v) == Some(Ordering::Equal))
            }),
            Condition::Within { center, radius } => listing
                .start_location
                .as_ref()
                .is_some_and(|p| center.angle_to(p.position()) <= *radius),
        }
    }
}

/// A conjunction of conditions. The empty filter matches everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    pub conditions: Vec<Condition>,
}

impl Filter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn and(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    #[must_use]
    pub fn eq(field: ListingField, value: FilterValue) -> Self {
        Self::new().and(Condition::Compare {
            field,
            op: Comparison::Eq,
            value,
        })
    }

    #[must_use]
    pub fn matches(&self, listing: &Listing) -> bool {
        self.conditions.iter().all(|c| c.matches(listing))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortKey {
    pub field: ListingField,
    pub descending: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sort {
    pub keys: Vec<SortKey>,
}

impl Default for Sort {
    /// Newest first.
    fn default() -> Self {
        Self {
            keys: vec![SortKey {
                field: ListingField::CreatedAt,
                descending: true,
            }],
        }
    }
}

impl Sort {
    /// Order two listings by the sort keys; missing values sort first.
    #[must_use]
    pub fn compare(&self, a: &Listing, b: &Listing) -> Ordering {
        for key in &self.keys {
            let (va, vb) = (a.field_value(key.field), b.field_value(key.field));
            let ord = match (&va, &vb) {
                (None, None) => Ordering::Equal,
                (None, Some(_)) => Ordering::Less,
                (Some(_), None) => Ordering::Greater,
                (Some(x), Some(y)) => x.compare(y).unwrap_or(Ordering::Equal),
            };
            let ord = if key.descending { ord.reverse() } else { ord };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    }
}

/// Which stored fields a read returns.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Projection {
    /// Everything except `createdAt`.
    #[default]
    Default,
    /// Only these fields (plus `id`).
    Include(Vec<ListingField>),
    /// Everything except these fields and `createdAt`.
    Exclude(Vec<ListingField>),
}

impl Projection {
    #[must_use]
    pub fn includes(&self, field: ListingField) -> bool {
        match self {
            Projection::Default => field != ListingField::CreatedAt,
            Projection::Include(fields) => field == ListingField::Id || fields.contains(&field),
            Projection::Exclude(fields) => {
                field != ListingField::CreatedAt && !fields.contains(&field)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub page: u32,
    pub limit: u32,
}

impl Default for Page {
    fn default() -> Self {
        Self {
            page: 1,
            limit: DEFAULT_PAGE_LIMIT,
        }
    }
}

impl Page {
    #[must_use]
    pub fn new(page: u32, limit: u32) -> Self {
        Self {
            page: page.max(1),
            limit: limit.clamp(1, MAX_PAGE_LIMIT),
        }
    }

    #[must_use]
    pub fn offset(self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.limit)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListingQuery {
    pub filter: Filter,
    pub sort: Sort,
    pub projection: Projection,
    pub page: Option<Page>,
}

impl ListingQuery {
    #[must_use]
    pub fn filtered(filter: Filter) -> Self {
        Self {
            filter,
            ..Self::default()
        }
    }
}

impl Listing {
    /// Current value of a scalar field, `None` for absent optional values
    /// and composite fields.
    #[must_use]
    pub fn field_value(&self, field: ListingField) -> Option<FilterValue> {
        let value = match field {
            ListingField::Id => FilterValue::Text(self.id.to_string()),
            ListingField::Name => FilterValue::Text(self.name.clone()),
            ListingField::Slug => FilterValue::Text(self.slug.clone()),
            ListingField::Duration => FilterValue::Number(f64::from(self.duration)),
            ListingField::MaxGroupSize => FilterValue::Number(f64::from(self.max_group_size)),
            ListingField::Difficulty => FilterValue::Difficulty(self.difficulty),
            ListingField::RatingsAverage => FilterValue::Number(self.ratings_average),
            ListingField::RatingsQuantity => FilterValue::Number(f64::from(self.ratings_quantity)),
            ListingField::Price => FilterValue::Number(self.price),
            ListingField::PriceDiscount => FilterValue::Number(self.price_discount?),
            ListingField::Summary => FilterValue::Text(self.summary.clone()),
            ListingField::Description => FilterValue::Text(self.description.clone()?),
            ListingField::ImageCover => FilterValue::Text(self.image_cover.clone()),
            ListingField::CreatedAt => FilterValue::Timestamp(self.created_at),
            ListingField::SecretListing => FilterValue::Bool(self.secret_listing),
            ListingField::Images
            | ListingField::StartDates
            | ListingField::StartLocation
            | ListingField::Locations
            | ListingField::Guides => return None,
        };
        Some(value)
    }
}
