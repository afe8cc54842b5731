//! Database operations for the `listings` table.

use chrono::{DateTime, Utc};
use parkbase_core::listing::{Difficulty, GeoPoint, Stop};
use parkbase_core::query::{Comparison, Condition, FilterValue, ListingField, Sort};
use parkbase_core::{Listing, Ref};
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::map_write_error;
use crate::{DbError, ListingRead};

const LISTING_COLUMNS: &str = "id, name, slug, duration, max_group_size, difficulty, \
     ratings_average, ratings_quantity, price, price_discount, summary, description, \
     image_cover, images, created_at, start_dates, secret_listing, start_location, \
     locations, guide_ids";

// ---------------------------------------------------------------------------
// Row type
// ---------------------------------------------------------------------------

/// A row from the `listings` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ListingRow {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub duration: i32,
    pub max_group_size: i32,
    pub difficulty: String,
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
    pub start_location: Option<Json<GeoPoint>>,
    pub locations: Json<Vec<Stop>>,
    pub guide_ids: Vec<Uuid>,
}

impl TryFrom<ListingRow> for Listing {
    type Error = DbError;

    fn try_from(row: ListingRow) -> Result<Self, Self::Error> {
        let difficulty = Difficulty::parse(&row.difficulty).ok_or_else(|| {
            DbError::InvalidRow(format!(
                "listing {} has unknown difficulty '{}'",
                row.id, row.difficulty
            ))
        })?;
        Ok(Listing {
            id: row.id,
            name: row.name,
            slug: row.slug,
            duration: row.duration,
            max_group_size: row.max_group_size,
            difficulty,
            ratings_average: row.ratings_average,
            ratings_quantity: row.ratings_quantity,
            price: row.price,
            price_discount: row.price_discount,
            summary: row.summary,
            description: row.description,
            image_cover: row.image_cover,
            images: row.images,
            created_at: row.created_at,
            start_dates: row.start_dates,
            secret_listing: row.secret_listing,
            start_location: row.start_location.map(|j| j.0),
            locations: row.locations.0,
            guides: row.guide_ids.into_iter().map(Ref::new).collect(),
        })
    }
}

// ---------------------------------------------------------------------------
// Query building
// ---------------------------------------------------------------------------

fn column(field: ListingField) -> Result<&'static str, DbError> {
    let column = match field {
        ListingField::Id => "id::text",
        ListingField::Name => "name",
        ListingField::Slug => "slug",
        ListingField::Duration => "duration",
        ListingField::MaxGroupSize => "max_group_size",
        ListingField::Difficulty => "difficulty",
        ListingField::RatingsAverage => "ratings_average",
        ListingField::RatingsQuantity => "ratings_quantity",
        ListingField::Price => "price",
        ListingField::PriceDiscount => "price_discount",
        ListingField::Summary => "summary",
        ListingField::Description => "description",
        ListingField::ImageCover => "image_cover",
        ListingField::CreatedAt => "created_at",
        ListingField::SecretListing => "secret_listing",
        ListingField::Images
        | ListingField::StartDates
        | ListingField::StartLocation
        | ListingField::Locations
        | ListingField::Guides => {
            return Err(DbError::UnsupportedQuery(format!(
                "'{}' cannot be filtered or sorted",
                field.api_name()
            )))
        }
    };
    Ok(column)
}

fn push_value(qb: &mut QueryBuilder<'_, Postgres>, value: &FilterValue) {
    match value {
        FilterValue::Text(text) => qb.push_bind(text.clone()),
        FilterValue::Number(n) => qb.push_bind(*n),
        FilterValue::Bool(b) => qb.push_bind(*b),
        FilterValue::Difficulty(d) => qb.push_bind(d.as_str()),
        FilterValue::Timestamp(t) => qb.push_bind(*t),
    };
}

fn push_condition(
    qb: &mut QueryBuilder<'_, Postgres>,
    condition: &Condition,
) -> Result<(), DbError> {
    match condition {
        Condition::Compare { field, op, value } => {
            let column = column(*field)?;
            if *op == Comparison::Ne {
                // Absent values count as "not equal".
                qb.push(format_args!("{column} IS DISTINCT FROM "));
            } else {
                qb.push(format_args!("{column} {} ", op.sql_operator()));
            }
            push_value(qb, value);
        }
        Condition::AnyOf { field, values } => {
            let column = column(*field)?;
            qb.push("(");
            for (i, value) in values.iter().enumerate() {
                if i > 0 {
                    qb.push(" OR ");
                }
                qb.push(format_args!("{column} = "));
                push_value(qb, value);
            }
            if values.is_empty() {
                qb.push("FALSE");
            }
            qb.push(")");
        }
        Condition::Within { center, radius } => {
            qb.push("(start_lat IS NOT NULL AND 2 * asin(least(1.0, sqrt(power(sin(radians(start_lat - ");
            qb.push_bind(center.lat);
            qb.push(") / 2), 2) + cos(radians(");
            qb.push_bind(center.lat);
            qb.push(")) * cos(radians(start_lat)) * power(sin(radians(start_lng - ");
            qb.push_bind(center.lng);
            qb.push(") / 2), 2)))) <= ");
            qb.push_bind(*radius);
            qb.push(")");
        }
    }
    Ok(())
}

fn push_sort(qb: &mut QueryBuilder<'_, Postgres>, sort: &Sort) -> Result<(), DbError> {
    for (i, key) in sort.keys.iter().enumerate() {
        qb.push(if i == 0 { " ORDER BY " } else { ", " });
        let expr = if key.field == ListingField::Difficulty {
            "CASE difficulty WHEN 'easy' THEN 0 WHEN 'medium' THEN 1 ELSE 2 END"
        } else {
            column(key.field)?
        };
        qb.push(expr);
        // Missing values sort first ascending, last descending.
        qb.push(if key.descending {
            " DESC NULLS LAST"
        } else {
            " ASC NULLS FIRST"
        });
    }
    Ok(())
}

fn build_find(read: &ListingRead) -> Result<QueryBuilder<'static, Postgres>, DbError> {
    let mut qb = QueryBuilder::new(format!("SELECT {LISTING_COLUMNS} FROM listings"));
    for (i, condition) in read.filter().conditions.iter().enumerate() {
        qb.push(if i == 0 { " WHERE " } else { " AND " });
        push_condition(&mut qb, condition)?;
    }
    push_sort(&mut qb, read.sort())?;
    if let Some(page) = read.page() {
        qb.push(" LIMIT ");
        qb.push_bind(i64::from(page.limit));
        qb.push(" OFFSET ");
        qb.push_bind(i64::try_from(page.offset()).unwrap_or(i64::MAX));
    }
    Ok(qb)
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

/// Listings matching a prepared read.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails, [`DbError::InvalidRow`] for
/// rows that do not decode into a listing.
pub async fn find_listings(pool: &PgPool, read: &ListingRead) -> Result<Vec<Listing>, DbError> {
    let mut qb = build_find(read)?;
    let rows = qb.build_query_as::<ListingRow>().fetch_all(pool).await?;
    rows.into_iter().map(Listing::try_from).collect()
}

/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_listing(pool: &PgPool, id: Uuid) -> Result<Option<Listing>, DbError> {
    let row = sqlx::query_as::<_, ListingRow>(&format!(
        "SELECT {LISTING_COLUMNS} FROM listings WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;
    row.map(Listing::try_from).transpose()
}

/// # Errors
///
/// Returns [`DbError::Duplicate`] when `name`, `slug` or `id` is taken, or
/// [`DbError::Sqlx`] if the insert fails.
pub async fn insert_listing(pool: &PgPool, listing: &Listing) -> Result<(), DbError> {
    sqlx::query(&format!(
        "INSERT INTO listings ({LISTING_COLUMNS}) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20)"
    ))
    .bind(listing.id)
    .bind(&listing.name)
    .bind(&listing.slug)
    .bind(listing.duration)
    .bind(listing.max_group_size)
    .bind(listing.difficulty.as_str())
    .bind(listing.ratings_average)
    .bind(listing.ratings_quantity)
    .bind(listing.price)
    .bind(listing.price_discount)
    .bind(&listing.summary)
    .bind(&listing.description)
    .bind(&listing.image_cover)
    .bind(&listing.images)
    .bind(listing.created_at)
    .bind(&listing.start_dates)
    .bind(listing.secret_listing)
    .bind(listing.start_location.as_ref().map(Json))
    .bind(Json(&listing.locations))
    .bind(listing.guide_ids())
    .execute(pool)
    .await
    .map_err(map_write_error)?;
    Ok(())
}

/// Overwrite every stored column except `id`. Returns `false` when no row
/// has this id.
///
/// # Errors
///
/// Returns [`DbError::Duplicate`] when the new `name` or `slug` is taken,
/// or [`DbError::Sqlx`] if the update fails.
pub async fn replace_listing(pool: &PgPool, listing: &Listing) -> Result<bool, DbError> {
    let result = sqlx::query(
        "UPDATE listings SET \
             name = $2, slug = $3, duration = $4, max_group_size = $5, difficulty = $6, \
             ratings_average = $7, ratings_quantity = $8, price = $9, price_discount = $10, \
             summary = $11, description = $12, image_cover = $13, images = $14, \
             created_at = $15, start_dates = $16, secret_listing = $17, \
             start_location = $18, locations = $19, guide_ids = $20 \
         WHERE id = $1",
    )
    .bind(listing.id)
    .bind(&listing.name)
    .bind(&listing.slug)
    .bind(listing.duration)
    .bind(listing.max_group_size)
    .bind(listing.difficulty.as_str())
    .bind(listing.ratings_average)
    .bind(listing.ratings_quantity)
    .bind(listing.price)
    .bind(listing.price_discount)
    .bind(&listing.summary)
    .bind(&listing.description)
    .bind(&listing.image_cover)
    .bind(&listing.images)
    .bind(listing.created_at)
    .bind(&listing.start_dates)
    .bind(listing.secret_listing)
    .bind(listing.start_location.as_ref().map(Json))
    .bind(Json(&listing.locations))
    .bind(listing.guide_ids())
    .execute(pool)
    .await
    .map_err(map_write_error)?;
    Ok(result.rows_affected() > 0)
}

/// # Errors
///
/// Returns [`DbError::Sqlx`] if the delete fails.
pub async fn delete_listing(pool: &PgPool, id: Uuid) -> Result<bool, DbError> {
    let result = sqlx::query("DELETE FROM listings WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// # Errors
///
/// Returns [`DbError::Sqlx`] if the delete fails.
pub async fn delete_all_listings(pool: &PgPool) -> Result<u64, DbError> {
    let result = sqlx::query("DELETE FROM listings").execute(pool).await?;
    Ok(result.rows_affected())
}
