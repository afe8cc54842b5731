//! Read access to the `reviews` table.

use chrono::{DateTime, Utc};
use parkbase_core::{Ref, Review};
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ReviewRow {
    pub id: Uuid,
    pub review: String,
    pub rating: f64,
    pub created_at: DateTime<Utc>,
    pub listing_id: Uuid,
    pub user_id: Uuid,
}

impl From<ReviewRow> for Review {
    fn from(row: ReviewRow) -> Self {
        Review {
            id: row.id,
            review: row.review,
            rating: row.rating,
            created_at: row.created_at,
            park: Ref::new(row.listing_id),
            user: Ref::new(row.user_id),
        }
    }
}

/// Reviews, newest first, optionally for one listing only.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_reviews(pool: &PgPool, listing_id: Option<Uuid>) -> Result<Vec<Review>, DbError> {
    let rows = sqlx::query_as::<_, ReviewRow>(
        "SELECT id, review, rating, created_at, listing_id, user_id \
         FROM reviews \
         WHERE ($1::uuid IS NULL OR listing_id = $1) \
         ORDER BY created_at DESC",
    )
    .bind(listing_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(Review::from).collect())
}
