//! Postgres implementation of the store traits.

pub mod bookings;
pub mod listings;
pub mod reviews;
pub mod users;

use async_trait::async_trait;
use parkbase_core::{Booking, Listing, Review, UserSummary};
use sqlx::PgPool;
use uuid::Uuid;

use crate::store::{BookingStore, ListingStore, ReviewStore, UserDirectory};
use crate::{DbError, ListingRead};

pub use bookings::{insert_booking, list_bookings, BookingRow};
pub use listings::{
    delete_all_listings, delete_listing, find_listings, get_listing, insert_listing,
    replace_listing, ListingRow,
};
pub use reviews::{list_reviews, ReviewRow};
pub use users::{get_user_summary, list_user_summaries, user_summaries_by_ids, UserSummaryRow};

/// Unique-constraint violations become [`DbError::Duplicate`] naming the
/// column; everything else is passed through.
pub(crate) fn map_write_error(err: sqlx::Error) -> DbError {
    if let sqlx::Error::Database(db) = &err {
        if db.code().as_deref() == Some("23505") {
            let field = match db.constraint() {
                Some("listings_name_key") => "name",
                Some("listings_slug_key") => "slug",
                Some("listings_pkey" | "bookings_pkey") => "id",
                Some(other) => other,
                None => "unknown",
            };
            return DbError::Duplicate {
                field: field.to_string(),
            };
        }
    }
    DbError::Sqlx(err)
}

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl ListingStore for PgStore {
    async fn insert(&self, listing: &Listing) -> Result<(), DbError> {
        insert_listing(&self.pool, listing).await
    }

    async fn find(&self, read: &ListingRead) -> Result<Vec<Listing>, DbError> {
        find_listings(&self.pool, read).await
    }

    async fn get(&self, id: Uuid) -> Result<Option<Listing>, DbError> {
        get_listing(&self.pool, id).await
    }

    async fn replace(&self, listing: &Listing) -> Result<bool, DbError> {
        replace_listing(&self.pool, listing).await
    }

    async fn delete(&self, id: Uuid) -> Result<bool, DbError> {
        delete_listing(&self.pool, id).await
    }

    async fn delete_all(&self) -> Result<u64, DbError> {
        delete_all_listings(&self.pool).await
    }

    async fn ping(&self) -> Result<(), DbError> {
        crate::health_check(&self.pool).await
    }
}

#[async_trait]
impl UserDirectory for PgStore {
    async fn summaries(&self, ids: &[Uuid]) -> Result<Vec<UserSummary>, DbError> {
        user_summaries_by_ids(&self.pool, ids).await
    }

    async fn summary(&self, id: Uuid) -> Result<Option<UserSummary>, DbError> {
        get_user_summary(&self.pool, id).await
    }

    async fn all_summaries(&self) -> Result<Vec<UserSummary>, DbError> {
        list_user_summaries(&self.pool).await
    }
}

#[async_trait]
impl ReviewStore for PgStore {
    async fn reviews(&self, park: Option<Uuid>) -> Result<Vec<Review>, DbError> {
        list_reviews(&self.pool, park).await
    }
}

#[async_trait]
impl BookingStore for PgStore {
    async fn record(&self, booking: &Booking) -> Result<(), DbError> {
        insert_booking(&self.pool, booking).await
    }

    async fn bookings(&self) -> Result<Vec<Booking>, DbError> {
        list_bookings(&self.pool).await
    }
}
