//! Database operations for the `bookings` table.

use chrono::{DateTime, Utc};
use parkbase_core::{Booking, Ref};
use sqlx::PgPool;
use uuid::Uuid;

use super::map_write_error;
use crate::DbError;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct BookingRow {
    pub id: Uuid,
    pub listing_id: Uuid,
    pub user_email: String,
    pub price: f64,
    pub paid: bool,
    pub created_at: DateTime<Utc>,
}

impl From<BookingRow> for Booking {
    fn from(row: BookingRow) -> Self {
        Booking {
            id: row.id,
            park: Ref::new(row.listing_id),
            user_email: row.user_email,
            price: row.price,
            paid: row.paid,
            created_at: row.created_at,
        }
    }
}

/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails. The listing id is not
/// checked against `listings`.
pub async fn insert_booking(pool: &PgPool, booking: &Booking) -> Result<(), DbError> {
    sqlx::query(
        "INSERT INTO bookings (id, listing_id, user_email, price, paid, created_at) \
         VALUES ($1, $2, $3, $4, $5, $6)",
    )
    .bind(booking.id)
    .bind(booking.park.id())
    .bind(&booking.user_email)
    .bind(booking.price)
    .bind(booking.paid)
    .bind(booking.created_at)
    .execute(pool)
    .await
    .map_err(map_write_error)?;
    Ok(())
}

/// Bookings, newest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_bookings(pool: &PgPool) -> Result<Vec<Booking>, DbError> {
    let rows = sqlx::query_as::<_, BookingRow>(
        "SELECT id, listing_id, user_email, price, paid, created_at \
         FROM bookings ORDER BY created_at DESC",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(Booking::from).collect())
}
