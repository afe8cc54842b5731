//! The document store contract.
//!
//! Adapters hold no domain knowledge: they persist and return documents,
//! report uniqueness violations as [`DbError::Duplicate`] and unreachable
//! collections as [`DbError::Unavailable`] or [`DbError::Sqlx`].

use async_trait::async_trait;
use parkbase_core::{Booking, Listing, Review, UserSummary};
use uuid::Uuid;

use crate::{DbError, ListingRead};

#[async_trait]
pub trait ListingStore: Send + Sync {
    /// Insert a new document. Fails with `Duplicate` if `name` or `slug`
    /// is already taken.
    async fn insert(&self, listing: &Listing) -> Result<(), DbError>;

    /// Documents matching the read's filter, in sort order, paginated.
    async fn find(&self, read: &ListingRead) -> Result<Vec<Listing>, DbError>;

    /// Identifier lookup. No filter is applied.
    async fn get(&self, id: Uuid) -> Result<Option<Listing>, DbError>;

    /// Overwrite the stored document with the same id. Returns `false` if
    /// there was none.
    async fn replace(&self, listing: &Listing) -> Result<bool, DbError>;

    async fn delete(&self, id: Uuid) -> Result<bool, DbError>;

    /// Remove every listing, returning how many were deleted.
    async fn delete_all(&self) -> Result<u64, DbError>;

    async fn ping(&self) -> Result<(), DbError>;
}

/// Read access to users, always through their public summary.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Summaries of the active users among `ids`, in no particular order.
    async fn summaries(&self, ids: &[Uuid]) -> Result<Vec<UserSummary>, DbError>;

    async fn summary(&self, id: Uuid) -> Result<Option<UserSummary>, DbError>;

    /// Every active user.
    async fn all_summaries(&self) -> Result<Vec<UserSummary>, DbError>;
}

#[async_trait]
pub trait ReviewStore: Send + Sync {
    /// Reviews, newest first, optionally limited to one listing.
    async fn reviews(&self, park: Option<Uuid>) -> Result<Vec<Review>, DbError>;
}

#[async_trait]
pub trait BookingStore: Send + Sync {
    async fn record(&self, booking: &Booking) -> Result<(), DbError>;

    /// Bookings, newest first.
    async fn bookings(&self) -> Result<Vec<Booking>, DbError>;
}
