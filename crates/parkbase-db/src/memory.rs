//! In-memory store used by tests and local runs without Postgres.

use std::collections::HashSet;
use std::sync::{PoisonError, RwLock as SyncRwLock};

use async_trait::async_trait;
use parkbase_core::{Booking, Listing, Referent, Review, User, UserSummary};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::store::{BookingStore, ListingStore, ReviewStore, UserDirectory};
use crate::{DbError, ListingRead};

/// Implements every store trait over in-process vectors.
///
/// A collection can be taken offline with [`MemoryStore::set_offline`] to
/// exercise data-access failures.
#[derive(Debug, Default)]
pub struct MemoryStore {
    listings: RwLock<Vec<Listing>>,
    users: RwLock<Vec<User>>,
    reviews: RwLock<Vec<Review>>,
    bookings: RwLock<Vec<Booking>>,
    offline: SyncRwLock<HashSet<&'static str>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every operation on collection `T` fail with `Unavailable`.
    pub fn set_offline<T: Referent>(&self, offline: bool) {
        let mut set = self.offline.write().unwrap_or_else(PoisonError::into_inner);
        if offline {
            set.insert(T::COLLECTION);
        } else {
            set.remove(T::COLLECTION);
        }
    }

    pub async fn add_user(&self, user: User) {
        self.users.write().await.push(user);
    }

    pub async fn add_review(&self, review: Review) {
        self.reviews.write().await.push(review);
    }

    fn check<T: Referent>(&self) -> Result<(), DbError> {
        let set = self.offline.read().unwrap_or_else(PoisonError::into_inner);
        if set.contains(T::COLLECTION) {
            return Err(DbError::Unavailable {
                collection: T::COLLECTION.to_string(),
            });
        }
        Ok(())
    }
}

fn conflict(existing: &[Listing], candidate: &Listing) -> Option<DbError> {
    let others = existing.iter().filter(|l| l.id != candidate.id);
    for other in others {
        let field = if other.name == candidate.name {
            "name"
        } else if other.slug == candidate.slug {
            "slug"
        } else {
            continue;
        };
        return Some(DbError::Duplicate {
            field: field.to_string(),
        });
    }
    None
}

#[async_trait]
impl ListingStore for MemoryStore {
    async fn insert(&self, listing: &Listing) -> Result<(), DbError> {
        self.check::<Listing>()?;
        let mut listings = self.listings.write().await;
        if listings.iter().any(|l| l.id == listing.id) {
            return Err(DbError::Duplicate {
                field: "id".to_string(),
            });
        }
        if let Some(err) = conflict(&listings, listing) {
            return Err(err);
        }
        listings.push(listing.clone());
        Ok(())
    }

    async fn find(&self, read: &ListingRead) -> Result<Vec<Listing>, DbError> {
        self.check::<Listing>()?;
        let listings = self.listings.read().await;
        let mut found: Vec<Listing> = listings
            .iter()
            .filter(|l| read.filter().matches(l))
            .cloned()
            .collect();
        found.sort_by(|a, b| read.sort().compare(a, b));
        if let Some(page) = read.page() {
            let offset = usize::try_from(page.offset()).unwrap_or(usize::MAX);
            found = found
                .into_iter()
                .skip(offset)
                .take(page.limit as usize)
                .collect();
        }
        Ok(found)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Listing>, DbError> {
        self.check::<Listing>()?;
        let listings = self.listings.read().await;
        Ok(listings.iter().find(|l| l.id == id).cloned())
    }

    async fn replace(&self, listing: &Listing) -> Result<bool, DbError> {
        self.check::<Listing>()?;
        let mut listings = self.listings.write().await;
        if let Some(err) = conflict(&listings, listing) {
            return Err(err);
        }
        match listings.iter_mut().find(|l| l.id == listing.id) {
            Some(slot) => {
                *slot = listing.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, id: Uuid) -> Result<bool, DbError> {
        self.check::<Listing>()?;
        let mut listings = self.listings.write().await;
        let before = listings.len();
        listings.retain(|l| l.id != id);
        Ok(listings.len() != before)
    }

    async fn delete_all(&self) -> Result<u64, DbError> {
        self.check::<Listing>()?;
        let mut listings = self.listings.write().await;
        let count = listings.len() as u64;
        listings.clear();
        Ok(count)
    }

    async fn ping(&self) -> Result<(), DbError> {
        self.check::<Listing>()
    }
}

#[async_trait]
impl UserDirectory for MemoryStore {
    async fn summaries(&self, ids: &[Uuid]) -> Result<Vec<UserSummary>, DbError> {
        self.check::<User>()?;
        let users = self.users.read().await;
        Ok(users
            .iter()
            .filter(|u| u.active && ids.contains(&u.id))
            .map(UserSummary::from)
            .collect())
    }

    async fn summary(&self, id: Uuid) -> Result<Option<UserSummary>, DbError> {
        self.check::<User>()?;
        let users = self.users.read().await;
        Ok(users
            .iter()
            .find(|u| u.active && u.id == id)
            .map(UserSummary::from))
    }

    async fn all_summaries(&self) -> Result<Vec<UserSummary>, DbError> {
        self.check::<User>()?;
        let users = self.users.read().await;
        Ok(users
            .iter()
            .filter(|u| u.active)
            .map(UserSummary::from)
            .collect())
    }
}

#[async_trait]
impl ReviewStore for MemoryStore {
    async fn reviews(&self, park: Option<Uuid>) -> Result<Vec<Review>, DbError> {
        self.check::<Review>()?;
        let reviews = self.reviews.read().await;
        let mut found: Vec<Review> = reviews
            .iter()
            .filter(|r| park.is_none_or(|id| r.park.id() == id))
            .cloned()
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(found)
    }
}

#[async_trait]
impl BookingStore for MemoryStore {
    async fn record(&self, booking: &Booking) -> Result<(), DbError> {
        self.check::<Booking>()?;
        self.bookings.write().await.push(booking.clone());
        Ok(())
    }

    async fn bookings(&self) -> Result<Vec<Booking>, DbError> {
        self.check::<Booking>()?;
        let bookings = self.bookings.read().await;
        let mut found = bookings.clone();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use parkbase_core::listing::{build_listing, Identity, SaveRules};
    use parkbase_core::ListingInput;

    use super::*;

    fn listing(name: &str) -> Listing {
        let input: ListingInput = serde_json::from_value(serde_json::json!({
            "name": name,
            "duration": 5,
            "maxGroupSize": 10,
            "difficulty": "easy",
            "price": 100,
            "summary": "x",
            "imageCover": "y"
        }))
        .expect("input");
        build_listing(input, Identity::fresh(), SaveRules::default())
            .expect("valid")
    }

    #[tokio::test]
    async fn insert_rejects_duplicate_name_and_slug() {
        let store = MemoryStore::new();
        store.insert(&listing("Mountain Retreat Base")).await.expect("insert");

        let err = store
            .insert(&listing("Mountain Retreat Base"))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Duplicate { ref field } if field == "name"));

        let err = store
            .insert(&listing("Mountain  Retreat Base!"))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Duplicate { ref field } if field == "slug"));
    }

    #[tokio::test]
    async fn offline_collection_fails_with_unavailable() {
        let store = MemoryStore::new();
        store.set_offline::<User>(true);
        let err = store.summaries(&[Uuid::new_v4()]).await.unwrap_err();
        assert!(matches!(err, DbError::Unavailable { ref collection } if collection == "users"));

        store.set_offline::<User>(false);
        assert!(store.summaries(&[]).await.expect("online").is_empty());
    }

    #[tokio::test]
    async fn replace_reports_missing_documents() {
        let store = MemoryStore::new();
        let doc = listing("Mountain Retreat Base");
        assert!(!store.replace(&doc).await.expect("replace"));
        store.insert(&doc).await.expect("insert");
        assert!(store.replace(&doc).await.expect("replace"));
        assert!(store.delete(doc.id).await.expect("delete"));
        assert!(!store.delete(doc.id).await.expect("delete"));
    }
}
