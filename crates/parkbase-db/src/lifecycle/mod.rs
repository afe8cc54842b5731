//! The listing lifecycle engine.
//!
//! [`Listings`] is the only sanctioned way to read or write listings. Writes
//! go through validation and derivation before the store sees them; every
//! find-class read goes through [`FIND_HOOKS`] via `prepare_find`.

mod aggregate;
mod hooks;

use std::collections::HashMap;
use std::sync::Arc;

use parkbase_core::listing::{
    build_listing, build_patch, DistanceUnit, Identity, LatLng, SaveRules,
};
use parkbase_core::query::{Condition, Filter, ListingQuery, Page, Projection};
use parkbase_core::{Listing, ListingDocument, ListingInput, Review, ValidationError};
use thiserror::Error;
use uuid::Uuid;

use crate::store::{ListingStore, ReviewStore, UserDirectory};
use crate::{DbError, ListingRead};

pub use aggregate::{DifficultyStats, ListingDistance, MonthPlan, STATS_MIN_RATING};
pub use hooks::{ReadHook, FIND_HOOKS};

use hooks::prepare_find;

#[derive(Debug, Error)]
pub enum ListingError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("no listing found with id {0}")]
    NotFound(Uuid),
    #[error("data access failed: {0}")]
    DataAccess(#[from] DbError),
}

/// Store uniqueness violations are reported the same way as any other
/// invalid field.
fn write_error(err: DbError) -> ListingError {
    match err {
        DbError::Duplicate { field } if field == "name" || field == "slug" => {
            ListingError::Validation(ValidationError::single(
                "name",
                if field == "name" {
                    "a listing with this name already exists"
                } else {
                    "a listing with an equivalent name already exists"
                },
            ))
        }
        other => ListingError::DataAccess(other),
    }
}

#[derive(Clone)]
pub struct Listings {
    store: Arc<dyn ListingStore>,
    users: Arc<dyn UserDirectory>,
    reviews: Arc<dyn ReviewStore>,
}

impl std::fmt::Debug for Listings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Listings").finish_non_exhaustive()
    }
}

impl Listings {
    #[must_use]
    pub fn new(
        store: Arc<dyn ListingStore>,
        users: Arc<dyn UserDirectory>,
        reviews: Arc<dyn ReviewStore>,
    ) -> Self {
        Self {
            store,
            users,
            reviews,
        }
    }

    /// Validate, derive and insert a new listing.
    ///
    /// # Errors
    ///
    /// [`ListingError::Validation`] with every failing field, before any
    /// write is attempted; [`ListingError::DataAccess`] if the store fails.
    pub async fn create(&self, input: ListingInput) -> Result<ListingDocument, ListingError> {
        let listing = build_listing(input, Identity::fresh(), SaveRules::default())?;
        self.store.insert(&listing).await.map_err(write_error)?;
        tracing::info!(id = %listing.id, slug = %listing.slug, "listing created");
        Ok(ListingDocument::new(listing, Projection::Default))
    }

    /// Full save of the document with identifier `id`: validation and every
    /// derivation run, whether the document already exists or not. The
    /// boolean is `true` when a new document was created.
    ///
    /// # Errors
    ///
    /// Same as [`Listings::create`].
    pub async fn create_or_replace(
        &self,
        id: Uuid,
        input: ListingInput,
    ) -> Result<(ListingDocument, bool), ListingError> {
        let existing = self.store.get(id).await?;
        let identity = Identity {
            id,
            created_at: existing
                .as_ref()
                .map_or_else(chrono::Utc::now, |l| l.created_at),
        };
        let listing = build_listing(input, identity, SaveRules::default())?;
        let replaced = self.store.replace(&listing).await.map_err(write_error)?;
        if !replaced {
            self.store.insert(&listing).await.map_err(write_error)?;
        }
        tracing::info!(id = %listing.id, created = !replaced, "listing saved");
        Ok((ListingDocument::new(listing, Projection::Default), !replaced))
    }

    /// Partial update: per-field validation and the patch transforms only.
    /// The slug is not recomputed and `priceDiscount < price` is not
    /// checked.
    ///
    /// # Errors
    ///
    /// [`ListingError::NotFound`] if no document has this id, plus the
    /// errors of [`Listings::create`].
    pub async fn patch_fields(
        &self,
        id: Uuid,
        input: ListingInput,
    ) -> Result<ListingDocument, ListingError> {
        let patch = build_patch(input)?;
        let mut listing = self
            .store
            .get(id)
            .await?
            .ok_or(ListingError::NotFound(id))?;
        patch.apply_to(&mut listing);
        if !self.store.replace(&listing).await.map_err(write_error)? {
            return Err(ListingError::NotFound(id));
        }
        tracing::info!(id = %id, "listing patched");
        let mut doc = ListingDocument::new(listing, Projection::Default);
        self.populate(std::slice::from_mut(&mut doc)).await?;
        Ok(doc)
    }

    /// The standard multi-document read. Secret listings are never
    /// returned and guides are always populated.
    ///
    /// # Errors
    ///
    /// [`ListingError::DataAccess`] if the store or the population lookup
    /// fails; no partial result is returned.
    pub async fn find_many(
        &self,
        query: ListingQuery,
    ) -> Result<Vec<ListingDocument>, ListingError> {
        self.run(prepare_find(query)).await
    }

    /// First listing matching `filter` through the same rewrite as
    /// [`Listings::find_many`].
    ///
    /// # Errors
    ///
    /// Same as [`Listings::find_many`].
    pub async fn find_one(&self, filter: Filter) -> Result<Option<ListingDocument>, ListingError> {
        let query = ListingQuery {
            filter,
            page: Some(Page::new(1, 1)),
            ..ListingQuery::default()
        };
        Ok(self.run(prepare_find(query)).await?.into_iter().next())
    }

    /// Identifier lookup. Bypasses the visibility filter, so secret
    /// listings are returned; guides and reviews are populated explicitly.
    ///
    /// # Errors
    ///
    /// [`ListingError::NotFound`] on a miss, [`ListingError::DataAccess`] if
    /// the store or a population lookup fails.
    pub async fn find_by_id(&self, id: Uuid) -> Result<ListingDocument, ListingError> {
        let listing = self
            .store
            .get(id)
            .await?
            .ok_or(ListingError::NotFound(id))?;
        let mut doc = ListingDocument::new(listing, Projection::Default);
        self.populate(std::slice::from_mut(&mut doc)).await?;
        doc.reviews = Some(self.reviews.reviews(Some(id)).await?);
        Ok(doc)
    }

    /// Reviews of one listing, newest first.
    ///
    /// # Errors
    ///
    /// [`ListingError::NotFound`] if the listing does not exist.
    pub async fn reviews_for(&self, id: Uuid) -> Result<Vec<Review>, ListingError> {
        if self.store.get(id).await?.is_none() {
            return Err(ListingError::NotFound(id));
        }
        Ok(self.reviews.reviews(Some(id)).await?)
    }

    /// # Errors
    ///
    /// [`ListingError::NotFound`] if no document has this id.
    pub async fn delete(&self, id: Uuid) -> Result<(), ListingError> {
        if !self.store.delete(id).await? {
            return Err(ListingError::NotFound(id));
        }
        tracing::info!(id = %id, "listing deleted");
        Ok(())
    }

    /// Per-difficulty statistics over visible, well-rated listings.
    ///
    /// # Errors
    ///
    /// [`ListingError::DataAccess`] if the store fails.
    pub async fn stats(&self) -> Result<Vec<DifficultyStats>, ListingError> {
        let docs = self.run(prepare_find(aggregate::stats_query())).await?;
        let listings: Vec<Listing> = docs.into_iter().map(|d| d.listing).collect();
        Ok(aggregate::difficulty_stats(&listings))
    }

    /// Visible listing start dates in `year`, grouped by month.
    ///
    /// # Errors
    ///
    /// [`ListingError::DataAccess`] if the store fails.
    pub async fn monthly_plan(&self, year: i32) -> Result<Vec<MonthPlan>, ListingError> {
        let docs = self.run(prepare_find(aggregate::plan_query())).await?;
        let listings: Vec<Listing> = docs.into_iter().map(|d| d.listing).collect();
        Ok(aggregate::monthly_plan(&listings, year))
    }

    /// Visible listings starting within `distance` of `center`.
    ///
    /// # Errors
    ///
    /// Same as [`Listings::find_many`].
    pub async fn within(
        &self,
        center: LatLng,
        distance: f64,
        unit: DistanceUnit,
    ) -> Result<Vec<ListingDocument>, ListingError> {
        let query = ListingQuery::filtered(Filter::new().and(Condition::Within {
            center,
            radius: unit.to_radians(distance),
        }));
        self.run(prepare_find(query)).await
    }

    /// Distance from `center` to every visible listing with a start
    /// location, nearest first.
    ///
    /// # Errors
    ///
    /// [`ListingError::DataAccess`] if the store fails.
    pub async fn distances(
        &self,
        center: LatLng,
        unit: DistanceUnit,
    ) -> Result<Vec<ListingDistance>, ListingError> {
        let docs = self.run(prepare_find(aggregate::distances_query())).await?;
        let listings: Vec<Listing> = docs.into_iter().map(|d| d.listing).collect();
        Ok(aggregate::distances(&listings, center, unit))
    }

    /// Create every payload in order, stopping at the first failure.
    /// Returns the number created.
    ///
    /// # Errors
    ///
    /// The first error of [`Listings::create`].
    pub async fn import(&self, inputs: Vec<ListingInput>) -> Result<usize, ListingError> {
        let mut created = 0;
        for input in inputs {
            self.create(input).await?;
            created += 1;
        }
        Ok(created)
    }

    /// Delete every listing.
    ///
    /// # Errors
    ///
    /// [`ListingError::DataAccess`] if the store fails.
    pub async fn purge(&self) -> Result<u64, ListingError> {
        let removed = self.store.delete_all().await?;
        tracing::warn!(removed, "all listings deleted");
        Ok(removed)
    }

    /// # Errors
    ///
    /// [`ListingError::DataAccess`] if the store is unreachable.
    pub async fn ping(&self) -> Result<(), ListingError> {
        Ok(self.store.ping().await?)
    }

    async fn run(&self, read: ListingRead) -> Result<Vec<ListingDocument>, ListingError> {
        let listings = self.store.find(&read).await?;
        let mut docs: Vec<ListingDocument> = listings
            .into_iter()
            .map(|l| ListingDocument::new(l, read.projection().clone()))
            .collect();
        if read.populates_guides() {
            self.populate(&mut docs).await?;
        }
        tracing::debug!(
            elapsed_ms = u64::try_from(read.started_at().elapsed().as_millis()).unwrap_or(u64::MAX),
            count = docs.len(),
            "listing read completed"
        );
        Ok(docs)
    }

    /// Resolve guide references into summaries with a single directory
    /// lookup. References to unknown or inactive users are dropped.
    async fn populate(&self, docs: &mut [ListingDocument]) -> Result<(), ListingError> {
        let mut ids: Vec<Uuid> = docs
            .iter()
            .flat_map(|d| d.listing.guide_ids())
            .collect();
        ids.sort_unstable();
        ids.dedup();

        let found = if ids.is_empty() {
            Vec::new()
        } else {
            self.users.summaries(&ids).await?
        };
        let by_id: HashMap<Uuid, _> = found.into_iter().map(|s| (s.id, s)).collect();

        for doc in docs {
            let guides = doc
                .listing
                .guides
                .iter()
                .filter_map(|r| by_id.get(&r.id()).cloned())
                .collect();
            doc.guides = Some(guides);
        }
        Ok(())
    }
}
