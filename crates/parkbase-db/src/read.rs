//! Prepared listing reads.

use std::time::Instant;

use parkbase_core::query::{Filter, ListingField, ListingQuery, Page, Projection, Sort};

/// A listing read that has been through the read-rewrite stage.
///
/// Only this crate can build one, and it only does so inside
/// [`Listings`](crate::Listings) after applying every hook in
/// [`FIND_HOOKS`](crate::FIND_HOOKS). Store adapters receive reads of this
/// type, so a store-level find cannot be issued without the rewrite.
#[derive(Debug, Clone)]
pub struct ListingRead {
    pub(crate) query: ListingQuery,
    pub(crate) populate_guides: bool,
    pub(crate) started_at: Instant,
}

impl ListingRead {
    pub(crate) fn unprepared(query: ListingQuery) -> Self {
        Self {
            query,
            populate_guides: false,
            started_at: Instant::now(),
        }
    }

    #[must_use]
    pub fn filter(&self) -> &Filter {
        &self.query.filter
    }

    #[must_use]
    pub fn sort(&self) -> &Sort {
        &self.query.sort
    }

    #[must_use]
    pub fn page(&self) -> Option<Page> {
        self.query.page
    }

    #[must_use]
    pub fn projection(&self) -> &Projection {
        &self.query.projection
    }

    /// Guides are resolved only when requested and actually returned.
    #[must_use]
    pub fn populates_guides(&self) -> bool {
        self.populate_guides && self.query.projection.includes(ListingField::Guides)
    }

    #[must_use]
    pub fn started_at(&self) -> Instant {
        self.started_at
    }
}
