//! The read-rewrite stage.

use parkbase_core::query::{Comparison, Condition, FilterValue, ListingField, ListingQuery};

use crate::ListingRead;

/// A rewrite attached to every find-class listing read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadHook {
    /// Restrict results to documents whose `secretListing` is not `true`.
    HideSecret,
    /// Resolve `guides` into user summaries after the read.
    PopulateGuides,
}

/// Hooks run, in any order, on every find-class read. Adding a read path
/// to [`Listings`](crate::Listings) means going through
/// [`prepare_find`], which runs all of them.
pub const FIND_HOOKS: [ReadHook; 2] = [ReadHook::HideSecret, ReadHook::PopulateGuides];

impl ReadHook {
    pub(crate) fn apply(self, read: &mut ListingRead) {
        match self {
            ReadHook::HideSecret => read.query.filter.conditions.push(Condition::Compare {
                field: ListingField::SecretListing,
                op: Comparison::Ne,
                value: FilterValue::Bool(true),
            }),
            ReadHook::PopulateGuides => read.populate_guides = true,
        }
    }
}

pub(crate) fn prepare_find(query: ListingQuery) -> ListingRead {
    let mut read = ListingRead::unprepared(query);
    for hook in FIND_HOOKS {
        hook.apply(&mut read);
    }
    read
}
