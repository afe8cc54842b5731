//! Weak references between collections.
//!
//! A [`Ref<T>`] stores only the identity of a document in another collection
//! plus the collection tag (carried by `T`). It never owns or embeds the
//! referenced document; resolving it is an explicit population step done by
//! the store layer.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

/// A document type that can be the target of a [`Ref`].
pub trait Referent {
    /// Name of the collection documents of this type live in.
    const COLLECTION: &'static str;
}

/// Reference to a document of type `T`, serialized as the bare identifier.
pub struct Ref<T> {
    id: Uuid,
    target: PhantomData<fn() -> T>,
}

impl<T: Referent> Ref<T> {
    #[must_use]
    pub fn new(id: Uuid) -> Self {
        Self {
            id,
            target: PhantomData,
        }
    }

    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    #[must_use]
    pub fn collection(&self) -> &'static str {
        T::COLLECTION
    }
}

impl<T> Clone for Ref<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Ref<T> {}

impl<T> PartialEq for Ref<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<T> Eq for Ref<T> {}

impl<T> Hash for Ref<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl<T: Referent> fmt::Debug for Ref<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ref({}:{})", T::COLLECTION, self.id)
    }
}

impl<T> Serialize for Ref<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.id.serialize(serializer)
    }
}

impl<'de, T> Deserialize<'de> for Ref<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Uuid::deserialize(deserializer).map(|id| Self {
            id,
            target: PhantomData,
        })
    }
}
