//! Outbound shape of a listing read.

use serde::ser::{Error as _, Serializer};
use serde::Serialize;
use serde_json::{Map, Value};

use super::Listing;
use crate::query::{ListingField, Projection};
use crate::review::Review;
use crate::user::UserSummary;

/// A listing as returned by a read: stored fields filtered by the
/// projection, guides either as ids or as populated summaries, plus the
/// `durationWeeks` virtual and, when requested, the listing's reviews.
#[derive(Debug, Clone, PartialEq)]
pub struct ListingDocument {
    pub listing: Listing,
    pub guides: Option<Vec<UserSummary>>,
    pub reviews: Option<Vec<Review>>,
    pub projection: Projection,
}

impl ListingDocument {
    #[must_use]
    pub fn new(listing: Listing, projection: Projection) -> Self {
        Self {
            listing,
            guides: None,
            reviews: None,
            projection,
        }
    }

    /// Whether guide references were expanded into summaries.
    #[must_use]
    pub fn is_populated(&self) -> bool {
        self.guides.is_some()
    }

    fn to_map(&self) -> Result<Map<String, Value>, serde_json::Error> {
        let Value::Object(stored) = serde_json::to_value(&self.listing)? else {
            return Ok(Map::new());
        };
        let mut out: Map<String, Value> = stored
            .into_iter()
            .filter(|(key, _)| {
                ListingField::from_api_name(key).is_none_or(|f| self.projection.includes(f))
            })
            .collect();

        if let Some(guides) = &self.guides {
            if out.contains_key("guides") {
                out.insert("guides".to_string(), serde_json::to_value(guides)?);
            }
        }
        if self.projection.includes(ListingField::Duration) {
            out.insert(
                "durationWeeks".to_string(),
                Value::from(self.listing.duration_weeks()),
            );
        }
        if let Some(reviews) = &self.reviews {
            out.insert("reviews".to_string(), serde_json::to_value(reviews)?);
        }
        Ok(out)
    }
}

impl Serialize for ListingDocument {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_map().map_err(S::Error::custom)?.serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;
    use crate::listing::fixtures;
    use crate::reference::Ref;
    use crate::user::Role;

    fn summary(name: &str) -> UserSummary {
        UserSummary {
            id: Uuid::new_v4(),
            name: name.to_string(),
            email: format!("{}@example.com", name.to_lowercase()),
            photo: None,
            role: Role::Guide,
        }
    }

    #[test]
    fn default_projection_hides_created_at_and_adds_weeks() {
        let mut listing = fixtures::listing("Mountain Retreat Base");
        listing.duration = 14;
        let json = serde_json::to_value(ListingDocument::new(listing, Projection::Default))
            .expect("serialize");
        assert!(json.get("createdAt").is_none());
        assert_eq!(json["durationWeeks"], 2.0);
        assert_eq!(json["slug"], "mountain-retreat-base");
        assert!(json.get("reviews").is_none());
    }

    #[test]
    fn populated_guides_replace_ids_with_summaries() {
        let mut listing = fixtures::listing("Mountain Retreat Base");
        let guide = summary("Lourdes");
        listing.guides = vec![Ref::new(guide.id)];
        let mut doc = ListingDocument::new(listing, Projection::Default);
        doc.guides = Some(vec![guide.clone()]);

        let json = serde_json::to_value(&doc).expect("serialize");
        let guides = json["guides"].as_array().expect("array");
        assert_eq!(guides.len(), 1);
        assert_eq!(guides[0]["name"], "Lourdes");
        assert_eq!(guides[0]["role"], "guide");
        assert!(guides[0].get("version").is_none());
        assert!(guides[0].get("passwordChangedAt").is_none());
    }

    #[test]
    fn unpopulated_guides_stay_ids() {
        let mut listing = fixtures::listing("Mountain Retreat Base");
        let id = Uuid::new_v4();
        listing.guides = vec![Ref::new(id)];
        let json = serde_json::to_value(ListingDocument::new(listing, Projection::Default))
            .expect("serialize");
        assert_eq!(json["guides"][0], id.to_string());
    }

    #[test]
    fn include_projection_keeps_only_selected_fields() {
        let listing = fixtures::listing("Mountain Retreat Base");
        let projection = Projection::Include(vec![ListingField::Name, ListingField::Price]);
        let json = serde_json::to_value(ListingDocument::new(listing, projection))
            .expect("serialize");
        let keys: Vec<&str> = json
            .as_object()
            .expect("object")
            .keys()
            .map(String::as_str)
            .collect();
        assert_eq!(keys.len(), 3, "got {keys:?}");
        for key in ["id", "name", "price"] {
            assert!(keys.contains(&key));
        }
    }
}
