//! Aggregate reads over visible listings.

use std::collections::BTreeMap;

use chrono::Datelike;
use parkbase_core::listing::{Difficulty, DistanceUnit, LatLng};
use parkbase_core::query::{
    Comparison, Condition, Filter, FilterValue, ListingField, ListingQuery, Projection,
};
use parkbase_core::Listing;
use serde::Serialize;
use uuid::Uuid;

/// Minimum `ratingsAverage` for a listing to count towards the stats.
pub const STATS_MIN_RATING: f64 = 4.5;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DifficultyStats {
    pub difficulty: Difficulty,
    pub num_listings: usize,
    pub num_ratings: i64,
    pub avg_rating: f64,
    pub avg_price: f64,
    pub min_price: f64,
    pub max_price: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthPlan {
    pub month: u32,
    pub num_listing_starts: usize,
    pub listings: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListingDistance {
    pub id: Uuid,
    pub name: String,
    pub distance: f64,
}

pub(crate) fn stats_query() -> ListingQuery {
    ListingQuery {
        filter: Filter::new().and(Condition::Compare {
            field: ListingField::RatingsAverage,
            op: Comparison::Gte,
            value: FilterValue::Number(STATS_MIN_RATING),
        }),
        projection: Projection::Include(vec![
            ListingField::Difficulty,
            ListingField::RatingsAverage,
            ListingField::RatingsQuantity,
            ListingField::Price,
        ]),
        ..ListingQuery::default()
    }
}

#[allow(clippy::cast_precision_loss)]
pub(crate) fn difficulty_stats(listings: &[Listing]) -> Vec<DifficultyStats> {
    let mut groups: BTreeMap<u8, Vec<&Listing>> = BTreeMap::new();
    for listing in listings {
        groups
            .entry(listing.difficulty as u8)
            .or_default()
            .push(listing);
    }

    let mut stats: Vec<DifficultyStats> = groups
        .into_values()
        .filter_map(|group| {
            let first = group.first()?;
            let n = group.len() as f64;
            Some(DifficultyStats {
                difficulty: first.difficulty,
                num_listings: group.len(),
                num_ratings: group.iter().map(|l| i64::from(l.ratings_quantity)).sum(),
                avg_rating: group.iter().map(|l| l.ratings_average).sum::<f64>() / n,
                avg_price: group.iter().map(|l| l.price).sum::<f64>() / n,
                min_price: group.iter().map(|l| l.price).fold(f64::INFINITY, f64::min),
                max_price: group.iter().map(|l| l.price).fold(f64::NEG_INFINITY, f64::max),
            })
        })
        .collect();
    stats.sort_by(|a, b| a.avg_price.total_cmp(&b.avg_price));
    stats
}

pub(crate) fn plan_query() -> ListingQuery {
    ListingQuery {
        projection: Projection::Include(vec![ListingField::Name, ListingField::StartDates]),
        ..ListingQuery::default()
    }
}

/// Start dates in `year` grouped by month, busiest month first.
pub(crate) fn monthly_plan(listings: &[Listing], year: i32) -> Vec<MonthPlan> {
    let mut months: BTreeMap<u32, Vec<String>> = BTreeMap::new();
    for listing in listings {
        for start in listing.start_dates.iter().filter(|d| d.year() == year) {
            months
                .entry(start.month())
                .or_default()
                .push(listing.name.clone());
        }
    }
    let mut plan: Vec<MonthPlan> = months
        .into_iter()
        .map(|(month, listings)| MonthPlan {
            month,
            num_listing_starts: listings.len(),
            listings,
        })
        .collect();
    plan.sort_by(|a, b| {
        b.num_listing_starts
            .cmp(&a.num_listing_starts)
            .then(a.month.cmp(&b.month))
    });
    plan
}

pub(crate) fn distances_query() -> ListingQuery {
    ListingQuery {
        projection: Projection::Include(vec![ListingField::Name, ListingField::StartLocation]),
        ..ListingQuery::default()
    }
}

/// Distance of every listing with a start location from `center`, nearest
/// first.
pub(crate) fn distances(
    listings: &[Listing],
    center: LatLng,
    unit: DistanceUnit,
) -> Vec<ListingDistance> {
    let mut out: Vec<ListingDistance> = listings
        .iter()
        .filter_map(|l| {
            let start = l.start_location.as_ref()?;
            Some(ListingDistance {
                id: l.id,
                name: l.name.clone(),
                distance: center.angle_to(start.position()) * unit.earth_radius(),
            })
        })
        .collect();
    out.sort_by(|a, b| a.distance.total_cmp(&b.distance));
    out
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use parkbase_core::listing::{build_listing, GeoPoint, Identity, PointKind, SaveRules};
    use parkbase_core::ListingInput;

    use super::*;

    fn listing(name: &str, difficulty: &str, price: f64) -> Listing {
        let input: ListingInput = serde_json::from_value(serde_json::json!({
            "name": name,
            "duration": 5,
            "maxGroupSize": 10,
            "difficulty": difficulty,
            "price": price,
            "ratingsQuantity": 4,
            "summary": "x",
            "imageCover": "y"
        }))
        .expect("input");
        build_listing(input, Identity::fresh(), SaveRules::default()).expect("valid")
    }

    #[test]
    fn stats_group_by_difficulty_and_sort_by_average_price() {
        let listings = vec![
            listing("Forest Hiker Trail", "easy", 300.0),
            listing("Sea Explorer Coast", "easy", 500.0),
            listing("Snow Adventurer Ridge", "difficult", 100.0),
        ];
        let stats = difficulty_stats(&listings);
        assert_eq!(stats.len(), 2);
        assert_eq!(stats[0].difficulty, Difficulty::Difficult);
        assert_eq!(stats[1].num_listings, 2);
        assert_eq!(stats[1].num_ratings, 8);
        assert!((stats[1].avg_price - 400.0).abs() < 1e-9);
        assert!((stats[1].min_price - 300.0).abs() < 1e-9);
        assert!((stats[1].max_price - 500.0).abs() < 1e-9);
    }

    #[test]
    fn monthly_plan_counts_starts_in_the_year() {
        let mut a = listing("Forest Hiker Trail", "easy", 300.0);
        a.start_dates = vec![
            Utc.with_ymd_and_hms(2021, 7, 19, 9, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2021, 3, 1, 9, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2022, 7, 1, 9, 0, 0).unwrap(),
        ];
        let mut b = listing("Sea Explorer Coast", "easy", 500.0);
        b.start_dates = vec![Utc.with_ymd_and_hms(2021, 7, 2, 9, 0, 0).unwrap()];

        let plan = monthly_plan(&[a, b], 2021);
        assert_eq!(plan.len(), 2);
        assert_eq!(plan[0].month, 7);
        assert_eq!(plan[0].num_listing_starts, 2);
        assert_eq!(plan[1].month, 3);
        assert_eq!(plan[1].listings, vec!["Forest Hiker Trail".to_string()]);
    }

    #[test]
    fn distances_skip_listings_without_a_start_and_sort_nearest_first() {
        let point = |lng: f64, lat: f64| GeoPoint {
            kind: PointKind::Point,
            coordinates: [lng, lat],
            address: None,
            description: None,
        };
        let mut far = listing("Forest Hiker Trail", "easy", 300.0);
        far.start_location = Some(point(-122.4194, 37.7749));
        let mut near = listing("Sea Explorer Coast", "easy", 500.0);
        near.start_location = Some(point(-118.3, 34.1));
        let nowhere = listing("Snow Adventurer Ridge", "easy", 100.0);

        let center = LatLng {
            lat: 34.0522,
            lng: -118.2437,
        };
        let out = distances(&[far, near, nowhere], center, DistanceUnit::Kilometers);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].name, "Sea Explorer Coast");
        assert!(out[1].distance > 500.0);
    }
}
