//! Lifecycle engine behaviour against the in-memory store.

use std::sync::Arc;

use chrono::Utc;
use parkbase_core::listing::{DistanceUnit, LatLng};
use parkbase_core::query::{parse_listing_query, Filter, FilterValue, ListingField};
use parkbase_core::{ListingInput, Ref, Review, Role, User};
use parkbase_db::{ListingError, Listings, MemoryStore};
use uuid::Uuid;

fn engine() -> (Arc<MemoryStore>, Listings) {
    let store = Arc::new(MemoryStore::new());
    let listings = Listings::new(store.clone(), store.clone(), store.clone());
    (store, listings)
}

fn input(value: serde_json::Value) -> ListingInput {
    serde_json::from_value(value).expect("listing input")
}

fn payload(name: &str) -> serde_json::Value {
    serde_json::json!({
        "name": name,
        "duration": 7,
        "maxGroupSize": 10,
        "difficulty": "easy",
        "price": 100,
        "summary": "x",
        "imageCover": "y"
    })
}

fn guide(name: &str) -> User {
    User {
        id: Uuid::new_v4(),
        name: name.to_string(),
        email: format!("{}@example.com", name.to_lowercase()),
        photo: None,
        role: Role::Guide,
        active: true,
        version: 3,
        password_changed_at: Some(Utc::now()),
    }
}

#[tokio::test]
async fn standard_list_hides_secret_listings_and_populates_guides() {
    let (store, listings) = engine();
    let lead = guide("Lourdes");
    store.add_user(lead.clone()).await;

    for i in 0..10 {
        let mut body = payload(&format!("Visible Camp Number {i}"));
        body["guides"] = serde_json::json!([lead.id]);
        body["secretListing"] = serde_json::json!(i < 2);
        listings.create(input(body)).await.expect("create");
    }

    let docs = listings
        .find_many(parse_listing_query(&[]).expect("query"))
        .await
        .expect("find");
    assert_eq!(docs.len(), 8);
    for doc in &docs {
        assert!(!doc.listing.secret_listing);
        let json = serde_json::to_value(doc).expect("serialize");
        let guides = json["guides"].as_array().expect("guides");
        assert_eq!(guides.len(), 1);
        assert_eq!(guides[0]["name"], "Lourdes");
        assert!(guides[0].get("version").is_none());
        assert!(guides[0].get("passwordChangedAt").is_none());
    }
}

#[tokio::test]
async fn explicit_secret_filter_still_returns_nothing() {
    let (_, listings) = engine();
    let mut body = payload("Hidden Valley Camp");
    body["secretListing"] = serde_json::json!(true);
    listings.create(input(body)).await.expect("create");

    let query = parse_listing_query(&[("secretListing".to_string(), "true".to_string())])
        .expect("query");
    assert!(listings.find_many(query).await.expect("find").is_empty());
    let slug = Filter::eq(
        ListingField::Slug,
        FilterValue::Text("hidden-valley-camp".to_string()),
    );
    assert!(listings.find_one(slug).await.expect("find").is_none());
}

#[tokio::test]
async fn identifier_lookup_returns_secret_listing_with_reviews() {
    let (store, listings) = engine();
    let mut body = payload("Hidden Valley Camp");
    body["secretListing"] = serde_json::json!(true);
    let created = listings.create(input(body)).await.expect("create");
    let id = created.listing.id;
    store
        .add_review(Review {
            id: Uuid::new_v4(),
            review: "Quiet and lovely".to_string(),
            rating: 5.0,
            created_at: Utc::now(),
            park: Ref::new(id),
            user: Ref::new(Uuid::new_v4()),
        })
        .await;

    let doc = listings.find_by_id(id).await.expect("found");
    assert!(doc.listing.secret_listing);
    assert_eq!(doc.reviews.as_ref().map(Vec::len), Some(1));
    assert!(doc.is_populated());
}

#[tokio::test]
async fn population_failure_fails_the_whole_read() {
    let (store, listings) = engine();
    let lead = guide("Lourdes");
    store.add_user(lead.clone()).await;
    let mut body = payload("Forest Hiker Camp");
    body["guides"] = serde_json::json!([lead.id]);
    listings.create(input(body)).await.expect("create");

    store.set_offline::<User>(true);
    let err = listings
        .find_many(parse_listing_query(&[]).expect("query"))
        .await
        .unwrap_err();
    assert!(matches!(err, ListingError::DataAccess(_)));
}

#[tokio::test]
async fn validation_failure_writes_nothing() {
    let (_, listings) = engine();
    let mut body = payload("Mountain Retreat Base");
    body["priceDiscount"] = serde_json::json!(120);
    let err = listings.create(input(body)).await.unwrap_err();
    match err {
        ListingError::Validation(v) => assert_eq!(v.fields(), vec!["priceDiscount"]),
        other => panic!("expected validation error, got {other:?}"),
    }
    let all = listings
        .find_many(parse_listing_query(&[]).expect("query"))
        .await
        .expect("find");
    assert!(all.is_empty());
}

#[tokio::test]
async fn non_finite_numbers_are_never_stored() {
    let (_, listings) = engine();
    assert!(serde_json::from_value::<ListingInput>(serde_json::json!({
        "ratingsAverage": "NaN",
        "price": "inf"
    }))
    .is_err());

    let mut bad = input(payload("Mountain Retreat Base"));
    bad.ratings_average = Some(f64::NAN);
    bad.price = Some(f64::INFINITY);
    let err = listings.create(bad).await.unwrap_err();
    assert!(
        matches!(err, ListingError::Validation(ref v) if v.fields() == vec!["ratingsAverage", "price"]),
        "got {err:?}"
    );
    let all = listings
        .find_many(parse_listing_query(&[]).expect("query"))
        .await
        .expect("find");
    assert!(all.is_empty());

    let created = listings
        .create(input(payload("Mountain Retreat Base")))
        .await
        .expect("create");
    let patch = ListingInput {
        ratings_average: Some(f64::NAN),
        ..ListingInput::default()
    };
    let err = listings
        .patch_fields(created.listing.id, patch)
        .await
        .unwrap_err();
    assert!(matches!(err, ListingError::Validation(ref v) if v.has_field("ratingsAverage")));
    let stored = listings
        .find_by_id(created.listing.id)
        .await
        .expect("find");
    assert!((stored.listing.ratings_average - 4.5).abs() < f64::EPSILON);
}

#[tokio::test]
async fn duplicate_names_are_validation_errors() {
    let (_, listings) = engine();
    listings
        .create(input(payload("Mountain Retreat Base")))
        .await
        .expect("create");
    let err = listings
        .create(input(payload("Mountain Retreat Base")))
        .await
        .unwrap_err();
    assert!(matches!(err, ListingError::Validation(ref v) if v.has_field("name")));
}

#[tokio::test]
async fn patch_keeps_slug_and_skips_discount_rule() {
    let (_, listings) = engine();
    let created = listings
        .create(input(payload("Mountain Retreat Base")))
        .await
        .expect("create");
    let id = created.listing.id;

    let patched = listings
        .patch_fields(
            id,
            input(serde_json::json!({
                "name": "Valley Retreat Base",
                "priceDiscount": 150,
                "ratingsAverage": 4.666
            })),
        )
        .await
        .expect("patch");
    assert_eq!(patched.listing.name, "Valley Retreat Base");
    assert_eq!(patched.listing.slug, "mountain-retreat-base");
    assert_eq!(patched.listing.price_discount, Some(150.0));
    assert!((patched.listing.ratings_average - 4.7).abs() < f64::EPSILON);
}

#[tokio::test]
async fn create_or_replace_rederives_and_keeps_created_at() {
    let (_, listings) = engine();
    let id = Uuid::new_v4();
    let (first, created) = listings
        .create_or_replace(id, input(payload("Mountain Retreat Base")))
        .await
        .expect("create");
    assert!(created);

    let (second, created) = listings
        .create_or_replace(id, input(payload("Valley Retreat Base")))
        .await
        .expect("replace");
    assert!(!created);
    assert_eq!(second.listing.slug, "valley-retreat-base");
    assert_eq!(second.listing.created_at, first.listing.created_at);

    let mut body = payload("Valley Retreat Base");
    body["priceDiscount"] = serde_json::json!(100);
    let err = listings.create_or_replace(id, input(body)).await.unwrap_err();
    assert!(matches!(err, ListingError::Validation(_)));
}

#[tokio::test]
async fn missing_ids_are_not_found() {
    let (_, listings) = engine();
    let id = Uuid::new_v4();
    assert!(matches!(
        listings.find_by_id(id).await,
        Err(ListingError::NotFound(missing)) if missing == id
    ));
    assert!(matches!(listings.delete(id).await, Err(ListingError::NotFound(_))));
    assert!(matches!(
        listings.patch_fields(id, input(serde_json::json!({"price": 5}))).await,
        Err(ListingError::NotFound(_))
    ));
}

#[tokio::test]
async fn aggregates_ignore_secret_listings() {
    let (_, listings) = engine();
    let mut visible = payload("Forest Hiker Trail");
    visible["startDates"] = serde_json::json!(["2021-07-19T09:00:00Z"]);
    visible["startLocation"] = serde_json::json!({"coordinates": [-118.3, 34.1]});
    let mut hidden = payload("Hidden Valley Camp");
    hidden["secretListing"] = serde_json::json!(true);
    hidden["startDates"] = serde_json::json!(["2021-07-20T09:00:00Z"]);
    hidden["startLocation"] = serde_json::json!({"coordinates": [-118.3, 34.1]});
    listings.create(input(visible)).await.expect("create");
    listings.create(input(hidden)).await.expect("create");

    let stats = listings.stats().await.expect("stats");
    assert_eq!(stats.len(), 1);
    assert_eq!(stats[0].num_listings, 1);

    let plan = listings.monthly_plan(2021).await.expect("plan");
    assert_eq!(plan[0].num_listing_starts, 1);
    assert_eq!(plan[0].listings, vec!["Forest Hiker Trail".to_string()]);

    let center = LatLng {
        lat: 34.0522,
        lng: -118.2437,
    };
    let near = listings
        .within(center, 20.0, DistanceUnit::Miles)
        .await
        .expect("within");
    assert_eq!(near.len(), 1);
    let distances = listings
        .distances(center, DistanceUnit::Miles)
        .await
        .expect("distances");
    assert_eq!(distances.len(), 1);
    assert!(distances[0].distance < 20.0);

}

#[tokio::test]
async fn import_and_purge() {
    let (_, listings) = engine();
    let created = listings
        .import(vec![
            input(payload("Forest Hiker Trail")),
            input(payload("Sea Explorer Coast")),
        ])
        .await
        .expect("import");
    assert_eq!(created, 2);
    assert_eq!(listings.purge().await.expect("purge"), 2);
}
