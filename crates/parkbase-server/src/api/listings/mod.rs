//! `/api/parks` routes. Every handler goes through [`parkbase_db::Listings`].

mod geo;
mod read;
mod stats;
mod write;

use axum::{routing::get, Router};

use super::AppState;

pub(super) fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/parks",
            get(read::list_listings).post(write::create_listing),
        )
        .route("/api/parks/top-5-cheap", get(read::top_cheap))
        .route("/api/parks/stats", get(stats::listing_stats))
        .route("/api/parks/monthly-plan/{year}", get(stats::monthly_plan))
        .route(
            "/api/parks/within/{distance}/center/{latlng}/unit/{unit}",
            get(geo::listings_within),
        )
        .route(
            "/api/parks/distances/{latlng}/unit/{unit}",
            get(geo::listing_distances),
        )
        .route("/api/parks/slug/{slug}", get(read::get_by_slug))
        .route(
            "/api/parks/{id}",
            get(read::get_listing)
                .put(write::replace_listing)
                .patch(write::patch_listing)
                .delete(write::delete_listing),
        )
        .route("/api/parks/{id}/reviews", get(read::listing_reviews))
}
