use axum::{
    extract::{Path, State},
    Extension, Json,
};
use parkbase_core::listing::{DistanceUnit, LatLng};
use parkbase_core::ListingDocument;
use parkbase_db::ListingDistance;

use crate::api::{map_listing_error, ApiError, ApiResponse, AppState, ResponseMeta};
use crate::middleware::RequestId;

const CENTER_FORMAT: &str = "Please provide latitude and longitude in the format lat,lng";

fn parse_center(request_id: &str, raw: &str) -> Result<LatLng, ApiError> {
    LatLng::parse(raw).ok_or_else(|| ApiError::new(request_id, "bad_request", CENTER_FORMAT))
}

fn parse_unit(request_id: &str, raw: &str) -> Result<DistanceUnit, ApiError> {
    DistanceUnit::parse(raw).ok_or_else(|| {
        ApiError::new(request_id, "bad_request", format!("unit must be mi or km, got '{raw}'"))
    })
}

pub(super) async fn listings_within(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path((distance, latlng, unit)): Path<(String, String, String)>,
) -> Result<Json<ApiResponse<Vec<ListingDocument>>>, ApiError> {
    let distance: f64 = distance
        .parse()
        .ok()
        .filter(|d: &f64| d.is_finite() && *d >= 0.0)
        .ok_or_else(|| {
            ApiError::new(req_id.0.clone(), "bad_request", "distance must be a non-negative number")
        })?;
    let center = parse_center(&req_id.0, &latlng)?;
    let unit = parse_unit(&req_id.0, &unit)?;

    let docs = state
        .listings
        .within(center, distance, unit)
        .await
        .map_err(|e| map_listing_error(req_id.0.clone(), e))?;

    Ok(Json(ApiResponse {
        meta: ResponseMeta::counted(req_id.0, docs.len()),
        data: docs,
    }))
}

pub(super) async fn listing_distances(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path((latlng, unit)): Path<(String, String)>,
) -> Result<Json<ApiResponse<Vec<ListingDistance>>>, ApiError> {
    let center = parse_center(&req_id.0, &latlng)?;
    let unit = parse_unit(&req_id.0, &unit)?;

    let distances = state
        .listings
        .distances(center, unit)
        .await
        .map_err(|e| map_listing_error(req_id.0.clone(), e))?;

    Ok(Json(ApiResponse {
        meta: ResponseMeta::counted(req_id.0, distances.len()),
        data: distances,
    }))
}
