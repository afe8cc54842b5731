use axum::{
    extract::{Path, State},
    Extension, Json,
};
use parkbase_core::query::{FilterValue, ListingField};
use parkbase_core::{parse_listing_query, query::Filter, ListingDocument, Review};

use crate::api::{
    map_core_error, map_listing_error, parse_id, ApiError, ApiResponse, AppState, ResponseMeta,
};
use crate::middleware::{QueryPairs, RequestId};

type ListingsResponse = Json<ApiResponse<Vec<ListingDocument>>>;

pub(super) async fn list_listings(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    QueryPairs(pairs): QueryPairs,
) -> Result<ListingsResponse, ApiError> {
    let query = parse_listing_query(&pairs).map_err(|e| map_core_error(req_id.0.clone(), &e))?;
    let docs = state
        .listings
        .find_many(query)
        .await
        .map_err(|e| map_listing_error(req_id.0.clone(), e))?;

    Ok(Json(ApiResponse {
        meta: ResponseMeta::counted(req_id.0, docs.len()),
        data: docs,
    }))
}

/// Best-rated cheap listings: the list read with a fixed limit and sort.
/// The alias parameters win over anything the caller supplied.
pub(super) async fn top_cheap(
    state: State<AppState>,
    req_id: Extension<RequestId>,
    QueryPairs(mut pairs): QueryPairs,
) -> Result<ListingsResponse, ApiError> {
    pairs.push(("limit".to_string(), "5".to_string()));
    pairs.push(("sort".to_string(), "-ratingsAverage,price".to_string()));
    list_listings(state, req_id, QueryPairs(pairs)).await
}

pub(super) async fn get_listing(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<ListingDocument>>, ApiError> {
    let id = parse_id(&req_id.0, &id)?;
    let doc = state
        .listings
        .find_by_id(id)
        .await
        .map_err(|e| map_listing_error(req_id.0.clone(), e))?;

    Ok(Json(ApiResponse {
        data: doc,
        meta: ResponseMeta::new(req_id.0),
    }))
}

pub(super) async fn get_by_slug(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(slug): Path<String>,
) -> Result<Json<ApiResponse<ListingDocument>>, ApiError> {
    let filter = Filter::eq(ListingField::Slug, FilterValue::Text(slug));
    let doc = state
        .listings
        .find_one(filter)
        .await
        .map_err(|e| map_listing_error(req_id.0.clone(), e))?
        .ok_or_else(|| ApiError::new(req_id.0.clone(), "not_found", "No listing found with that slug"))?;

    Ok(Json(ApiResponse {
        data: doc,
        meta: ResponseMeta::new(req_id.0),
    }))
}

pub(super) async fn listing_reviews(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Vec<Review>>>, ApiError> {
    let id = parse_id(&req_id.0, &id)?;
    let reviews = state
        .listings
        .reviews_for(id)
        .await
        .map_err(|e| map_listing_error(req_id.0.clone(), e))?;

    Ok(Json(ApiResponse {
        meta: ResponseMeta::counted(req_id.0, reviews.len()),
        data: reviews,
    }))
}
