use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use parkbase_core::{ListingDocument, ListingInput};

use crate::api::{map_listing_error, parse_id, ApiError, ApiResponse, AppState, ResponseMeta};
use crate::middleware::{RequestId, Structured};

type ListingResponse = Json<ApiResponse<ListingDocument>>;

pub(super) async fn create_listing(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Structured(input): Structured<ListingInput>,
) -> Result<(StatusCode, ListingResponse), ApiError> {
    let doc = state
        .listings
        .create(input)
        .await
        .map_err(|e| map_listing_error(req_id.0.clone(), e))?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse {
            data: doc,
            meta: ResponseMeta::new(req_id.0),
        }),
    ))
}

/// Full save: `201` when the id was new, `200` when it replaced a document.
pub(super) async fn replace_listing(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<String>,
    Structured(input): Structured<ListingInput>,
) -> Result<(StatusCode, ListingResponse), ApiError> {
    let id = parse_id(&req_id.0, &id)?;
    let (doc, created) = state
        .listings
        .create_or_replace(id, input)
        .await
        .map_err(|e| map_listing_error(req_id.0.clone(), e))?;

    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((
        status,
        Json(ApiResponse {
            data: doc,
            meta: ResponseMeta::new(req_id.0),
        }),
    ))
}

pub(super) async fn patch_listing(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<String>,
    Structured(input): Structured<ListingInput>,
) -> Result<ListingResponse, ApiError> {
    let id = parse_id(&req_id.0, &id)?;
    let doc = state
        .listings
        .patch_fields(id, input)
        .await
        .map_err(|e| map_listing_error(req_id.0.clone(), e))?;

    Ok(Json(ApiResponse {
        data: doc,
        meta: ResponseMeta::new(req_id.0),
    }))
}

pub(super) async fn delete_listing(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_id(&req_id.0, &id)?;
    state
        .listings
        .delete(id)
        .await
        .map_err(|e| map_listing_error(req_id.0, e))?;
    Ok(StatusCode::NO_CONTENT)
}
