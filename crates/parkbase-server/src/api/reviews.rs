use axum::{extract::State, Extension, Json};
use parkbase_core::Review;

use crate::middleware::{QueryPairs, RequestId};

use super::{map_db_error, parse_id, ApiError, ApiResponse, AppState, ResponseMeta};

/// `GET /api/reviews`, optionally narrowed with `?park=<id>`.
pub(super) async fn list_reviews(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    QueryPairs(pairs): QueryPairs,
) -> Result<Json<ApiResponse<Vec<Review>>>, ApiError> {
    let park = pairs
        .iter()
        .rev()
        .find(|(k, _)| k == "park")
        .map(|(_, v)| parse_id(&req_id.0, v))
        .transpose()?;
    let reviews = state
        .reviews
        .reviews(park)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        meta: ResponseMeta::counted(req_id.0, reviews.len()),
        data: reviews,
    }))
}
