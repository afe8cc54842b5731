use axum::{
    extract::{Path, State},
    Extension, Json,
};
use parkbase_db::{DifficultyStats, MonthPlan};

use crate::api::{map_listing_error, ApiError, ApiResponse, AppState, ResponseMeta};
use crate::middleware::RequestId;

pub(super) async fn listing_stats(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Result<Json<ApiResponse<Vec<DifficultyStats>>>, ApiError> {
    let stats = state
        .listings
        .stats()
        .await
        .map_err(|e| map_listing_error(req_id.0.clone(), e))?;

    Ok(Json(ApiResponse {
        data: stats,
        meta: ResponseMeta::new(req_id.0),
    }))
}

pub(super) async fn monthly_plan(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(year): Path<String>,
) -> Result<Json<ApiResponse<Vec<MonthPlan>>>, ApiError> {
    let year: i32 = year
        .parse()
        .map_err(|_| ApiError::new(req_id.0.clone(), "bad_request", format!("invalid year: {year}")))?;
    let plan = state
        .listings
        .monthly_plan(year)
        .await
        .map_err(|e| map_listing_error(req_id.0.clone(), e))?;

    Ok(Json(ApiResponse {
        meta: ResponseMeta::counted(req_id.0, plan.len()),
        data: plan,
    }))
}
