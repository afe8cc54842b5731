use axum::{
    extract::{Path, State},
    Extension, Json,
};
use parkbase_core::UserSummary;

use crate::middleware::RequestId;

use super::{map_db_error, parse_id, ApiError, ApiResponse, AppState, ResponseMeta};

pub(super) async fn list_users(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Result<Json<ApiResponse<Vec<UserSummary>>>, ApiError> {
    let users = state
        .users
        .all_summaries()
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        meta: ResponseMeta::counted(req_id.0, users.len()),
        data: users,
    }))
}

pub(super) async fn get_user(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<UserSummary>>, ApiError> {
    let id = parse_id(&req_id.0, &id)?;
    let user = state
        .users
        .summary(id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?
        .ok_or_else(|| ApiError::new(req_id.0.clone(), "not_found", "No user found with that ID"))?;

    Ok(Json(ApiResponse {
        data: user,
        meta: ResponseMeta::new(req_id.0),
    }))
}
