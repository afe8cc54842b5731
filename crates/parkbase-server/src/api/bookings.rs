use axum::{extract::State, Extension, Json};
use parkbase_core::Booking;

use crate::middleware::RequestId;

use super::{map_db_error, ApiError, ApiResponse, AppState, ResponseMeta};

pub(super) async fn list_bookings(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Result<Json<ApiResponse<Vec<Booking>>>, ApiError> {
    let bookings = state
        .bookings
        .bookings()
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        meta: ResponseMeta::counted(req_id.0, bookings.len()),
        data: bookings,
    }))
}
