//! Handle availability endpoints.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use gigboard_handles::{AvailabilityQuery, AvailabilityResponse, ReasonCode};
use tracing::debug;

use crate::server::{ApiError, SharedState};

/// POST /profile/handle-availability
pub async fn handle_check_availability(
    State(state): State<SharedState>,
    payload: Result<Json<AvailabilityQuery>, JsonRejection>,
) -> Result<(StatusCode, Json<AvailabilityResponse>), ApiError> {
    state.record_request();
    let Json(query) =
        payload.map_err(|err| ApiError::bad_request(format!("invalid request body: {err}")))?;
    Ok(answer(&state, query).await)
}

/// GET /profile/handle-availability?handle_kind=..&candidate_handle=..
pub async fn handle_check_availability_query(
    State(state): State<SharedState>,
    params: Result<Query<AvailabilityQuery>, QueryRejection>,
) -> Result<(StatusCode, Json<AvailabilityResponse>), ApiError> {
    state.record_request();
    let Query(query) =
        params.map_err(|err| ApiError::bad_request(format!("invalid query string: {err}")))?;
    Ok(answer(&state, query).await)
}

async fn answer(
    state: &SharedState,
    query: AvailabilityQuery,
) -> (StatusCode, Json<AvailabilityResponse>) {
    let response = state.resolver.query(&query).await;
    let status = status_for(&response);
    debug!(
        kind = %query.handle_kind,
        reason = %response.reason_code,
        status = status.as_u16(),
        "answered handle availability"
    );
    (status, Json(response))
}

fn status_for(response: &AvailabilityResponse) -> StatusCode {
    match response.reason_code {
        ReasonCode::MissingHandle | ReasonCode::InvalidFormat => StatusCode::BAD_REQUEST,
        ReasonCode::StoreUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        ReasonCode::NoHolder
        | ReasonCode::OwnProfile
        | ReasonCode::HeldByPremium
        | ReasonCode::CanTakeFromNonPremium => StatusCode::OK,
    }
}
