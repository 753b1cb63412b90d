use crate::{
    api::models::{
        reservations::ReservationResponse,
        sessions::{ScanPayload, SessionEndResponse, SessionScanRequest},
    },
    errors::{Error, Result},
    AppState,
};
use axum::{extract::State, response::Json};

/// Parse a scanned request body. Current scanners post the versioned JSON
/// payload; codes printed before versioning arrive as a bare token string or
/// the old `{"sessionToken": ...}` object and are upgraded on the way in.
fn parse_scan_request(raw: &str) -> Result<SessionScanRequest> {
    if let Ok(request) = serde_json::from_str::<SessionScanRequest>(raw) {
        return Ok(request);
    }

    ScanPayload::upgrade_legacy(raw)
        .map(|payload| SessionScanRequest {
            payload,
            validated_by: None,
        })
        .ok_or_else(|| Error::BadRequest {
            message: "unrecognized scan payload".into(),
        })
}

/// Start a parking session
#[utoipa::path(
    post,
    path = "/sessions/start",
    tag = "sessions",
    summary = "Start a parking session",
    description = "Validate a scanned entry code and move its reservation from reserved to \
                   active. A replayed or unknown token is answered 404 without revealing \
                   whether it ever existed.",
    request_body = SessionScanRequest,
    responses(
        (status = 200, description = "Session started", body = ReservationResponse),
        (status = 400, description = "Unrecognized scan payload"),
        (status = 404, description = "Token not found or already used"),
        (status = 500, description = "Internal server error"),
    )
)]
pub async fn start_session(State(state): State<AppState>, body: String) -> Result<Json<ReservationResponse>> {
    let request = parse_scan_request(&body)?;

    let reservation = state
        .engine()
        .start_session(request.payload.session_token(), request.validated_by)
        .await?;

    Ok(Json(ReservationResponse::from(reservation)))
}

/// End a parking session
#[utoipa::path(
    post,
    path = "/sessions/end",
    tag = "sessions",
    summary = "End a parking session",
    description = "Validate a scanned exit code, complete the reservation, release its \
                   capacity and bill the elapsed time against the requester's balance.",
    request_body = SessionScanRequest,
    responses(
        (status = 200, description = "Session ended and billed", body = SessionEndResponse),
        (status = 400, description = "Unrecognized scan payload"),
        (status = 404, description = "Token not found or already used"),
        (status = 500, description = "Internal server error"),
    )
)]
pub async fn end_session(State(state): State<AppState>, body: String) -> Result<Json<SessionEndResponse>> {
    let request = parse_scan_request(&body)?;

    let outcome = state
        .engine()
        .end_session(request.payload.session_token(), request.validated_by)
        .await?;

    Ok(Json(SessionEndResponse {
        reservation: ReservationResponse::from(outcome.reservation),
        billing: outcome.breakdown,
    }))
}
