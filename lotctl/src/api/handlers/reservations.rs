use crate::{
    api::models::reservations::{
        AllocationResponse, AttendedPoolReservationCreate, CancelRequest, PoolReservationCreate, ReservationDetailResponse,
        ReservationResponse, UnitReservationCreate,
    },
    engine::allocator::GuestIntake,
    errors::{Error, Result},
    types::{ReservationId, VehicleCategory},
    AppState,
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};

/// Reserve a discrete unit
#[utoipa::path(
    post,
    path = "/reservations/unit",
    tag = "reservations",
    summary = "Reserve a discrete unit",
    description = "Acquire an exclusive hold on a specific parking unit. Exactly one of any \
                   set of concurrent requests for the same unit succeeds.",
    responses(
        (status = 201, description = "Reservation created", body = AllocationResponse),
        (status = 400, description = "Category mismatch or invalid request"),
        (status = 402, description = "Insufficient balance or outstanding penalty"),
        (status = 404, description = "Unit, requester or vehicle not found"),
        (status = 409, description = "Unit already booked"),
        (status = 500, description = "Internal server error"),
    )
)]
pub async fn create_unit_reservation(
    State(state): State<AppState>,
    Json(data): Json<UnitReservationCreate>,
) -> Result<(StatusCode, Json<AllocationResponse>)> {
    let outcome = state.engine().allocate_unit(data.requester_id, data.vehicle_id, data.unit_id).await?;

    Ok((StatusCode::CREATED, Json(AllocationResponse::from(outcome))))
}

/// Reserve a pooled slot
#[utoipa::path(
    post,
    path = "/reservations/pool",
    tag = "reservations",
    summary = "Reserve a slot of pooled capacity",
    description = "Take one slot of a pool's capacity. A slot label may be supplied for \
                   human-assisted assignment; otherwise one is synthesized.",
    responses(
        (status = 201, description = "Reservation created", body = AllocationResponse),
        (status = 400, description = "Category mismatch or invalid request"),
        (status = 402, description = "Insufficient balance or outstanding penalty"),
        (status = 404, description = "Pool, requester or vehicle not found"),
        (status = 409, description = "Pool full or slot already taken"),
        (status = 500, description = "Internal server error"),
    )
)]
pub async fn create_pool_reservation(
    State(state): State<AppState>,
    Json(data): Json<PoolReservationCreate>,
) -> Result<(StatusCode, Json<AllocationResponse>)> {
    let outcome = state
        .engine()
        .allocate_pool(data.requester_id, data.vehicle_id, data.pool_id, data.slot_label)
        .await?;

    Ok((StatusCode::CREATED, Json(AllocationResponse::from(outcome))))
}

/// Attendant-assisted walk-up reservation
#[utoipa::path(
    post,
    path = "/reservations/pool/attended",
    tag = "reservations",
    summary = "Attendant-assisted walk-up reservation",
    description = "Create an ephemeral guest identity with an opening balance grant and \
                   allocate a pool slot directly into an active session.",
    responses(
        (status = 201, description = "Reservation created and session started", body = AllocationResponse),
        (status = 400, description = "Invalid category or grant amount"),
        (status = 404, description = "Pool not found"),
        (status = 409, description = "Pool full or slot already taken"),
        (status = 500, description = "Internal server error"),
    )
)]
pub async fn create_attended_reservation(
    State(state): State<AppState>,
    Json(data): Json<AttendedPoolReservationCreate>,
) -> Result<(StatusCode, Json<AllocationResponse>)> {
    let category: VehicleCategory = data.category.parse().map_err(|message| Error::BadRequest { message })?;

    let intake = GuestIntake {
        first_name: data.first_name,
        last_name: data.last_name,
        plate: data.plate,
        category,
        granted_hours: data.granted_hours,
    };

    let outcome = state
        .engine()
        .allocate_pool_attended(data.attendant_id, data.pool_id, data.slot_label, intake)
        .await?;

    Ok((StatusCode::CREATED, Json(AllocationResponse::from(outcome))))
}

/// Cancel a reservation
#[utoipa::path(
    post,
    path = "/reservations/{id}/cancel",
    tag = "reservations",
    summary = "Cancel a reservation",
    description = "Cancel a reservation that has not started, releasing its hold.",
    params(
        ("id" = String, Path, description = "Reservation ID (UUID)"),
    ),
    responses(
        (status = 200, description = "Reservation cancelled", body = ReservationResponse),
        (status = 404, description = "Reservation not found"),
        (status = 409, description = "Reservation already started or terminal"),
        (status = 500, description = "Internal server error"),
    )
)]
pub async fn cancel_reservation(
    State(state): State<AppState>,
    Path(id): Path<ReservationId>,
    Json(data): Json<CancelRequest>,
) -> Result<Json<ReservationResponse>> {
    let reservation = state.engine().cancel_reservation(id, data.actor_id).await?;

    Ok(Json(ReservationResponse::from(reservation)))
}

/// Get a reservation
#[utoipa::path(
    get,
    path = "/reservations/{id}",
    tag = "reservations",
    summary = "Get a reservation",
    description = "Reservation details plus the scan audit trail for its session.",
    params(
        ("id" = String, Path, description = "Reservation ID (UUID)"),
    ),
    responses(
        (status = 200, description = "Reservation details", body = ReservationDetailResponse),
        (status = 404, description = "Reservation not found"),
        (status = 500, description = "Internal server error"),
    )
)]
pub async fn get_reservation(
    State(state): State<AppState>,
    Path(id): Path<ReservationId>,
) -> Result<Json<ReservationDetailResponse>> {
    let detail = state.engine().get_reservation(id).await?;

    Ok(Json(ReservationDetailResponse::from(detail)))
}
