//! OpenAPI documentation for the management API at `/api/v1/*`.

use utoipa::OpenApi;

use crate::api::handlers;
use crate::api::models::{capacity, directory, reservations, sessions};
use crate::engine::billing::{BillingBreakdown, GrantOutcome};

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::reservations::create_unit_reservation,
        handlers::reservations::create_pool_reservation,
        handlers::reservations::create_attended_reservation,
        handlers::reservations::cancel_reservation,
        handlers::reservations::get_reservation,
        handlers::sessions::start_session,
        handlers::sessions::end_session,
        handlers::capacity::get_capacity,
        handlers::capacity::create_unit,
        handlers::capacity::create_pool,
        handlers::directory::create_requester,
        handlers::directory::create_vehicle,
        handlers::directory::grant_balance,
        handlers::directory::get_balance,
    ),
    components(schemas(
        reservations::UnitReservationCreate,
        reservations::PoolReservationCreate,
        reservations::AttendedPoolReservationCreate,
        reservations::CancelRequest,
        reservations::AllocationResponse,
        reservations::ReservationResponse,
        reservations::ReservationDetailResponse,
        reservations::ScanEventResponse,
        crate::db::models::scan_events::ScanPhase,
        sessions::ScanPayload,
        sessions::SessionScanRequest,
        sessions::SessionEndResponse,
        capacity::UnitCreate,
        capacity::PoolCreate,
        capacity::UnitResponse,
        capacity::PoolResponse,
        capacity::CapacityResponse,
        directory::RequesterCreate,
        directory::RequesterResponse,
        directory::VehicleCreate,
        directory::VehicleResponse,
        directory::BalanceGrantCreate,
        directory::BalanceResponse,
        BillingBreakdown,
        GrantOutcome,
    )),
    tags(
        (name = "reservations", description = "Allocation and lifecycle of parking reservations"),
        (name = "sessions", description = "Scan-driven session start/end and billing"),
        (name = "capacity", description = "Units, pools, and the availability listing"),
        (name = "directory", description = "Requesters, vehicles, and balances"),
    ),
    info(
        title = "lotctl API",
        description = "Campus parking reservation and capacity allocation engine"
    )
)]
pub struct ApiDoc;
