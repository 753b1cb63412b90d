//! API models for reservation allocation and lifecycle endpoints.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::db::models::reservations::{Allocation, Reservation, ReservationStatus};
use crate::db::models::scan_events::{ScanEvent, ScanPhase};
use crate::engine::allocator::AllocationOutcome;
use crate::engine::lifecycle::ReservationDetail;
use crate::types::{PoolId, RequesterId, ReservationId, UnitId, VehicleId};

/// Request to allocate a discrete unit.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct UnitReservationCreate {
    #[schema(value_type = Uuid)]
    pub requester_id: RequesterId,
    #[schema(value_type = Uuid)]
    pub vehicle_id: VehicleId,
    #[schema(value_type = Uuid)]
    pub unit_id: UnitId,
}

/// Request to allocate a pooled slot. `slot_label` is only used for
/// human-assisted assignment; when absent a label is synthesized.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct PoolReservationCreate {
    #[schema(value_type = Uuid)]
    pub requester_id: RequesterId,
    #[schema(value_type = Uuid)]
    pub vehicle_id: VehicleId,
    #[schema(value_type = Uuid)]
    pub pool_id: PoolId,
    #[serde(default)]
    pub slot_label: Option<String>,
}

/// Attendant-assisted walk-up allocation: creates a guest identity and an
/// opening balance grant, and starts the session immediately.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct AttendedPoolReservationCreate {
    pub attendant_id: Uuid,
    #[schema(value_type = Uuid)]
    pub pool_id: PoolId,
    #[serde(default)]
    pub slot_label: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub plate: String,
    /// Vehicle category; synonyms like "ebike" are accepted.
    pub category: String,
    #[schema(value_type = String)]
    pub granted_hours: Decimal,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CancelRequest {
    pub actor_id: Uuid,
}

/// What a successful allocation returns. The session token is the payload
/// for the scannable code and is shown exactly once here.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AllocationResponse {
    #[schema(value_type = Uuid)]
    pub reservation_id: ReservationId,
    pub session_token: Uuid,
}

impl From<AllocationOutcome> for AllocationResponse {
    fn from(outcome: AllocationOutcome) -> Self {
        Self {
            reservation_id: outcome.reservation_id,
            session_token: outcome.session_token,
        }
    }
}

/// Reservation summary. Deliberately omits the session token: once issued,
/// token validity is only ever checked by scanning, never re-read.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ReservationResponse {
    #[schema(value_type = Uuid)]
    pub id: ReservationId,
    #[schema(value_type = Uuid)]
    pub requester_id: RequesterId,
    #[schema(value_type = Uuid)]
    pub vehicle_id: VehicleId,
    pub allocation: Allocation,
    pub status: ReservationStatus,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub waiting_ended_at: Option<DateTime<Utc>>,
}

impl From<Reservation> for ReservationResponse {
    fn from(reservation: Reservation) -> Self {
        Self {
            id: reservation.id,
            requester_id: reservation.requester_id,
            vehicle_id: reservation.vehicle_id,
            allocation: reservation.allocation,
            status: reservation.status,
            created_at: reservation.created_at,
            started_at: reservation.started_at,
            ended_at: reservation.ended_at,
            waiting_ended_at: reservation.waiting_ended_at,
        }
    }
}

/// One entry of a reservation's scan audit trail.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ScanEventResponse {
    pub phase: ScanPhase,
    pub validated_by: Option<Uuid>,
    /// Reservation status observed at scan time.
    pub status_at_scan: String,
    pub scanned_at: DateTime<Utc>,
}

impl From<ScanEvent> for ScanEventResponse {
    fn from(event: ScanEvent) -> Self {
        Self {
            phase: event.phase,
            validated_by: event.validated_by,
            status_at_scan: event.status_at_scan,
            scanned_at: event.scanned_at,
        }
    }
}

/// Single-reservation read: the summary plus its scan history.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ReservationDetailResponse {
    #[serde(flatten)]
    pub reservation: ReservationResponse,
    pub scan_events: Vec<ScanEventResponse>,
}

impl From<ReservationDetail> for ReservationDetailResponse {
    fn from(detail: ReservationDetail) -> Self {
        Self {
            reservation: ReservationResponse::from(detail.reservation),
            scan_events: detail.scan_history.into_iter().map(ScanEventResponse::from).collect(),
        }
    }
}
