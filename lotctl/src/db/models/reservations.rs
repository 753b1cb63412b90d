//! Database models for reservations and their lifecycle.

use crate::types::{PoolId, RequesterId, ReservationId, UnitId, VehicleId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Reservation lifecycle status stored as TEXT in the database.
///
/// `Completed`, `Cancelled` and `Invalid` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, utoipa::ToSchema)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ReservationStatus {
    Reserved,
    Active,
    Completed,
    Cancelled,
    Invalid,
}

impl ReservationStatus {
    /// The wire/database representation ("reserved", "active", ...).
    pub fn as_str(self) -> &'static str {
        match self {
            ReservationStatus::Reserved => "reserved",
            ReservationStatus::Active => "active",
            ReservationStatus::Completed => "completed",
            ReservationStatus::Cancelled => "cancelled",
            ReservationStatus::Invalid => "invalid",
        }
    }
}

/// What a reservation holds: a discrete unit or a labelled pool slot.
/// Decided exactly once, at creation time, and carried on the row - never
/// re-inferred from the shape of an id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Allocation {
    Unit {
        #[schema(value_type = Uuid)]
        unit_id: UnitId,
    },
    Pool {
        #[schema(value_type = Uuid)]
        pool_id: PoolId,
        slot_label: String,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct Reservation {
    pub id: ReservationId,
    pub requester_id: RequesterId,
    pub vehicle_id: VehicleId,
    pub allocation: Allocation,
    pub status: ReservationStatus,
    pub session_token: Uuid,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub waiting_ended_at: Option<DateTime<Utc>>,
}

/// Raw row shape; the nullable allocation columns are folded into
/// [`Allocation`] by the repository.
#[derive(Debug, Clone, FromRow)]
pub(crate) struct ReservationRow {
    pub id: ReservationId,
    pub requester_id: RequesterId,
    pub vehicle_id: VehicleId,
    pub unit_id: Option<UnitId>,
    pub pool_id: Option<PoolId>,
    pub slot_label: Option<String>,
    pub status: ReservationStatus,
    pub session_token: Uuid,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub waiting_ended_at: Option<DateTime<Utc>>,
}

impl TryFrom<ReservationRow> for Reservation {
    type Error = crate::db::errors::DbError;

    fn try_from(row: ReservationRow) -> Result<Self, Self::Error> {
        let allocation = match (row.unit_id, row.pool_id, row.slot_label) {
            (Some(unit_id), None, _) => Allocation::Unit { unit_id },
            (None, Some(pool_id), Some(slot_label)) => Allocation::Pool { pool_id, slot_label },
            // The reservations_single_allocation CHECK constraint makes this
            // unreachable for rows written by this service.
            _ => {
                return Err(crate::db::errors::DbError::Other(anyhow::anyhow!(
                    "reservation {} has a malformed allocation",
                    row.id
                )));
            }
        };

        Ok(Reservation {
            id: row.id,
            requester_id: row.requester_id,
            vehicle_id: row.vehicle_id,
            allocation,
            status: row.status,
            session_token: row.session_token,
            created_at: row.created_at,
            started_at: row.started_at,
            ended_at: row.ended_at,
            waiting_ended_at: row.waiting_ended_at,
        })
    }
}

/// Database request for creating a reservation inside an allocation transaction
#[derive(Debug, Clone)]
pub struct ReservationCreateDBRequest {
    pub requester_id: RequesterId,
    pub vehicle_id: VehicleId,
    pub allocation: Allocation,
    pub status: ReservationStatus,
    pub session_token: Uuid,
    pub started_at: Option<DateTime<Utc>>,
}
