//! Database models for the append-only scan-event audit log.

use crate::types::ReservationId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Which half of the session the scan drove.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, utoipa::ToSchema)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ScanPhase {
    SessionStart,
    SessionEnd,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ScanEvent {
    pub id: i64,
    pub reservation_id: ReservationId,
    pub validated_by: Option<Uuid>,
    pub phase: ScanPhase,
    pub status_at_scan: String,
    pub scanned_at: DateTime<Utc>,
}
