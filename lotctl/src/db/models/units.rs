//! Database models for discrete parking units.

use crate::types::{PoolId, UnitId, VehicleCategory};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Unit status stored as TEXT in the database
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, utoipa::ToSchema)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum UnitStatus {
    Available,
    Reserved,
    Occupied,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ParkingUnit {
    pub id: UnitId,
    pub pool_id: Option<PoolId>,
    pub label: String,
    pub category: VehicleCategory,
    pub status: UnitStatus,
    pub created_at: DateTime<Utc>,
}

/// Database request for provisioning a new unit
#[derive(Debug, Clone)]
pub struct UnitCreateDBRequest {
    pub pool_id: Option<PoolId>,
    pub label: String,
    pub category: VehicleCategory,
}
