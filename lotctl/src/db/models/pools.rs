//! Database models for pooled capacity sections.

use crate::types::{PoolId, VehicleCategory};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Administrative pool status stored as TEXT in the database
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, utoipa::ToSchema)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PoolStatus {
    Available,
    Unavailable,
    Maintenance,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct CapacityPool {
    pub id: PoolId,
    pub name: String,
    pub category: VehicleCategory,
    pub total_capacity: i64,
    pub reserved_count: i64,
    pub occupied_count: i64,
    pub unavailable_count: i64,
    pub status: PoolStatus,
    pub next_slot_seq: i64,
    pub created_at: DateTime<Utc>,
}

impl CapacityPool {
    /// Capacity not currently held by any reservation, session or admin hold.
    pub fn available(&self) -> i64 {
        self.total_capacity - self.reserved_count - self.occupied_count - self.unavailable_count
    }

    /// Whether new allocations may be made against this pool at all.
    pub fn accepts_allocations(&self) -> bool {
        self.status == PoolStatus::Available
    }
}

/// Database request for provisioning a new pool
#[derive(Debug, Clone)]
pub struct PoolCreateDBRequest {
    pub name: String,
    pub category: VehicleCategory,
    pub total_capacity: i64,
}
