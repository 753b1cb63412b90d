//! API models for capacity listing and provisioning endpoints.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::cache::CapacitySnapshot;
use crate::db::models::pools::{CapacityPool, PoolStatus};
use crate::db::models::units::{ParkingUnit, UnitStatus};
use crate::types::{PoolId, UnitId, VehicleCategory};

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct UnitCreate {
    #[serde(default)]
    #[schema(value_type = Option<Uuid>)]
    pub pool_id: Option<PoolId>,
    pub label: String,
    /// Vehicle category; synonyms like "ebike" are accepted.
    pub category: String,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct PoolCreate {
    pub name: String,
    pub category: String,
    pub total_capacity: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UnitResponse {
    #[schema(value_type = Uuid)]
    pub id: UnitId,
    #[schema(value_type = Option<Uuid>)]
    pub pool_id: Option<PoolId>,
    pub label: String,
    pub category: VehicleCategory,
    pub status: UnitStatus,
    pub created_at: DateTime<Utc>,
}

impl From<ParkingUnit> for UnitResponse {
    fn from(unit: ParkingUnit) -> Self {
        Self {
            id: unit.id,
            pool_id: unit.pool_id,
            label: unit.label,
            category: unit.category,
            status: unit.status,
            created_at: unit.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PoolResponse {
    #[schema(value_type = Uuid)]
    pub id: PoolId,
    pub name: String,
    pub category: VehicleCategory,
    pub total_capacity: i64,
    pub reserved_count: i64,
    pub occupied_count: i64,
    pub unavailable_count: i64,
    /// Derived: `total - reserved - occupied - unavailable`.
    pub available: i64,
    pub status: PoolStatus,
}

impl From<CapacityPool> for PoolResponse {
    fn from(pool: CapacityPool) -> Self {
        let available = pool.available();
        Self {
            id: pool.id,
            name: pool.name,
            category: pool.category,
            total_capacity: pool.total_capacity,
            reserved_count: pool.reserved_count,
            occupied_count: pool.occupied_count,
            unavailable_count: pool.unavailable_count,
            available,
            status: pool.status,
        }
    }
}

/// The cached availability listing. A read-side hint; allocation decisions
/// never consult it.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CapacityResponse {
    pub units: Vec<UnitResponse>,
    pub pools: Vec<PoolResponse>,
}

impl From<&CapacitySnapshot> for CapacityResponse {
    fn from(snapshot: &CapacitySnapshot) -> Self {
        Self {
            units: snapshot.units.iter().cloned().map(UnitResponse::from).collect(),
            pools: snapshot.pools.iter().cloned().map(PoolResponse::from).collect(),
        }
    }
}
