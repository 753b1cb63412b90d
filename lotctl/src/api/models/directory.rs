//! API models for requesters, vehicles, and balance endpoints.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::db::models::requesters::{Requester, Vehicle};
use crate::types::{RequesterId, VehicleCategory, VehicleId};

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct RequesterCreate {
    pub first_name: String,
    pub last_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RequesterResponse {
    #[schema(value_type = Uuid)]
    pub id: RequesterId,
    pub first_name: String,
    pub last_name: String,
    pub is_guest: bool,
    pub created_at: DateTime<Utc>,
}

impl From<Requester> for RequesterResponse {
    fn from(requester: Requester) -> Self {
        Self {
            id: requester.id,
            first_name: requester.first_name,
            last_name: requester.last_name,
            is_guest: requester.is_guest,
            created_at: requester.created_at,
        }
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct VehicleCreate {
    #[schema(value_type = Uuid)]
    pub requester_id: RequesterId,
    pub plate: String,
    /// Vehicle category; synonyms like "ebike" are accepted.
    pub category: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct VehicleResponse {
    #[schema(value_type = Uuid)]
    pub id: VehicleId,
    #[schema(value_type = Uuid)]
    pub requester_id: RequesterId,
    pub plate: String,
    pub category: VehicleCategory,
    pub created_at: DateTime<Utc>,
}

impl From<Vehicle> for VehicleResponse {
    fn from(vehicle: Vehicle) -> Self {
        Self {
            id: vehicle.id,
            requester_id: vehicle.requester_id,
            plate: vehicle.plate,
            category: vehicle.category,
            created_at: vehicle.created_at,
        }
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct BalanceGrantCreate {
    #[schema(value_type = String)]
    pub hours: Decimal,
    #[serde(default)]
    pub granted_by: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BalanceResponse {
    #[schema(value_type = Uuid)]
    pub requester_id: RequesterId,
    /// Usable hours across all grants.
    #[schema(value_type = String)]
    pub balance: Decimal,
    /// Unpaid penalty hours; must be zero before new allocations.
    #[schema(value_type = String)]
    pub outstanding_penalty: Decimal,
}
