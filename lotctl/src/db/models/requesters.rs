//! Database models for requesters and vehicles.

use crate::types::{RequesterId, VehicleCategory, VehicleId};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Requester {
    pub id: RequesterId,
    pub first_name: String,
    pub last_name: String,
    pub is_guest: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Vehicle {
    pub id: VehicleId,
    pub requester_id: RequesterId,
    pub plate: String,
    pub category: VehicleCategory,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct RequesterCreateDBRequest {
    pub first_name: String,
    pub last_name: String,
    pub is_guest: bool,
}

#[derive(Debug, Clone)]
pub struct VehicleCreateDBRequest {
    pub requester_id: RequesterId,
    pub plate: String,
    pub category: VehicleCategory,
}
