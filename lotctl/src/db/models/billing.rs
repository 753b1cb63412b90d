//! Database models for the billing ledger: balance grants and penalty entries.

use crate::types::{RequesterId, ReservationId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

/// One grant of chargeable hours. Grants are consumed oldest-first.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct BalanceGrant {
    pub id: Uuid,
    pub requester_id: RequesterId,
    pub hours_granted: Decimal,
    pub hours_remaining: Decimal,
    pub granted_by: Option<Uuid>,
    pub granted_at: DateTime<Utc>,
}

/// One outstanding hour debt, raised when a session's charge exceeded the
/// available balance. Settled oldest-first when new hours are granted.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct PenaltyEntry {
    pub id: Uuid,
    pub requester_id: RequesterId,
    pub reservation_id: Option<ReservationId>,
    pub hours: Decimal,
    pub hours_outstanding: Decimal,
    pub created_at: DateTime<Utc>,
}
