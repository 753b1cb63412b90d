//! Repository for the billing ledger: balance grants and penalty entries.
//!
//! Grants and penalties are both consumed oldest-first. The oldest-first
//! scans take row locks so a concurrent session end and penalty settlement
//! on the same requester serialize instead of double-spending hours.

use rust_decimal::Decimal;
use sqlx::PgConnection;
use tracing::instrument;
use uuid::Uuid;

use crate::db::errors::{DbError, Result};
use crate::db::models::billing::{BalanceGrant, PenaltyEntry};
use crate::types::{RequesterId, ReservationId};

const GRANT_COLUMNS: &str = "id, requester_id, hours_granted, hours_remaining, granted_by, granted_at";
const PENALTY_COLUMNS: &str = "id, requester_id, reservation_id, hours, hours_outstanding, created_at";

pub struct Balances<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Balances<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Sum of remaining hours across all of the requester's grants.
    #[instrument(skip(self), err)]
    pub async fn total_balance(&mut self, requester_id: RequesterId) -> Result<Decimal> {
        let balance = sqlx::query_scalar::<_, Decimal>(
            "SELECT COALESCE(SUM(hours_remaining), 0) FROM balance_grants WHERE requester_id = $1",
        )
        .bind(requester_id)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(balance)
    }

    /// Sum of unpaid penalty hours for the requester.
    #[instrument(skip(self), err)]
    pub async fn outstanding_penalty(&mut self, requester_id: RequesterId) -> Result<Decimal> {
        let hours = sqlx::query_scalar::<_, Decimal>(
            "SELECT COALESCE(SUM(hours_outstanding), 0) FROM penalty_entries WHERE requester_id = $1",
        )
        .bind(requester_id)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(hours)
    }

    #[instrument(skip(self), err)]
    pub async fn insert_grant(
        &mut self,
        requester_id: RequesterId,
        hours_granted: Decimal,
        hours_remaining: Decimal,
        granted_by: Option<Uuid>,
    ) -> Result<BalanceGrant> {
        let grant = sqlx::query_as::<_, BalanceGrant>(&format!(
            "INSERT INTO balance_grants (requester_id, hours_granted, hours_remaining, granted_by)
             VALUES ($1, $2, $3, $4)
             RETURNING {GRANT_COLUMNS}"
        ))
        .bind(requester_id)
        .bind(hours_granted)
        .bind(hours_remaining)
        .bind(granted_by)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(grant)
    }

    /// The oldest grant that still has hours, locked for deduction.
    #[instrument(skip(self), err)]
    pub async fn oldest_open_grant_for_update(&mut self, requester_id: RequesterId) -> Result<Option<BalanceGrant>> {
        let grant = sqlx::query_as::<_, BalanceGrant>(&format!(
            "SELECT {GRANT_COLUMNS} FROM balance_grants
             WHERE requester_id = $1 AND hours_remaining > 0
             ORDER BY granted_at, id
             LIMIT 1
             FOR UPDATE"
        ))
        .bind(requester_id)
        .fetch_optional(&mut *self.db)
        .await?;

        Ok(grant)
    }

    /// Deduct hours from a specific grant. The guard re-checks the remaining
    /// balance so a stale read can never drive it negative.
    #[instrument(skip(self), err)]
    pub async fn deduct_from_grant(&mut self, grant_id: Uuid, hours: Decimal) -> Result<()> {
        let result = sqlx::query(
            "UPDATE balance_grants SET hours_remaining = hours_remaining - $2 WHERE id = $1 AND hours_remaining >= $2",
        )
        .bind(grant_id)
        .bind(hours)
        .execute(&mut *self.db)
        .await?;

        if result.rows_affected() != 1 {
            return Err(DbError::Other(anyhow::anyhow!(
                "grant {grant_id} no longer holds {hours} hours; concurrent deduction without a row lock"
            )));
        }

        Ok(())
    }

    #[instrument(skip(self), err)]
    pub async fn insert_penalty(
        &mut self,
        requester_id: RequesterId,
        reservation_id: Option<ReservationId>,
        hours: Decimal,
    ) -> Result<PenaltyEntry> {
        let entry = sqlx::query_as::<_, PenaltyEntry>(&format!(
            "INSERT INTO penalty_entries (requester_id, reservation_id, hours, hours_outstanding)
             VALUES ($1, $2, $3, $3)
             RETURNING {PENALTY_COLUMNS}"
        ))
        .bind(requester_id)
        .bind(reservation_id)
        .bind(hours)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(entry)
    }

    /// All unpaid penalties, oldest first, locked for settlement.
    #[instrument(skip(self), err)]
    pub async fn open_penalties_for_update(&mut self, requester_id: RequesterId) -> Result<Vec<PenaltyEntry>> {
        let entries = sqlx::query_as::<_, PenaltyEntry>(&format!(
            "SELECT {PENALTY_COLUMNS} FROM penalty_entries
             WHERE requester_id = $1 AND hours_outstanding > 0
             ORDER BY created_at, id
             FOR UPDATE"
        ))
        .bind(requester_id)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(entries)
    }

    /// Pay down part (or all) of one penalty entry.
    #[instrument(skip(self), err)]
    pub async fn settle_penalty(&mut self, penalty_id: Uuid, hours: Decimal) -> Result<()> {
        let result = sqlx::query(
            "UPDATE penalty_entries SET hours_outstanding = hours_outstanding - $2 WHERE id = $1 AND hours_outstanding >= $2",
        )
        .bind(penalty_id)
        .bind(hours)
        .execute(&mut *self.db)
        .await?;

        if result.rows_affected() != 1 {
            return Err(DbError::Other(anyhow::anyhow!(
                "penalty {penalty_id} no longer has {hours} hours outstanding; concurrent settlement without a row lock"
            )));
        }

        Ok(())
    }

    #[instrument(skip(self), err)]
    pub async fn list_grants(&mut self, requester_id: RequesterId) -> Result<Vec<BalanceGrant>> {
        let grants = sqlx::query_as::<_, BalanceGrant>(&format!(
            "SELECT {GRANT_COLUMNS} FROM balance_grants WHERE requester_id = $1 ORDER BY granted_at, id"
        ))
        .bind(requester_id)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(grants)
    }

    #[instrument(skip(self), err)]
    pub async fn list_penalties(&mut self, requester_id: RequesterId) -> Result<Vec<PenaltyEntry>> {
        let entries = sqlx::query_as::<_, PenaltyEntry>(&format!(
            "SELECT {PENALTY_COLUMNS} FROM penalty_entries WHERE requester_id = $1 ORDER BY created_at, id"
        ))
        .bind(requester_id)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(entries)
    }
}
