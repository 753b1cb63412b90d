//! Repository for pooled capacity sections.
//!
//! All counter mutations are guarded single-row UPDATEs whose WHERE clause
//! restates the precondition (room available, counter positive). A zero row
//! count means a concurrent request won; callers translate that into the
//! appropriate contention error. The table CHECK constraints are only the
//! last-resort integrity floor.

use sqlx::PgConnection;
use tracing::instrument;

use crate::db::errors::Result;
use crate::db::models::pools::{CapacityPool, PoolCreateDBRequest};
use crate::types::PoolId;

const POOL_COLUMNS: &str = "id, name, category, total_capacity, reserved_count, occupied_count, unavailable_count, status, \
                            next_slot_seq, created_at";

pub struct Pools<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Pools<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self, request), err)]
    pub async fn create(&mut self, request: &PoolCreateDBRequest) -> Result<CapacityPool> {
        let pool = sqlx::query_as::<_, CapacityPool>(&format!(
            "INSERT INTO capacity_pools (name, category, total_capacity) VALUES ($1, $2, $3) RETURNING {POOL_COLUMNS}"
        ))
        .bind(&request.name)
        .bind(request.category)
        .bind(request.total_capacity)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(pool)
    }

    #[instrument(skip(self), err)]
    pub async fn get_by_id(&mut self, id: PoolId) -> Result<Option<CapacityPool>> {
        let pool = sqlx::query_as::<_, CapacityPool>(&format!("SELECT {POOL_COLUMNS} FROM capacity_pools WHERE id = $1"))
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(pool)
    }

    /// Fetch the pool row with an exclusive row lock, for allocation paths
    /// that need to read the slot sequence before mutating counters.
    #[instrument(skip(self), err)]
    pub async fn get_for_update(&mut self, id: PoolId) -> Result<Option<CapacityPool>> {
        let pool = sqlx::query_as::<_, CapacityPool>(&format!("SELECT {POOL_COLUMNS} FROM capacity_pools WHERE id = $1 FOR UPDATE"))
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(pool)
    }

    #[instrument(skip(self), err)]
    pub async fn list(&mut self) -> Result<Vec<CapacityPool>> {
        let pools = sqlx::query_as::<_, CapacityPool>(&format!("SELECT {POOL_COLUMNS} FROM capacity_pools ORDER BY name"))
            .fetch_all(&mut *self.db)
            .await?;

        Ok(pools)
    }

    /// Take one slot of free capacity as reserved. `bump_seq` advances the
    /// slot-label sequence when the label was synthesized from it.
    /// Returns false when the pool is full or not accepting allocations.
    #[instrument(skip(self), err)]
    pub async fn reserve_slot(&mut self, id: PoolId, bump_seq: bool) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE capacity_pools
             SET reserved_count = reserved_count + 1,
                 next_slot_seq = next_slot_seq + $2
             WHERE id = $1
               AND status = 'available'
               AND reserved_count + occupied_count + unavailable_count < total_capacity",
        )
        .bind(id)
        .bind(if bump_seq { 1i64 } else { 0i64 })
        .execute(&mut *self.db)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Attendant-assisted variant: the slot goes straight to occupied, no
    /// reserved phase.
    #[instrument(skip(self), err)]
    pub async fn occupy_slot(&mut self, id: PoolId, bump_seq: bool) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE capacity_pools
             SET occupied_count = occupied_count + 1,
                 next_slot_seq = next_slot_seq + $2
             WHERE id = $1
               AND status = 'available'
               AND reserved_count + occupied_count + unavailable_count < total_capacity",
        )
        .bind(id)
        .bind(if bump_seq { 1i64 } else { 0i64 })
        .execute(&mut *self.db)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Session start: transfer one reserved slot to occupied.
    #[instrument(skip(self), err)]
    pub async fn begin_session(&mut self, id: PoolId) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE capacity_pools
             SET reserved_count = reserved_count - 1,
                 occupied_count = occupied_count + 1
             WHERE id = $1 AND reserved_count > 0",
        )
        .bind(id)
        .execute(&mut *self.db)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Release a reserved slot (cancel, invalidation, or end-before-start).
    #[instrument(skip(self), err)]
    pub async fn release_reserved(&mut self, id: PoolId) -> Result<bool> {
        let result = sqlx::query("UPDATE capacity_pools SET reserved_count = reserved_count - 1 WHERE id = $1 AND reserved_count > 0")
            .bind(id)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Release an occupied slot at session end.
    #[instrument(skip(self), err)]
    pub async fn release_occupied(&mut self, id: PoolId) -> Result<bool> {
        let result = sqlx::query("UPDATE capacity_pools SET occupied_count = occupied_count - 1 WHERE id = $1 AND occupied_count > 0")
            .bind(id)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() == 1)
    }
}
