//! Repository for reservation rows and their guarded status transitions.

use chrono::{DateTime, Utc};
use sqlx::PgConnection;
use tracing::instrument;
use uuid::Uuid;

use crate::db::errors::Result;
use crate::db::models::reservations::{
    Allocation, Reservation, ReservationCreateDBRequest, ReservationRow, ReservationStatus,
};
use crate::types::ReservationId;

const RESERVATION_COLUMNS: &str = "id, requester_id, vehicle_id, unit_id, pool_id, slot_label, status, session_token, \
                                   created_at, started_at, ended_at, waiting_ended_at";

/// Timestamps written alongside a status transition. `started_at` uses
/// COALESCE so the end-before-start backfill never overwrites a real start.
/// `waiting_ended_at` marks an expired grace deadline and is only written by
/// the invalidation path.
#[derive(Debug, Clone, Copy, Default)]
pub struct TransitionStamps {
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub waiting_ended_at: Option<DateTime<Utc>>,
}

pub struct Reservations<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Reservations<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self, request), err)]
    pub async fn create(&mut self, request: &ReservationCreateDBRequest) -> Result<Reservation> {
        let (unit_id, pool_id, slot_label) = match &request.allocation {
            Allocation::Unit { unit_id } => (Some(*unit_id), None, None),
            Allocation::Pool { pool_id, slot_label } => (None, Some(*pool_id), Some(slot_label.clone())),
        };

        let row = sqlx::query_as::<_, ReservationRow>(&format!(
            "INSERT INTO reservations (requester_id, vehicle_id, unit_id, pool_id, slot_label, status, session_token, started_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             RETURNING {RESERVATION_COLUMNS}"
        ))
        .bind(request.requester_id)
        .bind(request.vehicle_id)
        .bind(unit_id)
        .bind(pool_id)
        .bind(slot_label)
        .bind(request.status)
        .bind(request.session_token)
        .bind(request.started_at)
        .fetch_one(&mut *self.db)
        .await?;

        Reservation::try_from(row).map_err(Into::into)
    }

    #[instrument(skip(self), err)]
    pub async fn get_by_id(&mut self, id: ReservationId) -> Result<Option<Reservation>> {
        let row = sqlx::query_as::<_, ReservationRow>(&format!("SELECT {RESERVATION_COLUMNS} FROM reservations WHERE id = $1"))
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        row.map(Reservation::try_from).transpose()
    }

    /// Fetch with an exclusive row lock, restricted to the given statuses.
    /// The status filter makes replayed tokens and double transitions look
    /// identical to unknown ids, which is intentional.
    #[instrument(skip(self), err)]
    pub async fn get_for_update(&mut self, id: ReservationId, statuses: &[ReservationStatus]) -> Result<Option<Reservation>> {
        let statuses: Vec<&str> = statuses.iter().map(|s| s.as_str()).collect();
        let row = sqlx::query_as::<_, ReservationRow>(&format!(
            "SELECT {RESERVATION_COLUMNS} FROM reservations WHERE id = $1 AND status = ANY($2) FOR UPDATE"
        ))
        .bind(id)
        .bind(&statuses)
        .fetch_optional(&mut *self.db)
        .await?;

        row.map(Reservation::try_from).transpose()
    }

    /// Resolve an opaque session token, restricted to the given statuses,
    /// with an exclusive row lock.
    #[instrument(skip(self, token), err)]
    pub async fn get_by_token_for_update(&mut self, token: Uuid, statuses: &[ReservationStatus]) -> Result<Option<Reservation>> {
        let statuses: Vec<&str> = statuses.iter().map(|s| s.as_str()).collect();
        let row = sqlx::query_as::<_, ReservationRow>(&format!(
            "SELECT {RESERVATION_COLUMNS} FROM reservations WHERE session_token = $1 AND status = ANY($2) FOR UPDATE"
        ))
        .bind(token)
        .bind(&statuses)
        .fetch_optional(&mut *self.db)
        .await?;

        row.map(Reservation::try_from).transpose()
    }

    /// Guarded status transition. Returns false when the row was no longer in
    /// `from` - exactly one of N concurrent attempts can see true.
    #[instrument(skip(self, stamps), err)]
    pub async fn transition(
        &mut self,
        id: ReservationId,
        from: ReservationStatus,
        to: ReservationStatus,
        stamps: TransitionStamps,
    ) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE reservations
             SET status = $3,
                 started_at = COALESCE(started_at, $4),
                 ended_at = COALESCE(ended_at, $5),
                 waiting_ended_at = COALESCE(waiting_ended_at, $6)
             WHERE id = $1 AND status = $2",
        )
        .bind(id)
        .bind(from)
        .bind(to)
        .bind(stamps.started_at)
        .bind(stamps.ended_at)
        .bind(stamps.waiting_ended_at)
        .execute(&mut *self.db)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Reservations still in `reserved` with no session start, created at or
    /// before the cutoff. The sweeper's work queue.
    #[instrument(skip(self), err)]
    pub async fn list_expired_reserved(&mut self, cutoff: DateTime<Utc>) -> Result<Vec<ReservationId>> {
        let ids = sqlx::query_scalar::<_, ReservationId>(
            "SELECT id FROM reservations
             WHERE status = 'reserved' AND started_at IS NULL AND created_at <= $1
             ORDER BY created_at",
        )
        .bind(cutoff)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(ids)
    }

    /// Whether a live (reserved or active) reservation already holds the
    /// given (pool, slot label) pair.
    #[instrument(skip(self), err)]
    pub async fn slot_is_taken(&mut self, pool_id: Uuid, slot_label: &str) -> Result<bool> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM reservations
             WHERE pool_id = $1 AND slot_label = $2 AND status IN ('reserved', 'active')",
        )
        .bind(pool_id)
        .bind(slot_label)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(count > 0)
    }
}
