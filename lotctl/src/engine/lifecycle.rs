//! The reservation state machine.
//!
//! States: `reserved -> active -> completed`; `reserved -> cancelled`;
//! `reserved -> invalid` (sweeper only). Every transition is one guarded
//! reservation update plus its capacity effect, inside one transaction.
//! When the guarded update affects zero rows someone else already moved the
//! reservation: the caller gets `ReservationStateConflict` and no capacity
//! was mutated. For a single unit or (pool, slot) pair this makes concurrent
//! attempts at the same transition produce exactly one winner.

use chrono::Utc;
use sqlx::PgConnection;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::db::errors::DbError;
use crate::db::handlers::reservations::TransitionStamps;
use crate::db::handlers::{Pools, Reservations, ScanEvents, Units};
use crate::db::models::reservations::{Allocation, Reservation, ReservationStatus};
use crate::db::models::scan_events::ScanEvent;
use crate::db::models::units::UnitStatus;
use crate::errors::{Error, Result};
use crate::events::Event;
use crate::types::ReservationId;

use super::Engine;

/// Apply one transition: the guarded reservation update, then the matching
/// capacity mutation. Runs inside the caller's transaction.
///
/// A failed capacity mutation after a successful reservation update means
/// the counters and the reservation table disagree; that is an integrity
/// fault, surfaced as an internal error so the whole transaction rolls back.
pub(crate) async fn apply_transition(
    conn: &mut PgConnection,
    reservation: &Reservation,
    to: ReservationStatus,
    stamps: TransitionStamps,
) -> Result<()> {
    let from = reservation.status;

    let moved = Reservations::new(conn).transition(reservation.id, from, to, stamps).await?;
    if !moved {
        return Err(Error::ReservationStateConflict {
            reservation_id: reservation.id,
        });
    }

    let released = match (from, to, &reservation.allocation) {
        // Session start: the hold converts from reserved to occupied.
        (ReservationStatus::Reserved, ReservationStatus::Active, Allocation::Unit { unit_id }) => {
            Units::new(conn).transition(*unit_id, UnitStatus::Reserved, UnitStatus::Occupied).await?
        }
        (ReservationStatus::Reserved, ReservationStatus::Active, Allocation::Pool { pool_id, .. }) => {
            Pools::new(conn).begin_session(*pool_id).await?
        }

        // Leaving `reserved` for a terminal state releases the reserved hold.
        // This covers cancel, invalidation, and the end-before-start
        // completion (where started_at is backfilled before billing).
        (ReservationStatus::Reserved, _, Allocation::Unit { unit_id }) => {
            Units::new(conn).transition(*unit_id, UnitStatus::Reserved, UnitStatus::Available).await?
        }
        (ReservationStatus::Reserved, _, Allocation::Pool { pool_id, .. }) => {
            Pools::new(conn).release_reserved(*pool_id).await?
        }

        // Session end from active releases the occupied hold.
        (ReservationStatus::Active, ReservationStatus::Completed, Allocation::Unit { unit_id }) => {
            Units::new(conn).transition(*unit_id, UnitStatus::Occupied, UnitStatus::Available).await?
        }
        (ReservationStatus::Active, ReservationStatus::Completed, Allocation::Pool { pool_id, .. }) => {
            Pools::new(conn).release_occupied(*pool_id).await?
        }

        (from, to, _) => {
            return Err(anyhow::anyhow!(
                "unsupported transition {from:?} -> {to:?} for reservation {}",
                reservation.id
            )
            .into());
        }
    };

    if !released {
        return Err(anyhow::anyhow!(
            "capacity state out of sync with reservation {} during {from:?} -> {to:?}",
            reservation.id
        )
        .into());
    }

    Ok(())
}

/// Re-read the reservation after a transition so callers return fresh state.
pub(crate) async fn reload(conn: &mut PgConnection, id: ReservationId) -> Result<Reservation> {
    Reservations::new(conn)
        .get_by_id(id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("reservation {id} vanished mid-transaction").into())
}

/// A reservation read back with its scan audit trail.
#[derive(Debug, Clone)]
pub struct ReservationDetail {
    pub reservation: Reservation,
    pub scan_history: Vec<ScanEvent>,
}

impl Engine {
    #[instrument(skip(self), err)]
    pub async fn get_reservation(&self, id: ReservationId) -> Result<ReservationDetail> {
        let mut conn = self.db.acquire().await.map_err(DbError::from)?;

        let reservation = Reservations::new(&mut conn).get_by_id(id).await?.ok_or_else(|| Error::NotFound {
            resource: "Reservation".to_string(),
            id: id.to_string(),
        })?;
        let scan_history = ScanEvents::new(&mut conn).list_for_reservation(id).await?;

        Ok(ReservationDetail { reservation, scan_history })
    }

    /// Cancel a reservation that has not started. Only `reserved`
    /// reservations can be cancelled; anything else is a state conflict.
    #[instrument(skip(self), err)]
    pub async fn cancel_reservation(&self, id: ReservationId, actor_id: Uuid) -> Result<Reservation> {
        let mut tx = self.db.begin().await.map_err(DbError::from)?;

        let reservation = match Reservations::new(&mut tx).get_for_update(id, &[ReservationStatus::Reserved]).await? {
            Some(reservation) => reservation,
            None => {
                // Distinguish "gone" from "already moved on".
                return match Reservations::new(&mut tx).get_by_id(id).await? {
                    Some(_) => Err(Error::ReservationStateConflict { reservation_id: id }),
                    None => Err(Error::NotFound {
                        resource: "Reservation".to_string(),
                        id: id.to_string(),
                    }),
                };
            }
        };

        let now = Utc::now();
        apply_transition(
            &mut tx,
            &reservation,
            ReservationStatus::Cancelled,
            TransitionStamps {
                started_at: None,
                ended_at: Some(now),
                waiting_ended_at: None,
            },
        )
        .await?;

        let updated = reload(&mut tx, id).await?;
        tx.commit().await.map_err(DbError::from)?;

        info!(reservation_id = %id, %actor_id, "reservation cancelled");
        self.cache.invalidate().await;
        self.publisher.publish(Event::ReservationCancelled { reservation_id: id });

        Ok(updated)
    }

    /// Sweep one expired reservation: `reserved -> invalid`, releasing its
    /// hold. The grace deadline becomes the effective end for audit purposes.
    #[instrument(skip(self), err)]
    pub(crate) async fn invalidate_reservation(&self, id: ReservationId) -> Result<()> {
        let mut tx = self.db.begin().await.map_err(DbError::from)?;

        let reservation = Reservations::new(&mut tx)
            .get_for_update(id, &[ReservationStatus::Reserved])
            .await?
            .ok_or(Error::ReservationStateConflict { reservation_id: id })?;

        // A session started between the sweep listing and this lock; the
        // reservation is no longer stale.
        if reservation.started_at.is_some() {
            return Err(Error::ReservationStateConflict { reservation_id: id });
        }

        let now = Utc::now();
        apply_transition(
            &mut tx,
            &reservation,
            ReservationStatus::Invalid,
            TransitionStamps {
                started_at: None,
                ended_at: Some(now),
                waiting_ended_at: Some(now),
            },
        )
        .await?;

        tx.commit().await.map_err(DbError::from)?;

        self.cache.invalidate().await;
        self.publisher.publish(Event::ReservationInvalidated { reservation_id: id });

        Ok(())
    }
}
