//! Allocation of discrete units and pooled capacity.
//!
//! Both allocation models follow the same contract: eligibility is checked
//! before any lock, the "is there room" decision is made by the atomicity of
//! a guarded write (never a check-then-act read), and the capacity mutation
//! commits together with the reservation row or not at all.

use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::PgConnection;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::db::models::pools::CapacityPool;
use crate::db::models::requesters::{RequesterCreateDBRequest, VehicleCreateDBRequest};
use crate::db::models::reservations::{Allocation, Reservation, ReservationCreateDBRequest, ReservationStatus};
use crate::db::{
    errors::DbError,
    handlers::{Balances, Pools, Requesters, Reservations, Units, Vehicles},
};
use crate::errors::{Error, Result};
use crate::events::Event;
use crate::types::{PoolId, RequesterId, ReservationId, UnitId, VehicleCategory, VehicleId};

use super::Engine;

/// What a successful allocation hands back to the caller. The session token
/// is the only thing embedded in the scannable code.
#[derive(Debug, Clone, Serialize)]
pub struct AllocationOutcome {
    pub reservation_id: ReservationId,
    pub session_token: Uuid,
}

/// Walk-up guest details captured by an attendant at the booth.
#[derive(Debug, Clone)]
pub struct GuestIntake {
    pub first_name: String,
    pub last_name: String,
    pub plate: String,
    pub category: VehicleCategory,
    /// Hours sold at the booth; becomes the guest's opening balance grant.
    pub granted_hours: Decimal,
}

/// Requester must have zero outstanding penalty hours and a positive
/// aggregate balance. Surfaced before any lock is taken.
async fn check_eligibility(conn: &mut PgConnection, requester_id: RequesterId) -> Result<()> {
    let mut balances = Balances::new(conn);

    let penalty = balances.outstanding_penalty(requester_id).await?;
    if penalty > Decimal::ZERO {
        return Err(Error::OutstandingPenalty { requester_id, hours: penalty });
    }

    let balance = balances.total_balance(requester_id).await?;
    if balance <= Decimal::ZERO {
        return Err(Error::InsufficientBalance { requester_id });
    }

    Ok(())
}

fn pool_accepting(pool: &CapacityPool) -> Result<()> {
    if !pool.accepts_allocations() || pool.available() <= 0 {
        return Err(Error::PoolFull { pool_id: pool.id });
    }
    Ok(())
}

impl Engine {
    /// Acquire an exclusive hold on a discrete unit.
    ///
    /// The guarded `available -> reserved` write is what decides whether the
    /// unit was free; a concurrent winner makes it affect zero rows and this
    /// call fails `UnitAlreadyBooked` with nothing committed.
    #[instrument(skip(self), err)]
    pub async fn allocate_unit(
        &self,
        requester_id: RequesterId,
        vehicle_id: VehicleId,
        unit_id: UnitId,
    ) -> Result<AllocationOutcome> {
        let mut tx = self.db.begin().await.map_err(DbError::from)?;

        check_eligibility(&mut tx, requester_id).await?;

        let vehicle = Vehicles::new(&mut tx)
            .get_by_id(vehicle_id)
            .await?
            .ok_or_else(|| Error::NotFound {
                resource: "Vehicle".to_string(),
                id: vehicle_id.to_string(),
            })?;

        let unit = Units::new(&mut tx).get_by_id(unit_id).await?.ok_or_else(|| Error::NotFound {
            resource: "Unit".to_string(),
            id: unit_id.to_string(),
        })?;

        if !vehicle.category.matches(unit.category) {
            return Err(Error::CategoryMismatch {
                vehicle: vehicle.category,
                spot: unit.category,
            });
        }

        if !Units::new(&mut tx).claim_for_reservation(unit_id).await? {
            return Err(Error::UnitAlreadyBooked { unit_id });
        }

        let reservation = create_reservation(
            &mut tx,
            ReservationCreateDBRequest {
                requester_id,
                vehicle_id,
                allocation: Allocation::Unit { unit_id },
                status: ReservationStatus::Reserved,
                session_token: Uuid::new_v4(),
                started_at: None,
            },
        )
        .await?;

        tx.commit().await.map_err(DbError::from)?;

        info!(reservation_id = %reservation.id, %unit_id, "unit allocated");
        self.cache.invalidate().await;
        self.publisher.publish(Event::ReservationCreated {
            reservation_id: reservation.id,
            requester_id,
        });

        Ok(AllocationOutcome {
            reservation_id: reservation.id,
            session_token: reservation.session_token,
        })
    }

    /// Take one slot of pooled capacity.
    ///
    /// The pool row is locked so label synthesis reads a stable sequence; the
    /// counter increment is still a guarded write and is what decides
    /// `PoolFull`. A caller-supplied label (human-assisted assignment) is
    /// checked against live reservations and fails `SlotAlreadyTaken`.
    #[instrument(skip(self), err)]
    pub async fn allocate_pool(
        &self,
        requester_id: RequesterId,
        vehicle_id: VehicleId,
        pool_id: PoolId,
        slot_label: Option<String>,
    ) -> Result<AllocationOutcome> {
        let mut tx = self.db.begin().await.map_err(DbError::from)?;

        check_eligibility(&mut tx, requester_id).await?;

        let vehicle = Vehicles::new(&mut tx)
            .get_by_id(vehicle_id)
            .await?
            .ok_or_else(|| Error::NotFound {
                resource: "Vehicle".to_string(),
                id: vehicle_id.to_string(),
            })?;

        let pool = Pools::new(&mut tx).get_for_update(pool_id).await?.ok_or_else(|| Error::NotFound {
            resource: "Pool".to_string(),
            id: pool_id.to_string(),
        })?;

        pool_accepting(&pool)?;

        if !vehicle.category.matches(pool.category) {
            return Err(Error::CategoryMismatch {
                vehicle: vehicle.category,
                spot: pool.category,
            });
        }

        let (slot_label, bump_seq) = resolve_slot_label(&mut tx, &pool, slot_label).await?;

        if !Pools::new(&mut tx).reserve_slot(pool_id, bump_seq).await? {
            return Err(Error::PoolFull { pool_id });
        }

        let reservation = create_reservation(
            &mut tx,
            ReservationCreateDBRequest {
                requester_id,
                vehicle_id,
                allocation: Allocation::Pool {
                    pool_id,
                    slot_label: slot_label.clone(),
                },
                status: ReservationStatus::Reserved,
                session_token: Uuid::new_v4(),
                started_at: None,
            },
        )
        .await?;

        tx.commit().await.map_err(DbError::from)?;

        info!(reservation_id = %reservation.id, %pool_id, %slot_label, "pool slot allocated");
        self.cache.invalidate().await;
        self.publisher.publish(Event::ReservationCreated {
            reservation_id: reservation.id,
            requester_id,
        });

        Ok(AllocationOutcome {
            reservation_id: reservation.id,
            session_token: reservation.session_token,
        })
    }

    /// Attendant-assisted walk-up allocation.
    ///
    /// Creates an ephemeral guest identity, sells the guest an opening
    /// balance grant, and puts the reservation directly into `active` (the
    /// attendant is physically present, so there is no session-start scan):
    /// the pool's occupied count is incremented instead of reserved, and
    /// `started_at` is set immediately. Same atomic-allocation contract,
    /// different policy.
    #[instrument(skip(self, intake), err)]
    pub async fn allocate_pool_attended(
        &self,
        attendant_id: Uuid,
        pool_id: PoolId,
        slot_label: Option<String>,
        intake: GuestIntake,
    ) -> Result<AllocationOutcome> {
        if intake.granted_hours <= Decimal::ZERO {
            return Err(Error::BadRequest {
                message: "granted_hours must be positive".to_string(),
            });
        }

        let mut tx = self.db.begin().await.map_err(DbError::from)?;

        let pool = Pools::new(&mut tx).get_for_update(pool_id).await?.ok_or_else(|| Error::NotFound {
            resource: "Pool".to_string(),
            id: pool_id.to_string(),
        })?;

        pool_accepting(&pool)?;

        if !intake.category.matches(pool.category) {
            return Err(Error::CategoryMismatch {
                vehicle: intake.category,
                spot: pool.category,
            });
        }

        let requester = Requesters::new(&mut tx)
            .create(&RequesterCreateDBRequest {
                first_name: intake.first_name,
                last_name: intake.last_name,
                is_guest: true,
            })
            .await?;

        let vehicle = Vehicles::new(&mut tx)
            .create(&VehicleCreateDBRequest {
                requester_id: requester.id,
                plate: intake.plate,
                category: intake.category,
            })
            .await?;

        Balances::new(&mut tx)
            .insert_grant(requester.id, intake.granted_hours, intake.granted_hours, Some(attendant_id))
            .await?;

        let (slot_label, bump_seq) = resolve_slot_label(&mut tx, &pool, slot_label).await?;

        if !Pools::new(&mut tx).occupy_slot(pool_id, bump_seq).await? {
            return Err(Error::PoolFull { pool_id });
        }

        let reservation = create_reservation(
            &mut tx,
            ReservationCreateDBRequest {
                requester_id: requester.id,
                vehicle_id: vehicle.id,
                allocation: Allocation::Pool {
                    pool_id,
                    slot_label: slot_label.clone(),
                },
                status: ReservationStatus::Active,
                session_token: Uuid::new_v4(),
                started_at: Some(chrono::Utc::now()),
            },
        )
        .await?;

        tx.commit().await.map_err(DbError::from)?;

        info!(
            reservation_id = %reservation.id,
            %pool_id,
            %slot_label,
            requester_id = %requester.id,
            "attended pool slot allocated"
        );
        self.cache.invalidate().await;
        self.publisher.publish(Event::ReservationCreated {
            reservation_id: reservation.id,
            requester_id: requester.id,
        });

        Ok(AllocationOutcome {
            reservation_id: reservation.id,
            session_token: reservation.session_token,
        })
    }
}

/// Pick the slot label: caller-supplied labels are checked for live
/// conflicts; otherwise one is synthesized from the pool's running sequence.
/// Labels are presentation identifiers only; the partial unique index on
/// (pool, label, live status) stays the authoritative exclusivity check.
async fn resolve_slot_label(
    conn: &mut PgConnection,
    pool: &CapacityPool,
    requested: Option<String>,
) -> Result<(String, bool)> {
    match requested {
        Some(label) => {
            if Reservations::new(conn).slot_is_taken(pool.id, &label).await? {
                return Err(Error::SlotAlreadyTaken {
                    pool_id: pool.id,
                    slot_label: label,
                });
            }
            Ok((label, false))
        }
        None => Ok((format!("{}-{}", pool.name, pool.next_slot_seq + 1), true)),
    }
}

/// Insert the reservation row, translating a race on the live-reservation
/// unique indexes into the matching contention error.
async fn create_reservation(conn: &mut PgConnection, request: ReservationCreateDBRequest) -> Result<Reservation> {
    Reservations::new(conn).create(&request).await.map_err(|e| {
        if e.is_live_reservation_conflict() {
            match &request.allocation {
                Allocation::Unit { unit_id } => Error::UnitAlreadyBooked { unit_id: *unit_id },
                Allocation::Pool { pool_id, slot_label } => Error::SlotAlreadyTaken {
                    pool_id: *pool_id,
                    slot_label: slot_label.clone(),
                },
            }
        } else {
            Error::from(e)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{
        create_test_engine, create_test_pool, create_test_requester, create_test_unit, create_test_vehicle, grant_test_hours,
        pool_counters, unit_status,
    };
    use sqlx::PgPool;

    #[sqlx::test]
    #[test_log::test]
    async fn test_simultaneous_unit_claims_have_one_winner(pool: PgPool) {
        let engine = create_test_engine(&pool);
        let unit = create_test_unit(&pool, VehicleCategory::Car).await;

        let first = create_test_requester(&pool).await;
        let first_vehicle = create_test_vehicle(&pool, first.id, VehicleCategory::Car).await;
        grant_test_hours(&pool, first.id, "5").await;

        let second = create_test_requester(&pool).await;
        let second_vehicle = create_test_vehicle(&pool, second.id, VehicleCategory::Car).await;
        grant_test_hours(&pool, second.id, "5").await;

        // Both requests race the same guarded available -> reserved write.
        let (a, b) = tokio::join!(
            engine.allocate_unit(first.id, first_vehicle.id, unit.id),
            engine.allocate_unit(second.id, second_vehicle.id, unit.id),
        );

        assert_eq!(a.is_ok() as u8 + b.is_ok() as u8, 1, "exactly one claim must win");
        let loser = if a.is_ok() { b } else { a };
        assert!(matches!(loser, Err(Error::UnitAlreadyBooked { .. })));

        // The unit is held exactly once.
        assert_eq!(unit_status(&pool, unit.id).await, "reserved");
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_simultaneous_pool_claims_never_oversubscribe(pool: PgPool) {
        let engine = create_test_engine(&pool);
        let capacity_pool = create_test_pool(&pool, VehicleCategory::Car, 1).await;

        let first = create_test_requester(&pool).await;
        let first_vehicle = create_test_vehicle(&pool, first.id, VehicleCategory::Car).await;
        grant_test_hours(&pool, first.id, "5").await;

        let second = create_test_requester(&pool).await;
        let second_vehicle = create_test_vehicle(&pool, second.id, VehicleCategory::Car).await;
        grant_test_hours(&pool, second.id, "5").await;

        let (a, b) = tokio::join!(
            engine.allocate_pool(first.id, first_vehicle.id, capacity_pool.id, None),
            engine.allocate_pool(second.id, second_vehicle.id, capacity_pool.id, None),
        );

        assert_eq!(a.is_ok() as u8 + b.is_ok() as u8, 1, "the last slot must go to exactly one");
        let loser = if a.is_ok() { b } else { a };
        assert!(matches!(loser, Err(Error::PoolFull { .. })));

        assert_eq!(pool_counters(&pool, capacity_pool.id).await, (1, 0, 0));
    }
}
