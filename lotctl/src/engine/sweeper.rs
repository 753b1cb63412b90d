//! Grace-period sweeper.
//!
//! Periodically invalidates reservations stuck in `reserved` that never
//! started within the grace period, releasing their capacity. Each
//! reservation is swept in its own transaction; the guarded transition makes
//! the sweep idempotent and safe to run concurrently with itself or with a
//! late session start on the same reservation.

use std::time::Duration;

use chrono::Utc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::db::errors::DbError;
use crate::db::handlers::Reservations;
use crate::errors::{Error, Result};

use super::Engine;

/// Per-run outcome counters. One reservation's conflict or error never
/// fails the rest of the batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepStats {
    pub swept: usize,
    pub conflicted: usize,
    pub errored: usize,
}

pub struct GraceSweeper {
    engine: Engine,
    interval: Duration,
    grace_period: Duration,
}

impl GraceSweeper {
    pub fn new(engine: Engine, interval: Duration, grace_period: Duration) -> Self {
        Self {
            engine,
            interval,
            grace_period,
        }
    }

    /// Run until the token is cancelled. Missed ticks are skipped, not
    /// replayed: a slow sweep never causes a burst of catch-up sweeps.
    pub async fn run(self, shutdown: CancellationToken) {
        info!(interval = ?self.interval, grace_period = ?self.grace_period, "grace sweeper started");

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("grace sweeper shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    if let Err(error) = self.sweep_once().await {
                        error!(%error, "sweep run failed");
                    }
                }
            }
        }
    }

    /// One sweep pass. Lists the stale reservations, then invalidates each
    /// independently; a conflict means someone (a late scan, a cancel, or a
    /// concurrent sweep) won the race, which is the expected outcome.
    #[instrument(skip(self))]
    pub async fn sweep_once(&self) -> Result<SweepStats> {
        let cutoff = Utc::now()
            - chrono::Duration::from_std(self.grace_period)
                .map_err(|e| anyhow::anyhow!("grace period out of range: {e}"))?;

        let stale = {
            let mut conn = self.engine.db.acquire().await.map_err(DbError::from)?;
            Reservations::new(&mut conn).list_expired_reserved(cutoff).await?
        };

        let mut stats = SweepStats::default();
        for reservation_id in stale {
            match self.engine.invalidate_reservation(reservation_id).await {
                Ok(()) => {
                    info!(%reservation_id, "stale reservation invalidated");
                    stats.swept += 1;
                }
                Err(Error::ReservationStateConflict { .. }) => {
                    debug!(%reservation_id, "reservation moved on before sweep; skipped");
                    stats.conflicted += 1;
                }
                Err(error) => {
                    warn!(%reservation_id, %error, "failed to invalidate stale reservation");
                    stats.errored += 1;
                }
            }
        }

        if stats != SweepStats::default() {
            info!(swept = stats.swept, conflicted = stats.conflicted, errored = stats.errored, "sweep complete");
        }

        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{
        create_test_engine, create_test_pool, create_test_requester, create_test_unit, create_test_vehicle, grant_test_hours,
        pool_counters, unit_status,
    };
    use crate::types::{ReservationId, VehicleCategory};
    use sqlx::PgPool;

    fn sweeper_for(pool: &PgPool) -> GraceSweeper {
        GraceSweeper::new(
            create_test_engine(pool),
            Duration::from_secs(60),
            Duration::from_secs(15 * 60),
        )
    }

    async fn backdate(pool: &PgPool, reservation_id: ReservationId, minutes: i32) {
        sqlx::query("UPDATE reservations SET created_at = now() - make_interval(mins => $2) WHERE id = $1")
            .bind(reservation_id)
            .bind(minutes)
            .execute(pool)
            .await
            .unwrap();
    }

    async fn reservation_status(pool: &PgPool, reservation_id: ReservationId) -> String {
        sqlx::query_scalar("SELECT status FROM reservations WHERE id = $1")
            .bind(reservation_id)
            .fetch_one(pool)
            .await
            .unwrap()
    }

    async fn waiting_ended_at(pool: &PgPool, reservation_id: ReservationId) -> Option<chrono::DateTime<Utc>> {
        sqlx::query_scalar("SELECT waiting_ended_at FROM reservations WHERE id = $1")
            .bind(reservation_id)
            .fetch_one(pool)
            .await
            .unwrap()
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_sweep_invalidates_stale_and_releases_capacity(pool: PgPool) {
        let engine = create_test_engine(&pool);
        let sweeper = sweeper_for(&pool);

        let requester = create_test_requester(&pool).await;
        let vehicle = create_test_vehicle(&pool, requester.id, VehicleCategory::Car).await;
        let unit = create_test_unit(&pool, VehicleCategory::Car).await;
        grant_test_hours(&pool, requester.id, "5").await;

        let allocation = engine.allocate_unit(requester.id, vehicle.id, unit.id).await.unwrap();
        backdate(&pool, allocation.reservation_id, 30).await;

        let stats = sweeper.sweep_once().await.unwrap();
        assert_eq!(stats.swept, 1);
        assert_eq!(stats.conflicted, 0);
        assert_eq!(stats.errored, 0);

        assert_eq!(reservation_status(&pool, allocation.reservation_id).await, "invalid");
        assert_eq!(unit_status(&pool, unit.id).await, "available");

        // Second pass finds nothing: the sweep is idempotent.
        let stats = sweeper.sweep_once().await.unwrap();
        assert_eq!(stats, SweepStats::default());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_sweep_leaves_fresh_reservations_alone(pool: PgPool) {
        let engine = create_test_engine(&pool);
        let sweeper = sweeper_for(&pool);

        let requester = create_test_requester(&pool).await;
        let vehicle = create_test_vehicle(&pool, requester.id, VehicleCategory::Car).await;
        let unit = create_test_unit(&pool, VehicleCategory::Car).await;
        grant_test_hours(&pool, requester.id, "5").await;

        engine.allocate_unit(requester.id, vehicle.id, unit.id).await.unwrap();

        let stats = sweeper.sweep_once().await.unwrap();
        assert_eq!(stats, SweepStats::default());
        assert_eq!(unit_status(&pool, unit.id).await, "reserved");
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_sweep_skips_started_sessions(pool: PgPool) {
        let engine = create_test_engine(&pool);
        let sweeper = sweeper_for(&pool);

        let capacity_pool = create_test_pool(&pool, VehicleCategory::Car, 2).await;
        let requester = create_test_requester(&pool).await;
        let vehicle = create_test_vehicle(&pool, requester.id, VehicleCategory::Car).await;
        grant_test_hours(&pool, requester.id, "5").await;

        let allocation = engine
            .allocate_pool(requester.id, vehicle.id, capacity_pool.id, None)
            .await
            .unwrap();
        engine.start_session(allocation.session_token, None).await.unwrap();
        backdate(&pool, allocation.reservation_id, 30).await;

        // Active reservations are out of the sweeper's scope entirely.
        let stats = sweeper.sweep_once().await.unwrap();
        assert_eq!(stats, SweepStats::default());
        assert_eq!(reservation_status(&pool, allocation.reservation_id).await, "active");
        assert_eq!(pool_counters(&pool, capacity_pool.id).await, (0, 1, 0));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_invalidated_token_cannot_start(pool: PgPool) {
        let engine = create_test_engine(&pool);
        let sweeper = sweeper_for(&pool);

        let requester = create_test_requester(&pool).await;
        let vehicle = create_test_vehicle(&pool, requester.id, VehicleCategory::Car).await;
        let unit = create_test_unit(&pool, VehicleCategory::Car).await;
        grant_test_hours(&pool, requester.id, "5").await;

        let allocation = engine.allocate_unit(requester.id, vehicle.id, unit.id).await.unwrap();
        backdate(&pool, allocation.reservation_id, 30).await;
        sweeper.sweep_once().await.unwrap();

        let result = engine.start_session(allocation.session_token, None).await;
        assert!(matches!(result, Err(crate::errors::Error::TokenNotFound)));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_grace_deadline_marked_only_on_invalidation(pool: PgPool) {
        let engine = create_test_engine(&pool);
        let sweeper = sweeper_for(&pool);

        let requester = create_test_requester(&pool).await;
        let vehicle = create_test_vehicle(&pool, requester.id, VehicleCategory::Car).await;
        grant_test_hours(&pool, requester.id, "5").await;

        let cancelled_unit = create_test_unit(&pool, VehicleCategory::Car).await;
        let swept_unit = create_test_unit(&pool, VehicleCategory::Car).await;

        let cancelled = engine.allocate_unit(requester.id, vehicle.id, cancelled_unit.id).await.unwrap();
        engine.cancel_reservation(cancelled.reservation_id, requester.id).await.unwrap();

        let swept = engine.allocate_unit(requester.id, vehicle.id, swept_unit.id).await.unwrap();
        backdate(&pool, swept.reservation_id, 30).await;
        sweeper.sweep_once().await.unwrap();

        // Only the expired grace deadline stamps the marker.
        assert!(waiting_ended_at(&pool, cancelled.reservation_id).await.is_none());
        assert!(waiting_ended_at(&pool, swept.reservation_id).await.is_some());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_direct_invalidate_conflicts_after_sweep(pool: PgPool) {
        let engine = create_test_engine(&pool);
        let sweeper = sweeper_for(&pool);

        let requester = create_test_requester(&pool).await;
        let vehicle = create_test_vehicle(&pool, requester.id, VehicleCategory::Car).await;
        let unit = create_test_unit(&pool, VehicleCategory::Car).await;
        grant_test_hours(&pool, requester.id, "5").await;

        let allocation = engine.allocate_unit(requester.id, vehicle.id, unit.id).await.unwrap();
        backdate(&pool, allocation.reservation_id, 30).await;
        sweeper.sweep_once().await.unwrap();

        let result = engine.invalidate_reservation(allocation.reservation_id).await;
        assert!(matches!(
            result,
            Err(crate::errors::Error::ReservationStateConflict { .. })
        ));
        // Capacity was released exactly once.
        assert_eq!(unit_status(&pool, unit.id).await, "available");
    }
}
