//! Read cache for the capacity listing.
//!
//! The cached snapshot is a hint only. Database rows stay authoritative for
//! every allocation decision; the cache backs the read-side availability
//! listing and is invalidated on every mutating transition.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use serde::Serialize;
use sqlx::PgPool;

use crate::db::handlers::{Pools, Units};
use crate::db::models::pools::CapacityPool;
use crate::db::models::units::ParkingUnit;
use crate::errors::Result;

/// Point-in-time view of all units and pools.
#[derive(Debug, Clone, Serialize)]
pub struct CapacitySnapshot {
    pub units: Vec<ParkingUnit>,
    pub pools: Vec<CapacityPool>,
}

#[derive(Clone)]
pub struct CapacityCache {
    inner: Cache<(), Arc<CapacitySnapshot>>,
}

impl CapacityCache {
    pub fn new(ttl: Duration) -> Self {
        let inner = Cache::builder().max_capacity(1).time_to_live(ttl).build();
        Self { inner }
    }

    /// Cached snapshot, loading from the database on a miss. A race between
    /// two loaders just does one redundant read.
    pub async fn get_or_load(&self, db: &PgPool) -> Result<Arc<CapacitySnapshot>> {
        if let Some(snapshot) = self.inner.get(&()).await {
            return Ok(snapshot);
        }

        let snapshot = Arc::new(Self::load(db).await?);
        self.inner.insert((), Arc::clone(&snapshot)).await;
        Ok(snapshot)
    }

    /// Drop the snapshot. Called after every committed capacity mutation.
    pub async fn invalidate(&self) {
        self.inner.invalidate(&()).await;
    }

    async fn load(db: &PgPool) -> Result<CapacitySnapshot> {
        let mut conn = db.acquire().await.map_err(crate::db::errors::DbError::from)?;
        let units = Units::new(&mut conn).list().await?;
        let pools = Pools::new(&mut conn).list().await?;
        Ok(CapacitySnapshot { units, pools })
    }
}

impl std::fmt::Debug for CapacityCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapacityCache").finish_non_exhaustive()
    }
}
