//! Repository for discrete parking units.

use sqlx::PgConnection;
use tracing::instrument;

use crate::db::errors::Result;
use crate::db::models::units::{ParkingUnit, UnitCreateDBRequest, UnitStatus};
use crate::types::UnitId;

pub struct Units<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Units<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self, request), err)]
    pub async fn create(&mut self, request: &UnitCreateDBRequest) -> Result<ParkingUnit> {
        let unit = sqlx::query_as::<_, ParkingUnit>(
            "INSERT INTO parking_units (pool_id, label, category)
             VALUES ($1, $2, $3)
             RETURNING id, pool_id, label, category, status, created_at",
        )
        .bind(request.pool_id)
        .bind(&request.label)
        .bind(request.category)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(unit)
    }

    #[instrument(skip(self), err)]
    pub async fn get_by_id(&mut self, id: UnitId) -> Result<Option<ParkingUnit>> {
        let unit = sqlx::query_as::<_, ParkingUnit>(
            "SELECT id, pool_id, label, category, status, created_at FROM parking_units WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&mut *self.db)
        .await?;

        Ok(unit)
    }

    #[instrument(skip(self), err)]
    pub async fn list(&mut self) -> Result<Vec<ParkingUnit>> {
        let units = sqlx::query_as::<_, ParkingUnit>(
            "SELECT id, pool_id, label, category, status, created_at FROM parking_units ORDER BY label",
        )
        .fetch_all(&mut *self.db)
        .await?;

        Ok(units)
    }

    /// Guarded status transition. Returns false when the unit was not in the
    /// expected state - the write, not any earlier read, is what decides.
    #[instrument(skip(self), err)]
    pub async fn transition(&mut self, id: UnitId, from: UnitStatus, to: UnitStatus) -> Result<bool> {
        let result = sqlx::query("UPDATE parking_units SET status = $3 WHERE id = $1 AND status = $2")
            .bind(id)
            .bind(from)
            .bind(to)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Claim an available unit for a new reservation (available -> reserved).
    #[instrument(skip(self), err)]
    pub async fn claim_for_reservation(&mut self, id: UnitId) -> Result<bool> {
        self.transition(id, UnitStatus::Available, UnitStatus::Reserved).await
    }
}
