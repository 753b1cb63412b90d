//! Repositories for requesters and their vehicles.

use sqlx::PgConnection;
use tracing::instrument;

use crate::db::errors::Result;
use crate::db::models::requesters::{Requester, RequesterCreateDBRequest, Vehicle, VehicleCreateDBRequest};
use crate::types::{RequesterId, VehicleId};

pub struct Requesters<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Requesters<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self, request), err)]
    pub async fn create(&mut self, request: &RequesterCreateDBRequest) -> Result<Requester> {
        let requester = sqlx::query_as::<_, Requester>(
            "INSERT INTO requesters (first_name, last_name, is_guest)
             VALUES ($1, $2, $3)
             RETURNING id, first_name, last_name, is_guest, created_at",
        )
        .bind(&request.first_name)
        .bind(&request.last_name)
        .bind(request.is_guest)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(requester)
    }

    #[instrument(skip(self), err)]
    pub async fn get_by_id(&mut self, id: RequesterId) -> Result<Option<Requester>> {
        let requester = sqlx::query_as::<_, Requester>(
            "SELECT id, first_name, last_name, is_guest, created_at FROM requesters WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&mut *self.db)
        .await?;

        Ok(requester)
    }
}

pub struct Vehicles<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Vehicles<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self, request), err)]
    pub async fn create(&mut self, request: &VehicleCreateDBRequest) -> Result<Vehicle> {
        let vehicle = sqlx::query_as::<_, Vehicle>(
            "INSERT INTO vehicles (requester_id, plate, category)
             VALUES ($1, $2, $3)
             RETURNING id, requester_id, plate, category, created_at",
        )
        .bind(request.requester_id)
        .bind(&request.plate)
        .bind(request.category)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(vehicle)
    }

    #[instrument(skip(self), err)]
    pub async fn get_by_id(&mut self, id: VehicleId) -> Result<Option<Vehicle>> {
        let vehicle = sqlx::query_as::<_, Vehicle>(
            "SELECT id, requester_id, plate, category, created_at FROM vehicles WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&mut *self.db)
        .await?;

        Ok(vehicle)
    }
}
