use crate::{
    api::models::capacity::{CapacityResponse, PoolCreate, PoolResponse, UnitCreate, UnitResponse},
    db::handlers::{Pools, Units},
    db::models::pools::PoolCreateDBRequest,
    db::models::units::UnitCreateDBRequest,
    errors::{Error, Result},
    types::VehicleCategory,
    AppState,
};
use axum::{extract::State, http::StatusCode, response::Json};

/// List current capacity
#[utoipa::path(
    get,
    path = "/capacity",
    tag = "capacity",
    summary = "List current capacity",
    description = "Units and pools with their availability. Served from a short-lived \
                   cache; allocation decisions never consult it.",
    responses(
        (status = 200, description = "Capacity listing", body = CapacityResponse),
        (status = 500, description = "Internal server error"),
    )
)]
pub async fn get_capacity(State(state): State<AppState>) -> Result<Json<CapacityResponse>> {
    let snapshot = state.cache.get_or_load(&state.db).await?;

    Ok(Json(CapacityResponse::from(snapshot.as_ref())))
}

/// Provision a parking unit
#[utoipa::path(
    post,
    path = "/units",
    tag = "capacity",
    summary = "Provision a parking unit",
    responses(
        (status = 201, description = "Unit created", body = UnitResponse),
        (status = 400, description = "Invalid category"),
        (status = 500, description = "Internal server error"),
    )
)]
pub async fn create_unit(State(state): State<AppState>, Json(data): Json<UnitCreate>) -> Result<(StatusCode, Json<UnitResponse>)> {
    let category: VehicleCategory = data.category.parse().map_err(|message| Error::BadRequest { message })?;

    let mut conn = state.db.acquire().await.map_err(crate::db::errors::DbError::from)?;
    let unit = Units::new(&mut conn)
        .create(&UnitCreateDBRequest {
            pool_id: data.pool_id,
            label: data.label,
            category,
        })
        .await?;

    state.cache.invalidate().await;

    Ok((StatusCode::CREATED, Json(UnitResponse::from(unit))))
}

/// Provision a capacity pool
#[utoipa::path(
    post,
    path = "/pools",
    tag = "capacity",
    summary = "Provision a capacity pool",
    responses(
        (status = 201, description = "Pool created", body = PoolResponse),
        (status = 400, description = "Invalid category or capacity"),
        (status = 500, description = "Internal server error"),
    )
)]
pub async fn create_pool(State(state): State<AppState>, Json(data): Json<PoolCreate>) -> Result<(StatusCode, Json<PoolResponse>)> {
    let category: VehicleCategory = data.category.parse().map_err(|message| Error::BadRequest { message })?;
    if data.total_capacity <= 0 {
        return Err(Error::BadRequest {
            message: "total_capacity must be positive".into(),
        });
    }

    let mut conn = state.db.acquire().await.map_err(crate::db::errors::DbError::from)?;
    let pool = Pools::new(&mut conn)
        .create(&PoolCreateDBRequest {
            name: data.name,
            category,
            total_capacity: data.total_capacity,
        })
        .await?;

    state.cache.invalidate().await;

    Ok((StatusCode::CREATED, Json(PoolResponse::from(pool))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{create_test_app, create_test_requester, create_test_vehicle, grant_test_hours};
    use serde_json::json;
    use sqlx::PgPool;

    #[sqlx::test]
    #[test_log::test]
    async fn test_provision_and_list(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;

        let response = app
            .post("/api/v1/pools")
            .json(&json!({"name": "north-lot", "category": "car", "total_capacity": 12}))
            .await;
        response.assert_status(StatusCode::CREATED);
        let created_pool: PoolResponse = response.json();
        assert_eq!(created_pool.available, 12);

        let response = app
            .post("/api/v1/units")
            .json(&json!({"label": "EV-1", "category": "car", "pool_id": created_pool.id}))
            .await;
        response.assert_status(StatusCode::CREATED);

        let response = app.get("/api/v1/capacity").await;
        response.assert_status_ok();
        let capacity: CapacityResponse = response.json();
        assert_eq!(capacity.pools.len(), 1);
        assert_eq!(capacity.units.len(), 1);
        assert_eq!(capacity.units[0].label, "EV-1");
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_category_synonyms_accepted(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;

        let response = app
            .post("/api/v1/units")
            .json(&json!({"label": "B-1", "category": "ebike"}))
            .await;
        response.assert_status(StatusCode::CREATED);
        let unit: UnitResponse = response.json();
        assert_eq!(unit.category, VehicleCategory::Bicycle);

        let response = app
            .post("/api/v1/units")
            .json(&json!({"label": "B-2", "category": "hovercraft"}))
            .await;
        response.assert_status_bad_request();
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_zero_capacity_pool_rejected(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;

        let response = app
            .post("/api/v1/pools")
            .json(&json!({"name": "empty", "category": "car", "total_capacity": 0}))
            .await;
        response.assert_status_bad_request();
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_listing_reflects_allocations(pool: PgPool) {
        // Engine and server share a state so the allocation invalidates the
        // cache the listing endpoint reads from.
        let state = crate::test_utils::create_test_state(pool.clone());
        let engine = state.engine();
        let app = crate::test_utils::create_test_app_with_state(state).await;

        let capacity_pool = crate::test_utils::create_test_pool(&pool, crate::types::VehicleCategory::Car, 3).await;
        let requester = create_test_requester(&pool).await;
        let vehicle = create_test_vehicle(&pool, requester.id, crate::types::VehicleCategory::Car).await;
        grant_test_hours(&pool, requester.id, "5").await;

        // Warm the cache, then allocate; the mutation must invalidate it.
        app.get("/api/v1/capacity").await.assert_status_ok();
        engine
            .allocate_pool(requester.id, vehicle.id, capacity_pool.id, None)
            .await
            .unwrap();

        let capacity: CapacityResponse = app.get("/api/v1/capacity").await.json();
        assert_eq!(capacity.pools[0].reserved_count, 1);
        assert_eq!(capacity.pools[0].available, 2);
    }
}
