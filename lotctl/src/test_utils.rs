//! Test utilities: fixture constructors and a test server over a real pool.

use axum_test::TestServer;
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::db::handlers::{Balances, Pools, Requesters, Units, Vehicles};
use crate::db::models::pools::{CapacityPool, PoolCreateDBRequest};
use crate::db::models::requesters::{Requester, RequesterCreateDBRequest, Vehicle, VehicleCreateDBRequest};
use crate::db::models::units::{ParkingUnit, UnitCreateDBRequest};
use crate::engine::Engine;
use crate::types::{PoolId, RequesterId, UnitId, VehicleCategory};
use crate::{AppState, Config, build_router};

pub fn create_test_config() -> Config {
    Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        ..Default::default()
    }
}

pub fn create_test_state(pool: PgPool) -> AppState {
    AppState::builder()
        .db(pool)
        .config(create_test_config())
        .publisher(crate::events::Publisher::default())
        .cache(crate::cache::CapacityCache::new(std::time::Duration::from_secs(60)))
        .build()
}

pub async fn create_test_app_with_state(state: AppState) -> TestServer {
    let router = build_router(state).expect("Failed to build router");
    TestServer::new(router.into_make_service()).expect("Failed to create test server")
}

pub async fn create_test_app(pool: PgPool) -> TestServer {
    create_test_app_with_state(create_test_state(pool)).await
}

/// Engine handle with its own publisher and cache. For tests that assert on
/// the HTTP cache, build the engine from the server's state instead.
pub fn create_test_engine(pool: &PgPool) -> Engine {
    create_test_state(pool.clone()).engine()
}

pub async fn create_test_requester(pool: &PgPool) -> Requester {
    let mut conn = pool.acquire().await.unwrap();
    Requesters::new(&mut conn)
        .create(&RequesterCreateDBRequest {
            first_name: "Test".to_string(),
            last_name: format!("Requester-{}", &Uuid::new_v4().to_string()[..8]),
            is_guest: false,
        })
        .await
        .unwrap()
}

pub async fn create_test_vehicle(pool: &PgPool, requester_id: RequesterId, category: VehicleCategory) -> Vehicle {
    let mut conn = pool.acquire().await.unwrap();
    Vehicles::new(&mut conn)
        .create(&VehicleCreateDBRequest {
            requester_id,
            plate: format!("TST-{}", &Uuid::new_v4().to_string()[..8]),
            category,
        })
        .await
        .unwrap()
}

pub async fn create_test_unit(pool: &PgPool, category: VehicleCategory) -> ParkingUnit {
    let mut conn = pool.acquire().await.unwrap();
    Units::new(&mut conn)
        .create(&UnitCreateDBRequest {
            pool_id: None,
            label: format!("U-{}", &Uuid::new_v4().to_string()[..8]),
            category,
        })
        .await
        .unwrap()
}

pub async fn create_test_pool(pool: &PgPool, category: VehicleCategory, total_capacity: i64) -> CapacityPool {
    let mut conn = pool.acquire().await.unwrap();
    Pools::new(&mut conn)
        .create(&PoolCreateDBRequest {
            name: format!("lot-{}", &Uuid::new_v4().to_string()[..8]),
            category,
            total_capacity,
        })
        .await
        .unwrap()
}

pub async fn grant_test_hours(pool: &PgPool, requester_id: RequesterId, hours: &str) {
    let hours: Decimal = hours.parse().expect("valid decimal");
    let mut conn = pool.acquire().await.unwrap();
    Balances::new(&mut conn)
        .insert_grant(requester_id, hours, hours, None)
        .await
        .unwrap();
}

pub async fn unit_status(pool: &PgPool, unit_id: UnitId) -> String {
    sqlx::query_scalar("SELECT status FROM parking_units WHERE id = $1")
        .bind(unit_id)
        .fetch_one(pool)
        .await
        .unwrap()
}

pub async fn pool_counters(pool: &PgPool, pool_id: PoolId) -> (i64, i64, i64) {
    sqlx::query_as("SELECT reserved_count, occupied_count, unavailable_count FROM capacity_pools WHERE id = $1")
        .bind(pool_id)
        .fetch_one(pool)
        .await
        .unwrap()
}
