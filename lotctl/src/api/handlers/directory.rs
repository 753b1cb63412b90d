use crate::{
    api::models::directory::{BalanceGrantCreate, BalanceResponse, RequesterCreate, RequesterResponse, VehicleCreate, VehicleResponse},
    db::errors::DbError,
    db::handlers::{Balances, Requesters, Vehicles},
    db::models::requesters::{RequesterCreateDBRequest, VehicleCreateDBRequest},
    engine::billing::GrantOutcome,
    errors::{Error, Result},
    types::{RequesterId, VehicleCategory},
    AppState,
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};

/// Register a requester
#[utoipa::path(
    post,
    path = "/requesters",
    tag = "directory",
    summary = "Register a requester",
    responses(
        (status = 201, description = "Requester created", body = RequesterResponse),
        (status = 500, description = "Internal server error"),
    )
)]
pub async fn create_requester(
    State(state): State<AppState>,
    Json(data): Json<RequesterCreate>,
) -> Result<(StatusCode, Json<RequesterResponse>)> {
    let mut conn = state.db.acquire().await.map_err(DbError::from)?;
    let requester = Requesters::new(&mut conn)
        .create(&RequesterCreateDBRequest {
            first_name: data.first_name,
            last_name: data.last_name,
            is_guest: false,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(RequesterResponse::from(requester))))
}

/// Register a vehicle
#[utoipa::path(
    post,
    path = "/vehicles",
    tag = "directory",
    summary = "Register a vehicle",
    responses(
        (status = 201, description = "Vehicle created", body = VehicleResponse),
        (status = 400, description = "Invalid category"),
        (status = 404, description = "Requester not found"),
        (status = 500, description = "Internal server error"),
    )
)]
pub async fn create_vehicle(
    State(state): State<AppState>,
    Json(data): Json<VehicleCreate>,
) -> Result<(StatusCode, Json<VehicleResponse>)> {
    let category: VehicleCategory = data.category.parse().map_err(|message| Error::BadRequest { message })?;

    let mut conn = state.db.acquire().await.map_err(DbError::from)?;
    let vehicle = Vehicles::new(&mut conn)
        .create(&VehicleCreateDBRequest {
            requester_id: data.requester_id,
            plate: data.plate,
            category,
        })
        .await
        .map_err(|error| match error {
            DbError::ForeignKeyViolation { .. } => Error::NotFound {
                resource: "requester".to_string(),
                id: data.requester_id.to_string(),
            },
            other => other.into(),
        })?;

    Ok((StatusCode::CREATED, Json(VehicleResponse::from(vehicle))))
}

/// Grant balance hours
#[utoipa::path(
    post,
    path = "/requesters/{id}/balance",
    tag = "directory",
    summary = "Grant balance hours",
    description = "Top up a requester. Outstanding penalties are settled oldest-first out \
                   of the grant before the remainder lands as usable balance.",
    params(
        ("id" = String, Path, description = "Requester ID (UUID)"),
    ),
    responses(
        (status = 201, description = "Grant recorded", body = GrantOutcome),
        (status = 400, description = "Non-positive grant"),
        (status = 404, description = "Requester not found"),
        (status = 500, description = "Internal server error"),
    )
)]
pub async fn grant_balance(
    State(state): State<AppState>,
    Path(id): Path<RequesterId>,
    Json(data): Json<BalanceGrantCreate>,
) -> Result<(StatusCode, Json<GrantOutcome>)> {
    let outcome = state.engine().grant_balance(id, data.hours, data.granted_by).await?;

    Ok((StatusCode::CREATED, Json(outcome)))
}

/// Get a requester's balance
#[utoipa::path(
    get,
    path = "/requesters/{id}/balance",
    tag = "directory",
    summary = "Get a requester's balance",
    params(
        ("id" = String, Path, description = "Requester ID (UUID)"),
    ),
    responses(
        (status = 200, description = "Balance and outstanding penalty", body = BalanceResponse),
        (status = 404, description = "Requester not found"),
        (status = 500, description = "Internal server error"),
    )
)]
pub async fn get_balance(State(state): State<AppState>, Path(id): Path<RequesterId>) -> Result<Json<BalanceResponse>> {
    let mut conn = state.db.acquire().await.map_err(DbError::from)?;

    Requesters::new(&mut conn).get_by_id(id).await?.ok_or_else(|| Error::NotFound {
        resource: "requester".to_string(),
        id: id.to_string(),
    })?;

    let mut balances = Balances::new(&mut conn);
    let balance = balances.total_balance(id).await?;
    let outstanding_penalty = balances.outstanding_penalty(id).await?;

    Ok(Json(BalanceResponse {
        requester_id: id,
        balance,
        outstanding_penalty,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::create_test_app;
    use rust_decimal::Decimal;
    use serde_json::json;
    use sqlx::PgPool;
    use uuid::Uuid;

    #[sqlx::test]
    #[test_log::test]
    async fn test_register_and_grant(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;

        let response = app
            .post("/api/v1/requesters")
            .json(&json!({"first_name": "Ada", "last_name": "Moreno"}))
            .await;
        response.assert_status(StatusCode::CREATED);
        let requester: RequesterResponse = response.json();
        assert!(!requester.is_guest);

        let response = app
            .post("/api/v1/vehicles")
            .json(&json!({"requester_id": requester.id, "plate": "CAM-204", "category": "motorbike"}))
            .await;
        response.assert_status(StatusCode::CREATED);
        let vehicle: VehicleResponse = response.json();
        assert_eq!(vehicle.category, VehicleCategory::Motorcycle);

        let response = app
            .post(&format!("/api/v1/requesters/{}/balance", requester.id))
            .json(&json!({"hours": "8"}))
            .await;
        response.assert_status(StatusCode::CREATED);
        let grant: GrantOutcome = response.json();
        assert_eq!(grant.hours_granted, Decimal::from(8));
        assert_eq!(grant.penalty_settled, Decimal::ZERO);
        assert_eq!(grant.hours_remaining, Decimal::from(8));

        let balance: BalanceResponse = app.get(&format!("/api/v1/requesters/{}/balance", requester.id)).await.json();
        assert_eq!(balance.balance, Decimal::from(8));
        assert_eq!(balance.outstanding_penalty, Decimal::ZERO);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_grant_settles_penalties_first(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;

        let requester: RequesterResponse = app
            .post("/api/v1/requesters")
            .json(&json!({"first_name": "Noor", "last_name": "Haddad"}))
            .await
            .json();

        // Two penalties, oldest first: 1.5 then 0.5 hours.
        sqlx::query("INSERT INTO penalty_entries (requester_id, hours, hours_outstanding) VALUES ($1, 1.5, 1.5)")
            .bind(requester.id)
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query("INSERT INTO penalty_entries (requester_id, hours, hours_outstanding) VALUES ($1, 0.5, 0.5)")
            .bind(requester.id)
            .execute(&pool)
            .await
            .unwrap();

        let grant: GrantOutcome = app
            .post(&format!("/api/v1/requesters/{}/balance", requester.id))
            .json(&json!({"hours": "3"}))
            .await
            .json();
        assert_eq!(grant.penalty_settled, Decimal::new(2, 0));
        assert_eq!(grant.hours_remaining, Decimal::ONE);

        let balance: BalanceResponse = app.get(&format!("/api/v1/requesters/{}/balance", requester.id)).await.json();
        assert_eq!(balance.balance, Decimal::ONE);
        assert_eq!(balance.outstanding_penalty, Decimal::ZERO);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_partial_settlement_leaves_penalty_open(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;

        let requester: RequesterResponse = app
            .post("/api/v1/requesters")
            .json(&json!({"first_name": "Iris", "last_name": "Okafor"}))
            .await
            .json();

        sqlx::query("INSERT INTO penalty_entries (requester_id, hours, hours_outstanding) VALUES ($1, 4, 4)")
            .bind(requester.id)
            .execute(&pool)
            .await
            .unwrap();

        let grant: GrantOutcome = app
            .post(&format!("/api/v1/requesters/{}/balance", requester.id))
            .json(&json!({"hours": "1"}))
            .await
            .json();
        assert_eq!(grant.penalty_settled, Decimal::ONE);
        assert_eq!(grant.hours_remaining, Decimal::ZERO);

        let balance: BalanceResponse = app.get(&format!("/api/v1/requesters/{}/balance", requester.id)).await.json();
        assert_eq!(balance.balance, Decimal::ZERO);
        assert_eq!(balance.outstanding_penalty, Decimal::from(3));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_grant_validation(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;

        let response = app
            .post(&format!("/api/v1/requesters/{}/balance", Uuid::new_v4()))
            .json(&json!({"hours": "5"}))
            .await;
        response.assert_status_not_found();

        let requester: RequesterResponse = app
            .post("/api/v1/requesters")
            .json(&json!({"first_name": "Kai", "last_name": "Lindqvist"}))
            .await
            .json();

        let response = app
            .post(&format!("/api/v1/requesters/{}/balance", requester.id))
            .json(&json!({"hours": "-2"}))
            .await;
        response.assert_status_bad_request();
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_vehicle_for_unknown_requester(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;

        let response = app
            .post("/api/v1/vehicles")
            .json(&json!({"requester_id": Uuid::new_v4(), "plate": "NOPE-1", "category": "car"}))
            .await;
        response.assert_status_not_found();
    }
}
