use crate::db::errors::DbError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error as ThisError;

/// Service error taxonomy.
///
/// Three families matter to callers:
/// - eligibility errors (`InsufficientBalance`, `OutstandingPenalty`) are
///   surfaced before any lock is taken and are never retried automatically;
/// - contention errors (`UnitAlreadyBooked`, `PoolFull`, `SlotAlreadyTaken`,
///   `ReservationStateConflict`, `TokenNotFound`) are expected under
///   concurrency and safe to retry with fresh state;
/// - everything else is internal and rendered without detail.
#[derive(ThisError, Debug)]
pub enum Error {
    /// Requester has no remaining chargeable hours
    #[error("Requester {requester_id} has no remaining balance")]
    InsufficientBalance { requester_id: uuid::Uuid },

    /// Requester has unpaid penalty hours outstanding
    #[error("Requester {requester_id} has {hours} outstanding penalty hours")]
    OutstandingPenalty {
        requester_id: uuid::Uuid,
        hours: rust_decimal::Decimal,
    },

    /// Unit was claimed by a concurrent request
    #[error("Unit {unit_id} is no longer available")]
    UnitAlreadyBooked { unit_id: uuid::Uuid },

    /// Pool has no remaining capacity (or is unavailable / in maintenance)
    #[error("Pool {pool_id} has no available capacity")]
    PoolFull { pool_id: uuid::Uuid },

    /// Requested slot label is already held by a live reservation
    #[error("Slot {slot_label} in pool {pool_id} is already taken")]
    SlotAlreadyTaken { pool_id: uuid::Uuid, slot_label: String },

    /// Vehicle category does not match the unit category
    #[error("Vehicle category {vehicle} does not match spot category {spot}")]
    CategoryMismatch {
        vehicle: crate::types::VehicleCategory,
        spot: crate::types::VehicleCategory,
    },

    /// Guarded status transition matched zero rows: someone else already
    /// moved this reservation. No capacity was mutated.
    #[error("Reservation {reservation_id} is not in the expected state")]
    ReservationStateConflict { reservation_id: uuid::Uuid },

    /// Unknown, already-used, or already-ended session token. Deliberately
    /// indistinguishable for replay safety.
    #[error("Session token not recognized")]
    TokenNotFound,

    /// Invalid request data or business rule violation
    #[error("{message}")]
    BadRequest { message: String },

    /// Requested resource not found
    #[error("{resource} with ID {id} not found")]
    NotFound { resource: String, id: String },

    /// Generic internal service error
    #[error("Failed to {operation}")]
    Internal { operation: String },

    /// Database operation error
    #[error(transparent)]
    Database(#[from] DbError),

    /// Unexpected error with full context chain
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::InsufficientBalance { .. } | Error::OutstandingPenalty { .. } => StatusCode::PAYMENT_REQUIRED,
            Error::UnitAlreadyBooked { .. }
            | Error::PoolFull { .. }
            | Error::SlotAlreadyTaken { .. }
            | Error::ReservationStateConflict { .. } => StatusCode::CONFLICT,
            Error::TokenNotFound => StatusCode::NOT_FOUND,
            Error::CategoryMismatch { .. } | Error::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Error::NotFound { .. } => StatusCode::NOT_FOUND,
            Error::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Error::Database(db_err) => match db_err {
                DbError::NotFound => StatusCode::NOT_FOUND,
                DbError::UniqueViolation { .. } => StatusCode::CONFLICT,
                DbError::ForeignKeyViolation { .. } => StatusCode::BAD_REQUEST,
                // Check violations on the capacity counters are integrity
                // errors, not client errors.
                DbError::CheckViolation { .. } => StatusCode::INTERNAL_SERVER_ERROR,
                DbError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Error::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable code included in every error response body.
    pub fn code(&self) -> &'static str {
        match self {
            Error::InsufficientBalance { .. } => "insufficient_balance",
            Error::OutstandingPenalty { .. } => "outstanding_penalty",
            Error::UnitAlreadyBooked { .. } => "unit_already_booked",
            Error::PoolFull { .. } => "pool_full",
            Error::SlotAlreadyTaken { .. } => "slot_already_taken",
            Error::CategoryMismatch { .. } => "category_mismatch",
            Error::ReservationStateConflict { .. } => "reservation_state_conflict",
            Error::TokenNotFound => "token_not_found",
            Error::BadRequest { .. } => "bad_request",
            Error::NotFound { .. } => "not_found",
            Error::Database(DbError::UniqueViolation { .. }) => "conflict",
            Error::Internal { .. } | Error::Database(_) | Error::Other(_) => "internal_error",
        }
    }

    /// Returns a user-safe error message, without leaking internal implementation details
    pub fn user_message(&self) -> String {
        match self {
            Error::InsufficientBalance { .. } => "No remaining balance; acquire parking hours before reserving".to_string(),
            Error::OutstandingPenalty { .. } => "Outstanding penalty hours must be settled before reserving".to_string(),
            Error::UnitAlreadyBooked { .. } => "That spot was just taken; pick another".to_string(),
            Error::PoolFull { .. } => "No capacity left in that section; try another".to_string(),
            Error::SlotAlreadyTaken { slot_label, .. } => format!("Slot {slot_label} is already taken"),
            Error::CategoryMismatch { vehicle, spot } => {
                format!("A {vehicle} cannot park in a {spot} spot")
            }
            Error::ReservationStateConflict { .. } => "Reservation changed state; refresh and retry".to_string(),
            Error::TokenNotFound => "Code not recognized or already used".to_string(),
            Error::BadRequest { message } => message.clone(),
            Error::NotFound { resource, id } => format!("{resource} with ID {id} not found"),
            Error::Database(DbError::UniqueViolation { .. }) => "Resource already exists".to_string(),
            Error::Database(DbError::NotFound) => "Resource not found".to_string(),
            Error::Database(DbError::ForeignKeyViolation { .. }) => "Invalid reference to related resource".to_string(),
            Error::Internal { .. } | Error::Database(_) | Error::Other(_) => "Internal server error".to_string(),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        // Log full detail internally - different levels based on severity
        match &self {
            Error::Database(DbError::CheckViolation { .. }) => {
                tracing::error!("Capacity integrity violation: {:#}", self);
            }
            Error::Database(DbError::Other(_)) | Error::Internal { .. } | Error::Other(_) => {
                tracing::error!("Internal service error: {:#}", self);
            }
            Error::Database(_) => {
                tracing::warn!("Database constraint error: {}", self);
            }
            Error::InsufficientBalance { .. } | Error::OutstandingPenalty { .. } => {
                tracing::info!("Eligibility rejection: {}", self);
            }
            Error::UnitAlreadyBooked { .. }
            | Error::PoolFull { .. }
            | Error::SlotAlreadyTaken { .. }
            | Error::ReservationStateConflict { .. }
            | Error::TokenNotFound => {
                tracing::debug!("Contention error: {}", self);
            }
            Error::BadRequest { .. } | Error::NotFound { .. } | Error::CategoryMismatch { .. } => {
                tracing::debug!("Client error: {}", self);
            }
        }

        let body = serde_json::json!({
            "code": self.code(),
            "message": self.user_message(),
        });

        (self.status_code(), axum::response::Json(body)).into_response()
    }
}

/// Type alias for service operation results
pub type Result<T> = std::result::Result<T, Error>;
