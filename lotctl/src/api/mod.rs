//! API layer for HTTP request handling and data models.
//!
//! - **[`handlers`]**: Axum route handlers for all API endpoints
//! - **[`models`]**: Request/response data structures for API communication
//!
//! # API Structure
//!
//! - **Reservations** (`/api/v1/reservations/*`): allocation, cancel, lookup
//! - **Sessions** (`/api/v1/sessions/*`): scan-token start/end
//! - **Capacity** (`/api/v1/capacity`, `/api/v1/units`, `/api/v1/pools`):
//!   availability listing and provisioning
//! - **Directory** (`/api/v1/requesters/*`, `/api/v1/vehicles`): requesters,
//!   vehicles, and balance grants
//!
//! All endpoints are documented with OpenAPI annotations using `utoipa`;
//! interactive docs are served at `/docs` when the server is running.

pub mod handlers;
pub mod models;
