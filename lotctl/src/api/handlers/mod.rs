//! Axum route handlers for the HTTP API.

pub mod capacity;
pub mod directory;
pub mod reservations;
pub mod sessions;
