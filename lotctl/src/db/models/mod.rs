//! Database record models matching table schemas.
//!
//! Each struct here corresponds to a table row and is returned by the
//! repositories in [`crate::db::handlers`]. Database models are distinct from
//! the API models in [`crate::api::models`] so the storage and API
//! representations can evolve independently.

pub mod billing;
pub mod pools;
pub mod requesters;
pub mod reservations;
pub mod scan_events;
pub mod units;
