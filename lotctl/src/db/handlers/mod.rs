//! Repository implementations for database access.
//!
//! Each repository wraps a SQLx connection (or transaction) and provides the
//! strongly-typed queries for one table family. Guarded mutations - the
//! `UPDATE ... WHERE <expected state>` writes whose row count decides between
//! success and a contention error - live here; the decision of what a zero
//! row count *means* lives in [`crate::engine`].
//!
//! # Common Pattern
//!
//! ```ignore
//! let mut tx = pool.begin().await?;
//! let mut units = Units::new(&mut tx);
//! let claimed = units.claim_for_reservation(unit_id).await?;
//! tx.commit().await?;
//! ```

pub mod billing;
pub mod pools;
pub mod requesters;
pub mod reservations;
pub mod scan_events;
pub mod units;

pub use billing::Balances;
pub use pools::Pools;
pub use requesters::{Requesters, Vehicles};
pub use reservations::Reservations;
pub use scan_events::ScanEvents;
pub use units::Units;
