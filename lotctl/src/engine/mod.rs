//! The reservation engine: allocation, lifecycle transitions, session
//! validation, billing, and the grace-period sweeper.
//!
//! Every mutating operation follows the same shape: open a transaction, take
//! the row locks it needs, perform guarded writes whose row counts decide
//! between success and a contention error, commit, and only then fire the
//! post-commit effects (cache invalidation, event publication, audit rows).
//! Nothing outside the transaction is ever treated as authoritative.

pub mod allocator;
pub mod billing;
pub mod lifecycle;
pub mod sessions;
pub mod sweeper;

use sqlx::PgPool;

use crate::cache::CapacityCache;
use crate::events::Publisher;

/// Handle bundling everything a core operation needs. Cheap to clone; all
/// fields are reference-counted handles.
#[derive(Debug, Clone)]
pub struct Engine {
    pub(crate) db: PgPool,
    pub(crate) publisher: Publisher,
    pub(crate) cache: CapacityCache,
}

impl Engine {
    pub fn new(db: PgPool, publisher: Publisher, cache: CapacityCache) -> Self {
        Self { db, publisher, cache }
    }

    pub fn db(&self) -> &PgPool {
        &self.db
    }
}
