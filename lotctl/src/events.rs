//! Post-commit event fan-out.
//!
//! Core operations publish a typed [`Event`] after their transaction commits.
//! Delivery is fire-and-forget over a `tokio::sync::broadcast` channel: a
//! slow or absent subscriber can never fail (or delay) the state machine.

use rust_decimal::Decimal;
use serde::Serialize;
use tokio::sync::broadcast;

use crate::types::{RequesterId, ReservationId};

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    ReservationCreated {
        reservation_id: ReservationId,
        requester_id: RequesterId,
    },
    SessionStarted {
        reservation_id: ReservationId,
    },
    SessionEnded {
        reservation_id: ReservationId,
        total_hours: Decimal,
        penalty_hours: Decimal,
    },
    ReservationCancelled {
        reservation_id: ReservationId,
    },
    ReservationInvalidated {
        reservation_id: ReservationId,
    },
    BalanceGranted {
        requester_id: RequesterId,
        hours: Decimal,
    },
}

/// Cloneable handle for publishing events.
#[derive(Debug, Clone)]
pub struct Publisher {
    tx: broadcast::Sender<Event>,
}

impl Publisher {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }

    /// Publish an event. Send only fails when no subscriber exists, which is
    /// a normal condition, not an error.
    pub fn publish(&self, event: Event) {
        if let Err(error) = self.tx.send(event) {
            tracing::trace!(%error, "event dropped: no active subscribers");
        }
    }
}

impl Default for Publisher {
    fn default() -> Self {
        Self::new(256)
    }
}
