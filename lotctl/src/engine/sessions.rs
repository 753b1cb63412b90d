//! Session validation: resolving scan tokens and driving the session
//! transitions.
//!
//! The token is opaque; its validity is solely a function of the current
//! reservation status. Replayed, already-ended, and unknown tokens are all
//! answered with the same `TokenNotFound`, so a stolen or stale code leaks
//! nothing about the reservation it once belonged to.

use chrono::Utc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::db::errors::DbError;
use crate::db::handlers::reservations::TransitionStamps;
use crate::db::handlers::{Reservations, ScanEvents};
use crate::db::models::reservations::{Reservation, ReservationStatus};
use crate::db::models::scan_events::ScanPhase;
use crate::errors::{Error, Result};
use crate::events::Event;
use crate::types::ReservationId;

use super::billing::{self, BillingBreakdown};
use super::lifecycle::{apply_transition, reload};
use super::Engine;

/// What `end_session` returns: the completed reservation and its charge.
#[derive(Debug, Clone)]
pub struct SessionCloseOutcome {
    pub reservation: Reservation,
    pub breakdown: BillingBreakdown,
}

impl Engine {
    /// Start the parking session for a scanned token.
    ///
    /// Resolves the token to a `reserved` reservation and drives
    /// reserved -> active. A second call with the same token finds no
    /// `reserved` row and fails `TokenNotFound`: that is the intended
    /// "already used" signal.
    #[instrument(skip(self, token), err)]
    pub async fn start_session(&self, token: Uuid, validated_by: Option<Uuid>) -> Result<Reservation> {
        let mut tx = self.db.begin().await.map_err(DbError::from)?;

        let reservation = Reservations::new(&mut tx)
            .get_by_token_for_update(token, &[ReservationStatus::Reserved])
            .await?
            .ok_or(Error::TokenNotFound)?;

        let now = Utc::now();
        apply_transition(
            &mut tx,
            &reservation,
            ReservationStatus::Active,
            TransitionStamps {
                started_at: Some(now),
                ended_at: None,
                waiting_ended_at: None,
            },
        )
        .await?;

        let updated = reload(&mut tx, reservation.id).await?;
        tx.commit().await.map_err(DbError::from)?;

        info!(reservation_id = %reservation.id, "session started");
        self.append_scan_event(reservation.id, validated_by, ScanPhase::SessionStart, reservation.status)
            .await;
        self.cache.invalidate().await;
        self.publisher.publish(Event::SessionStarted {
            reservation_id: reservation.id,
        });

        Ok(updated)
    }

    /// End the parking session for a scanned token and bill it.
    ///
    /// Accepts both `active` and `reserved` reservations; ending a
    /// never-started reservation backfills `started_at` to now before the
    /// duration is computed. Billing runs inside the same transaction as the
    /// transition, so a billing failure aborts the whole thing and the
    /// reservation stays non-terminal, safe to retry.
    #[instrument(skip(self, token), err)]
    pub async fn end_session(&self, token: Uuid, validated_by: Option<Uuid>) -> Result<SessionCloseOutcome> {
        let mut tx = self.db.begin().await.map_err(DbError::from)?;

        let reservation = Reservations::new(&mut tx)
            .get_by_token_for_update(token, &[ReservationStatus::Reserved, ReservationStatus::Active])
            .await?
            .ok_or(Error::TokenNotFound)?;

        let now = Utc::now();
        let started = reservation.started_at.unwrap_or(now);

        apply_transition(
            &mut tx,
            &reservation,
            ReservationStatus::Completed,
            TransitionStamps {
                started_at: Some(now),
                ended_at: Some(now),
                waiting_ended_at: None,
            },
        )
        .await?;

        let split = billing::compute_split(reservation.created_at, Some(started), now);
        let penalty_hours = billing::apply_charge(&mut tx, reservation.requester_id, reservation.id, split.total).await?;

        let updated = reload(&mut tx, reservation.id).await?;
        tx.commit().await.map_err(DbError::from)?;

        info!(
            reservation_id = %reservation.id,
            total_hours = %split.total,
            %penalty_hours,
            "session ended"
        );
        self.append_scan_event(reservation.id, validated_by, ScanPhase::SessionEnd, reservation.status)
            .await;
        self.cache.invalidate().await;
        self.publisher.publish(Event::SessionEnded {
            reservation_id: reservation.id,
            total_hours: split.total,
            penalty_hours,
        });

        Ok(SessionCloseOutcome {
            reservation: updated,
            breakdown: BillingBreakdown {
                wait_hours: split.wait,
                parking_hours: split.parking,
                total_charged_hours: split.total,
                penalty_hours,
            },
        })
    }

    /// Best-effort audit append, after commit. A failure here is logged and
    /// never surfaced; the transition already happened.
    async fn append_scan_event(
        &self,
        reservation_id: ReservationId,
        validated_by: Option<Uuid>,
        phase: ScanPhase,
        status_at_scan: ReservationStatus,
    ) {
        let result = async {
            let mut conn = self.db.acquire().await.map_err(DbError::from)?;
            ScanEvents::new(&mut conn)
                .append(reservation_id, validated_by, phase, status_at_scan.as_str())
                .await
        }
        .await;

        if let Err(error) = result {
            warn!(%reservation_id, %error, "failed to append scan event");
        }
    }
}
