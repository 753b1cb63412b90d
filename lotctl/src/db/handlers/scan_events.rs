//! Repository for the append-only scan-event audit log.

use sqlx::PgConnection;
use tracing::instrument;
use uuid::Uuid;

use crate::db::errors::Result;
use crate::db::models::scan_events::{ScanEvent, ScanPhase};
use crate::types::ReservationId;

pub struct ScanEvents<'c> {
    db: &'c mut PgConnection,
}

impl<'c> ScanEvents<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self), err)]
    pub async fn append(
        &mut self,
        reservation_id: ReservationId,
        validated_by: Option<Uuid>,
        phase: ScanPhase,
        status_at_scan: &str,
    ) -> Result<ScanEvent> {
        let event = sqlx::query_as::<_, ScanEvent>(
            "INSERT INTO scan_events (reservation_id, validated_by, phase, status_at_scan)
             VALUES ($1, $2, $3, $4)
             RETURNING id, reservation_id, validated_by, phase, status_at_scan, scanned_at",
        )
        .bind(reservation_id)
        .bind(validated_by)
        .bind(phase)
        .bind(status_at_scan)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(event)
    }

    #[instrument(skip(self), err)]
    pub async fn list_for_reservation(&mut self, reservation_id: ReservationId) -> Result<Vec<ScanEvent>> {
        let events = sqlx::query_as::<_, ScanEvent>(
            "SELECT id, reservation_id, validated_by, phase, status_at_scan, scanned_at
             FROM scan_events
             WHERE reservation_id = $1
             ORDER BY scanned_at, id",
        )
        .bind(reservation_id)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(events)
    }
}
