//! Billing math and the balance/penalty ledger operations.
//!
//! All hour arithmetic uses [`Decimal`]; floats never touch the ledger.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::PgConnection;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::db::errors::DbError;
use crate::db::handlers::{Balances, Requesters};
use crate::errors::{Error, Result};
use crate::events::Event;
use crate::types::{RequesterId, ReservationId};

use super::Engine;

/// Charge presented to the requester at session close. The wait/parking
/// split is presentation detail; `wait_hours + parking_hours` always equals
/// `total_charged_hours`, which is what the ledger is charged.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct BillingBreakdown {
    #[schema(value_type = String)]
    pub wait_hours: Decimal,
    #[schema(value_type = String)]
    pub parking_hours: Decimal,
    #[schema(value_type = String)]
    pub total_charged_hours: Decimal,
    #[schema(value_type = String)]
    pub penalty_hours: Decimal,
}

/// Result of granting hours to a requester, after penalty settlement.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct GrantOutcome {
    pub grant_id: Uuid,
    #[schema(value_type = String)]
    pub hours_granted: Decimal,
    /// Portion of the grant consumed paying down outstanding penalties.
    #[schema(value_type = String)]
    pub penalty_settled: Decimal,
    /// Portion left as usable balance.
    #[schema(value_type = String)]
    pub hours_remaining: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ChargeSplit {
    pub wait: Decimal,
    pub parking: Decimal,
    pub total: Decimal,
}

/// Minimum charge: 1/60 of an hour. A session is never zero-charged.
fn min_charge() -> Decimal {
    Decimal::ONE / Decimal::from(60)
}

fn hours_between(from: DateTime<Utc>, to: DateTime<Utc>) -> Decimal {
    let seconds = (to - from).num_seconds().max(0);
    Decimal::from(seconds) / Decimal::from(3600)
}

/// Compute the charge for a closed session.
///
/// `total = (ended - created) / 3600s`, floored at the minimum charge. The
/// wait/parking split is reconciled so the parts always sum to the total:
/// any shortfall (clock drift, rounding, null start) lands on the parking
/// side when a parking phase exists, otherwise on the wait side.
pub(crate) fn compute_split(created: DateTime<Utc>, started: Option<DateTime<Utc>>, ended: DateTime<Utc>) -> ChargeSplit {
    let total = hours_between(created, ended).max(min_charge()).round_dp(4);

    let (mut wait, mut parking) = match started {
        Some(started) => (
            hours_between(created, started).round_dp(4),
            hours_between(started, ended).round_dp(4),
        ),
        None => (Decimal::ZERO, Decimal::ZERO),
    };

    let shortfall = total - (wait + parking);
    if shortfall != Decimal::ZERO {
        if parking > Decimal::ZERO {
            parking += shortfall;
        } else {
            wait += shortfall;
        }
    }

    ChargeSplit { wait, parking, total }
}

/// Deduct the charge from the requester's oldest open grant; any shortfall
/// becomes a penalty entry. Returns the penalty hours raised (zero when the
/// grant covered the whole charge). Runs inside the caller's transaction so
/// a failure aborts the session-close transition with it.
pub(crate) async fn apply_charge(
    conn: &mut PgConnection,
    requester_id: RequesterId,
    reservation_id: ReservationId,
    total_hours: Decimal,
) -> Result<Decimal> {
    let mut balances = Balances::new(conn);

    let shortfall = match balances.oldest_open_grant_for_update(requester_id).await? {
        Some(grant) => {
            let deducted = total_hours.min(grant.hours_remaining);
            balances.deduct_from_grant(grant.id, deducted).await?;
            total_hours - deducted
        }
        None => total_hours,
    };

    if shortfall > Decimal::ZERO {
        balances.insert_penalty(requester_id, Some(reservation_id), shortfall).await?;
    }

    Ok(shortfall)
}

impl Engine {
    /// Grant hours to a requester, settling outstanding penalties first.
    ///
    /// Penalties are consumed oldest-first until the grant or the penalties
    /// run out; whatever remains is the requester's usable balance. The
    /// settlement and the grant commit atomically.
    #[instrument(skip(self), err)]
    pub async fn grant_balance(&self, requester_id: RequesterId, hours: Decimal, granted_by: Option<Uuid>) -> Result<GrantOutcome> {
        if hours <= Decimal::ZERO {
            return Err(Error::BadRequest {
                message: "granted hours must be positive".to_string(),
            });
        }

        let mut tx = self.db.begin().await.map_err(DbError::from)?;

        Requesters::new(&mut tx)
            .get_by_id(requester_id)
            .await?
            .ok_or_else(|| Error::NotFound {
                resource: "Requester".to_string(),
                id: requester_id.to_string(),
            })?;

        let mut balances = Balances::new(&mut tx);
        let mut remaining = hours;
        let mut settled = Decimal::ZERO;

        for penalty in balances.open_penalties_for_update(requester_id).await? {
            if remaining <= Decimal::ZERO {
                break;
            }
            let pay = remaining.min(penalty.hours_outstanding);
            balances.settle_penalty(penalty.id, pay).await?;
            remaining -= pay;
            settled += pay;
        }

        let grant = balances.insert_grant(requester_id, hours, remaining, granted_by).await?;

        tx.commit().await.map_err(DbError::from)?;

        info!(%requester_id, %hours, %settled, "balance granted");
        self.publisher.publish(Event::BalanceGranted { requester_id, hours });

        Ok(GrantOutcome {
            grant_id: grant.id,
            hours_granted: hours,
            penalty_settled: settled,
            hours_remaining: remaining,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn test_ninety_minute_session_charges_one_and_a_half_hours() {
        let created = Utc::now();
        let started = created + TimeDelta::minutes(6);
        let ended = created + TimeDelta::minutes(90);

        let split = compute_split(created, Some(started), ended);

        assert_eq!(split.total, dec("1.5"));
        assert_eq!(split.wait, dec("0.1"));
        assert_eq!(split.parking, dec("1.4"));
        assert_eq!(split.wait + split.parking, split.total);
    }

    #[test]
    fn test_short_session_floors_at_one_minute() {
        let created = Utc::now();
        let ended = created + TimeDelta::seconds(10);

        let split = compute_split(created, Some(created), ended);

        assert_eq!(split.total, dec("0.0167"));
        assert_eq!(split.wait + split.parking, split.total);
    }

    #[test]
    fn test_null_start_charges_everything_as_wait() {
        let created = Utc::now();
        let ended = created + TimeDelta::hours(2);

        let split = compute_split(created, None, ended);

        assert_eq!(split.total, dec("2"));
        assert_eq!(split.wait, dec("2"));
        assert_eq!(split.parking, Decimal::ZERO);
    }

    #[test]
    fn test_backfilled_start_puts_duration_on_wait_side() {
        // End-before-start: started is backfilled to the end instant, so the
        // whole duration is wait and parking is zero.
        let created = Utc::now();
        let ended = created + TimeDelta::minutes(30);

        let split = compute_split(created, Some(ended), ended);

        assert_eq!(split.total, dec("0.5"));
        assert_eq!(split.parking, Decimal::ZERO);
        assert_eq!(split.wait, dec("0.5"));
    }

    #[test]
    fn test_split_always_sums_to_total() {
        let created = Utc::now();
        for (wait_secs, park_secs) in [(1, 1), (59, 61), (3600, 5400), (7, 0), (0, 7)] {
            let started = created + TimeDelta::seconds(wait_secs);
            let ended = started + TimeDelta::seconds(park_secs);
            let split = compute_split(created, Some(started), ended);
            assert_eq!(split.wait + split.parking, split.total, "wait={wait_secs} park={park_secs}");
        }
    }
}
