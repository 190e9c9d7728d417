use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use voya_domain::{JourneyDate, RejectReason, Reservation, UnitRejection};
use voya_reservation::claim::{evaluate_claim, evaluate_confirm, ClaimDecision, ConfirmDecision};
use voya_reservation::ledger::{
    ConfirmOutcome, ConfirmRequest, HoldOutcome, HoldRequest, LegConflict, LegUnit,
    ReleaseFilter, RenewRequest, ReservationLedger,
};
use voya_reservation::LedgerError;

const SEAT_COLUMNS: &str = "id, bus_id, seat_number, journey_date, status, hold_token, \
     hold_expires_at, user_id, trip_id, payment_id, booking_id, created_at, updated_at";

/// Postgres ledger for date-keyed seat claims. Each operation is one
/// transaction; the unique key on (bus, seat, date) settles insert races the
/// row locks cannot see.
pub struct PgSeatLedger {
    pool: PgPool,
}

impl PgSeatLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct SeatRow {
    id: Uuid,
    bus_id: Uuid,
    seat_number: String,
    journey_date: NaiveDate,
    status: String,
    hold_token: Option<String>,
    hold_expires_at: Option<DateTime<Utc>>,
    user_id: String,
    trip_id: Uuid,
    payment_id: Option<Uuid>,
    booking_id: Option<Uuid>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl SeatRow {
    fn into_reservation(self) -> Result<Reservation<JourneyDate>, LedgerError> {
        let status = self.status.parse().map_err(LedgerError::Storage)?;
        Ok(Reservation {
            id: self.id,
            resource_id: self.bus_id,
            unit_number: self.seat_number,
            validity: JourneyDate(self.journey_date),
            status,
            hold_token: self.hold_token,
            hold_expires_at: self.hold_expires_at,
            user_id: self.user_id,
            trip_id: self.trip_id,
            payment_id: self.payment_id,
            booking_id: self.booking_id,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

fn db_err(e: sqlx::Error) -> LedgerError {
    LedgerError::Storage(e.to_string())
}

async fn reap(
    tx: &mut Transaction<'_, Postgres>,
    bus_id: Uuid,
    now: DateTime<Utc>,
) -> Result<u64, LedgerError> {
    let swept = sqlx::query(
        "UPDATE seat_reservations SET status = 'EXPIRED', updated_at = $2 \
         WHERE bus_id = $1 AND status = 'HELD' AND hold_expires_at <= $2",
    )
    .bind(bus_id)
    .bind(now)
    .execute(&mut **tx)
    .await
    .map_err(db_err)?
    .rows_affected();
    Ok(swept)
}

async fn rows_for_key(
    tx: &mut Transaction<'_, Postgres>,
    bus_id: Uuid,
    seat_number: &str,
    journey_date: NaiveDate,
) -> Result<Vec<Reservation<JourneyDate>>, LedgerError> {
    let query = format!(
        "SELECT {SEAT_COLUMNS} FROM seat_reservations \
         WHERE bus_id = $1 AND seat_number = $2 AND journey_date = $3 FOR UPDATE"
    );
    let rows: Vec<SeatRow> = sqlx::query_as(&query)
        .bind(bus_id)
        .bind(seat_number)
        .bind(journey_date)
        .fetch_all(&mut **tx)
        .await
        .map_err(db_err)?;
    rows.into_iter().map(SeatRow::into_reservation).collect()
}

#[async_trait]
impl ReservationLedger<JourneyDate> for PgSeatLedger {
    async fn hold(&self, req: HoldRequest<JourneyDate>) -> Result<HoldOutcome, LedgerError> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        reap(&mut tx, req.resource_id, req.now).await?;

        let mut outcome = HoldOutcome::default();
        for unit in &req.unit_numbers {
            let existing = rows_for_key(&mut tx, req.resource_id, unit, req.validity.0).await?;
            match evaluate_claim(&existing, &req.validity, &req.hold_token, &req.user_id, req.now)
            {
                ClaimDecision::Insert => {
                    let inserted = sqlx::query(
                        "INSERT INTO seat_reservations \
                         (id, bus_id, seat_number, journey_date, status, hold_token, \
                          hold_expires_at, user_id, trip_id, created_at, updated_at) \
                         VALUES ($1, $2, $3, $4, 'HELD', $5, $6, $7, $8, $9, $9) \
                         ON CONFLICT ON CONSTRAINT uq_seat_claim DO NOTHING",
                    )
                    .bind(Uuid::new_v4())
                    .bind(req.resource_id)
                    .bind(unit)
                    .bind(req.validity.0)
                    .bind(&req.hold_token)
                    .bind(req.expires_at)
                    .bind(&req.user_id)
                    .bind(req.trip_id)
                    .bind(req.now)
                    .execute(&mut *tx)
                    .await
                    .map_err(db_err)?
                    .rows_affected();

                    if inserted == 1 {
                        outcome.held.push(unit.clone());
                    } else {
                        // A concurrent transaction claimed the key first.
                        outcome
                            .rejected
                            .push(UnitRejection::new(unit.clone(), RejectReason::HeldByOther));
                    }
                }
                ClaimDecision::Regrant { row_id } | ClaimDecision::Supersede { row_id } => {
                    sqlx::query(
                        "UPDATE seat_reservations SET status = 'HELD', hold_token = $2, \
                         hold_expires_at = $3, user_id = $4, trip_id = $5, payment_id = NULL, \
                         booking_id = NULL, updated_at = $6 WHERE id = $1",
                    )
                    .bind(row_id)
                    .bind(&req.hold_token)
                    .bind(req.expires_at)
                    .bind(&req.user_id)
                    .bind(req.trip_id)
                    .bind(req.now)
                    .execute(&mut *tx)
                    .await
                    .map_err(db_err)?;
                    outcome.held.push(unit.clone());
                }
                ClaimDecision::Reject(reason) => {
                    outcome
                        .rejected
                        .push(UnitRejection::new(unit.clone(), reason));
                }
            }
        }

        tx.commit().await.map_err(db_err)?;
        Ok(outcome)
    }

    async fn renew(&self, req: RenewRequest) -> Result<DateTime<Utc>, LedgerError> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        reap(&mut tx, req.resource_id, req.now).await?;

        let renewed = sqlx::query(
            "UPDATE seat_reservations SET hold_expires_at = $3, \
             payment_id = COALESCE($4, payment_id), updated_at = $5 \
             WHERE bus_id = $1 AND hold_token = $2 AND status = 'HELD'",
        )
        .bind(req.resource_id)
        .bind(&req.hold_token)
        .bind(req.new_expires_at)
        .bind(req.payment_id)
        .bind(req.now)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?
        .rows_affected();

        if renewed == 0 {
            let saw_expired: bool = sqlx::query_scalar(
                "SELECT EXISTS(SELECT 1 FROM seat_reservations \
                 WHERE bus_id = $1 AND hold_token = $2 AND status = 'EXPIRED')",
            )
            .bind(req.resource_id)
            .bind(&req.hold_token)
            .fetch_one(&mut *tx)
            .await
            .map_err(db_err)?;

            return Err(if saw_expired {
                LedgerError::HoldExpired
            } else {
                LedgerError::HoldMismatch
            });
        }

        tx.commit().await.map_err(db_err)?;
        Ok(req.new_expires_at)
    }

    async fn confirm(
        &self,
        req: ConfirmRequest<JourneyDate>,
    ) -> Result<ConfirmOutcome<JourneyDate>, LedgerError> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        reap(&mut tx, req.resource_id, req.now).await?;

        let mut outcome = ConfirmOutcome {
            confirmed: Vec::new(),
            conflicts: Vec::new(),
        };

        for (validity, units) in &req.legs {
            for unit in units {
                let existing = rows_for_key(&mut tx, req.resource_id, unit, validity.0).await?;
                match evaluate_confirm(&existing, validity, &req.hold_token, &req.user_id, req.now)
                {
                    ConfirmDecision::Confirm { row_id } => {
                        sqlx::query(
                            "UPDATE seat_reservations SET status = 'BOOKED', \
                             hold_expires_at = NULL, booking_id = $2, \
                             payment_id = COALESCE($3, payment_id), updated_at = $4 \
                             WHERE id = $1",
                        )
                        .bind(row_id)
                        .bind(req.booking_id)
                        .bind(req.payment_id)
                        .bind(req.now)
                        .execute(&mut *tx)
                        .await
                        .map_err(db_err)?;
                        outcome.confirmed.push(LegUnit {
                            validity: *validity,
                            unit: unit.clone(),
                        });
                    }
                    ConfirmDecision::AlreadyConfirmed => {
                        outcome.confirmed.push(LegUnit {
                            validity: *validity,
                            unit: unit.clone(),
                        });
                    }
                    ConfirmDecision::Conflict(reason) => {
                        outcome.conflicts.push(LegConflict {
                            validity: *validity,
                            unit: unit.clone(),
                            reason,
                        });
                    }
                }
            }
        }

        tx.commit().await.map_err(db_err)?;
        Ok(outcome)
    }

    async fn release(&self, filter: ReleaseFilter<JourneyDate>) -> Result<u64, LedgerError> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        reap(&mut tx, filter.resource_id, filter.now).await?;

        let released = sqlx::query(
            "UPDATE seat_reservations SET status = 'RELEASED', hold_token = NULL, \
             hold_expires_at = NULL, payment_id = NULL, updated_at = $3 \
             WHERE bus_id = $1 AND hold_token = $2 AND status = 'HELD' \
               AND ($4::date IS NULL OR journey_date = $4) \
               AND ($5::text[] IS NULL OR seat_number = ANY($5))",
        )
        .bind(filter.resource_id)
        .bind(&filter.hold_token)
        .bind(filter.now)
        .bind(filter.validity.map(|v| v.0))
        .bind(filter.unit_numbers)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?
        .rows_affected();

        tx.commit().await.map_err(db_err)?;
        Ok(released)
    }

    async fn reap_expired(
        &self,
        resource_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<u64, LedgerError> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        let swept = reap(&mut tx, resource_id, now).await?;
        tx.commit().await.map_err(db_err)?;
        Ok(swept)
    }

    async fn active_claims(
        &self,
        resource_id: Uuid,
        validity: &JourneyDate,
        now: DateTime<Utc>,
    ) -> Result<Vec<Reservation<JourneyDate>>, LedgerError> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        reap(&mut tx, resource_id, now).await?;

        let query = format!(
            "SELECT {SEAT_COLUMNS} FROM seat_reservations \
             WHERE bus_id = $1 AND journey_date = $2 AND status IN ('HELD', 'BOOKED')"
        );
        let rows: Vec<SeatRow> = sqlx::query_as(&query)
            .bind(resource_id)
            .bind(validity.0)
            .fetch_all(&mut *tx)
            .await
            .map_err(db_err)?;

        tx.commit().await.map_err(db_err)?;
        rows.into_iter().map(SeatRow::into_reservation).collect()
    }

    async fn hold_owner(
        &self,
        resource_id: Uuid,
        hold_token: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<String>, LedgerError> {
        sqlx::query_scalar(
            "SELECT user_id FROM seat_reservations \
             WHERE bus_id = $1 AND hold_token = $2 AND status = 'HELD' \
               AND hold_expires_at > $3 LIMIT 1",
        )
        .bind(resource_id)
        .bind(hold_token)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)
    }
}
