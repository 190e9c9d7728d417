use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use voya_domain::{RejectReason, Reservation, StayRange, UnitRejection};
use voya_reservation::claim::{evaluate_claim, evaluate_confirm, ClaimDecision, ConfirmDecision};
use voya_reservation::ledger::{
    ConfirmOutcome, ConfirmRequest, HoldOutcome, HoldRequest, LegConflict, LegUnit,
    ReleaseFilter, RenewRequest, ReservationLedger,
};
use voya_reservation::LedgerError;

const ROOM_COLUMNS: &str = "id, hotel_id, room_number, check_in, check_out, status, hold_token, \
     hold_expires_at, user_id, trip_id, payment_id, booking_id, created_at, updated_at";

/// Postgres ledger for interval-keyed room claims. An interval key cannot
/// carry a uniqueness constraint, so every claim first locks the room's
/// catalog row; concurrent transactions for the same room serialize there
/// and cannot both observe "no overlap".
pub struct PgRoomLedger {
    pool: PgPool,
}

impl PgRoomLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct RoomRow {
    id: Uuid,
    hotel_id: Uuid,
    room_number: String,
    check_in: NaiveDate,
    check_out: NaiveDate,
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

impl RoomRow {
    fn into_reservation(self) -> Result<Reservation<StayRange>, LedgerError> {
        let status = self.status.parse().map_err(LedgerError::Storage)?;
        let validity = StayRange::new(self.check_in, self.check_out)
            .map_err(|e| LedgerError::Storage(e.to_string()))?;
        Ok(Reservation {
            id: self.id,
            resource_id: self.hotel_id,
            unit_number: self.room_number,
            validity,
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
    hotel_id: Uuid,
    now: DateTime<Utc>,
) -> Result<u64, LedgerError> {
    let swept = sqlx::query(
        "UPDATE room_reservations SET status = 'EXPIRED', updated_at = $2 \
         WHERE hotel_id = $1 AND status = 'HELD' AND hold_expires_at <= $2",
    )
    .bind(hotel_id)
    .bind(now)
    .execute(&mut **tx)
    .await
    .map_err(db_err)?
    .rows_affected();
    Ok(swept)
}

/// Serialization point for claims on one room. Returns false when the room
/// is not in the catalog.
async fn lock_room(
    tx: &mut Transaction<'_, Postgres>,
    hotel_id: Uuid,
    room_number: &str,
) -> Result<bool, LedgerError> {
    let locked: Option<String> = sqlx::query_scalar(
        "SELECT room_number FROM rooms WHERE hotel_id = $1 AND room_number = $2 FOR UPDATE",
    )
    .bind(hotel_id)
    .bind(room_number)
    .fetch_optional(&mut **tx)
    .await
    .map_err(db_err)?;
    Ok(locked.is_some())
}

async fn overlapping_rows(
    tx: &mut Transaction<'_, Postgres>,
    hotel_id: Uuid,
    room_number: &str,
    stay: &StayRange,
) -> Result<Vec<Reservation<StayRange>>, LedgerError> {
    let query = format!(
        "SELECT {ROOM_COLUMNS} FROM room_reservations \
         WHERE hotel_id = $1 AND room_number = $2 \
           AND check_in < $4 AND check_out > $3 FOR UPDATE"
    );
    let rows: Vec<RoomRow> = sqlx::query_as(&query)
        .bind(hotel_id)
        .bind(room_number)
        .bind(stay.check_in())
        .bind(stay.check_out())
        .fetch_all(&mut **tx)
        .await
        .map_err(db_err)?;
    rows.into_iter().map(RoomRow::into_reservation).collect()
}

#[async_trait]
impl ReservationLedger<StayRange> for PgRoomLedger {
    async fn hold(&self, req: HoldRequest<StayRange>) -> Result<HoldOutcome, LedgerError> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        reap(&mut tx, req.resource_id, req.now).await?;

        let mut outcome = HoldOutcome::default();
        for unit in &req.unit_numbers {
            if !lock_room(&mut tx, req.resource_id, unit).await? {
                outcome
                    .rejected
                    .push(UnitRejection::new(unit.clone(), RejectReason::NotFound));
                continue;
            }

            let existing =
                overlapping_rows(&mut tx, req.resource_id, unit, &req.validity).await?;
            match evaluate_claim(&existing, &req.validity, &req.hold_token, &req.user_id, req.now)
            {
                ClaimDecision::Insert => {
                    sqlx::query(
                        "INSERT INTO room_reservations \
                         (id, hotel_id, room_number, check_in, check_out, status, hold_token, \
                          hold_expires_at, user_id, trip_id, created_at, updated_at) \
                         VALUES ($1, $2, $3, $4, $5, 'HELD', $6, $7, $8, $9, $10, $10)",
                    )
                    .bind(Uuid::new_v4())
                    .bind(req.resource_id)
                    .bind(unit)
                    .bind(req.validity.check_in())
                    .bind(req.validity.check_out())
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
                ClaimDecision::Regrant { row_id } | ClaimDecision::Supersede { row_id } => {
                    sqlx::query(
                        "UPDATE room_reservations SET status = 'HELD', check_in = $2, \
                         check_out = $3, hold_token = $4, hold_expires_at = $5, user_id = $6, \
                         trip_id = $7, payment_id = NULL, booking_id = NULL, updated_at = $8 \
                         WHERE id = $1",
                    )
                    .bind(row_id)
                    .bind(req.validity.check_in())
                    .bind(req.validity.check_out())
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
            "UPDATE room_reservations SET hold_expires_at = $3, \
             payment_id = COALESCE($4, payment_id), updated_at = $5 \
             WHERE hotel_id = $1 AND hold_token = $2 AND status = 'HELD'",
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
                "SELECT EXISTS(SELECT 1 FROM room_reservations \
                 WHERE hotel_id = $1 AND hold_token = $2 AND status = 'EXPIRED')",
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
        req: ConfirmRequest<StayRange>,
    ) -> Result<ConfirmOutcome<StayRange>, LedgerError> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        reap(&mut tx, req.resource_id, req.now).await?;

        let mut outcome = ConfirmOutcome {
            confirmed: Vec::new(),
            conflicts: Vec::new(),
        };

        for (validity, units) in &req.legs {
            for unit in units {
                let existing =
                    overlapping_rows(&mut tx, req.resource_id, unit, validity).await?;
                match evaluate_confirm(&existing, validity, &req.hold_token, &req.user_id, req.now)
                {
                    ConfirmDecision::Confirm { row_id } => {
                        sqlx::query(
                            "UPDATE room_reservations SET status = 'BOOKED', \
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

    async fn release(&self, filter: ReleaseFilter<StayRange>) -> Result<u64, LedgerError> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        reap(&mut tx, filter.resource_id, filter.now).await?;

        let (scope_ci, scope_co) = match filter.validity {
            Some(stay) => (Some(stay.check_in()), Some(stay.check_out())),
            None => (None, None),
        };

        let released = sqlx::query(
            "UPDATE room_reservations SET status = 'RELEASED', hold_token = NULL, \
             hold_expires_at = NULL, payment_id = NULL, updated_at = $3 \
             WHERE hotel_id = $1 AND hold_token = $2 AND status = 'HELD' \
               AND ($4::date IS NULL OR (check_in < $5 AND check_out > $4)) \
               AND ($6::text[] IS NULL OR room_number = ANY($6))",
        )
        .bind(filter.resource_id)
        .bind(&filter.hold_token)
        .bind(filter.now)
        .bind(scope_ci)
        .bind(scope_co)
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
        validity: &StayRange,
        now: DateTime<Utc>,
    ) -> Result<Vec<Reservation<StayRange>>, LedgerError> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        reap(&mut tx, resource_id, now).await?;

        let query = format!(
            "SELECT {ROOM_COLUMNS} FROM room_reservations \
             WHERE hotel_id = $1 AND check_in < $3 AND check_out > $2 \
               AND status IN ('HELD', 'BOOKED')"
        );
        let rows: Vec<RoomRow> = sqlx::query_as(&query)
            .bind(resource_id)
            .bind(validity.check_in())
            .bind(validity.check_out())
            .fetch_all(&mut *tx)
            .await
            .map_err(db_err)?;

        tx.commit().await.map_err(db_err)?;
        rows.into_iter().map(RoomRow::into_reservation).collect()
    }

    async fn hold_owner(
        &self,
        resource_id: Uuid,
        hold_token: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<String>, LedgerError> {
        sqlx::query_scalar(
            "SELECT user_id FROM room_reservations \
             WHERE hotel_id = $1 AND hold_token = $2 AND status = 'HELD' \
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
