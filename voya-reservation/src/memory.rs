//! In-memory ledger backend. One mutex acquisition per operation plays the
//! role the database transaction plays in the Postgres backend: claims for a
//! resource serialize, so racing callers cannot both observe "available".

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Mutex;
use uuid::Uuid;

use voya_domain::{Reservation, ReservationStatus, UnitRejection, ValidityKey};

use crate::claim::{evaluate_claim, evaluate_confirm, ClaimDecision, ConfirmDecision};
use crate::ledger::{
    ConfirmOutcome, ConfirmRequest, HoldOutcome, HoldRequest, LegConflict, LegUnit,
    ReleaseFilter, RenewRequest, ReservationLedger,
};
use crate::LedgerError;

#[derive(Debug, Default)]
pub struct MemoryLedger<K> {
    rows: Mutex<Vec<Reservation<K>>>,
}

impl<K: ValidityKey> MemoryLedger<K> {
    pub fn new() -> Self {
        Self {
            rows: Mutex::new(Vec::new()),
        }
    }

    /// Test/ops hook: a raw snapshot of every row for a resource.
    pub fn rows_for(&self, resource_id: Uuid) -> Vec<Reservation<K>> {
        self.rows
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.resource_id == resource_id)
            .cloned()
            .collect()
    }

    fn reap_locked(
        rows: &mut Vec<Reservation<K>>,
        resource_id: Uuid,
        now: DateTime<Utc>,
    ) -> u64 {
        let mut reaped = 0;
        for row in rows
            .iter_mut()
            .filter(|r| r.resource_id == resource_id && r.is_expired_hold(now))
        {
            row.status = ReservationStatus::Expired;
            row.updated_at = now;
            reaped += 1;
        }
        reaped
    }
}

#[async_trait]
impl<K: ValidityKey> ReservationLedger<K> for MemoryLedger<K> {
    async fn hold(&self, req: HoldRequest<K>) -> Result<HoldOutcome, LedgerError> {
        let mut rows = self.rows.lock().unwrap();
        Self::reap_locked(&mut rows, req.resource_id, req.now);

        let mut outcome = HoldOutcome::default();
        for unit in &req.unit_numbers {
            let unit_rows: Vec<Reservation<K>> = rows
                .iter()
                .filter(|r| r.resource_id == req.resource_id && r.unit_number == *unit)
                .cloned()
                .collect();

            match evaluate_claim(&unit_rows, &req.validity, &req.hold_token, &req.user_id, req.now)
            {
                ClaimDecision::Insert => {
                    rows.push(Reservation {
                        id: Uuid::new_v4(),
                        resource_id: req.resource_id,
                        unit_number: unit.clone(),
                        validity: req.validity.clone(),
                        status: ReservationStatus::Held,
                        hold_token: Some(req.hold_token.clone()),
                        hold_expires_at: Some(req.expires_at),
                        user_id: req.user_id.clone(),
                        trip_id: req.trip_id,
                        payment_id: None,
                        booking_id: None,
                        created_at: req.now,
                        updated_at: req.now,
                    });
                    outcome.held.push(unit.clone());
                }
                ClaimDecision::Regrant { row_id } | ClaimDecision::Supersede { row_id } => {
                    let row = rows
                        .iter_mut()
                        .find(|r| r.id == row_id)
                        .ok_or_else(|| LedgerError::Storage("claim row vanished".into()))?;
                    row.status = ReservationStatus::Held;
                    row.validity = req.validity.clone();
                    row.hold_token = Some(req.hold_token.clone());
                    row.hold_expires_at = Some(req.expires_at);
                    row.user_id = req.user_id.clone();
                    row.trip_id = req.trip_id;
                    row.payment_id = None;
                    row.booking_id = None;
                    row.updated_at = req.now;
                    outcome.held.push(unit.clone());
                }
                ClaimDecision::Reject(reason) => {
                    outcome.rejected.push(UnitRejection::new(unit.clone(), reason));
                }
            }
        }
        Ok(outcome)
    }

    async fn renew(&self, req: RenewRequest) -> Result<DateTime<Utc>, LedgerError> {
        let mut rows = self.rows.lock().unwrap();
        Self::reap_locked(&mut rows, req.resource_id, req.now);

        let mut renewed = 0;
        let mut saw_expired = false;
        for row in rows
            .iter_mut()
            .filter(|r| r.resource_id == req.resource_id && r.token_matches(&req.hold_token))
        {
            if row.is_live_hold(req.now) {
                row.hold_expires_at = Some(req.new_expires_at);
                if req.payment_id.is_some() {
                    row.payment_id = req.payment_id;
                }
                row.updated_at = req.now;
                renewed += 1;
            } else if row.status == ReservationStatus::Expired {
                saw_expired = true;
            }
        }

        match renewed {
            0 if saw_expired => Err(LedgerError::HoldExpired),
            0 => Err(LedgerError::HoldMismatch),
            _ => Ok(req.new_expires_at),
        }
    }

    async fn confirm(&self, req: ConfirmRequest<K>) -> Result<ConfirmOutcome<K>, LedgerError> {
        let mut rows = self.rows.lock().unwrap();
        Self::reap_locked(&mut rows, req.resource_id, req.now);

        let mut outcome = ConfirmOutcome {
            confirmed: Vec::new(),
            conflicts: Vec::new(),
        };

        for (validity, units) in &req.legs {
            for unit in units {
                let unit_rows: Vec<Reservation<K>> = rows
                    .iter()
                    .filter(|r| r.resource_id == req.resource_id && r.unit_number == *unit)
                    .cloned()
                    .collect();

                match evaluate_confirm(&unit_rows, validity, &req.hold_token, &req.user_id, req.now)
                {
                    ConfirmDecision::Confirm { row_id } => {
                        let row = rows
                            .iter_mut()
                            .find(|r| r.id == row_id)
                            .ok_or_else(|| LedgerError::Storage("claim row vanished".into()))?;
                        row.status = ReservationStatus::Booked;
                        row.hold_expires_at = None;
                        row.booking_id = req.booking_id;
                        if req.payment_id.is_some() {
                            row.payment_id = req.payment_id;
                        }
                        row.updated_at = req.now;
                        outcome.confirmed.push(LegUnit {
                            validity: validity.clone(),
                            unit: unit.clone(),
                        });
                    }
                    ConfirmDecision::AlreadyConfirmed => {
                        outcome.confirmed.push(LegUnit {
                            validity: validity.clone(),
                            unit: unit.clone(),
                        });
                    }
                    ConfirmDecision::Conflict(reason) => {
                        outcome.conflicts.push(LegConflict {
                            validity: validity.clone(),
                            unit: unit.clone(),
                            reason,
                        });
                    }
                }
            }
        }
        Ok(outcome)
    }

    async fn release(&self, filter: ReleaseFilter<K>) -> Result<u64, LedgerError> {
        let mut rows = self.rows.lock().unwrap();
        Self::reap_locked(&mut rows, filter.resource_id, filter.now);

        let mut released = 0;
        for row in rows.iter_mut().filter(|r| {
            r.resource_id == filter.resource_id
                && r.status == ReservationStatus::Held
                && r.token_matches(&filter.hold_token)
        }) {
            if let Some(validity) = &filter.validity {
                if !row.validity.conflicts_with(validity) {
                    continue;
                }
            }
            if let Some(units) = &filter.unit_numbers {
                if !units.contains(&row.unit_number) {
                    continue;
                }
            }
            row.status = ReservationStatus::Released;
            row.hold_token = None;
            row.hold_expires_at = None;
            row.payment_id = None;
            row.updated_at = filter.now;
            released += 1;
        }
        Ok(released)
    }

    async fn reap_expired(
        &self,
        resource_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<u64, LedgerError> {
        let mut rows = self.rows.lock().unwrap();
        Ok(Self::reap_locked(&mut rows, resource_id, now))
    }

    async fn active_claims(
        &self,
        resource_id: Uuid,
        validity: &K,
        now: DateTime<Utc>,
    ) -> Result<Vec<Reservation<K>>, LedgerError> {
        let mut rows = self.rows.lock().unwrap();
        Self::reap_locked(&mut rows, resource_id, now);

        Ok(rows
            .iter()
            .filter(|r| {
                r.resource_id == resource_id
                    && r.validity.conflicts_with(validity)
                    && r.is_active(now)
            })
            .cloned()
            .collect())
    }

    async fn hold_owner(
        &self,
        resource_id: Uuid,
        hold_token: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<String>, LedgerError> {
        let rows = self.rows.lock().unwrap();
        Ok(rows
            .iter()
            .find(|r| {
                r.resource_id == resource_id
                    && r.token_matches(hold_token)
                    && r.is_live_hold(now)
            })
            .map(|r| r.user_id.clone()))
    }
}
