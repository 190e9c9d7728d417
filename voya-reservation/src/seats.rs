use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use voya_domain::catalog::SeatCatalog;
use voya_domain::clock::Clock;
use voya_domain::{
    ConflictReport, JourneyDate, RejectReason, ReservationError, ReservationResult,
    ReservationStatus, UnitRejection,
};

use crate::ledger::{
    ConfirmRequest, HoldRequest, ReleaseFilter, RenewRequest, ReservationLedger,
};
use crate::HoldPolicy;

#[derive(Debug, Clone, Deserialize)]
pub struct HoldSeatsRequest {
    pub bus_id: Uuid,
    pub journey_date: NaiveDate,
    pub seat_numbers: Vec<String>,
    pub hold_token: Option<String>,
    pub user_id: String,
    pub trip_id: Uuid,
}

#[derive(Debug, Clone, Serialize)]
pub struct SeatHoldGrant {
    pub hold_token: String,
    pub expires_at: DateTime<Utc>,
    pub held: Vec<String>,
    pub rejected: Vec<UnitRejection>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeatLeg {
    pub journey_date: NaiveDate,
    pub seat_numbers: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ConfirmSeatsRequest {
    pub bus_id: Uuid,
    pub hold_token: String,
    pub user_id: String,
    pub trip_id: Uuid,
    pub legs: Vec<SeatLeg>,
    pub booking_id: Option<Uuid>,
    pub payment_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConfirmedSeat {
    pub journey_date: NaiveDate,
    pub seat_number: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SeatConfirmation {
    pub confirmed: Vec<ConfirmedSeat>,
}

#[derive(Debug, Clone)]
pub struct ReleaseSeatsRequest {
    pub bus_id: Uuid,
    pub hold_token: String,
    pub user_id: String,
    pub is_admin: bool,
    pub journey_date: Option<NaiveDate>,
    pub seat_numbers: Option<Vec<String>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UnitState {
    Available,
    Held,
    Booked,
}

#[derive(Debug, Clone, Serialize)]
pub struct SeatView {
    pub seat_number: String,
    pub status: UnitState,
    pub is_own_hold: bool,
}

/// Hold/confirm/release state machine for bus seats, one claimable instance
/// per seat per journey date.
pub struct SeatReservationManager {
    ledger: Arc<dyn ReservationLedger<JourneyDate>>,
    catalog: Arc<dyn SeatCatalog>,
    policy: HoldPolicy,
    clock: Arc<dyn Clock>,
}

impl SeatReservationManager {
    pub fn new(
        ledger: Arc<dyn ReservationLedger<JourneyDate>>,
        catalog: Arc<dyn SeatCatalog>,
        policy: HoldPolicy,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            ledger,
            catalog,
            policy,
            clock,
        }
    }

    /// Attempts every requested seat independently. At least one grant makes
    /// the call a success with both lists; zero grants is a conflict carrying
    /// the per-seat rejection reasons.
    pub async fn hold_seats(&self, req: HoldSeatsRequest) -> ReservationResult<SeatHoldGrant> {
        if req.seat_numbers.is_empty() {
            return Err(ReservationError::Validation(
                "at least one seat number is required".to_string(),
            ));
        }

        let bus = self
            .catalog
            .bus(req.bus_id)
            .await
            .map_err(|e| ReservationError::Ledger(e.to_string()))?
            .ok_or_else(|| ReservationError::NotFound(format!("bus {}", req.bus_id)))?;

        let mut requested = Vec::new();
        let mut rejected = Vec::new();
        for seat in &req.seat_numbers {
            if requested.contains(seat) {
                continue;
            }
            if bus.has_seat(seat) {
                requested.push(seat.clone());
            } else {
                rejected.push(UnitRejection::new(seat.clone(), RejectReason::NotFound));
            }
        }

        let hold_token = req
            .hold_token
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let now = self.clock.now();
        let expires_at = now + Duration::seconds(self.policy.hold_seconds);

        let mut held = Vec::new();
        if !requested.is_empty() {
            let outcome = self
                .ledger
                .hold(HoldRequest {
                    resource_id: req.bus_id,
                    validity: JourneyDate(req.journey_date),
                    unit_numbers: requested,
                    hold_token: hold_token.clone(),
                    user_id: req.user_id.clone(),
                    trip_id: req.trip_id,
                    expires_at,
                    now,
                })
                .await?;
            held = outcome.held;
            rejected.extend(outcome.rejected);
        }

        debug!(
            bus_id = %req.bus_id,
            date = %req.journey_date,
            held = held.len(),
            rejected = rejected.len(),
            "seat hold attempted"
        );

        if held.is_empty() {
            return Err(ReservationError::Conflict(ConflictReport::new(
                "no requested seat could be held",
                rejected,
            )));
        }

        Ok(SeatHoldGrant {
            hold_token,
            expires_at,
            held,
            rejected,
        })
    }

    /// Converts held seats into booking-linked claims. Every leg and seat is
    /// evaluated; any conflict fails the call, with the confirmed subset
    /// reported alongside for diagnostics.
    pub async fn confirm_seats(
        &self,
        req: ConfirmSeatsRequest,
    ) -> ReservationResult<SeatConfirmation> {
        if req.legs.is_empty() || req.legs.iter().all(|l| l.seat_numbers.is_empty()) {
            return Err(ReservationError::Validation(
                "at least one leg with seat numbers is required".to_string(),
            ));
        }

        let now = self.clock.now();
        let outcome = self
            .ledger
            .confirm(ConfirmRequest {
                resource_id: req.bus_id,
                hold_token: req.hold_token.clone(),
                user_id: req.user_id.clone(),
                legs: req
                    .legs
                    .iter()
                    .map(|l| (JourneyDate(l.journey_date), l.seat_numbers.clone()))
                    .collect(),
                booking_id: req.booking_id,
                payment_id: req.payment_id,
                now,
            })
            .await?;

        let confirmed: Vec<ConfirmedSeat> = outcome
            .confirmed
            .iter()
            .map(|c| ConfirmedSeat {
                journey_date: c.validity.0,
                seat_number: c.unit.clone(),
            })
            .collect();

        if !outcome.conflicts.is_empty() {
            let rejections = outcome
                .conflicts
                .iter()
                .map(|c| UnitRejection::new(c.unit.clone(), c.reason))
                .collect();
            let succeeded = confirmed.iter().map(|c| c.seat_number.clone()).collect();
            return Err(ReservationError::Conflict(
                ConflictReport::new("one or more seats could not be confirmed", rejections)
                    .with_succeeded(succeeded),
            ));
        }

        Ok(SeatConfirmation { confirmed })
    }

    /// Idempotent. Only the hold's owner or an admin may release; strangers
    /// are rejected before the ledger is touched.
    pub async fn release_seats(&self, req: ReleaseSeatsRequest) -> ReservationResult<u64> {
        let now = self.clock.now();

        if !req.is_admin {
            if let Some(owner) = self
                .ledger
                .hold_owner(req.bus_id, &req.hold_token, now)
                .await?
            {
                if owner != req.user_id {
                    return Err(ReservationError::Forbidden(
                        "hold belongs to another booker".to_string(),
                    ));
                }
            }
        }

        let released = self
            .ledger
            .release(ReleaseFilter {
                resource_id: req.bus_id,
                hold_token: req.hold_token,
                validity: req.journey_date.map(JourneyDate),
                unit_numbers: req.seat_numbers,
                now,
            })
            .await?;

        debug!(bus_id = %req.bus_id, released, "seat hold released");
        Ok(released)
    }

    /// Payment collaborator entry point: extends the hold and links the
    /// payment intent to it.
    pub async fn renew_hold(
        &self,
        bus_id: Uuid,
        hold_token: &str,
        payment_id: Option<Uuid>,
    ) -> ReservationResult<DateTime<Utc>> {
        let now = self.clock.now();
        let new_expires_at = now + Duration::seconds(self.policy.payment_extension_seconds);
        let expires_at = self
            .ledger
            .renew(RenewRequest {
                resource_id: bus_id,
                hold_token: hold_token.to_string(),
                new_expires_at,
                payment_id,
                now,
            })
            .await?;
        Ok(expires_at)
    }

    /// Read projection of every seat for a journey date. Runs the reap, then
    /// classifies; no other side effects.
    pub async fn seat_map(
        &self,
        bus_id: Uuid,
        journey_date: NaiveDate,
        viewer_user_id: &str,
        known_hold_token: Option<&str>,
    ) -> ReservationResult<Vec<SeatView>> {
        let bus = self
            .catalog
            .bus(bus_id)
            .await
            .map_err(|e| ReservationError::Ledger(e.to_string()))?
            .ok_or_else(|| ReservationError::NotFound(format!("bus {}", bus_id)))?;

        let now = self.clock.now();
        let claims = self
            .ledger
            .active_claims(bus_id, &JourneyDate(journey_date), now)
            .await?;

        let by_seat: HashMap<&str, _> = claims
            .iter()
            .map(|c| (c.unit_number.as_str(), c))
            .collect();

        Ok(bus
            .seat_numbers()
            .map(|seat| match by_seat.get(seat.as_str()) {
                Some(claim) if claim.status == ReservationStatus::Booked => SeatView {
                    seat_number: seat,
                    status: UnitState::Booked,
                    is_own_hold: false,
                },
                Some(claim) => SeatView {
                    is_own_hold: claim.user_id == viewer_user_id
                        || known_hold_token
                            .map(|t| claim.token_matches(t))
                            .unwrap_or(false),
                    seat_number: seat,
                    status: UnitState::Held,
                },
                None => SeatView {
                    seat_number: seat,
                    status: UnitState::Available,
                    is_own_hold: false,
                },
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use voya_domain::catalog::Bus;
    use voya_domain::clock::ManualClock;

    use crate::memory::MemoryLedger;

    struct OneBusCatalog {
        bus: Bus,
    }

    #[async_trait]
    impl SeatCatalog for OneBusCatalog {
        async fn bus(
            &self,
            bus_id: Uuid,
        ) -> Result<Option<Bus>, Box<dyn std::error::Error + Send + Sync>> {
            Ok((bus_id == self.bus.id).then(|| self.bus.clone()))
        }
    }

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 11, 20, 12, 0, 0).unwrap()
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 12, d).unwrap()
    }

    fn manager(capacity: u32) -> (SeatReservationManager, Uuid, Arc<ManualClock>) {
        let bus_id = Uuid::new_v4();
        let clock = Arc::new(ManualClock::new(start()));
        let manager = SeatReservationManager::new(
            Arc::new(MemoryLedger::new()),
            Arc::new(OneBusCatalog {
                bus: Bus {
                    id: bus_id,
                    name: "Night Coach".to_string(),
                    capacity,
                },
            }),
            HoldPolicy::default(),
            clock.clone(),
        );
        (manager, bus_id, clock)
    }

    fn hold_req(bus_id: Uuid, seats: &[&str], user: &str) -> HoldSeatsRequest {
        HoldSeatsRequest {
            bus_id,
            journey_date: day(1),
            seat_numbers: seats.iter().map(|s| s.to_string()).collect(),
            hold_token: None,
            user_id: user.to_string(),
            trip_id: Uuid::new_v4(),
        }
    }

    #[tokio::test]
    async fn partial_success_reports_both_lists() {
        let (manager, bus_id, _clock) = manager(40);

        // Bob books seat 2 first.
        let bob = manager.hold_seats(hold_req(bus_id, &["2"], "bob")).await.unwrap();
        manager
            .confirm_seats(ConfirmSeatsRequest {
                bus_id,
                hold_token: bob.hold_token.clone(),
                user_id: "bob".to_string(),
                trip_id: Uuid::new_v4(),
                legs: vec![SeatLeg {
                    journey_date: day(1),
                    seat_numbers: vec!["2".to_string()],
                }],
                booking_id: Some(Uuid::new_v4()),
                payment_id: None,
            })
            .await
            .unwrap();

        let grant = manager
            .hold_seats(hold_req(bus_id, &["1", "2", "3"], "alice"))
            .await
            .unwrap();
        assert_eq!(grant.held, vec!["1", "3"]);
        assert_eq!(grant.rejected.len(), 1);
        assert_eq!(grant.rejected[0].unit, "2");
        assert_eq!(grant.rejected[0].reason, RejectReason::AlreadyBooked);
    }

    #[tokio::test]
    async fn all_rejected_is_a_conflict() {
        let (manager, bus_id, _clock) = manager(40);

        manager.hold_seats(hold_req(bus_id, &["5"], "bob")).await.unwrap();

        let err = manager
            .hold_seats(hold_req(bus_id, &["5"], "alice"))
            .await
            .unwrap_err();
        match err {
            ReservationError::Conflict(report) => {
                assert_eq!(report.rejections.len(), 1);
                assert_eq!(report.rejections[0].reason, RejectReason::HeldByOther);
            }
            other => panic!("expected conflict, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn out_of_range_seat_is_rejected_per_unit() {
        let (manager, bus_id, _clock) = manager(10);

        let grant = manager
            .hold_seats(hold_req(bus_id, &["9", "11"], "alice"))
            .await
            .unwrap();
        assert_eq!(grant.held, vec!["9"]);
        assert_eq!(grant.rejected[0].unit, "11");
        assert_eq!(grant.rejected[0].reason, RejectReason::NotFound);
    }

    #[tokio::test]
    async fn same_token_retry_is_idempotent() {
        let (manager, bus_id, _clock) = manager(40);

        let first = manager.hold_seats(hold_req(bus_id, &["4"], "alice")).await.unwrap();

        let mut retry = hold_req(bus_id, &["4"], "alice");
        retry.hold_token = Some(first.hold_token.clone());
        let second = manager.hold_seats(retry).await.unwrap();
        assert_eq!(second.held, vec!["4"]);
        assert!(second.rejected.is_empty());
    }

    #[tokio::test]
    async fn expired_hold_reads_available_and_is_reclaimable() {
        let (manager, bus_id, clock) = manager(10);

        manager.hold_seats(hold_req(bus_id, &["3"], "alice")).await.unwrap();
        clock.advance(Duration::seconds(HoldPolicy::default().hold_seconds + 1));

        let map = manager.seat_map(bus_id, day(1), "carol", None).await.unwrap();
        let seat3 = map.iter().find(|s| s.seat_number == "3").unwrap();
        assert_eq!(seat3.status, UnitState::Available);

        let retry = manager.hold_seats(hold_req(bus_id, &["3"], "bob")).await.unwrap();
        assert_eq!(retry.held, vec!["3"]);
    }

    #[tokio::test]
    async fn confirm_with_expired_hold_fails_and_does_not_book() {
        let (manager, bus_id, clock) = manager(10);

        let grant = manager.hold_seats(hold_req(bus_id, &["3"], "alice")).await.unwrap();
        clock.advance(Duration::seconds(HoldPolicy::default().hold_seconds + 1));

        let err = manager
            .confirm_seats(ConfirmSeatsRequest {
                bus_id,
                hold_token: grant.hold_token,
                user_id: "alice".to_string(),
                trip_id: Uuid::new_v4(),
                legs: vec![SeatLeg {
                    journey_date: day(1),
                    seat_numbers: vec!["3".to_string()],
                }],
                booking_id: Some(Uuid::new_v4()),
                payment_id: None,
            })
            .await
            .unwrap_err();
        match err {
            ReservationError::Conflict(report) => {
                assert_eq!(report.rejections[0].reason, RejectReason::HoldExpired);
                assert!(report.succeeded.is_empty());
            }
            other => panic!("expected conflict, got {:?}", other),
        }

        let map = manager.seat_map(bus_id, day(1), "alice", None).await.unwrap();
        let seat3 = map.iter().find(|s| s.seat_number == "3").unwrap();
        assert_ne!(seat3.status, UnitState::Booked);
    }

    #[tokio::test]
    async fn renew_extends_expiry_then_confirm_succeeds() {
        let (manager, bus_id, clock) = manager(10);

        let grant = manager.hold_seats(hold_req(bus_id, &["6"], "alice")).await.unwrap();

        let payment_id = Uuid::new_v4();
        let extended = manager
            .renew_hold(bus_id, &grant.hold_token, Some(payment_id))
            .await
            .unwrap();
        assert!(extended > grant.expires_at);

        // Past the original expiry but inside the payment extension.
        clock.advance(Duration::seconds(HoldPolicy::default().hold_seconds + 60));

        let confirmation = manager
            .confirm_seats(ConfirmSeatsRequest {
                bus_id,
                hold_token: grant.hold_token,
                user_id: "alice".to_string(),
                trip_id: Uuid::new_v4(),
                legs: vec![SeatLeg {
                    journey_date: day(1),
                    seat_numbers: vec!["6".to_string()],
                }],
                booking_id: Some(Uuid::new_v4()),
                payment_id: Some(payment_id),
            })
            .await
            .unwrap();
        assert_eq!(confirmation.confirmed.len(), 1);
    }

    #[tokio::test]
    async fn stranger_cannot_release_non_admin() {
        let (manager, bus_id, _clock) = manager(10);

        let grant = manager.hold_seats(hold_req(bus_id, &["2"], "alice")).await.unwrap();

        let err = manager
            .release_seats(ReleaseSeatsRequest {
                bus_id,
                hold_token: grant.hold_token.clone(),
                user_id: "mallory".to_string(),
                is_admin: false,
                journey_date: None,
                seat_numbers: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ReservationError::Forbidden(_)));

        // An admin may sweep any hold.
        let released = manager
            .release_seats(ReleaseSeatsRequest {
                bus_id,
                hold_token: grant.hold_token,
                user_id: "ops".to_string(),
                is_admin: true,
                journey_date: None,
                seat_numbers: None,
            })
            .await
            .unwrap();
        assert_eq!(released, 1);
    }

    #[tokio::test]
    async fn releasing_unknown_token_is_a_noop() {
        let (manager, bus_id, _clock) = manager(10);

        let released = manager
            .release_seats(ReleaseSeatsRequest {
                bus_id,
                hold_token: "no-such-token".to_string(),
                user_id: "alice".to_string(),
                is_admin: false,
                journey_date: None,
                seat_numbers: None,
            })
            .await
            .unwrap();
        assert_eq!(released, 0);
    }

    #[tokio::test]
    async fn seat_map_marks_own_hold() {
        let (manager, bus_id, _clock) = manager(4);

        let grant = manager.hold_seats(hold_req(bus_id, &["2"], "alice")).await.unwrap();

        let map = manager
            .seat_map(bus_id, day(1), "someone-else", Some(grant.hold_token.as_str()))
            .await
            .unwrap();
        assert_eq!(map.len(), 4);
        let seat2 = map.iter().find(|s| s.seat_number == "2").unwrap();
        assert_eq!(seat2.status, UnitState::Held);
        assert!(seat2.is_own_hold);

        let blind = manager.seat_map(bus_id, day(1), "someone-else", None).await.unwrap();
        let seat2 = blind.iter().find(|s| s.seat_number == "2").unwrap();
        assert!(!seat2.is_own_hold);
    }

    #[tokio::test]
    async fn same_seat_is_independent_across_dates() {
        let (manager, bus_id, _clock) = manager(10);

        manager.hold_seats(hold_req(bus_id, &["1"], "alice")).await.unwrap();

        let mut other_day = hold_req(bus_id, &["1"], "bob");
        other_day.journey_date = day(2);
        let grant = manager.hold_seats(other_day).await.unwrap();
        assert_eq!(grant.held, vec!["1"]);
    }

    #[tokio::test]
    async fn empty_seat_list_is_a_validation_error() {
        let (manager, bus_id, _clock) = manager(10);
        let err = manager.hold_seats(hold_req(bus_id, &[], "alice")).await.unwrap_err();
        assert!(matches!(err, ReservationError::Validation(_)));
    }

    #[tokio::test]
    async fn unknown_bus_is_not_found() {
        let (manager, _bus_id, _clock) = manager(10);
        let err = manager
            .hold_seats(hold_req(Uuid::new_v4(), &["1"], "alice"))
            .await
            .unwrap_err();
        assert!(matches!(err, ReservationError::NotFound(_)));
    }
}
