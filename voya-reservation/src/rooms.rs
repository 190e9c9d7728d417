use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use voya_domain::catalog::{Room, RoomCatalog};
use voya_domain::clock::Clock;
use voya_domain::{
    ConflictReport, RejectReason, ReservationError, ReservationResult, ReservationStatus,
    StayRange, UnitRejection,
};

use crate::ledger::{
    ConfirmRequest, HoldRequest, ReleaseFilter, RenewRequest, ReservationLedger,
};
use crate::seats::UnitState;
use crate::HoldPolicy;

/// Either the caller names the rooms, or asks for a count and the manager
/// auto-assigns, preferring an unbroken numeric run.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RoomSelection {
    Numbers(Vec<String>),
    Count(u32),
}

#[derive(Debug, Clone)]
pub struct HoldRoomsRequest {
    pub hotel_id: Uuid,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub selection: RoomSelection,
    pub hold_token: Option<String>,
    pub user_id: String,
    pub trip_id: Uuid,
}

#[derive(Debug, Clone, Serialize)]
pub struct RoomHoldGrant {
    pub hold_token: String,
    pub expires_at: DateTime<Utc>,
    pub held: Vec<String>,
    pub rejected: Vec<UnitRejection>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RoomLeg {
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub room_numbers: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ConfirmRoomsRequest {
    pub hotel_id: Uuid,
    pub hold_token: String,
    pub user_id: String,
    pub trip_id: Uuid,
    pub legs: Vec<RoomLeg>,
    pub booking_id: Option<Uuid>,
    pub payment_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConfirmedRoom {
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub room_number: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RoomConfirmation {
    pub confirmed: Vec<ConfirmedRoom>,
}

#[derive(Debug, Clone)]
pub struct ReleaseRoomsRequest {
    pub hotel_id: Uuid,
    pub hold_token: String,
    pub user_id: String,
    pub is_admin: bool,
    /// Narrows the release to holds overlapping this stay.
    pub stay: Option<StayRange>,
    pub room_numbers: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RoomView {
    pub room_number: String,
    pub floor: i32,
    pub sleeps: i32,
    pub status: UnitState,
    pub is_own_hold: bool,
}

/// Hold/confirm/release state machine for hotel rooms. Claims are scoped to
/// half-open stay intervals; two claims on a room conflict when the
/// intervals overlap, not merely when they are equal.
pub struct RoomReservationManager {
    ledger: Arc<dyn ReservationLedger<StayRange>>,
    catalog: Arc<dyn RoomCatalog>,
    policy: HoldPolicy,
    clock: Arc<dyn Clock>,
}

impl RoomReservationManager {
    pub fn new(
        ledger: Arc<dyn ReservationLedger<StayRange>>,
        catalog: Arc<dyn RoomCatalog>,
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

    pub async fn hold_rooms(&self, req: HoldRoomsRequest) -> ReservationResult<RoomHoldGrant> {
        let stay = StayRange::new(req.check_in, req.check_out)?;

        self.catalog
            .hotel(req.hotel_id)
            .await
            .map_err(|e| ReservationError::Ledger(e.to_string()))?
            .ok_or_else(|| ReservationError::NotFound(format!("hotel {}", req.hotel_id)))?;
        let rooms = self
            .catalog
            .rooms(req.hotel_id)
            .await
            .map_err(|e| ReservationError::Ledger(e.to_string()))?;

        let hold_token = req
            .hold_token
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let now = self.clock.now();
        let expires_at = now + Duration::seconds(self.policy.hold_seconds);

        let mut rejected = Vec::new();
        let requested = match &req.selection {
            RoomSelection::Numbers(numbers) => {
                if numbers.is_empty() {
                    return Err(ReservationError::Validation(
                        "at least one room number is required".to_string(),
                    ));
                }
                let known: HashSet<&str> = rooms.iter().map(|r| r.number.as_str()).collect();
                let mut picked = Vec::new();
                for number in numbers {
                    if picked.contains(number) {
                        continue;
                    }
                    if known.contains(number.as_str()) {
                        picked.push(number.clone());
                    } else {
                        rejected.push(UnitRejection::new(number.clone(), RejectReason::NotFound));
                    }
                }
                picked
            }
            RoomSelection::Count(0) => {
                return Err(ReservationError::Validation(
                    "rooms_needed must be at least 1".to_string(),
                ));
            }
            RoomSelection::Count(needed) => {
                let available = self.available_rooms(req.hotel_id, &rooms, &stay, now).await?;
                if (available.len() as u32) < *needed {
                    return Err(ReservationError::Conflict(ConflictReport::new(
                        format!(
                            "not enough rooms: requested {}, available {}",
                            needed,
                            available.len()
                        ),
                        Vec::new(),
                    )));
                }
                assign_block(&available, *needed as usize)
            }
        };

        let mut held = Vec::new();
        if !requested.is_empty() {
            let outcome = self
                .ledger
                .hold(HoldRequest {
                    resource_id: req.hotel_id,
                    validity: stay,
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
            hotel_id = %req.hotel_id,
            stay = %stay,
            held = held.len(),
            rejected = rejected.len(),
            "room hold attempted"
        );

        if held.is_empty() {
            return Err(ReservationError::Conflict(ConflictReport::new(
                "no requested room could be held",
                rejected,
            )));
        }

        Ok(RoomHoldGrant {
            hold_token,
            expires_at,
            held,
            rejected,
        })
    }

    pub async fn confirm_rooms(
        &self,
        req: ConfirmRoomsRequest,
    ) -> ReservationResult<RoomConfirmation> {
        if req.legs.is_empty() || req.legs.iter().all(|l| l.room_numbers.is_empty()) {
            return Err(ReservationError::Validation(
                "at least one leg with room numbers is required".to_string(),
            ));
        }

        let mut legs = Vec::with_capacity(req.legs.len());
        for leg in &req.legs {
            let stay = StayRange::new(leg.check_in, leg.check_out)?;
            legs.push((stay, leg.room_numbers.clone()));
        }

        let now = self.clock.now();
        let outcome = self
            .ledger
            .confirm(ConfirmRequest {
                resource_id: req.hotel_id,
                hold_token: req.hold_token.clone(),
                user_id: req.user_id.clone(),
                legs,
                booking_id: req.booking_id,
                payment_id: req.payment_id,
                now,
            })
            .await?;

        let confirmed: Vec<ConfirmedRoom> = outcome
            .confirmed
            .iter()
            .map(|c| ConfirmedRoom {
                check_in: c.validity.check_in(),
                check_out: c.validity.check_out(),
                room_number: c.unit.clone(),
            })
            .collect();

        if !outcome.conflicts.is_empty() {
            let rejections = outcome
                .conflicts
                .iter()
                .map(|c| UnitRejection::new(c.unit.clone(), c.reason))
                .collect();
            let succeeded = confirmed.iter().map(|c| c.room_number.clone()).collect();
            return Err(ReservationError::Conflict(
                ConflictReport::new("one or more rooms could not be confirmed", rejections)
                    .with_succeeded(succeeded),
            ));
        }

        Ok(RoomConfirmation { confirmed })
    }

    pub async fn release_rooms(&self, req: ReleaseRoomsRequest) -> ReservationResult<u64> {
        let now = self.clock.now();

        if !req.is_admin {
            if let Some(owner) = self
                .ledger
                .hold_owner(req.hotel_id, &req.hold_token, now)
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
                resource_id: req.hotel_id,
                hold_token: req.hold_token,
                validity: req.stay,
                unit_numbers: req.room_numbers,
                now,
            })
            .await?;

        debug!(hotel_id = %req.hotel_id, released, "room hold released");
        Ok(released)
    }

    pub async fn renew_hold(
        &self,
        hotel_id: Uuid,
        hold_token: &str,
        payment_id: Option<Uuid>,
    ) -> ReservationResult<DateTime<Utc>> {
        let now = self.clock.now();
        let new_expires_at = now + Duration::seconds(self.policy.payment_extension_seconds);
        let expires_at = self
            .ledger
            .renew(RenewRequest {
                resource_id: hotel_id,
                hold_token: hold_token.to_string(),
                new_expires_at,
                payment_id,
                now,
            })
            .await?;
        Ok(expires_at)
    }

    /// Read projection of every room over a stay interval, reap first.
    pub async fn room_availability(
        &self,
        hotel_id: Uuid,
        check_in: NaiveDate,
        check_out: NaiveDate,
        viewer_user_id: &str,
        known_hold_token: Option<&str>,
    ) -> ReservationResult<Vec<RoomView>> {
        let stay = StayRange::new(check_in, check_out)?;

        self.catalog
            .hotel(hotel_id)
            .await
            .map_err(|e| ReservationError::Ledger(e.to_string()))?
            .ok_or_else(|| ReservationError::NotFound(format!("hotel {}", hotel_id)))?;
        let mut rooms = self
            .catalog
            .rooms(hotel_id)
            .await
            .map_err(|e| ReservationError::Ledger(e.to_string()))?;
        sort_room_numbers_in_place(&mut rooms);

        let now = self.clock.now();
        let claims = self.ledger.active_claims(hotel_id, &stay, now).await?;

        let mut by_room: HashMap<&str, Vec<_>> = HashMap::new();
        for claim in &claims {
            by_room
                .entry(claim.unit_number.as_str())
                .or_default()
                .push(claim);
        }

        Ok(rooms
            .iter()
            .map(|room| {
                let claims = by_room.get(room.number.as_str());
                let booked = claims
                    .map(|cs| cs.iter().any(|c| c.status == ReservationStatus::Booked))
                    .unwrap_or(false);
                if booked {
                    return RoomView {
                        room_number: room.number.clone(),
                        floor: room.floor,
                        sleeps: room.sleeps,
                        status: UnitState::Booked,
                        is_own_hold: false,
                    };
                }
                match claims.and_then(|cs| cs.first()) {
                    Some(claim) => RoomView {
                        room_number: room.number.clone(),
                        floor: room.floor,
                        sleeps: room.sleeps,
                        status: UnitState::Held,
                        is_own_hold: claim.user_id == viewer_user_id
                            || known_hold_token
                                .map(|t| claim.token_matches(t))
                                .unwrap_or(false),
                    },
                    None => RoomView {
                        room_number: room.number.clone(),
                        floor: room.floor,
                        sleeps: room.sleeps,
                        status: UnitState::Available,
                        is_own_hold: false,
                    },
                }
            })
            .collect())
    }

    async fn available_rooms(
        &self,
        hotel_id: Uuid,
        rooms: &[Room],
        stay: &StayRange,
        now: DateTime<Utc>,
    ) -> ReservationResult<Vec<String>> {
        let claims = self.ledger.active_claims(hotel_id, stay, now).await?;
        let occupied: HashSet<&str> = claims.iter().map(|c| c.unit_number.as_str()).collect();

        let mut available: Vec<String> = rooms
            .iter()
            .filter(|r| !occupied.contains(r.number.as_str()))
            .map(|r| r.number.clone())
            .collect();
        sort_numbers_in_place(&mut available);
        Ok(available)
    }
}

/// Numeric ordering when every number parses, lexicographic otherwise.
fn sort_numbers_in_place(numbers: &mut [String]) {
    let all_numeric = numbers.iter().all(|n| n.parse::<u64>().is_ok());
    if all_numeric {
        numbers.sort_by_key(|n| n.parse::<u64>().unwrap_or(u64::MAX));
    } else {
        numbers.sort();
    }
}

fn sort_room_numbers_in_place(rooms: &mut [Room]) {
    let all_numeric = rooms.iter().all(|r| r.number.parse::<u64>().is_ok());
    if all_numeric {
        rooms.sort_by_key(|r| r.number.parse::<u64>().unwrap_or(u64::MAX));
    } else {
        rooms.sort_by(|a, b| a.number.cmp(&b.number));
    }
}

/// Picks `needed` rooms out of the sorted availability list: the first
/// unbroken numeric run when one exists, otherwise the first `needed` in
/// sorted order.
fn assign_block(available: &[String], needed: usize) -> Vec<String> {
    if needed == 0 || available.len() < needed {
        return Vec::new();
    }

    let numeric: Option<Vec<u64>> = available
        .iter()
        .map(|n| n.parse::<u64>().ok())
        .collect();

    if let Some(numbers) = numeric {
        for window in numbers.windows(needed) {
            let contiguous = window.windows(2).all(|pair| pair[1] == pair[0] + 1);
            if contiguous {
                return window.iter().map(|n| n.to_string()).collect();
            }
        }
    }

    available[..needed].to_vec()
}
