use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::validity::ValidityKey;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReservationStatus {
    Held,
    Booked,
    Released,
    Expired,
}

impl ReservationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReservationStatus::Held => "HELD",
            ReservationStatus::Booked => "BOOKED",
            ReservationStatus::Released => "RELEASED",
            ReservationStatus::Expired => "EXPIRED",
        }
    }
}

impl std::fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ReservationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "HELD" => Ok(ReservationStatus::Held),
            "BOOKED" => Ok(ReservationStatus::Booked),
            "RELEASED" => Ok(ReservationStatus::Released),
            "EXPIRED" => Ok(ReservationStatus::Expired),
            other => Err(format!("unknown reservation status: {}", other)),
        }
    }
}

/// One ledger row: the claim state of a unit for a validity scope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reservation<K> {
    pub id: Uuid,
    pub resource_id: Uuid,
    pub unit_number: String,
    pub validity: K,
    pub status: ReservationStatus,
    pub hold_token: Option<String>,
    pub hold_expires_at: Option<DateTime<Utc>>,
    pub user_id: String,
    pub trip_id: Uuid,
    pub payment_id: Option<Uuid>,
    pub booking_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl<K: ValidityKey> Reservation<K> {
    /// A hold that has not passed its expiry.
    pub fn is_live_hold(&self, now: DateTime<Utc>) -> bool {
        self.status == ReservationStatus::Held
            && self.hold_expires_at.map(|at| at > now).unwrap_or(false)
    }

    /// A hold whose expiry has passed. Logically equivalent to no reservation
    /// until the reaper reclassifies it.
    pub fn is_expired_hold(&self, now: DateTime<Utc>) -> bool {
        self.status == ReservationStatus::Held
            && self.hold_expires_at.map(|at| at <= now).unwrap_or(true)
    }

    /// Rows that occupy the unit: a booking, or a hold still inside its
    /// expiry window.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.status == ReservationStatus::Booked || self.is_live_hold(now)
    }

    pub fn token_matches(&self, token: &str) -> bool {
        self.hold_token.as_deref() == Some(token)
    }
}

/// Why a single unit in a batch was not granted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RejectReason {
    AlreadyBooked,
    HeldByOther,
    NotFound,
    HoldExpired,
    HoldMismatch,
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            RejectReason::AlreadyBooked => "already booked",
            RejectReason::HeldByOther => "held by another booker",
            RejectReason::NotFound => "no such unit",
            RejectReason::HoldExpired => "hold expired",
            RejectReason::HoldMismatch => "hold mismatch",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitRejection {
    pub unit: String,
    pub reason: RejectReason,
}

impl UnitRejection {
    pub fn new(unit: impl Into<String>, reason: RejectReason) -> Self {
        Self {
            unit: unit.into(),
            reason,
        }
    }
}
