use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::ReservationError;

/// Temporal scope a claim applies to. Two claims on the same unit collide
/// exactly when their validity keys conflict.
pub trait ValidityKey:
    Clone + PartialEq + std::fmt::Debug + Send + Sync + 'static
{
    fn conflicts_with(&self, other: &Self) -> bool;
}

/// A single calendar date. The same physical seat is a distinct reservable
/// instance on each journey date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JourneyDate(pub NaiveDate);

impl ValidityKey for JourneyDate {
    fn conflicts_with(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl std::fmt::Display for JourneyDate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Half-open stay interval `[check_in, check_out)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StayRange {
    check_in: NaiveDate,
    check_out: NaiveDate,
}

impl StayRange {
    pub fn new(check_in: NaiveDate, check_out: NaiveDate) -> Result<Self, ReservationError> {
        if check_out <= check_in {
            return Err(ReservationError::Validation(format!(
                "check-out {} must be after check-in {}",
                check_out, check_in
            )));
        }
        Ok(Self {
            check_in,
            check_out,
        })
    }

    pub fn check_in(&self) -> NaiveDate {
        self.check_in
    }

    pub fn check_out(&self) -> NaiveDate {
        self.check_out
    }

    pub fn nights(&self) -> i64 {
        (self.check_out - self.check_in).num_days()
    }
}

impl ValidityKey for StayRange {
    fn conflicts_with(&self, other: &Self) -> bool {
        self.check_in < other.check_out && self.check_out > other.check_in
    }
}

impl std::fmt::Display for StayRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {})", self.check_in, self.check_out)
    }
}
