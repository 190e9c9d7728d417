pub mod access;
pub mod catalog;
pub mod clock;
pub mod events;
pub mod reservation;
pub mod validity;

pub use reservation::{RejectReason, Reservation, ReservationStatus, UnitRejection};
pub use validity::{JourneyDate, StayRange, ValidityKey};

use serde::{Deserialize, Serialize};

/// Per-operation failure report for batch conflicts. `succeeded` carries the
/// units the operation still committed, so callers can act on partial results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConflictReport {
    pub message: String,
    pub succeeded: Vec<String>,
    pub rejections: Vec<UnitRejection>,
}

impl ConflictReport {
    pub fn new(message: impl Into<String>, rejections: Vec<UnitRejection>) -> Self {
        Self {
            message: message.into(),
            succeeded: Vec::new(),
            rejections,
        }
    }

    pub fn with_succeeded(mut self, succeeded: Vec<String>) -> Self {
        self.succeeded = succeeded;
        self
    }
}

impl std::fmt::Display for ConflictReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ReservationError {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(ConflictReport),
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("ledger failure: {0}")]
    Ledger(String),
}

pub type ReservationResult<T> = Result<T, ReservationError>;
