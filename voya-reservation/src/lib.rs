pub mod claim;
pub mod ledger;
pub mod memory;
pub mod rooms;
pub mod seats;

pub use ledger::{
    ConfirmOutcome, ConfirmRequest, HoldOutcome, HoldRequest, LegConflict, LegUnit,
    ReleaseFilter, RenewRequest, ReservationLedger,
};
pub use memory::MemoryLedger;
pub use rooms::RoomReservationManager;
pub use seats::SeatReservationManager;

use voya_domain::{ConflictReport, ReservationError};

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("no live hold matches the supplied token")]
    HoldMismatch,
    #[error("hold expired")]
    HoldExpired,
    #[error("storage failure: {0}")]
    Storage(String),
}

impl From<LedgerError> for ReservationError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::HoldMismatch | LedgerError::HoldExpired => {
                ReservationError::Conflict(ConflictReport::new(err.to_string(), Vec::new()))
            }
            LedgerError::Storage(msg) => ReservationError::Ledger(msg),
        }
    }
}

/// Hold lifetime rules, sourced from configuration.
#[derive(Debug, Clone, Copy)]
pub struct HoldPolicy {
    /// Lifetime of a fresh hold, in seconds.
    pub hold_seconds: i64,
    /// Lifetime granted when a payment intent is attached via renew.
    pub payment_extension_seconds: i64,
}

impl Default for HoldPolicy {
    fn default() -> Self {
        Self {
            hold_seconds: 900,
            payment_extension_seconds: 1800,
        }
    }
}
