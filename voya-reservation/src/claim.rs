//! Per-unit claim decisions, shared by every ledger backend. The validity
//! key strategy decides what "conflicting" means: date equality for seats,
//! interval overlap for rooms.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use voya_domain::{RejectReason, Reservation, ReservationStatus, ValidityKey};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimDecision {
    /// No row blocks the claim; insert a fresh HELD row.
    Insert,
    /// The caller already holds the unit with this token; refresh the expiry.
    Regrant { row_id: Uuid },
    /// A terminal row occupies the exact key; rewrite it in place as HELD.
    Supersede { row_id: Uuid },
    Reject(RejectReason),
}

/// Decides one unit's hold attempt against every existing row for that unit.
/// Assumes the reap already ran, but tolerates unreaped expired holds.
pub fn evaluate_claim<K: ValidityKey>(
    rows: &[Reservation<K>],
    validity: &K,
    hold_token: &str,
    user_id: &str,
    now: DateTime<Utc>,
) -> ClaimDecision {
    let conflicting: Vec<&Reservation<K>> = rows
        .iter()
        .filter(|r| r.validity.conflicts_with(validity))
        .collect();

    if conflicting
        .iter()
        .any(|r| r.status == ReservationStatus::Booked)
    {
        return ClaimDecision::Reject(RejectReason::AlreadyBooked);
    }

    if let Some(live) = conflicting.iter().find(|r| r.is_live_hold(now)) {
        return if live.token_matches(hold_token) && live.user_id == user_id {
            ClaimDecision::Regrant { row_id: live.id }
        } else {
            ClaimDecision::Reject(RejectReason::HeldByOther)
        };
    }

    // Only RELEASED/EXPIRED rows (or stale unreaped holds) remain. Reuse an
    // exact-key row so the per-key uniqueness constraint keeps holding.
    if let Some(terminal) = rows.iter().find(|r| r.validity == *validity) {
        return ClaimDecision::Supersede {
            row_id: terminal.id,
        };
    }

    ClaimDecision::Insert
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmDecision {
    Confirm { row_id: Uuid },
    /// The row is already BOOKED under this token; nothing to do.
    AlreadyConfirmed,
    Conflict(RejectReason),
}

/// Decides one unit's HELD -> BOOKED transition. Requires a live hold with
/// matching token and owner; an expired hold is reported as such rather than
/// folded into the generic mismatch.
pub fn evaluate_confirm<K: ValidityKey>(
    rows: &[Reservation<K>],
    validity: &K,
    hold_token: &str,
    user_id: &str,
    now: DateTime<Utc>,
) -> ConfirmDecision {
    let conflicting: Vec<&Reservation<K>> = rows
        .iter()
        .filter(|r| r.validity.conflicts_with(validity))
        .collect();

    if let Some(live) = conflicting
        .iter()
        .find(|r| r.is_live_hold(now) && r.token_matches(hold_token))
    {
        if live.user_id == user_id {
            return ConfirmDecision::Confirm { row_id: live.id };
        }
        return ConfirmDecision::Conflict(RejectReason::HoldMismatch);
    }

    if conflicting
        .iter()
        .any(|r| r.status == ReservationStatus::Booked && r.token_matches(hold_token))
    {
        return ConfirmDecision::AlreadyConfirmed;
    }

    let expired_under_token = conflicting.iter().any(|r| {
        r.token_matches(hold_token)
            && (r.status == ReservationStatus::Expired || r.is_expired_hold(now))
    });
    if expired_under_token {
        return ConfirmDecision::Conflict(RejectReason::HoldExpired);
    }

    ConfirmDecision::Conflict(RejectReason::HoldMismatch)
}
