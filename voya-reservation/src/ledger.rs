use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use voya_domain::{RejectReason, Reservation, UnitRejection, ValidityKey};

use crate::LedgerError;

/// Batch hold attempt. Every unit is attempted; nothing short-circuits.
#[derive(Debug, Clone)]
pub struct HoldRequest<K> {
    pub resource_id: Uuid,
    pub validity: K,
    pub unit_numbers: Vec<String>,
    pub hold_token: String,
    pub user_id: String,
    pub trip_id: Uuid,
    pub expires_at: DateTime<Utc>,
    pub now: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct HoldOutcome {
    pub held: Vec<String>,
    pub rejected: Vec<UnitRejection>,
}

#[derive(Debug, Clone)]
pub struct RenewRequest {
    pub resource_id: Uuid,
    pub hold_token: String,
    pub new_expires_at: DateTime<Utc>,
    pub payment_id: Option<Uuid>,
    pub now: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct ConfirmRequest<K> {
    pub resource_id: Uuid,
    pub hold_token: String,
    pub user_id: String,
    pub legs: Vec<(K, Vec<String>)>,
    pub booking_id: Option<Uuid>,
    pub payment_id: Option<Uuid>,
    pub now: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LegUnit<K> {
    pub validity: K,
    pub unit: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LegConflict<K> {
    pub validity: K,
    pub unit: String,
    pub reason: RejectReason,
}

#[derive(Debug, Clone)]
pub struct ConfirmOutcome<K> {
    pub confirmed: Vec<LegUnit<K>>,
    pub conflicts: Vec<LegConflict<K>>,
}

/// Release scope. `validity`/`unit_numbers` narrow the sweep; `None` releases
/// every hold carrying the token on the resource.
#[derive(Debug, Clone)]
pub struct ReleaseFilter<K> {
    pub resource_id: Uuid,
    pub hold_token: String,
    pub validity: Option<K>,
    pub unit_numbers: Option<Vec<String>>,
    pub now: DateTime<Utc>,
}

/// The single source of truth for claims on (resource, unit, validity key).
///
/// Implementations must make each call atomic (one database transaction, or
/// one lock acquisition) and must run the stale-hold reap for the resource
/// at the start of every call, so no caller ever observes a logically
/// expired hold as occupying a unit.
#[async_trait]
pub trait ReservationLedger<K: ValidityKey>: Send + Sync {
    async fn hold(&self, req: HoldRequest<K>) -> Result<HoldOutcome, LedgerError>;

    /// Extends a live hold's expiry, optionally attaching a payment id.
    async fn renew(&self, req: RenewRequest) -> Result<DateTime<Utc>, LedgerError>;

    async fn confirm(&self, req: ConfirmRequest<K>) -> Result<ConfirmOutcome<K>, LedgerError>;

    /// Idempotent: zero matching holds releases nothing and is not an error.
    async fn release(&self, filter: ReleaseFilter<K>) -> Result<u64, LedgerError>;

    /// Reclassifies every hold on the resource whose expiry has passed.
    async fn reap_expired(
        &self,
        resource_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<u64, LedgerError>;

    /// HELD/BOOKED rows conflicting with the given validity scope, after the
    /// reap has run.
    async fn active_claims(
        &self,
        resource_id: Uuid,
        validity: &K,
        now: DateTime<Utc>,
    ) -> Result<Vec<Reservation<K>>, LedgerError>;

    /// Owner of any live hold carrying the token, if one exists.
    async fn hold_owner(
        &self,
        resource_id: Uuid,
        hold_token: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<String>, LedgerError>;
}
