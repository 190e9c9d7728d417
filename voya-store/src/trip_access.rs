use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use voya_domain::access::TripAccess;
use voya_domain::ReservationError;

/// Trips are owned by the CRUD layer; this adapter only answers "may this
/// caller act on that trip".
pub struct PgTripAccess {
    pool: PgPool,
}

impl PgTripAccess {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TripAccess for PgTripAccess {
    async fn authorize(
        &self,
        trip_id: Uuid,
        user_id: &str,
        is_admin: bool,
    ) -> Result<(), ReservationError> {
        let owner: Option<String> =
            sqlx::query_scalar("SELECT user_id FROM trips WHERE id = $1")
                .bind(trip_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| ReservationError::Ledger(e.to_string()))?;

        match owner {
            None => Err(ReservationError::NotFound(format!("trip {}", trip_id))),
            Some(owner) if owner != user_id && !is_admin => Err(ReservationError::Forbidden(
                "trip does not belong to you".to_string(),
            )),
            Some(_) => Ok(()),
        }
    }
}
