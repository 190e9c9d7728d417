use async_trait::async_trait;
use uuid::Uuid;

use crate::ReservationError;

/// Trip authorization seam. Callers consult this before any hold, confirm or
/// release; the reservation engine itself assumes the check already passed.
#[async_trait]
pub trait TripAccess: Send + Sync {
    async fn authorize(
        &self,
        trip_id: Uuid,
        user_id: &str,
        is_admin: bool,
    ) -> Result<(), ReservationError>;
}
