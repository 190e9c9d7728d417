use std::sync::Arc;

use voya_domain::access::TripAccess;
use voya_reservation::{RoomReservationManager, SeatReservationManager};

#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
    pub expiration: u64,
}

#[derive(Clone)]
pub struct AppState {
    pub seat_manager: Arc<SeatReservationManager>,
    pub room_manager: Arc<RoomReservationManager>,
    pub access: Arc<dyn TripAccess>,
    pub auth: AuthConfig,
}
