use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeatsHeldEvent {
    pub bus_id: Uuid,
    pub journey_date: NaiveDate,
    pub seat_numbers: Vec<String>,
    pub trip_id: Uuid,
    pub hold_token: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomsHeldEvent {
    pub hotel_id: Uuid,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub room_numbers: Vec<String>,
    pub trip_id: Uuid,
    pub hold_token: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReservationsConfirmedEvent {
    pub resource_id: Uuid,
    pub hold_token: String,
    pub booking_id: Option<Uuid>,
    pub units: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReservationsReleasedEvent {
    pub resource_id: Uuid,
    pub hold_token: String,
    pub released: u64,
}
