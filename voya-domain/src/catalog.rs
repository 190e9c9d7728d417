use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A bus with seats numbered 1..=capacity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bus {
    pub id: Uuid,
    pub name: String,
    pub capacity: u32,
}

impl Bus {
    pub fn seat_numbers(&self) -> impl Iterator<Item = String> {
        (1..=self.capacity).map(|n| n.to_string())
    }

    pub fn has_seat(&self, seat_number: &str) -> bool {
        seat_number
            .parse::<u32>()
            .map(|n| n >= 1 && n <= self.capacity)
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hotel {
    pub id: Uuid,
    pub name: String,
}

/// A hotel room. Floor and sleeps are display attributes only; the
/// reservation algorithm keys on the room number.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Room {
    pub number: String,
    pub floor: i32,
    pub sleeps: i32,
}

/// Read-only seat inventory definition, owned by the CRUD layer.
#[async_trait]
pub trait SeatCatalog: Send + Sync {
    async fn bus(
        &self,
        bus_id: Uuid,
    ) -> Result<Option<Bus>, Box<dyn std::error::Error + Send + Sync>>;
}

/// Read-only room inventory definition, owned by the CRUD layer.
#[async_trait]
pub trait RoomCatalog: Send + Sync {
    async fn hotel(
        &self,
        hotel_id: Uuid,
    ) -> Result<Option<Hotel>, Box<dyn std::error::Error + Send + Sync>>;

    async fn rooms(
        &self,
        hotel_id: Uuid,
    ) -> Result<Vec<Room>, Box<dyn std::error::Error + Send + Sync>>;
}
