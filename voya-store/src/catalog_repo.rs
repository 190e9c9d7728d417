use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use voya_domain::catalog::{Bus, Hotel, Room, RoomCatalog, SeatCatalog};

pub struct PgSeatCatalog {
    pool: PgPool,
}

impl PgSeatCatalog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct BusRow {
    id: Uuid,
    name: String,
    capacity: i32,
}

#[async_trait]
impl SeatCatalog for PgSeatCatalog {
    async fn bus(
        &self,
        bus_id: Uuid,
    ) -> Result<Option<Bus>, Box<dyn std::error::Error + Send + Sync>> {
        let row: Option<BusRow> =
            sqlx::query_as("SELECT id, name, capacity FROM buses WHERE id = $1")
                .bind(bus_id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.map(|r| Bus {
            id: r.id,
            name: r.name,
            capacity: r.capacity.max(0) as u32,
        }))
    }
}

pub struct PgRoomCatalog {
    pool: PgPool,
}

impl PgRoomCatalog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct HotelRow {
    id: Uuid,
    name: String,
}

#[derive(sqlx::FromRow)]
struct RoomRow {
    room_number: String,
    floor: i32,
    sleeps: i32,
}

#[async_trait]
impl RoomCatalog for PgRoomCatalog {
    async fn hotel(
        &self,
        hotel_id: Uuid,
    ) -> Result<Option<Hotel>, Box<dyn std::error::Error + Send + Sync>> {
        let row: Option<HotelRow> =
            sqlx::query_as("SELECT id, name FROM hotels WHERE id = $1")
                .bind(hotel_id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.map(|r| Hotel {
            id: r.id,
            name: r.name,
        }))
    }

    async fn rooms(
        &self,
        hotel_id: Uuid,
    ) -> Result<Vec<Room>, Box<dyn std::error::Error + Send + Sync>> {
        let rows: Vec<RoomRow> = sqlx::query_as(
            "SELECT room_number, floor, sleeps FROM rooms \
             WHERE hotel_id = $1 ORDER BY room_number",
        )
        .bind(hotel_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| Room {
                number: r.room_number,
                floor: r.floor,
                sleeps: r.sleeps,
            })
            .collect())
    }
}
