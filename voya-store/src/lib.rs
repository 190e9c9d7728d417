pub mod app_config;
pub mod catalog_repo;
pub mod database;
pub mod room_ledger;
pub mod seat_ledger;
pub mod trip_access;

pub use catalog_repo::{PgRoomCatalog, PgSeatCatalog};
pub use database::DbClient;
pub use room_ledger::PgRoomLedger;
pub use seat_ledger::PgSeatLedger;
pub use trip_access::PgTripAccess;
