use std::net::SocketAddr;
use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use voya_api::{app, state::AuthConfig, AppState};
use voya_domain::clock::SystemClock;
use voya_reservation::{RoomReservationManager, SeatReservationManager};
use voya_store::{PgRoomCatalog, PgRoomLedger, PgSeatCatalog, PgSeatLedger, PgTripAccess};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "voya_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = voya_store::app_config::Config::load().expect("Failed to load config");
    tracing::info!("Starting Voya API on port {}", config.server.port);

    let db = voya_store::DbClient::new(&config.database.url)
        .await
        .expect("Failed to connect to Postgres");
    db.migrate().await.expect("Failed to run migrations");

    let clock = Arc::new(SystemClock);

    let seat_manager = Arc::new(SeatReservationManager::new(
        Arc::new(PgSeatLedger::new(db.pool.clone())),
        Arc::new(PgSeatCatalog::new(db.pool.clone())),
        config.hold_rules.seat_policy(),
        clock.clone(),
    ));
    let room_manager = Arc::new(RoomReservationManager::new(
        Arc::new(PgRoomLedger::new(db.pool.clone())),
        Arc::new(PgRoomCatalog::new(db.pool.clone())),
        config.hold_rules.room_policy(),
        clock,
    ));

    let app_state = AppState {
        seat_manager,
        room_manager,
        access: Arc::new(PgTripAccess::new(db.pool.clone())),
        auth: AuthConfig {
            secret: config.auth.jwt_secret.clone(),
            expiration: config.auth.jwt_expiration_seconds,
        },
    };

    let app = app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind listener");
    axum::serve(listener, app).await.expect("Server error");
}
