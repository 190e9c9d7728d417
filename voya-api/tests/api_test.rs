use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use http_body_util::BodyExt;
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use voya_api::state::AuthConfig;
use voya_api::{app, AppState};
use voya_domain::access::TripAccess;
use voya_domain::catalog::{Bus, Hotel, Room, RoomCatalog, SeatCatalog};
use voya_domain::clock::SystemClock;
use voya_domain::ReservationError;
use voya_reservation::{
    HoldPolicy, MemoryLedger, RoomReservationManager, SeatReservationManager,
};

const SECRET: &str = "test-secret";

struct StaticCatalog {
    bus: Bus,
    hotel: Hotel,
    rooms: Vec<Room>,
}

#[async_trait]
impl SeatCatalog for StaticCatalog {
    async fn bus(
        &self,
        bus_id: Uuid,
    ) -> Result<Option<Bus>, Box<dyn std::error::Error + Send + Sync>> {
        Ok((bus_id == self.bus.id).then(|| self.bus.clone()))
    }
}

#[async_trait]
impl RoomCatalog for StaticCatalog {
    async fn hotel(
        &self,
        hotel_id: Uuid,
    ) -> Result<Option<Hotel>, Box<dyn std::error::Error + Send + Sync>> {
        Ok((hotel_id == self.hotel.id).then(|| self.hotel.clone()))
    }

    async fn rooms(
        &self,
        hotel_id: Uuid,
    ) -> Result<Vec<Room>, Box<dyn std::error::Error + Send + Sync>> {
        if hotel_id == self.hotel.id {
            Ok(self.rooms.clone())
        } else {
            Ok(Vec::new())
        }
    }
}

/// Every trip belongs to its caller in these tests; the CRUD layer owns the
/// real check.
struct AllowAllTrips;

#[async_trait]
impl TripAccess for AllowAllTrips {
    async fn authorize(
        &self,
        _trip_id: Uuid,
        _user_id: &str,
        _is_admin: bool,
    ) -> Result<(), ReservationError> {
        Ok(())
    }
}

fn fixture() -> (axum::Router, Uuid, Uuid) {
    let bus_id = Uuid::new_v4();
    let hotel_id = Uuid::new_v4();
    let catalog = Arc::new(StaticCatalog {
        bus: Bus {
            id: bus_id,
            name: "Coastal Express".to_string(),
            capacity: 12,
        },
        hotel: Hotel {
            id: hotel_id,
            name: "Harbor View".to_string(),
        },
        rooms: vec![
            Room {
                number: "101".to_string(),
                floor: 1,
                sleeps: 2,
            },
            Room {
                number: "102".to_string(),
                floor: 1,
                sleeps: 2,
            },
            Room {
                number: "103".to_string(),
                floor: 1,
                sleeps: 3,
            },
        ],
    });

    let clock = Arc::new(SystemClock);
    let state = AppState {
        seat_manager: Arc::new(SeatReservationManager::new(
            Arc::new(MemoryLedger::new()),
            catalog.clone(),
            HoldPolicy::default(),
            clock.clone(),
        )),
        room_manager: Arc::new(RoomReservationManager::new(
            Arc::new(MemoryLedger::new()),
            catalog,
            HoldPolicy::default(),
            clock,
        )),
        access: Arc::new(AllowAllTrips),
        auth: AuthConfig {
            secret: SECRET.to_string(),
            expiration: 3600,
        },
    };

    (app(state), bus_id, hotel_id)
}

fn bearer(sub: &str) -> String {
    let claims = json!({ "sub": sub, "role": "guest", "exp": u32::MAX });
    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .unwrap();
    format!("Bearer {}", token)
}

fn post(uri: &str, user: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::AUTHORIZATION, bearer(user))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str, user: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .header(header::AUTHORIZATION, bearer(user))
        .body(Body::empty())
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn seat_hold_confirm_release_flow() {
    let (app, bus_id, _) = fixture();
    let trip_id = Uuid::new_v4();

    // Alice holds two seats.
    let response = app
        .clone()
        .oneshot(post(
            &format!("/v1/buses/{}/holds", bus_id),
            "alice",
            json!({
                "trip_id": trip_id,
                "journey_date": "2025-12-01",
                "seat_numbers": ["1", "2"],
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let grant = body_json(response).await;
    let token = grant["hold_token"].as_str().unwrap().to_string();
    assert_eq!(grant["held"], json!(["1", "2"]));

    // Bob races for seat 1 and loses.
    let response = app
        .clone()
        .oneshot(post(
            &format!("/v1/buses/{}/holds", bus_id),
            "bob",
            json!({
                "trip_id": Uuid::new_v4(),
                "journey_date": "2025-12-01",
                "seat_numbers": ["1"],
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let conflict = body_json(response).await;
    assert_eq!(conflict["rejections"][0]["unit"], "1");
    assert_eq!(conflict["rejections"][0]["reason"], "HELD_BY_OTHER");

    // The seat map shows both holds.
    let response = app
        .clone()
        .oneshot(get(
            &format!("/v1/buses/{}/seat-map?date=2025-12-01", bus_id),
            "alice",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let map = body_json(response).await;
    assert_eq!(map.as_array().unwrap().len(), 12);
    assert_eq!(map[0]["status"], "HELD");
    assert_eq!(map[0]["is_own_hold"], true);
    assert_eq!(map[2]["status"], "AVAILABLE");

    // Payment attaches and extends, then the booking confirms.
    let response = app
        .clone()
        .oneshot(post(
            &format!("/v1/buses/{}/holds/{}/renew", bus_id, token),
            "alice",
            json!({ "payment_id": Uuid::new_v4() }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(post(
            &format!("/v1/buses/{}/holds/{}/confirm", bus_id, token),
            "alice",
            json!({
                "trip_id": trip_id,
                "legs": [{ "journey_date": "2025-12-01", "seat_numbers": ["1", "2"] }],
                "booking_id": Uuid::new_v4(),
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let confirmation = body_json(response).await;
    assert_eq!(confirmation["confirmed"].as_array().unwrap().len(), 2);

    // Releasing after confirmation touches nothing, and stays a success.
    let response = app
        .clone()
        .oneshot(post(
            &format!("/v1/buses/{}/holds/{}/release", bus_id, token),
            "alice",
            json!({ "trip_id": trip_id }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let released = body_json(response).await;
    assert_eq!(released["released"], 0);
}

#[tokio::test]
async fn room_count_hold_assigns_a_block() {
    let (app, _, hotel_id) = fixture();

    let response = app
        .clone()
        .oneshot(post(
            &format!("/v1/hotels/{}/holds", hotel_id),
            "alice",
            json!({
                "trip_id": Uuid::new_v4(),
                "check_in": "2025-12-01",
                "check_out": "2025-12-05",
                "rooms_needed": 2,
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let grant = body_json(response).await;
    assert_eq!(grant["held"], json!(["101", "102"]));

    // Overlapping stay on the same rooms conflicts.
    let response = app
        .clone()
        .oneshot(post(
            &format!("/v1/hotels/{}/holds", hotel_id),
            "bob",
            json!({
                "trip_id": Uuid::new_v4(),
                "check_in": "2025-12-04",
                "check_out": "2025-12-08",
                "room_numbers": ["101"],
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    // Only one room is left over that interval.
    let response = app
        .clone()
        .oneshot(post(
            &format!("/v1/hotels/{}/holds", hotel_id),
            "bob",
            json!({
                "trip_id": Uuid::new_v4(),
                "check_in": "2025-12-01",
                "check_out": "2025-12-05",
                "rooms_needed": 2,
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let conflict = body_json(response).await;
    assert!(conflict["error"]
        .as_str()
        .unwrap()
        .contains("not enough rooms"));
}

#[tokio::test]
async fn availability_reports_display_attributes() {
    let (app, _, hotel_id) = fixture();

    let response = app
        .clone()
        .oneshot(get(
            &format!(
                "/v1/hotels/{}/availability?check_in=2025-12-01&check_out=2025-12-03",
                hotel_id
            ),
            "alice",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let views = body_json(response).await;
    assert_eq!(views.as_array().unwrap().len(), 3);
    assert_eq!(views[0]["room_number"], "101");
    assert_eq!(views[0]["status"], "AVAILABLE");
    assert_eq!(views[2]["sleeps"], 3);
}

#[tokio::test]
async fn missing_bearer_token_is_unauthorized() {
    let (app, bus_id, _) = fixture();

    let request = Request::builder()
        .method("GET")
        .uri(format!("/v1/buses/{}/seat-map?date=2025-12-01", bus_id))
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    // The typed Authorization header rejects the request before the handler.
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn bad_selection_is_a_validation_error() {
    let (app, _, hotel_id) = fixture();

    let response = app
        .oneshot(post(
            &format!("/v1/hotels/{}/holds", hotel_id),
            "alice",
            json!({
                "trip_id": Uuid::new_v4(),
                "check_in": "2025-12-01",
                "check_out": "2025-12-05",
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
