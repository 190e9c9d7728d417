use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use axum_extra::headers::{authorization::Bearer, Authorization};
use axum_extra::TypedHeader;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use voya_domain::events::{ReservationsConfirmedEvent, ReservationsReleasedEvent, RoomsHeldEvent};
use voya_domain::{ReservationError, StayRange};
use voya_reservation::rooms::{
    ConfirmRoomsRequest, HoldRoomsRequest, ReleaseRoomsRequest, RoomConfirmation, RoomHoldGrant,
    RoomLeg, RoomSelection, RoomView,
};

use crate::auth::authenticate;
use crate::error::AppError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/hotels/{hotel_id}/holds", post(hold_rooms))
        .route("/v1/hotels/{hotel_id}/holds/{token}/renew", post(renew_hold))
        .route("/v1/hotels/{hotel_id}/holds/{token}/confirm", post(confirm_rooms))
        .route("/v1/hotels/{hotel_id}/holds/{token}/release", post(release_rooms))
        .route("/v1/hotels/{hotel_id}/availability", get(room_availability))
}

#[derive(Debug, Deserialize)]
struct HoldRoomsBody {
    trip_id: Uuid,
    check_in: NaiveDate,
    check_out: NaiveDate,
    room_numbers: Option<Vec<String>>,
    rooms_needed: Option<u32>,
    hold_token: Option<String>,
}

async fn hold_rooms(
    State(state): State<AppState>,
    Path(hotel_id): Path<Uuid>,
    TypedHeader(Authorization(bearer)): TypedHeader<Authorization<Bearer>>,
    Json(body): Json<HoldRoomsBody>,
) -> Result<Json<RoomHoldGrant>, AppError> {
    let claims = authenticate(bearer.token(), &state.auth.secret)?;
    state
        .access
        .authorize(body.trip_id, &claims.sub, claims.is_admin())
        .await?;

    let selection = match (body.room_numbers, body.rooms_needed) {
        (Some(numbers), None) => RoomSelection::Numbers(numbers),
        (None, Some(needed)) => RoomSelection::Count(needed),
        _ => {
            return Err(ReservationError::Validation(
                "exactly one of room_numbers or rooms_needed is required".to_string(),
            )
            .into())
        }
    };

    let grant = state
        .room_manager
        .hold_rooms(HoldRoomsRequest {
            hotel_id,
            check_in: body.check_in,
            check_out: body.check_out,
            selection,
            hold_token: body.hold_token,
            user_id: claims.sub,
            trip_id: body.trip_id,
        })
        .await?;

    let event = RoomsHeldEvent {
        hotel_id,
        check_in: body.check_in,
        check_out: body.check_out,
        room_numbers: grant.held.clone(),
        trip_id: body.trip_id,
        hold_token: grant.hold_token.clone(),
        expires_at: grant.expires_at,
    };
    info!(target: "voya.events", event = ?event, "rooms held");

    Ok(Json(grant))
}

#[derive(Debug, Deserialize)]
struct RenewHoldBody {
    payment_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
struct RenewHoldResponse {
    hold_token: String,
    expires_at: DateTime<Utc>,
}

async fn renew_hold(
    State(state): State<AppState>,
    Path((hotel_id, token)): Path<(Uuid, String)>,
    TypedHeader(Authorization(bearer)): TypedHeader<Authorization<Bearer>>,
    Json(body): Json<RenewHoldBody>,
) -> Result<Json<RenewHoldResponse>, AppError> {
    authenticate(bearer.token(), &state.auth.secret)?;

    let expires_at = state
        .room_manager
        .renew_hold(hotel_id, &token, body.payment_id)
        .await?;

    Ok(Json(RenewHoldResponse {
        hold_token: token,
        expires_at,
    }))
}

#[derive(Debug, Deserialize)]
struct ConfirmRoomsBody {
    trip_id: Uuid,
    legs: Vec<RoomLeg>,
    booking_id: Option<Uuid>,
    payment_id: Option<Uuid>,
}

async fn confirm_rooms(
    State(state): State<AppState>,
    Path((hotel_id, token)): Path<(Uuid, String)>,
    TypedHeader(Authorization(bearer)): TypedHeader<Authorization<Bearer>>,
    Json(body): Json<ConfirmRoomsBody>,
) -> Result<Json<RoomConfirmation>, AppError> {
    let claims = authenticate(bearer.token(), &state.auth.secret)?;
    state
        .access
        .authorize(body.trip_id, &claims.sub, claims.is_admin())
        .await?;

    let confirmation = state
        .room_manager
        .confirm_rooms(ConfirmRoomsRequest {
            hotel_id,
            hold_token: token.clone(),
            user_id: claims.sub,
            trip_id: body.trip_id,
            legs: body.legs,
            booking_id: body.booking_id,
            payment_id: body.payment_id,
        })
        .await?;

    let event = ReservationsConfirmedEvent {
        resource_id: hotel_id,
        hold_token: token,
        booking_id: body.booking_id,
        units: confirmation
            .confirmed
            .iter()
            .map(|c| c.room_number.clone())
            .collect(),
    };
    info!(target: "voya.events", event = ?event, "rooms confirmed");

    Ok(Json(confirmation))
}

#[derive(Debug, Deserialize)]
struct ReleaseRoomsBody {
    trip_id: Uuid,
    check_in: Option<NaiveDate>,
    check_out: Option<NaiveDate>,
    room_numbers: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
struct ReleaseResponse {
    released: u64,
}

async fn release_rooms(
    State(state): State<AppState>,
    Path((hotel_id, token)): Path<(Uuid, String)>,
    TypedHeader(Authorization(bearer)): TypedHeader<Authorization<Bearer>>,
    Json(body): Json<ReleaseRoomsBody>,
) -> Result<Json<ReleaseResponse>, AppError> {
    let claims = authenticate(bearer.token(), &state.auth.secret)?;
    let is_admin = claims.is_admin();
    state
        .access
        .authorize(body.trip_id, &claims.sub, is_admin)
        .await?;

    let stay = match (body.check_in, body.check_out) {
        (Some(check_in), Some(check_out)) => Some(StayRange::new(check_in, check_out)?),
        _ => None,
    };

    let released = state
        .room_manager
        .release_rooms(ReleaseRoomsRequest {
            hotel_id,
            hold_token: token.clone(),
            user_id: claims.sub,
            is_admin,
            stay,
            room_numbers: body.room_numbers,
        })
        .await?;

    let event = ReservationsReleasedEvent {
        resource_id: hotel_id,
        hold_token: token,
        released,
    };
    info!(target: "voya.events", event = ?event, "rooms released");

    Ok(Json(ReleaseResponse { released }))
}

#[derive(Debug, Deserialize)]
struct AvailabilityQuery {
    check_in: NaiveDate,
    check_out: NaiveDate,
    hold_token: Option<String>,
}

async fn room_availability(
    State(state): State<AppState>,
    Path(hotel_id): Path<Uuid>,
    TypedHeader(Authorization(bearer)): TypedHeader<Authorization<Bearer>>,
    Query(query): Query<AvailabilityQuery>,
) -> Result<Json<Vec<RoomView>>, AppError> {
    let claims = authenticate(bearer.token(), &state.auth.secret)?;

    let views = state
        .room_manager
        .room_availability(
            hotel_id,
            query.check_in,
            query.check_out,
            &claims.sub,
            query.hold_token.as_deref(),
        )
        .await?;

    Ok(Json(views))
}
