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

use voya_domain::events::{ReservationsConfirmedEvent, ReservationsReleasedEvent, SeatsHeldEvent};
use voya_reservation::seats::{
    ConfirmSeatsRequest, HoldSeatsRequest, ReleaseSeatsRequest, SeatConfirmation, SeatHoldGrant,
    SeatLeg, SeatView,
};

use crate::auth::authenticate;
use crate::error::AppError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/buses/{bus_id}/holds", post(hold_seats))
        .route("/v1/buses/{bus_id}/holds/{token}/renew", post(renew_hold))
        .route("/v1/buses/{bus_id}/holds/{token}/confirm", post(confirm_seats))
        .route("/v1/buses/{bus_id}/holds/{token}/release", post(release_seats))
        .route("/v1/buses/{bus_id}/seat-map", get(seat_map))
}

#[derive(Debug, Deserialize)]
struct HoldSeatsBody {
    trip_id: Uuid,
    journey_date: NaiveDate,
    seat_numbers: Vec<String>,
    hold_token: Option<String>,
}

async fn hold_seats(
    State(state): State<AppState>,
    Path(bus_id): Path<Uuid>,
    TypedHeader(Authorization(bearer)): TypedHeader<Authorization<Bearer>>,
    Json(body): Json<HoldSeatsBody>,
) -> Result<Json<SeatHoldGrant>, AppError> {
    let claims = authenticate(bearer.token(), &state.auth.secret)?;
    state
        .access
        .authorize(body.trip_id, &claims.sub, claims.is_admin())
        .await?;

    let grant = state
        .seat_manager
        .hold_seats(HoldSeatsRequest {
            bus_id,
            journey_date: body.journey_date,
            seat_numbers: body.seat_numbers,
            hold_token: body.hold_token,
            user_id: claims.sub,
            trip_id: body.trip_id,
        })
        .await?;

    let event = SeatsHeldEvent {
        bus_id,
        journey_date: body.journey_date,
        seat_numbers: grant.held.clone(),
        trip_id: body.trip_id,
        hold_token: grant.hold_token.clone(),
        expires_at: grant.expires_at,
    };
    info!(target: "voya.events", event = ?event, "seats held");

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
    Path((bus_id, token)): Path<(Uuid, String)>,
    TypedHeader(Authorization(bearer)): TypedHeader<Authorization<Bearer>>,
    Json(body): Json<RenewHoldBody>,
) -> Result<Json<RenewHoldResponse>, AppError> {
    authenticate(bearer.token(), &state.auth.secret)?;

    let expires_at = state
        .seat_manager
        .renew_hold(bus_id, &token, body.payment_id)
        .await?;

    Ok(Json(RenewHoldResponse {
        hold_token: token,
        expires_at,
    }))
}

#[derive(Debug, Deserialize)]
struct ConfirmSeatsBody {
    trip_id: Uuid,
    legs: Vec<SeatLeg>,
    booking_id: Option<Uuid>,
    payment_id: Option<Uuid>,
}

async fn confirm_seats(
    State(state): State<AppState>,
    Path((bus_id, token)): Path<(Uuid, String)>,
    TypedHeader(Authorization(bearer)): TypedHeader<Authorization<Bearer>>,
    Json(body): Json<ConfirmSeatsBody>,
) -> Result<Json<SeatConfirmation>, AppError> {
    let claims = authenticate(bearer.token(), &state.auth.secret)?;
    state
        .access
        .authorize(body.trip_id, &claims.sub, claims.is_admin())
        .await?;

    let confirmation = state
        .seat_manager
        .confirm_seats(ConfirmSeatsRequest {
            bus_id,
            hold_token: token.clone(),
            user_id: claims.sub,
            trip_id: body.trip_id,
            legs: body.legs,
            booking_id: body.booking_id,
            payment_id: body.payment_id,
        })
        .await?;

    let event = ReservationsConfirmedEvent {
        resource_id: bus_id,
        hold_token: token,
        booking_id: body.booking_id,
        units: confirmation
            .confirmed
            .iter()
            .map(|c| c.seat_number.clone())
            .collect(),
    };
    info!(target: "voya.events", event = ?event, "seats confirmed");

    Ok(Json(confirmation))
}

#[derive(Debug, Deserialize)]
struct ReleaseSeatsBody {
    trip_id: Uuid,
    journey_date: Option<NaiveDate>,
    seat_numbers: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
struct ReleaseResponse {
    released: u64,
}

async fn release_seats(
    State(state): State<AppState>,
    Path((bus_id, token)): Path<(Uuid, String)>,
    TypedHeader(Authorization(bearer)): TypedHeader<Authorization<Bearer>>,
    Json(body): Json<ReleaseSeatsBody>,
) -> Result<Json<ReleaseResponse>, AppError> {
    let claims = authenticate(bearer.token(), &state.auth.secret)?;
    let is_admin = claims.is_admin();
    state
        .access
        .authorize(body.trip_id, &claims.sub, is_admin)
        .await?;

    let released = state
        .seat_manager
        .release_seats(ReleaseSeatsRequest {
            bus_id,
            hold_token: token.clone(),
            user_id: claims.sub,
            is_admin,
            journey_date: body.journey_date,
            seat_numbers: body.seat_numbers,
        })
        .await?;

    let event = ReservationsReleasedEvent {
        resource_id: bus_id,
        hold_token: token,
        released,
    };
    info!(target: "voya.events", event = ?event, "seats released");

    Ok(Json(ReleaseResponse { released }))
}

#[derive(Debug, Deserialize)]
struct SeatMapQuery {
    date: NaiveDate,
    hold_token: Option<String>,
}

async fn seat_map(
    State(state): State<AppState>,
    Path(bus_id): Path<Uuid>,
    TypedHeader(Authorization(bearer)): TypedHeader<Authorization<Bearer>>,
    Query(query): Query<SeatMapQuery>,
) -> Result<Json<Vec<SeatView>>, AppError> {
    let claims = authenticate(bearer.token(), &state.auth.secret)?;

    let map = state
        .seat_manager
        .seat_map(
            bus_id,
            query.date,
            &claims.sub,
            query.hold_token.as_deref(),
        )
        .await?;

    Ok(Json(map))
}
