use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::{Extension, Json, extract::Path, extract::Query, extract::State};
use serde_json::json;
use uuid::Uuid;

use ridepool_db::DbError;
use ridepool_db::queries::RequestAction;
use ridepool_types::api::{CreateRideRequest, RequestListQuery};

use crate::error::ApiError;
use crate::middleware::AuthUser;
use crate::{AppState, blocking, ok_with};

pub async fn create_request(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Json(req): Json<CreateRideRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.seats_requested < 1 {
        return Err(ApiError::Validation(
            "seats_requested must be at least 1".into(),
        ));
    }
    let db = state.clone();
    let request = blocking(move || db.db.create_request(user_id, &req)).await?;
    Ok((StatusCode::CREATED, ok_with("ride_request", request)))
}

/// `is_driver` flips the view: requests against the caller's trips
/// rather than requests the caller has made.
pub async fn list_requests(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Query(query): Query<RequestListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let requests = blocking(move || {
        if query.is_driver {
            db.db.requests_for_driver(user_id)
        } else {
            db.db.requests_for_passenger(user_id)
        }
    })
    .await?;
    Ok(ok_with("ride_requests", requests))
}

/// Visible only to the passenger and the trip's driver; trip-enriched.
pub async fn get_request(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let (request, trip) = blocking(move || {
        let request = db.db.get_request(id)?.ok_or(DbError::NotFound("Ride request"))?;
        let trip = db.db.get_trip(request.trip_id)?.ok_or(DbError::NotFound("Trip"))?;
        if request.passenger_id != user_id && trip.driver_id != user_id {
            return Err(DbError::NotOwner("Not authorized to view this ride request"));
        }
        Ok((request, trip))
    })
    .await?;

    let mut payload = json!(request);
    payload["trip"] = json!(trip);
    Ok(ok_with("ride_request", payload))
}

pub async fn accept_request(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let request =
        blocking(move || db.db.decide_request(id, user_id, RequestAction::Accept)).await?;
    Ok(ok_with("ride_request", request))
}

pub async fn reject_request(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let request =
        blocking(move || db.db.decide_request(id, user_id, RequestAction::Reject)).await?;
    Ok(ok_with("ride_request", request))
}

pub async fn cancel_request(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let request = blocking(move || db.db.cancel_request(id, user_id)).await?;
    Ok(ok_with("ride_request", request))
}

/// Driver-only: pending requests for one trip, each with the passenger
/// profile attached.
pub async fn pending_for_trip(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Path(trip_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let pending = blocking(move || db.db.pending_requests_for_trip(trip_id, user_id)).await?;

    let payload: Vec<_> = pending
        .into_iter()
        .map(|(request, passenger)| {
            let mut value = json!(request);
            value["passenger"] = json!(passenger);
            value
        })
        .collect();
    Ok(ok_with("ride_requests", payload))
}
