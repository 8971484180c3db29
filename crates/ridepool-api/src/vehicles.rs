use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::{Extension, Json, extract::Path, extract::State};
use uuid::Uuid;

use ridepool_db::DbError;
use ridepool_types::api::{AddVehicleRequest, UpdateVehicleRequest};

use crate::error::ApiError;
use crate::middleware::AuthUser;
use crate::{AppState, blocking, ok_message, ok_with};

pub async fn list_vehicles(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let vehicles = blocking(move || db.db.list_vehicles(user_id)).await?;
    Ok(ok_with("vehicles", vehicles))
}

pub async fn get_vehicle(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let vehicle = blocking(move || db.db.get_vehicle(id, Some(user_id)))
        .await?
        .ok_or(ApiError::Db(DbError::NotFound("Vehicle")))?;
    Ok(ok_with("vehicle", vehicle))
}

pub async fn add_vehicle(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Json(req): Json<AddVehicleRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.capacity < 1 {
        return Err(ApiError::Validation("capacity must be at least 1".into()));
    }
    let db = state.clone();
    let vehicle = blocking(move || db.db.add_vehicle(user_id, &req)).await?;
    Ok((StatusCode::CREATED, ok_with("vehicle", vehicle)))
}

pub async fn update_vehicle(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateVehicleRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if matches!(req.capacity, Some(0)) {
        return Err(ApiError::Validation("capacity must be at least 1".into()));
    }
    let db = state.clone();
    let vehicle = blocking(move || db.db.update_vehicle(id, user_id, &req)).await?;
    Ok(ok_with("vehicle", vehicle))
}

pub async fn delete_vehicle(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    blocking(move || db.db.delete_vehicle(id, user_id)).await?;
    Ok(ok_message("Vehicle deleted successfully"))
}
