use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::{Extension, Json, extract::Path, extract::State};
use uuid::Uuid;

use ridepool_db::DbError;
use ridepool_types::api::{AddLocationRequest, UpdateLocationRequest};

use crate::error::ApiError;
use crate::middleware::AuthUser;
use crate::{AppState, blocking, ok_message, ok_with};

pub async fn list_locations(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let locations = blocking(move || db.db.list_locations(user_id)).await?;
    Ok(ok_with("locations", locations))
}

pub async fn get_location(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let location = blocking(move || db.db.get_location(id, Some(user_id)))
        .await?
        .ok_or(ApiError::Db(DbError::NotFound("Location")))?;
    Ok(ok_with("location", location))
}

pub async fn add_location(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Json(req): Json<AddLocationRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.name.trim().is_empty() {
        return Err(ApiError::Validation("name is required".into()));
    }
    let db = state.clone();
    let location = blocking(move || db.db.add_location(user_id, &req)).await?;
    Ok((StatusCode::CREATED, ok_with("location", location)))
}

pub async fn update_location(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateLocationRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let location = blocking(move || db.db.update_location(id, user_id, &req)).await?;
    Ok(ok_with("location", location))
}

pub async fn delete_location(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    blocking(move || db.db.delete_location(id, user_id)).await?;
    Ok(ok_message("Location deleted successfully"))
}

pub async fn toggle_favorite(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let location = blocking(move || db.db.toggle_location_favorite(id, user_id)).await?;
    Ok(ok_with("location", location))
}
