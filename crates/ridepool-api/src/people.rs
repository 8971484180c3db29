use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::{Extension, Json, extract::Path, extract::State};
use uuid::Uuid;

use ridepool_db::DbError;
use ridepool_types::api::{AddPersonRequest, UpdatePersonRequest};

use crate::error::ApiError;
use crate::middleware::AuthUser;
use crate::{AppState, blocking, ok_message, ok_with};

pub async fn list_people(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let people = blocking(move || db.db.list_people(user_id)).await?;
    Ok(ok_with("people", people))
}

pub async fn get_person(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let person = blocking(move || db.db.get_person(id, Some(user_id)))
        .await?
        .ok_or(ApiError::Db(DbError::NotFound("Person")))?;
    Ok(ok_with("person", person))
}

pub async fn add_person(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Json(req): Json<AddPersonRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.name.trim().is_empty() {
        return Err(ApiError::Validation("name is required".into()));
    }
    let db = state.clone();
    let person = blocking(move || db.db.add_person(user_id, &req)).await?;
    Ok((StatusCode::CREATED, ok_with("person", person)))
}

pub async fn update_person(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdatePersonRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let person = blocking(move || db.db.update_person(id, user_id, &req)).await?;
    Ok(ok_with("person", person))
}

pub async fn delete_person(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    blocking(move || db.db.delete_person(id, user_id)).await?;
    Ok(ok_message("Person deleted successfully"))
}

pub async fn toggle_favorite(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let person = blocking(move || db.db.toggle_person_favorite(id, user_id)).await?;
    Ok(ok_with("person", person))
}
