use axum::response::IntoResponse;
use axum::{Extension, Json, extract::Path, extract::State};
use uuid::Uuid;

use ridepool_db::DbError;
use ridepool_types::api::UpdateUserRequest;

use crate::error::ApiError;
use crate::middleware::AuthUser;
use crate::{AppState, blocking, ok_message, ok_with};

pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let user = blocking(move || db.db.get_user(id))
        .await?
        .ok_or(ApiError::Db(DbError::NotFound("User")))?;
    Ok(ok_with("user", user))
}

pub async fn update_me(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Json(req): Json<UpdateUserRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let user = blocking(move || db.db.update_user(user_id, &req)).await?;
    Ok(ok_with("user", user))
}

pub async fn complete_onboarding(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    blocking(move || db.db.complete_onboarding(user_id)).await?;
    Ok(ok_message("Onboarding completed"))
}
