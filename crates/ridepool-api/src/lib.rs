pub mod auth;
pub mod error;
mod geo;
pub mod locations;
pub mod middleware;
pub mod people;
pub mod ratings;
pub mod ride_requests;
pub mod trips;
pub mod users;
pub mod vehicles;

use std::sync::Arc;

use axum::Json;
use serde::Serialize;
use serde_json::{Value, json};
use tracing::error;

use ridepool_db::Database;

use crate::error::ApiError;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub jwt_secret: String,
}

/// Run a blocking store call off the async runtime.
pub(crate) async fn blocking<T, F>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> ridepool_db::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {e}");
            ApiError::Internal
        })?
        .map_err(ApiError::from)
}

/// `{"success": true, "<key>": <value>}`
pub(crate) fn ok_with<T: Serialize>(key: &str, value: T) -> Json<Value> {
    Json(json!({ "success": true, (key): value }))
}

/// `{"success": true, "message": "..."}`
pub(crate) fn ok_message(message: &str) -> Json<Value> {
    Json(json!({ "success": true, "message": message }))
}
