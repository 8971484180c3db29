use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::{Extension, Json, extract::Path, extract::Query, extract::State};
use serde_json::{Value, json};
use uuid::Uuid;

use ridepool_db::{Database, DbError};
use ridepool_types::api::{RatingListQuery, SubmitRatingRequest};
use ridepool_types::models::Rating;

use crate::error::ApiError;
use crate::middleware::AuthUser;
use crate::{AppState, blocking, ok_with};

pub async fn submit_rating(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Json(req): Json<SubmitRatingRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if !(1..=5).contains(&req.rating) {
        return Err(ApiError::Validation("rating must be between 1 and 5".into()));
    }
    if req.rated_user_id == user_id {
        return Err(ApiError::Validation("You cannot rate yourself".into()));
    }
    let db = state.clone();
    let rating = blocking(move || db.db.submit_rating(user_id, &req)).await?;
    Ok((StatusCode::CREATED, ok_with("rating", rating)))
}

/// Attach the trip route and both parties to a rating row.
fn enrich(db: &Database, rating: Rating) -> ridepool_db::Result<Value> {
    let mut value = json!(rating);
    if let Some(trip) = db.get_trip(rating.trip_id)? {
        value["trip"] = json!({
            "start_address": trip.start_address,
            "end_address": trip.end_address,
            "start_time": trip.start_time,
        });
    }
    if let Some(rater) = db.get_user_summary(rating.rater_id)? {
        value["rater"] = json!(rater);
    }
    if let Some(rated) = db.get_user_summary(rating.rated_user_id)? {
        value["rated_user"] = json!(rated);
    }
    Ok(value)
}

/// Ratings received by the caller, or given by them with `as_rater`.
pub async fn list_ratings(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Query(query): Query<RatingListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let ratings = blocking(move || {
        let rows = if query.as_rater {
            db.db.ratings_by_rater(user_id)?
        } else {
            db.db.ratings_for_user(user_id)?
        };
        rows.into_iter().map(|r| enrich(&db.db, r)).collect::<ridepool_db::Result<Vec<_>>>()
    })
    .await?;
    Ok(ok_with("ratings", ratings))
}

/// Visible to the two parties and the trip's driver.
pub async fn get_rating(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let rating = blocking(move || {
        let rating = db.db.get_rating(id)?.ok_or(DbError::NotFound("Rating"))?;
        let trip = db.db.get_trip(rating.trip_id)?.ok_or(DbError::NotFound("Trip"))?;
        if rating.rater_id != user_id
            && rating.rated_user_id != user_id
            && trip.driver_id != user_id
        {
            return Err(DbError::NotOwner("Not authorized to view this rating"));
        }
        enrich(&db.db, rating)
    })
    .await?;
    Ok(ok_with("rating", rating))
}

/// All ratings exchanged on one trip; participants only.
pub async fn trip_ratings(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Path(trip_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let ratings = blocking(move || {
        let trip = db.db.get_trip(trip_id)?.ok_or(DbError::NotFound("Trip"))?;
        if trip.driver_id != user_id {
            let mine = db.db.requests_for_passenger(user_id)?;
            if !mine.iter().any(|r| r.trip_id == trip_id) {
                return Err(DbError::NotParticipant(
                    "Not authorized to view ratings for this trip",
                ));
            }
        }
        db.db
            .ratings_for_trip(trip_id)?
            .into_iter()
            .map(|r| enrich(&db.db, r))
            .collect::<ridepool_db::Result<Vec<_>>>()
    })
    .await?;
    Ok(ok_with("ratings", ratings))
}

/// Public rating summary for any user.
pub async fn user_rating_summary(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let user = blocking(move || db.db.get_user(user_id))
        .await?
        .ok_or(ApiError::Db(DbError::NotFound("User")))?;
    Ok(ok_with(
        "rating_summary",
        json!({
            "user_id": user.id,
            "average_rating": user.average_rating,
            "total_ratings": user.total_ratings,
        }),
    ))
}
