use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, Row, params};
use uuid::Uuid;

use ridepool_types::api::SubmitRatingRequest;
use ridepool_types::models::{Rating, TripStatus};

use crate::queries::trips::query_trip;
use crate::queries::uuid_col;
use crate::{Database, DbError, Result};

const RATING_COLUMNS: &str =
    "id, trip_id, rater_id, rated_user_id, rating, comment, created_at";

fn rating_from_row(row: &Row) -> rusqlite::Result<Rating> {
    Ok(Rating {
        id: uuid_col(row, 0)?,
        trip_id: uuid_col(row, 1)?,
        rater_id: uuid_col(row, 2)?,
        rated_user_id: uuid_col(row, 3)?,
        rating: row.get(4)?,
        comment: row.get(5)?,
        created_at: row.get(6)?,
    })
}

/// A user took part in a trip if they drove it or hold a request that
/// was accepted (or later completed) on it.
fn was_participant(conn: &Connection, trip_id: Uuid, driver_id: Uuid, user_id: Uuid) -> Result<bool> {
    if user_id == driver_id {
        return Ok(true);
    }
    let count: u32 = conn.query_row(
        "SELECT COUNT(*) FROM ride_requests WHERE trip_id = ?1 AND passenger_id = ?2 \
         AND status IN ('accepted', 'completed')",
        params![trip_id.to_string(), user_id.to_string()],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

impl Database {
    /// Record a rating and fold it into the rated user's aggregate.
    /// The participant checks, the duplicate check, the insert, and the
    /// aggregate rewrite all commit together.
    pub fn submit_rating(&self, rater_id: Uuid, req: &SubmitRatingRequest) -> Result<Rating> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let trip = query_trip(&tx, req.trip_id)?.ok_or(DbError::NotFound("Trip"))?;

            if trip.status != TripStatus::Completed {
                return Err(DbError::InvalidState {
                    message: "Cannot rate a trip with status",
                    current: trip.status.to_string(),
                });
            }
            if !was_participant(&tx, trip.id, trip.driver_id, rater_id)? {
                return Err(DbError::NotParticipant("You were not part of this trip"));
            }
            if !was_participant(&tx, trip.id, trip.driver_id, req.rated_user_id)? {
                return Err(DbError::NotParticipant(
                    "The user you are rating was not part of this trip",
                ));
            }

            let existing: u32 = tx.query_row(
                "SELECT COUNT(*) FROM ratings \
                 WHERE trip_id = ?1 AND rater_id = ?2 AND rated_user_id = ?3",
                params![
                    req.trip_id.to_string(),
                    rater_id.to_string(),
                    req.rated_user_id.to_string(),
                ],
                |row| row.get(0),
            )?;
            if existing > 0 {
                return Err(DbError::DuplicateRating);
            }

            let rating = Rating {
                id: Uuid::new_v4(),
                trip_id: req.trip_id,
                rater_id,
                rated_user_id: req.rated_user_id,
                rating: req.rating,
                comment: req.comment.clone().unwrap_or_default(),
                created_at: Utc::now(),
            };

            tx.execute(
                &format!("INSERT INTO ratings ({RATING_COLUMNS}) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"),
                params![
                    rating.id.to_string(),
                    rating.trip_id.to_string(),
                    rating.rater_id.to_string(),
                    rating.rated_user_id.to_string(),
                    rating.rating,
                    rating.comment,
                    rating.created_at,
                ],
            )?;

            // Full recount rather than an incremental update, so the
            // aggregate can never drift from the rows.
            let (total, avg): (u32, f64) = tx.query_row(
                "SELECT COUNT(*), AVG(rating) FROM ratings WHERE rated_user_id = ?1",
                [req.rated_user_id.to_string()],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )?;
            let rounded = (avg * 10.0).round() / 10.0;
            tx.execute(
                "UPDATE users SET average_rating = ?1, total_ratings = ?2, updated_at = ?3 \
                 WHERE id = ?4",
                params![rounded, total, Utc::now(), req.rated_user_id.to_string()],
            )?;

            tx.commit()?;
            Ok(rating)
        })
    }

    pub fn get_rating(&self, id: Uuid) -> Result<Option<Rating>> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare(&format!("SELECT {RATING_COLUMNS} FROM ratings WHERE id = ?1"))?;
            let rating = stmt.query_row([id.to_string()], rating_from_row).optional()?;
            Ok(rating)
        })
    }

    /// Ratings this user has given.
    pub fn ratings_by_rater(&self, rater_id: Uuid) -> Result<Vec<Rating>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {RATING_COLUMNS} FROM ratings WHERE rater_id = ?1 \
                 ORDER BY created_at DESC"
            ))?;
            let ratings = stmt
                .query_map([rater_id.to_string()], rating_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(ratings)
        })
    }

    /// Ratings this user has received.
    pub fn ratings_for_user(&self, rated_user_id: Uuid) -> Result<Vec<Rating>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {RATING_COLUMNS} FROM ratings WHERE rated_user_id = ?1 \
                 ORDER BY created_at DESC"
            ))?;
            let ratings = stmt
                .query_map([rated_user_id.to_string()], rating_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(ratings)
        })
    }

    pub fn ratings_for_trip(&self, trip_id: Uuid) -> Result<Vec<Rating>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {RATING_COLUMNS} FROM ratings WHERE trip_id = ?1 ORDER BY created_at"
            ))?;
            let ratings = stmt
                .query_map([trip_id.to_string()], rating_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(ratings)
        })
    }
}
