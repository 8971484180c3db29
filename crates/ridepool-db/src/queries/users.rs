use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, Row, params};
use uuid::Uuid;

use ridepool_types::api::{UpdateUserRequest, UserSummary};
use ridepool_types::models::User;

use crate::queries::uuid_col;
use crate::{Database, DbError, Result};

const USER_COLUMNS: &str = "id, email, name, phone, profile_image_url, date_of_birth, gender, \
     institute, onboarding_completed, average_rating, total_ratings, created_at, updated_at";

fn user_from_row(row: &Row) -> rusqlite::Result<User> {
    Ok(User {
        id: uuid_col(row, 0)?,
        email: row.get(1)?,
        name: row.get(2)?,
        phone: row.get(3)?,
        profile_image_url: row.get(4)?,
        date_of_birth: row.get(5)?,
        gender: row.get(6)?,
        institute: row.get(7)?,
        onboarding_completed: row.get(8)?,
        average_rating: row.get(9)?,
        total_ratings: row.get(10)?,
        created_at: row.get(11)?,
        updated_at: row.get(12)?,
    })
}

pub(crate) fn query_user(conn: &Connection, id: Uuid) -> Result<Option<User>> {
    let mut stmt = conn.prepare(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"))?;
    let user = stmt
        .query_row([id.to_string()], user_from_row)
        .optional()?;
    Ok(user)
}

pub(crate) fn query_user_summary(conn: &Connection, id: Uuid) -> Result<Option<UserSummary>> {
    let mut stmt =
        conn.prepare("SELECT id, name, profile_image_url, phone FROM users WHERE id = ?1")?;
    let summary = stmt
        .query_row([id.to_string()], |row| {
            Ok(UserSummary {
                id: uuid_col(row, 0)?,
                name: row.get(1)?,
                profile_image_url: row.get(2)?,
                phone: row.get(3)?,
            })
        })
        .optional()?;
    Ok(summary)
}

impl Database {
    pub fn create_user(&self, user: &User, password_hash: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (id, email, password_hash, name, phone, profile_image_url, \
                 date_of_birth, gender, institute, onboarding_completed, average_rating, \
                 total_ratings, created_at, updated_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
                params![
                    user.id.to_string(),
                    user.email,
                    password_hash,
                    user.name,
                    user.phone,
                    user.profile_image_url,
                    user.date_of_birth,
                    user.gender,
                    user.institute,
                    user.onboarding_completed,
                    user.average_rating,
                    user.total_ratings,
                    user.created_at,
                    user.updated_at,
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_user(&self, id: Uuid) -> Result<Option<User>> {
        self.with_conn(|conn| query_user(conn, id))
    }

    pub fn get_user_summary(&self, id: Uuid) -> Result<Option<UserSummary>> {
        self.with_conn(|conn| query_user_summary(conn, id))
    }

    /// Returns the profile together with the stored password hash.
    pub fn get_user_by_email(&self, email: &str) -> Result<Option<(User, String)>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {USER_COLUMNS}, password_hash FROM users WHERE email = ?1"
            ))?;
            let found = stmt
                .query_row([email], |row| Ok((user_from_row(row)?, row.get(13)?)))
                .optional()?;
            Ok(found)
        })
    }

    /// Applies the allowed profile fields; absent fields stay untouched.
    pub fn update_user(&self, id: Uuid, req: &UpdateUserRequest) -> Result<User> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let mut user = query_user(&tx, id)?.ok_or(DbError::NotFound("User"))?;

            if let Some(name) = &req.name {
                user.name = name.clone();
            }
            if let Some(phone) = &req.phone {
                user.phone = Some(phone.clone());
            }
            if let Some(url) = &req.profile_image_url {
                user.profile_image_url = Some(url.clone());
            }
            if let Some(dob) = &req.date_of_birth {
                user.date_of_birth = Some(dob.clone());
            }
            if let Some(gender) = &req.gender {
                user.gender = Some(gender.clone());
            }
            if let Some(institute) = &req.institute {
                user.institute = Some(institute.clone());
            }
            if let Some(done) = req.onboarding_completed {
                user.onboarding_completed = done;
            }
            user.updated_at = Utc::now();

            tx.execute(
                "UPDATE users SET name = ?1, phone = ?2, profile_image_url = ?3, \
                 date_of_birth = ?4, gender = ?5, institute = ?6, onboarding_completed = ?7, \
                 updated_at = ?8 WHERE id = ?9",
                params![
                    user.name,
                    user.phone,
                    user.profile_image_url,
                    user.date_of_birth,
                    user.gender,
                    user.institute,
                    user.onboarding_completed,
                    user.updated_at,
                    id.to_string(),
                ],
            )?;
            tx.commit()?;
            Ok(user)
        })
    }

    pub fn complete_onboarding(&self, id: Uuid) -> Result<()> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE users SET onboarding_completed = 1, updated_at = ?1 WHERE id = ?2",
                params![Utc::now(), id.to_string()],
            )?;
            if changed == 0 {
                return Err(DbError::NotFound("User"));
            }
            Ok(())
        })
    }
}
