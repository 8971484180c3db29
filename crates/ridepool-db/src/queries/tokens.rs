use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, params};
use uuid::Uuid;

use crate::queries::uuid_col;
use crate::{Database, Result};

/// Stored refresh token. Long-lived and revocable; revocation is a
/// flag flip, never a delete, so reuse after logout stays detectable.
#[derive(Debug, Clone)]
pub struct RefreshToken {
    pub token: String,
    pub user_id: Uuid,
    pub expires_at: DateTime<Utc>,
    pub is_revoked: bool,
}

impl Database {
    pub fn store_refresh_token(
        &self,
        token: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO refresh_tokens (token, user_id, expires_at, is_revoked, created_at) \
                 VALUES (?1, ?2, ?3, 0, ?4)",
                params![token, user_id.to_string(), expires_at, Utc::now()],
            )?;
            Ok(())
        })
    }

    pub fn find_refresh_token(&self, token: &str) -> Result<Option<RefreshToken>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT token, user_id, expires_at, is_revoked FROM refresh_tokens \
                 WHERE token = ?1",
            )?;
            let found = stmt
                .query_row([token], |row| {
                    Ok(RefreshToken {
                        token: row.get(0)?,
                        user_id: uuid_col(row, 1)?,
                        expires_at: row.get(2)?,
                        is_revoked: row.get(3)?,
                    })
                })
                .optional()?;
            Ok(found)
        })
    }

    /// Returns false when the token was never issued.
    pub fn revoke_refresh_token(&self, token: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE refresh_tokens SET is_revoked = 1 WHERE token = ?1",
                [token],
            )?;
            Ok(changed > 0)
        })
    }
}
