use argon2::password_hash::{SaltString, rand_core::OsRng};
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::{Extension, Json, extract::State};
use chrono::{Duration, Utc};
use jsonwebtoken::{EncodingKey, Header, encode};
use rand::Rng;
use rand::distr::Alphanumeric;
use serde_json::json;
use tracing::{error, info};
use uuid::Uuid;

use ridepool_db::DbError;
use ridepool_types::api::{Claims, LoginRequest, LogoutRequest, RefreshRequest, RegisterRequest};
use ridepool_types::models::User;

use crate::error::ApiError;
use crate::middleware::AuthUser;
use crate::{AppState, blocking, ok_message, ok_with};

const ACCESS_TOKEN_HOURS: i64 = 1;
const REFRESH_TOKEN_DAYS: i64 = 30;

fn mint_access_token(secret: &str, user_id: Uuid) -> Result<String, ApiError> {
    let now = Utc::now();
    let claims = Claims {
        sub: user_id,
        iat: now.timestamp() as usize,
        exp: (now + Duration::hours(ACCESS_TOKEN_HOURS)).timestamp() as usize,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| {
        error!("failed to sign access token: {e}");
        ApiError::Internal
    })
}

/// Opaque random string; the store keeps it with an expiry and a
/// revocation flag.
fn new_refresh_token() -> String {
    rand::rng()
        .sample_iter(Alphanumeric)
        .take(48)
        .map(char::from)
        .collect()
}

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let email = req.email.trim().to_lowercase();
    if !email.contains('@') {
        return Err(ApiError::Validation("Invalid email address".into()));
    }
    if req.password.len() < 8 {
        return Err(ApiError::Validation(
            "Password must be at least 8 characters".into(),
        ));
    }
    if req.name.trim().is_empty() {
        return Err(ApiError::Validation("Name is required".into()));
    }

    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
        .hash_password(req.password.as_bytes(), &salt)
        .map_err(|e| {
            error!("password hashing failed: {e}");
            ApiError::Internal
        })?
        .to_string();

    let now = Utc::now();
    let user = User {
        id: Uuid::new_v4(),
        email,
        name: req.name.trim().to_string(),
        phone: req.phone,
        profile_image_url: None,
        date_of_birth: req.date_of_birth,
        gender: req.gender,
        institute: req.institute,
        onboarding_completed: false,
        average_rating: None,
        total_ratings: 0,
        created_at: now,
        updated_at: now,
    };

    let refresh_token = new_refresh_token();
    let refresh_expires = now + Duration::days(REFRESH_TOKEN_DAYS);

    let db = state.clone();
    let stored = user.clone();
    let token = refresh_token.clone();
    let duplicate = blocking(move || {
        if db.db.get_user_by_email(&stored.email)?.is_some() {
            return Ok(true);
        }
        db.db.create_user(&stored, &password_hash)?;
        db.db.store_refresh_token(&token, stored.id, refresh_expires)?;
        Ok(false)
    })
    .await?;
    if duplicate {
        return Err(ApiError::Validation(
            "User with this email already exists".into(),
        ));
    }

    let access_token = mint_access_token(&state.jwt_secret, user.id)?;
    info!("registered user {}", user.id);

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "user": user,
            "access_token": access_token,
            "refresh_token": refresh_token,
        })),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let email = req.email.trim().to_lowercase();

    let db = state.clone();
    let found = blocking(move || db.db.get_user_by_email(&email)).await?;
    let (user, hash) =
        found.ok_or_else(|| ApiError::Unauthorized("Invalid email or password".into()))?;

    let parsed = PasswordHash::new(&hash).map_err(|e| {
        error!("stored password hash unparsable for {}: {e}", user.id);
        ApiError::Internal
    })?;
    Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed)
        .map_err(|_| ApiError::Unauthorized("Invalid email or password".into()))?;

    let access_token = mint_access_token(&state.jwt_secret, user.id)?;
    let refresh_token = new_refresh_token();
    let refresh_expires = Utc::now() + Duration::days(REFRESH_TOKEN_DAYS);

    let db = state.clone();
    let token = refresh_token.clone();
    let user_id = user.id;
    blocking(move || db.db.store_refresh_token(&token, user_id, refresh_expires)).await?;

    Ok(Json(json!({
        "success": true,
        "user": user,
        "access_token": access_token,
        "refresh_token": refresh_token,
    })))
}

pub async fn refresh(
    State(state): State<AppState>,
    Json(req): Json<RefreshRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let token = req.refresh_token.clone();
    let record = blocking(move || db.db.find_refresh_token(&token))
        .await?
        .ok_or_else(|| ApiError::Unauthorized("Invalid refresh token".into()))?;

    if record.is_revoked {
        return Err(ApiError::Unauthorized("Invalid refresh token".into()));
    }
    if record.expires_at < Utc::now() {
        return Err(ApiError::Unauthorized("Refresh token expired".into()));
    }

    let access_token = mint_access_token(&state.jwt_secret, record.user_id)?;
    Ok(ok_with("access_token", access_token))
}

pub async fn logout(
    State(state): State<AppState>,
    Json(req): Json<LogoutRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let revoked = blocking(move || db.db.revoke_refresh_token(&req.refresh_token)).await?;
    if !revoked {
        return Err(ApiError::Validation("Invalid refresh token".into()));
    }
    Ok(ok_message("Logged out successfully"))
}

pub async fn me(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let user = blocking(move || db.db.get_user(user_id))
        .await?
        .ok_or(ApiError::Db(DbError::NotFound("User")))?;
    Ok(ok_with("user", user))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashed_passwords_verify_and_reject() {
        let salt = SaltString::generate(&mut OsRng);
        let hash = Argon2::default()
            .hash_password(b"hunter2hunter2", &salt)
            .unwrap()
            .to_string();

        let parsed = PasswordHash::new(&hash).unwrap();
        assert!(
            Argon2::default()
                .verify_password(b"hunter2hunter2", &parsed)
                .is_ok()
        );
        assert!(
            Argon2::default()
                .verify_password(b"wrong-password", &parsed)
                .is_err()
        );
    }

    #[test]
    fn refresh_tokens_are_distinct_and_url_safe() {
        let a = new_refresh_token();
        let b = new_refresh_token();
        assert_eq!(a.len(), 48);
        assert_ne!(a, b);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric()));
    }
}
