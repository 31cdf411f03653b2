use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use jsonwebtoken::{EncodingKey, Header, encode};
use tracing::info;

use cardauth_db::is_unique_violation;
use cardauth_types::api::{AuthResponse, Claims, LoginRequest, RegisterRequest};
use cardauth_types::models::User;

use crate::error::{ApiError, ApiResult};
use crate::extractors::ValidatedJson;
use crate::state::AppState;

const BAD_CREDENTIALS: &str = "invalid username or password";

pub async fn register(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<RegisterRequest>,
) -> ApiResult<impl IntoResponse> {
    let username = req.username.trim();
    let email = req.email.trim();
    if username.is_empty() {
        return Err(ApiError::bad_request("username is required"));
    }

    if state.db.get_user_by_username(username)?.is_some() {
        return Err(ApiError::Conflict("username already exists"));
    }
    if state.db.get_user_by_email(email)?.is_some() {
        return Err(ApiError::Conflict("email already exists"));
    }

    let nickname = match req.nickname.trim() {
        "" => username,
        nickname => nickname,
    };
    let password_hash = hash_password(&req.password)?;

    let user_id = state
        .db
        .create_user(username, email, &password_hash, nickname)
        .map_err(|e| {
            // Lost a race against a concurrent registration.
            if is_unique_violation(&e) {
                ApiError::Conflict("username or email already exists")
            } else {
                ApiError::Internal(e)
            }
        })?;

    let user: User = state
        .db
        .get_user_by_id(user_id)?
        .ok_or_else(|| anyhow::anyhow!("user {} vanished after insert", user_id))?
        .into();
    let token = create_token(&state, &user)?;

    info!("Registered user {} ({})", user.username, user.id);
    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            token,
            user,
            message: "registration successful".to_string(),
        }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<LoginRequest>,
) -> ApiResult<Json<AuthResponse>> {
    let row = state
        .db
        .get_user_by_username(req.username.trim())?
        .ok_or(ApiError::Unauthorized(BAD_CREDENTIALS))?;

    if !verify_password(&req.password, &row.password)? {
        return Err(ApiError::Unauthorized(BAD_CREDENTIALS));
    }

    let user: User = row.into();
    let token = create_token(&state, &user)?;

    Ok(Json(AuthResponse {
        token,
        user,
        message: "login successful".to_string(),
    }))
}

/// Hash a password with Argon2id and a random salt into a PHC string.
pub fn hash_password(password: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("password hashing failed: {}", e))?
        .to_string();
    Ok(hash)
}

/// Ok(false) means a wrong password; Err means the stored hash is unusable.
pub fn verify_password(password: &str, stored_hash: &str) -> anyhow::Result<bool> {
    let parsed = PasswordHash::new(stored_hash)
        .map_err(|e| anyhow::anyhow!("stored password hash is corrupt: {}", e))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

pub fn create_token(state: &AppState, user: &User) -> anyhow::Result<String> {
    let now = chrono::Utc::now();
    let claims = Claims {
        sub: user.id,
        username: user.username.clone(),
        iat: now.timestamp() as usize,
        exp: (now + state.token_ttl).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(state.jwt_secret.as_bytes()),
    )?;

    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_round_trip() {
        let hash = hash_password("hunter22").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("hunter22", &hash).unwrap());
        assert!(!verify_password("hunter23", &hash).unwrap());
    }

    #[test]
    fn same_password_gets_distinct_salts() {
        assert_ne!(hash_password("secret1").unwrap(), hash_password("secret1").unwrap());
    }

    #[test]
    fn corrupt_hash_is_an_error() {
        assert!(verify_password("x", "not-a-phc-string").is_err());
    }
}
