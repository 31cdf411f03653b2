use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{DecodingKey, Validation, decode};

use cardauth_types::api::Claims;

use crate::error::ApiError;
use crate::state::AppState;

/// Extract and validate the JWT from the Authorization header, make sure the
/// user still exists, then hand the claims to the handler via extensions.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let auth_header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(ApiError::Unauthorized("missing authentication token"))?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .filter(|t| !t.is_empty() && !t.contains(' '))
        .ok_or(ApiError::Unauthorized("malformed authentication token"))?;

    let claims = decode_token(&state.jwt_secret, token)?;

    if state.db.get_user_by_id(claims.sub)?.is_none() {
        return Err(ApiError::Unauthorized("user does not exist"));
    }

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

pub fn decode_token(secret: &str, token: &str) -> Result<Claims, ApiError> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| ApiError::Unauthorized("invalid authentication token"))?;

    Ok(token_data.claims)
}
