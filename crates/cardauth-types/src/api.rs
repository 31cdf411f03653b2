use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::{Activity, Card, CardTransaction, InviteState, User};

// -- JWT Claims --

/// Bearer token claims. `sub` is the user id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i64,
    pub username: String,
    pub iat: usize,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    #[validate(length(min = 1, max = 64, message = "username must be 1 to 64 characters"))]
    pub username: String,
    #[validate(email(message = "email address is invalid"))]
    pub email: String,
    #[validate(length(min = 6, message = "password must be at least 6 characters"))]
    pub password: String,
    #[serde(default)]
    #[validate(length(max = 64, message = "nickname must be at most 64 characters"))]
    pub nickname: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    #[validate(length(min = 1, message = "username is required"))]
    pub username: String,
    #[validate(length(min = 1, message = "password is required"))]
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: User,
    pub message: String,
}

// -- Users --

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateUserRequest {
    #[validate(length(min = 1, max = 64, message = "nickname must be 1 to 64 characters"))]
    pub nickname: Option<String>,
    #[validate(email(message = "email address is invalid"))]
    pub email: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UserResponse {
    pub message: String,
    pub user: User,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UsersResponse<T> {
    pub users: Vec<T>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ActivityResponse {
    pub message: String,
    #[serde(rename = "activeCards")]
    pub active_cards: Vec<Activity>,
}

// -- Cards --

#[derive(Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct CreateCardRequest {
    #[validate(length(min = 1, max = 128, message = "title must be 1 to 128 characters"))]
    pub title: String,
    #[validate(length(min = 1, max = 2048, message = "description must be 1 to 2048 characters"))]
    pub description: String,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct SendCardRequest {
    #[validate(length(min = 1, message = "recipient username is required"))]
    pub to_username: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CardResponse {
    pub message: String,
    pub card: Card,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CardsResponse {
    pub cards: Vec<Card>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TransactionsResponse {
    pub transactions: Vec<CardTransaction>,
}

// -- Friends --

#[derive(Debug, Serialize, Deserialize)]
pub struct FriendSearchEntry {
    pub user: User,
    pub invited: InviteState,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct InviteEntry {
    pub user: User,
    pub invited: InviteState,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ListResponse<T> {
    pub list: Vec<T>,
}

// -- Generic --

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ActionResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
