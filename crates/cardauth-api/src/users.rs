use axum::{Extension, Json, extract::State};

use cardauth_db::is_unique_violation;
use cardauth_types::api::{
    ActivityResponse, Claims, SearchQuery, UpdateUserRequest, UserResponse, UsersResponse,
};
use cardauth_types::models::{PublicUser, User};

use crate::error::{ApiError, ApiResult};
use crate::extractors::{AppPath, AppQuery, ValidatedJson};
use crate::state::AppState;

const SEARCH_LIMIT: u32 = 10;
const ACTIVITY_LIMIT: u32 = 5;

/// Search terms shorter than this are rejected.
pub(crate) const MIN_QUERY_CHARS: usize = 2;

pub(crate) fn search_term(query: &SearchQuery) -> ApiResult<&str> {
    let term = query.q.trim();
    if term.chars().count() < MIN_QUERY_CHARS {
        return Err(ApiError::bad_request(format!(
            "search query must be at least {MIN_QUERY_CHARS} characters"
        )));
    }
    Ok(term)
}

pub async fn profile(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<User>> {
    let user = state
        .db
        .get_user_by_id(claims.sub)?
        .ok_or(ApiError::NotFound("user not found"))?;
    Ok(Json(user.into()))
}

pub async fn list_users(State(state): State<AppState>) -> ApiResult<Json<UsersResponse<User>>> {
    let users = state.db.list_users()?.into_iter().map(User::from).collect();
    Ok(Json(UsersResponse { users }))
}

pub async fn search_users(
    State(state): State<AppState>,
    AppQuery(query): AppQuery<SearchQuery>,
) -> ApiResult<Json<UsersResponse<PublicUser>>> {
    let term = search_term(&query)?;
    let users = state
        .db
        .search_users(term, SEARCH_LIMIT)?
        .into_iter()
        .map(|row| PublicUser::from(User::from(row)))
        .collect();
    Ok(Json(UsersResponse { users }))
}

/// Users may only edit their own profile.
pub async fn update_user(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    AppPath(user_id): AppPath<i64>,
    ValidatedJson(req): ValidatedJson<UpdateUserRequest>,
) -> ApiResult<Json<UserResponse>> {
    if user_id != claims.sub {
        return Err(ApiError::Forbidden("you can only update your own profile"));
    }

    let nickname = req.nickname.as_deref().map(str::trim);
    let email = req.email.as_deref().map(str::trim);
    if nickname == Some("") {
        return Err(ApiError::bad_request("nickname must not be blank"));
    }
    if let Some(email) = email {
        let taken = state.db.get_user_by_email(email)?;
        if taken.is_some_and(|other| other.id != user_id) {
            return Err(ApiError::Conflict("email already exists"));
        }
    }

    let updated = state
        .db
        .update_user_profile(user_id, nickname, email)
        .map_err(|e| {
            if is_unique_violation(&e) {
                ApiError::Conflict("email already exists")
            } else {
                ApiError::Internal(e)
            }
        })?;
    if !updated {
        return Err(ApiError::NotFound("user not found"));
    }

    let user = state
        .db
        .get_user_by_id(user_id)?
        .ok_or(ApiError::NotFound("user not found"))?;
    Ok(Json(UserResponse {
        message: "profile updated".to_string(),
        user: user.into(),
    }))
}

pub async fn recent_activity(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<ActivityResponse>> {
    let active_cards = state
        .db
        .recent_activity(claims.sub, ACTIVITY_LIMIT)?
        .into_iter()
        .map(Into::into)
        .collect();
    Ok(Json(ActivityResponse {
        message: "recent activity".to_string(),
        active_cards,
    }))
}
