use std::collections::HashMap;

use axum::{Extension, Json, extract::State};
use tracing::info;

use cardauth_db::is_unique_violation;
use cardauth_db::models::{InviteWithUserRow, UserRow};
use cardauth_types::api::{
    ActionResponse, Claims, FriendSearchEntry, InviteEntry, ListResponse, SearchQuery,
    UsersResponse,
};
use cardauth_types::models::{InviteState, User};

use crate::emails;
use crate::error::{ApiError, ApiResult};
use crate::extractors::{AppPath, AppQuery};
use crate::mail::{Notification, OutgoingMail, notify};
use crate::state::AppState;
use crate::users::search_term;

const FRIEND_SEARCH_LIMIT: u32 = 25;

fn load_user(state: &AppState, id: i64, missing: &'static str) -> ApiResult<UserRow> {
    state.db.get_user_by_id(id)?.ok_or(ApiError::NotFound(missing))
}

fn invite_entries(rows: Vec<InviteWithUserRow>) -> Vec<InviteEntry> {
    rows.into_iter()
        .map(|row| InviteEntry {
            invited: InviteState::from(Some(row.invite.status)),
            updated_at: row.invite.updated_at,
            user: row.user.into(),
        })
        .collect()
}

pub async fn list_friends(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<UsersResponse<User>>> {
    let users = state
        .db
        .list_friends(claims.sub)?
        .into_iter()
        .map(User::from)
        .collect();
    Ok(Json(UsersResponse { users }))
}

/// Invites the caller sent.
pub async fn list_sent_invites(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<ListResponse<InviteEntry>>> {
    let list = invite_entries(state.db.list_sent_invites(claims.sub)?);
    Ok(Json(ListResponse { list }))
}

/// Invites the caller received.
pub async fn list_received_invites(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<ListResponse<InviteEntry>>> {
    let list = invite_entries(state.db.list_received_invites(claims.sub)?);
    Ok(Json(ListResponse { list }))
}

/// Search users and annotate each with the caller's outgoing invite status.
pub async fn search_friends(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    AppQuery(query): AppQuery<SearchQuery>,
) -> ApiResult<Json<ListResponse<FriendSearchEntry>>> {
    let term = search_term(&query)?;
    let users = state
        .db
        .search_users_by_name_or_email(term, FRIEND_SEARCH_LIMIT)?;

    // Batch the invite lookup instead of one query per user.
    let ids: Vec<i64> = users.iter().map(|u| u.id).collect();
    let statuses: HashMap<i64, _> = state
        .db
        .invites_from(claims.sub, &ids)?
        .into_iter()
        .map(|invite| (invite.to_user_id, invite.status))
        .collect();

    let list = users
        .into_iter()
        .map(|row| FriendSearchEntry {
            invited: InviteState::from(statuses.get(&row.id).copied()),
            user: row.into(),
        })
        .collect();
    Ok(Json(ListResponse { list }))
}

pub async fn invite_friend(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    AppPath(invitee_id): AppPath<i64>,
) -> ApiResult<Json<ActionResponse>> {
    let invitee = load_user(&state, invitee_id, "invited user does not exist")?;
    if invitee.id == claims.sub {
        return Err(ApiError::bad_request("you cannot invite yourself"));
    }
    if state.db.are_friends(claims.sub, invitee.id)? {
        return Err(ApiError::bad_request("you are already friends"));
    }
    if state.db.get_invite(claims.sub, invitee.id)?.is_some() {
        return Err(ApiError::bad_request("you have already invited this user"));
    }

    state.db.create_invite(claims.sub, invitee.id).map_err(|e| {
        if is_unique_violation(&e) {
            ApiError::bad_request("you have already invited this user")
        } else {
            ApiError::Internal(e)
        }
    })?;
    info!("User {} invited {}", claims.sub, invitee.id);

    let me = load_user(&state, claims.sub, "user not found")?;
    let content = emails::friend_invite(&me.nickname, &me.email, &state.app_url);
    let outcome = notify(
        state.mailer.as_ref(),
        OutgoingMail {
            to: invitee.email,
            subject: content.subject,
            html_body: content.html_body,
        },
    )
    .await;

    let message = match outcome {
        Notification::Failed => "friend invite sent, but the email notification failed",
        Notification::Delivered | Notification::Skipped => "friend invite sent",
    };
    Ok(Json(ActionResponse {
        success: true,
        message: message.to_string(),
    }))
}

pub async fn accept_friend(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    AppPath(inviter_id): AppPath<i64>,
) -> ApiResult<Json<ActionResponse>> {
    let inviter = load_user(&state, inviter_id, "inviting user does not exist")?;
    if inviter.id == claims.sub {
        return Err(ApiError::bad_request("you cannot accept your own invite"));
    }
    if state.db.are_friends(claims.sub, inviter.id)? {
        return Err(ApiError::bad_request("you are already friends"));
    }
    if !state.db.accept_invite(inviter.id, claims.sub)? {
        return Err(ApiError::bad_request("no pending friend invite found"));
    }
    info!("User {} accepted invite from {}", claims.sub, inviter.id);

    let me = load_user(&state, claims.sub, "user not found")?;
    let content = emails::invite_accepted(&me.nickname, &me.email, &state.app_url);
    let outcome = notify(
        state.mailer.as_ref(),
        OutgoingMail {
            to: inviter.email,
            subject: content.subject,
            html_body: content.html_body,
        },
    )
    .await;

    let message = match outcome {
        Notification::Failed => "friend invite accepted, but the email notification failed",
        Notification::Delivered | Notification::Skipped => "friend invite accepted",
    };
    Ok(Json(ActionResponse {
        success: true,
        message: message.to_string(),
    }))
}

pub async fn reject_friend(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    AppPath(inviter_id): AppPath<i64>,
) -> ApiResult<Json<ActionResponse>> {
    let inviter = load_user(&state, inviter_id, "inviting user does not exist")?;
    if !state.db.reject_invite(inviter.id, claims.sub)? {
        return Err(ApiError::bad_request("no pending friend invite found"));
    }
    info!("User {} rejected invite from {}", claims.sub, inviter.id);

    Ok(Json(ActionResponse {
        success: true,
        message: "friend invite rejected".to_string(),
    }))
}
