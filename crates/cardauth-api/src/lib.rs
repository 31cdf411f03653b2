pub mod auth;
pub mod cards;
pub mod emails;
pub mod error;
pub mod extractors;
pub mod friends;
pub mod mail;
pub mod middleware;
pub mod pages;
pub mod state;
pub mod users;

use axum::{
    Router,
    middleware::from_fn_with_state,
    routing::{get, post},
};

use crate::middleware::require_auth;
use crate::state::AppState;

/// API and page routes. Static files, CORS and tracing are layered on by
/// the server binary.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/api/register", post(auth::register))
        .route("/api/login", post(auth::login));

    let protected_routes = Router::new()
        .route("/api/profile", get(users::profile))
        .route("/api/activity", get(users::recent_activity))
        .route("/api/users/listUsers", get(users::list_users))
        .route("/api/users/search", get(users::search_users))
        .route("/api/user/{id}/update", post(users::update_user))
        .route("/api/cards", post(cards::create_card).get(cards::list_created))
        .route("/api/cards/received", get(cards::list_received))
        .route("/api/cards/{id}/transactions", get(cards::list_transactions))
        .route("/api/cards/{id}/use", post(cards::use_card))
        .route("/api/cards/{id}/send", post(cards::send_card))
        .route("/api/cards/{id}/delete", post(cards::delete_card))
        .route("/api/users/friends", get(friends::list_friends))
        .route("/api/users/friends/search", get(friends::search_friends))
        .route("/api/users/friends/myInvite/list", get(friends::list_sent_invites))
        .route("/api/users/friends/inviteMy/list", get(friends::list_received_invites))
        .route("/api/users/friends/{id}/invite", post(friends::invite_friend))
        .route("/api/users/friends/{id}/accept", post(friends::accept_friend))
        .route("/api/users/friends/{id}/reject", post(friends::reject_friend))
        .layer(from_fn_with_state(state.clone(), require_auth));

    let page_routes = Router::new()
        .route("/", get(pages::index))
        .route("/login", get(pages::login))
        .route("/register", get(pages::register))
        .route("/dashboard", get(pages::dashboard))
        .route("/cards", get(pages::cards))
        .route("/cards/create", get(pages::create_card))
        .route("/friends", get(pages::friends));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .merge(page_routes)
        .with_state(state)
}
