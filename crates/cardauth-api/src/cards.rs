use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};
use chrono::Utc;
use tracing::{info, warn};

use cardauth_db::models::CardRow;
use cardauth_types::api::{
    CardResponse, CardsResponse, Claims, CreateCardRequest, MessageResponse, SendCardRequest,
    TransactionsResponse,
};
use cardauth_types::models::Card;

use crate::emails;
use crate::error::{ApiError, ApiResult};
use crate::extractors::{AppPath, ValidatedJson};
use crate::mail::{Notification, OutgoingMail, notify};
use crate::state::AppState;

const NOT_USABLE: &str = "card has already been used or has expired";

fn load_card(state: &AppState, card_id: i64) -> ApiResult<CardRow> {
    state
        .db
        .get_card(card_id)?
        .ok_or(ApiError::NotFound("card not found"))
}

fn load_card_detail(state: &AppState, card_id: i64) -> ApiResult<Card> {
    let card = state
        .db
        .get_card_detail(card_id)?
        .ok_or(ApiError::NotFound("card not found"))?;
    Ok(card.into())
}

pub async fn create_card(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ValidatedJson(req): ValidatedJson<CreateCardRequest>,
) -> ApiResult<impl IntoResponse> {
    let title = req.title.trim();
    let description = req.description.trim();
    if title.is_empty() || description.is_empty() {
        return Err(ApiError::bad_request("title and description are required"));
    }
    if req.expires_at.is_some_and(|at| at <= Utc::now()) {
        return Err(ApiError::bad_request("expiry must be in the future"));
    }

    let card_id = state
        .db
        .create_card(claims.sub, title, description, req.expires_at)?;
    let card = load_card_detail(&state, card_id)?;

    info!("User {} created card {} ({})", claims.sub, card.id, card.title);
    Ok((
        StatusCode::CREATED,
        Json(CardResponse {
            message: "card created".to_string(),
            card,
        }),
    ))
}

pub async fn list_created(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<CardsResponse>> {
    let cards = state
        .db
        .list_created_cards(claims.sub)?
        .into_iter()
        .map(Card::from)
        .collect();
    Ok(Json(CardsResponse { cards }))
}

pub async fn list_received(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<CardsResponse>> {
    let cards = state
        .db
        .list_received_cards(claims.sub)?
        .into_iter()
        .map(Card::from)
        .collect();
    Ok(Json(CardsResponse { cards }))
}

/// Only the creator and the current owner may read a card's history.
pub async fn list_transactions(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    AppPath(card_id): AppPath<i64>,
) -> ApiResult<Json<TransactionsResponse>> {
    let card = load_card(&state, card_id)?;
    if card.creator_id != claims.sub && card.owner_id != claims.sub {
        return Err(ApiError::Forbidden("you may not view this card's history"));
    }

    let transactions = state
        .db
        .list_card_transactions(card_id)?
        .into_iter()
        .map(Into::into)
        .collect();
    Ok(Json(TransactionsResponse { transactions }))
}

pub async fn use_card(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    AppPath(card_id): AppPath<i64>,
) -> ApiResult<Json<CardResponse>> {
    let card: Card = load_card(&state, card_id)?.into();
    if card.owner_id != claims.sub {
        return Err(ApiError::Forbidden("you do not own this card"));
    }

    let now = Utc::now();
    if !card.is_usable(now) || !state.db.use_card(card_id, claims.sub, now)? {
        return Err(ApiError::bad_request(NOT_USABLE));
    }

    let card = load_card_detail(&state, card_id)?;
    info!("User {} used card {}", claims.sub, card_id);

    // Tell the creator, unless they just redeemed their own card.
    if let (Some(creator), Some(owner)) = (&card.creator, &card.owner) {
        if creator.id != owner.id {
            let content = emails::card_used(&owner.nickname, &card.title, &state.app_url);
            notify(
                state.mailer.as_ref(),
                OutgoingMail {
                    to: creator.email.clone(),
                    subject: content.subject,
                    html_body: content.html_body,
                },
            )
            .await;
        }
    }

    Ok(Json(CardResponse {
        message: "card used".to_string(),
        card,
    }))
}

pub async fn send_card(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    AppPath(card_id): AppPath<i64>,
    ValidatedJson(req): ValidatedJson<SendCardRequest>,
) -> ApiResult<Json<CardResponse>> {
    let card: Card = load_card(&state, card_id)?.into();
    if card.owner_id != claims.sub {
        return Err(ApiError::Forbidden("only the owner can send this card"));
    }

    let now = Utc::now();
    if !card.is_usable(now) {
        return Err(ApiError::bad_request(NOT_USABLE));
    }

    let recipient = state
        .db
        .get_user_by_username(req.to_username.trim())?
        .ok_or(ApiError::NotFound("recipient does not exist"))?;
    if recipient.id == claims.sub {
        return Err(ApiError::bad_request("you cannot send a card to yourself"));
    }

    let sender = state
        .db
        .get_user_by_id(claims.sub)?
        .ok_or(ApiError::NotFound("user not found"))?;

    if !state.db.send_card(card_id, claims.sub, recipient.id, now)? {
        return Err(ApiError::bad_request(NOT_USABLE));
    }
    info!("User {} sent card {} to {}", claims.sub, card_id, recipient.id);

    let content = emails::card_received(&sender.nickname, &card.title, &state.app_url);
    let outcome = notify(
        state.mailer.as_ref(),
        OutgoingMail {
            to: recipient.email.clone(),
            subject: content.subject,
            html_body: content.html_body,
        },
    )
    .await;

    let message = match outcome {
        Notification::Delivered => "card sent, recipient notified by email",
        Notification::Failed => "card sent, but the email notification failed",
        Notification::Skipped => "card sent",
    };

    Ok(Json(CardResponse {
        message: message.to_string(),
        card: load_card_detail(&state, card_id)?,
    }))
}

/// Only a card that is both created and currently owned by the caller can
/// be deleted.
pub async fn delete_card(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    AppPath(card_id): AppPath<i64>,
) -> ApiResult<Json<MessageResponse>> {
    let card = load_card(&state, card_id)?;
    if card.owner_id != claims.sub || card.creator_id != claims.sub {
        return Err(ApiError::Forbidden("you may not delete this card"));
    }

    match state.db.delete_card(card_id, claims.sub) {
        Ok(true) => {}
        Ok(false) => {
            warn!("Card {} changed hands before it could be deleted", card_id);
            return Err(ApiError::ExpectationFailed("delete failed"));
        }
        Err(e) => {
            warn!("Failed to delete card {}: {:#}", card_id, e);
            return Err(ApiError::ExpectationFailed("delete failed"));
        }
    }

    info!("Card [{}:{}] deleted", card.id, card.title);
    Ok(Json(MessageResponse {
        message: "card deleted".to_string(),
    }))
}
