//! Database row types. These map directly to SQLite rows and are kept
//! separate from the cardauth-types API models; conversions live here.

use chrono::{DateTime, Utc};
use rusqlite::Row;

use cardauth_types::models::{
    Activity, Card, CardStatus, CardTransaction, InviteStatus, TransactionKind, User,
};

use crate::{enum_at, opt_timestamp_at, timestamp_at};

pub struct UserRow {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub password: String,
    pub nickname: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub(crate) const USER_COLUMNS: [&str; 7] = [
    "id",
    "username",
    "email",
    "password",
    "nickname",
    "created_at",
    "updated_at",
];

impl UserRow {
    pub(crate) fn from_row(row: &Row<'_>, offset: usize) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(offset)?,
            username: row.get(offset + 1)?,
            email: row.get(offset + 2)?,
            password: row.get(offset + 3)?,
            nickname: row.get(offset + 4)?,
            created_at: timestamp_at(row, offset + 5)?,
            updated_at: timestamp_at(row, offset + 6)?,
        })
    }
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            username: row.username,
            email: row.email,
            nickname: row.nickname,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

pub struct CardRow {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub creator_id: i64,
    pub owner_id: i64,
    pub status: CardStatus,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_transaction_at: Option<DateTime<Utc>>,
    pub last_transaction_type: Option<TransactionKind>,
}

pub(crate) const CARD_COLUMNS: [&str; 11] = [
    "id",
    "title",
    "description",
    "creator_id",
    "owner_id",
    "status",
    "expires_at",
    "created_at",
    "updated_at",
    "last_transaction_at",
    "last_transaction_type",
];

impl CardRow {
    pub(crate) fn from_row(row: &Row<'_>, offset: usize) -> rusqlite::Result<Self> {
        let last_type: Option<String> = row.get(offset + 10)?;
        let last_transaction_type = match last_type {
            Some(_) => Some(enum_at(row, offset + 10)?),
            None => None,
        };

        Ok(Self {
            id: row.get(offset)?,
            title: row.get(offset + 1)?,
            description: row.get(offset + 2)?,
            creator_id: row.get(offset + 3)?,
            owner_id: row.get(offset + 4)?,
            status: enum_at(row, offset + 5)?,
            expires_at: opt_timestamp_at(row, offset + 6)?,
            created_at: timestamp_at(row, offset + 7)?,
            updated_at: timestamp_at(row, offset + 8)?,
            last_transaction_at: opt_timestamp_at(row, offset + 9)?,
            last_transaction_type,
        })
    }
}

impl From<CardRow> for Card {
    fn from(row: CardRow) -> Self {
        Self {
            id: row.id,
            title: row.title,
            description: row.description,
            creator_id: row.creator_id,
            owner_id: row.owner_id,
            status: row.status,
            expires_at: row.expires_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
            transaction_at: row.last_transaction_at,
            transaction_type: row.last_transaction_type,
            creator: None,
            owner: None,
        }
    }
}

/// A card joined with its creator and current owner.
pub struct CardDetailRow {
    pub card: CardRow,
    pub creator: UserRow,
    pub owner: UserRow,
}

impl From<CardDetailRow> for Card {
    fn from(row: CardDetailRow) -> Self {
        let mut card = Card::from(row.card);
        card.creator = Some(row.creator.into());
        card.owner = Some(row.owner.into());
        card
    }
}

pub struct TransactionRow {
    pub id: i64,
    pub card_id: i64,
    pub from_user_id: i64,
    pub to_user_id: i64,
    pub kind: TransactionKind,
    pub created_at: DateTime<Utc>,
}

impl From<TransactionRow> for CardTransaction {
    fn from(row: TransactionRow) -> Self {
        Self {
            id: row.id,
            card_id: row.card_id,
            from_user_id: row.from_user_id,
            to_user_id: row.to_user_id,
            kind: row.kind,
            created_at: row.created_at,
        }
    }
}

pub struct ActivityRow {
    pub creator_id: i64,
    pub creator_nickname: String,
    pub owner_nickname: String,
    pub card_title: String,
    pub card_description: String,
    pub transaction_at: DateTime<Utc>,
    pub transaction_type: TransactionKind,
}

impl From<ActivityRow> for Activity {
    fn from(row: ActivityRow) -> Self {
        Self {
            creator_nickname: row.creator_nickname,
            owner_nickname: row.owner_nickname,
            creator_id: row.creator_id,
            card_title: row.card_title,
            card_description: row.card_description,
            transaction_at: row.transaction_at,
            transaction_type: row.transaction_type,
        }
    }
}

pub struct InviteRow {
    pub id: i64,
    pub from_user_id: i64,
    pub to_user_id: i64,
    pub status: InviteStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub(crate) const INVITE_COLUMNS: [&str; 6] = [
    "id",
    "from_user_id",
    "to_user_id",
    "status",
    "created_at",
    "updated_at",
];

impl InviteRow {
    pub(crate) fn from_row(row: &Row<'_>, offset: usize) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(offset)?,
            from_user_id: row.get(offset + 1)?,
            to_user_id: row.get(offset + 2)?,
            status: enum_at(row, offset + 3)?,
            created_at: timestamp_at(row, offset + 4)?,
            updated_at: timestamp_at(row, offset + 5)?,
        })
    }
}

/// An invite together with the user on the other end of it.
pub struct InviteWithUserRow {
    pub user: UserRow,
    pub invite: InviteRow,
}

/// Render `alias.col, alias.col, ...` for a joined select.
pub(crate) fn columns(alias: &str, cols: &[&str]) -> String {
    cols.iter()
        .map(|c| format!("{alias}.{c}"))
        .collect::<Vec<_>>()
        .join(", ")
}
