use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
#[error("unknown {kind} value: {value}")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub nickname: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Search results only expose the public part of a user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicUser {
    pub id: i64,
    pub username: String,
    pub nickname: String,
}

impl From<User> for PublicUser {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            nickname: user.nickname,
        }
    }
}

// -- Cards --

/// Lifecycle of a card. The only legal transitions are
/// `Active -> Used` and `Active -> Expired`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CardStatus {
    Active,
    Used,
    Expired,
}

impl CardStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Used => "used",
            Self::Expired => "expired",
        }
    }

    pub fn can_transition_to(self, next: CardStatus) -> bool {
        matches!(
            (self, next),
            (Self::Active, Self::Used) | (Self::Active, Self::Expired)
        )
    }
}

impl fmt::Display for CardStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CardStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "used" => Ok(Self::Used),
            "expired" => Ok(Self::Expired),
            other => Err(ParseEnumError {
                kind: "card status",
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Send,
    Use,
}

impl TransactionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Send => "send",
            Self::Use => "use",
        }
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionKind {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "send" => Ok(Self::Send),
            "use" => Ok(Self::Use),
            other => Err(ParseEnumError {
                kind: "transaction type",
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Card {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub creator_id: i64,
    pub owner_id: i64,
    pub status: CardStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_type: Option<TransactionKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creator: Option<User>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<User>,
}

impl Card {
    /// True once `expires_at` has passed, even if the sweep has not yet
    /// flipped the stored status.
    pub fn is_past_expiry(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }

    /// A card can be used or sent while it may still move to `Used`.
    pub fn is_usable(&self, now: DateTime<Utc>) -> bool {
        self.status.can_transition_to(CardStatus::Used) && !self.is_past_expiry(now)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CardTransaction {
    pub id: i64,
    pub card_id: i64,
    pub from_user_id: i64,
    pub to_user_id: i64,
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    pub created_at: DateTime<Utc>,
}

/// One line of the "recent activity" feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Activity {
    pub creator_nickname: String,
    pub owner_nickname: String,
    pub creator_id: i64,
    pub card_title: String,
    pub card_description: String,
    pub transaction_at: DateTime<Utc>,
    pub transaction_type: TransactionKind,
}

// -- Friends --

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InviteStatus {
    Pending,
    Accepted,
    Rejected,
}

impl InviteStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
        }
    }
}

impl fmt::Display for InviteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InviteStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "accepted" => Ok(Self::Accepted),
            "rejected" => Ok(Self::Rejected),
            other => Err(ParseEnumError {
                kind: "invite status",
                value: other.to_string(),
            }),
        }
    }
}

/// Invite status as shown next to a user in listings; `Default` means no
/// invite exists between the two users.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InviteState {
    Default,
    Pending,
    Accepted,
    Rejected,
}

impl From<Option<InviteStatus>> for InviteState {
    fn from(status: Option<InviteStatus>) -> Self {
        match status {
            None => Self::Default,
            Some(InviteStatus::Pending) => Self::Pending,
            Some(InviteStatus::Accepted) => Self::Accepted,
            Some(InviteStatus::Rejected) => Self::Rejected,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn card(status: CardStatus, expires_at: Option<DateTime<Utc>>) -> Card {
        let now = Utc::now();
        Card {
            id: 1,
            title: "Breakfast in bed".into(),
            description: "Redeem any Sunday".into(),
            creator_id: 1,
            owner_id: 2,
            status,
            expires_at,
            created_at: now,
            updated_at: now,
            transaction_at: None,
            transaction_type: None,
            creator: None,
            owner: None,
        }
    }

    #[test]
    fn status_round_trips_through_str() {
        for status in [CardStatus::Active, CardStatus::Used, CardStatus::Expired] {
            assert_eq!(status.as_str().parse::<CardStatus>().unwrap(), status);
        }
        assert!("revoked".parse::<CardStatus>().is_err());
    }

    #[test]
    fn status_only_moves_forward_from_active() {
        assert!(CardStatus::Active.can_transition_to(CardStatus::Used));
        assert!(CardStatus::Active.can_transition_to(CardStatus::Expired));
        assert!(!CardStatus::Used.can_transition_to(CardStatus::Active));
        assert!(!CardStatus::Expired.can_transition_to(CardStatus::Used));
        assert!(!CardStatus::Used.can_transition_to(CardStatus::Expired));
    }

    #[test]
    fn past_expiry_card_is_not_usable() {
        let now = Utc::now();
        assert!(card(CardStatus::Active, None).is_usable(now));
        assert!(card(CardStatus::Active, Some(now + Duration::hours(1))).is_usable(now));
        assert!(!card(CardStatus::Active, Some(now - Duration::seconds(1))).is_usable(now));
        assert!(!card(CardStatus::Used, None).is_usable(now));
        assert!(!card(CardStatus::Expired, None).is_usable(now));
    }

    #[test]
    fn transaction_serializes_kind_as_type() {
        let tx = CardTransaction {
            id: 7,
            card_id: 1,
            from_user_id: 1,
            to_user_id: 2,
            kind: TransactionKind::Send,
            created_at: Utc::now(),
        };
        let json = serde_json::to_value(&tx).unwrap();
        assert_eq!(json["type"], "send");
    }

    #[test]
    fn missing_invite_is_shown_as_default() {
        assert_eq!(InviteState::from(None), InviteState::Default);
        assert_eq!(
            serde_json::to_value(InviteState::from(Some(InviteStatus::Pending))).unwrap(),
            "pending"
        );
        assert_eq!(serde_json::to_value(InviteState::Default).unwrap(), "default");
    }
}
