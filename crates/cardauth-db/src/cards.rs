use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};

use crate::models::{
    ActivityRow, CARD_COLUMNS, CardDetailRow, CardRow, TransactionRow, USER_COLUMNS, UserRow,
    columns,
};
use crate::{Database, enum_at, format_timestamp, timestamp_at};

/// A status transition only applies to an active card that has not passed
/// its expiry. Keeping the guard in the UPDATE makes it atomic with respect
/// to the expiry sweep.
const USABLE_GUARD: &str = "status = 'active' AND (expires_at IS NULL OR expires_at > ?3)";

impl Database {
    pub fn create_card(
        &self,
        creator_id: i64,
        title: &str,
        description: &str,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<i64> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO cards (title, description, creator_id, owner_id, expires_at)
                 VALUES (?1, ?2, ?3, ?3, ?4)",
                params![title, description, creator_id, expires_at.map(format_timestamp)],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    pub fn get_card(&self, id: i64) -> Result<Option<CardRow>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {} FROM cards c WHERE c.id = ?1", columns("c", &CARD_COLUMNS));
            let row = conn
                .query_row(&sql, [id], |row| CardRow::from_row(row, 0))
                .optional()?;
            Ok(row)
        })
    }

    pub fn get_card_detail(&self, id: i64) -> Result<Option<CardDetailRow>> {
        self.with_conn(|conn| {
            let mut rows = query_card_details(conn, "c.id = ?1", id)?;
            Ok(rows.pop())
        })
    }

    /// Cards the user created, newest first.
    pub fn list_created_cards(&self, user_id: i64) -> Result<Vec<CardDetailRow>> {
        self.with_conn(|conn| query_card_details(conn, "c.creator_id = ?1", user_id))
    }

    /// Cards the user currently owns but did not create, newest first.
    pub fn list_received_cards(&self, user_id: i64) -> Result<Vec<CardDetailRow>> {
        self.with_conn(|conn| {
            query_card_details(conn, "c.owner_id = ?1 AND c.creator_id != ?1", user_id)
        })
    }

    /// Redeem a card on behalf of its owner and log a `use` transaction from
    /// the owner back to the creator. Returns false when the card is not
    /// owned by `owner_id` or is no longer usable.
    pub fn use_card(&self, card_id: i64, owner_id: i64, now: DateTime<Utc>) -> Result<bool> {
        let now = format_timestamp(now);
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let changed = tx.execute(
                &format!(
                    "UPDATE cards
                     SET status = 'used', updated_at = ?3,
                         last_transaction_at = ?3, last_transaction_type = 'use'
                     WHERE id = ?1 AND owner_id = ?2 AND {USABLE_GUARD}"
                ),
                params![card_id, owner_id, now],
            )?;
            if changed == 0 {
                return Ok(false);
            }

            tx.execute(
                "INSERT INTO card_transactions (card_id, from_user_id, to_user_id, type, created_at)
                 SELECT id, owner_id, creator_id, 'use', ?2 FROM cards WHERE id = ?1",
                params![card_id, now],
            )?;
            tx.commit()?;
            Ok(true)
        })
    }

    /// Transfer ownership of an active card and log a `send` transaction.
    /// Returns false when `from_user_id` does not own the card or it is no
    /// longer usable.
    pub fn send_card(
        &self,
        card_id: i64,
        from_user_id: i64,
        to_user_id: i64,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let now = format_timestamp(now);
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let changed = tx.execute(
                &format!(
                    "UPDATE cards
                     SET owner_id = ?4, updated_at = ?3,
                         last_transaction_at = ?3, last_transaction_type = 'send'
                     WHERE id = ?1 AND owner_id = ?2 AND {USABLE_GUARD}"
                ),
                params![card_id, from_user_id, now, to_user_id],
            )?;
            if changed == 0 {
                return Ok(false);
            }

            tx.execute(
                "INSERT INTO card_transactions (card_id, from_user_id, to_user_id, type, created_at)
                 VALUES (?1, ?2, ?3, 'send', ?4)",
                params![card_id, from_user_id, to_user_id, now],
            )?;
            tx.commit()?;
            Ok(true)
        })
    }

    /// Delete a card the user both created and still owns.
    pub fn delete_card(&self, card_id: i64, user_id: i64) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "DELETE FROM cards WHERE id = ?1 AND owner_id = ?2 AND creator_id = ?2",
                params![card_id, user_id],
            )?;
            Ok(changed == 1)
        })
    }

    /// Move every active card whose expiry has passed to `expired`.
    /// Returns the number of cards changed.
    pub fn expire_cards(&self, now: DateTime<Utc>) -> Result<usize> {
        let now = format_timestamp(now);
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "UPDATE cards SET status = 'expired', updated_at = ?1
                 WHERE status = 'active' AND expires_at IS NOT NULL AND expires_at <= ?1",
                [&now],
            )?;
            Ok(changed)
        })
    }

    /// Transaction log of a card, oldest first.
    pub fn list_card_transactions(&self, card_id: i64) -> Result<Vec<TransactionRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, card_id, from_user_id, to_user_id, type, created_at
                 FROM card_transactions
                 WHERE card_id = ?1
                 ORDER BY created_at, id",
            )?;
            let rows = stmt
                .query_map([card_id], |row| {
                    Ok(TransactionRow {
                        id: row.get(0)?,
                        card_id: row.get(1)?,
                        from_user_id: row.get(2)?,
                        to_user_id: row.get(3)?,
                        kind: enum_at(row, 4)?,
                        created_at: timestamp_at(row, 5)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Latest send/use events the user took part in, skipping expired cards.
    pub fn recent_activity(&self, user_id: i64, limit: u32) -> Result<Vec<ActivityRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT cr.id, cr.nickname, o.nickname, c.title, c.description, t.created_at, t.type
                 FROM card_transactions t
                 JOIN cards c ON c.id = t.card_id
                 JOIN users cr ON cr.id = c.creator_id
                 JOIN users o ON o.id = c.owner_id
                 WHERE c.status != 'expired'
                   AND (t.from_user_id = ?1 OR t.to_user_id = ?1)
                 ORDER BY t.created_at DESC, t.id DESC
                 LIMIT ?2",
            )?;
            let rows = stmt
                .query_map(params![user_id, limit], |row| {
                    Ok(ActivityRow {
                        creator_id: row.get(0)?,
                        creator_nickname: row.get(1)?,
                        owner_nickname: row.get(2)?,
                        card_title: row.get(3)?,
                        card_description: row.get(4)?,
                        transaction_at: timestamp_at(row, 5)?,
                        transaction_type: enum_at(row, 6)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

// JOIN users twice so creator and owner come back with the card (no N+1)
fn query_card_details(conn: &Connection, predicate: &str, id: i64) -> Result<Vec<CardDetailRow>> {
    let sql = format!(
        "SELECT {}, {}, {}
         FROM cards c
         JOIN users cr ON cr.id = c.creator_id
         JOIN users o ON o.id = c.owner_id
         WHERE {}
         ORDER BY c.created_at DESC, c.id DESC",
        columns("c", &CARD_COLUMNS),
        columns("cr", &USER_COLUMNS),
        columns("o", &USER_COLUMNS),
        predicate
    );
    let creator_at = CARD_COLUMNS.len();
    let owner_at = creator_at + USER_COLUMNS.len();

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([id], |row| {
            Ok(CardDetailRow {
                card: CardRow::from_row(row, 0)?,
                creator: UserRow::from_row(row, creator_at)?,
                owner: UserRow::from_row(row, owner_at)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use cardauth_types::models::{CardStatus, TransactionKind};

    use crate::test_support::{db, user};

    #[test]
    fn new_card_is_active_and_owned_by_creator() {
        let db = db();
        let alice = user(&db, "alice");
        let id = db.create_card(alice, "Movie night", "Pick any film", None).unwrap();

        let card = db.get_card(id).unwrap().unwrap();
        assert_eq!(card.status, CardStatus::Active);
        assert_eq!(card.creator_id, alice);
        assert_eq!(card.owner_id, alice);
        assert!(card.last_transaction_type.is_none());

        let detail = db.get_card_detail(id).unwrap().unwrap();
        assert_eq!(detail.creator.username, "alice");
        assert_eq!(detail.owner.username, "alice");
    }

    #[test]
    fn send_transfers_ownership_and_logs() {
        let db = db();
        let alice = user(&db, "alice");
        let bob = user(&db, "bob");
        let id = db.create_card(alice, "Hug", "One free hug", None).unwrap();

        assert!(db.send_card(id, alice, bob, Utc::now()).unwrap());

        let card = db.get_card(id).unwrap().unwrap();
        assert_eq!(card.owner_id, bob);
        assert_eq!(card.last_transaction_type, Some(TransactionKind::Send));

        let log = db.list_card_transactions(id).unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!((log[0].from_user_id, log[0].to_user_id), (alice, bob));
        assert_eq!(log[0].kind, TransactionKind::Send);

        // The previous owner can no longer send it.
        assert!(!db.send_card(id, alice, bob, Utc::now()).unwrap());
        assert_eq!(db.list_card_transactions(id).unwrap().len(), 1);

        assert_eq!(db.list_received_cards(bob).unwrap().len(), 1);
        assert!(db.list_received_cards(alice).unwrap().is_empty());
        assert_eq!(db.list_created_cards(alice).unwrap().len(), 1);
    }

    #[test]
    fn use_is_one_way() {
        let db = db();
        let alice = user(&db, "alice");
        let bob = user(&db, "bob");
        let id = db.create_card(alice, "Dinner", "I cook", None).unwrap();
        db.send_card(id, alice, bob, Utc::now()).unwrap();

        // Only the owner may use it.
        assert!(!db.use_card(id, alice, Utc::now()).unwrap());
        assert!(db.use_card(id, bob, Utc::now()).unwrap());
        assert!(!db.use_card(id, bob, Utc::now()).unwrap());
        assert!(!db.send_card(id, bob, alice, Utc::now()).unwrap());

        let card = db.get_card(id).unwrap().unwrap();
        assert_eq!(card.status, CardStatus::Used);

        let log = db.list_card_transactions(id).unwrap();
        assert_eq!(log.len(), 2);
        assert_eq!(log[1].kind, TransactionKind::Use);
        assert_eq!((log[1].from_user_id, log[1].to_user_id), (bob, alice));
    }

    #[test]
    fn sweep_expires_only_due_active_cards() {
        let db = db();
        let alice = user(&db, "alice");
        let now = Utc::now();
        let due = db
            .create_card(alice, "Due", "gone", Some(now - Duration::minutes(1)))
            .unwrap();
        let later = db
            .create_card(alice, "Later", "still here", Some(now + Duration::days(1)))
            .unwrap();
        let forever = db.create_card(alice, "Forever", "no expiry", None).unwrap();
        let used = db
            .create_card(alice, "Used", "redeemed", Some(now + Duration::seconds(30)))
            .unwrap();
        db.use_card(used, alice, now).unwrap();

        assert_eq!(db.expire_cards(now).unwrap(), 1);
        assert_eq!(db.get_card(due).unwrap().unwrap().status, CardStatus::Expired);
        assert_eq!(db.get_card(later).unwrap().unwrap().status, CardStatus::Active);
        assert_eq!(db.get_card(forever).unwrap().unwrap().status, CardStatus::Active);
        assert_eq!(db.get_card(used).unwrap().unwrap().status, CardStatus::Used);

        // Already expired cards are not counted twice.
        assert_eq!(db.expire_cards(now).unwrap(), 0);
    }

    #[test]
    fn past_expiry_card_cannot_move_before_sweep() {
        let db = db();
        let alice = user(&db, "alice");
        let bob = user(&db, "bob");
        let now = Utc::now();
        let id = db
            .create_card(alice, "Stale", "too late", Some(now - Duration::seconds(5)))
            .unwrap();

        assert!(!db.send_card(id, alice, bob, now).unwrap());
        assert!(!db.use_card(id, alice, now).unwrap());
        assert!(db.list_card_transactions(id).unwrap().is_empty());
    }

    #[test]
    fn delete_requires_creator_and_owner() {
        let db = db();
        let alice = user(&db, "alice");
        let bob = user(&db, "bob");
        let kept = db.create_card(alice, "Kept", "sent away", None).unwrap();
        db.send_card(kept, alice, bob, Utc::now()).unwrap();

        assert!(!db.delete_card(kept, alice).unwrap());
        assert!(!db.delete_card(kept, bob).unwrap());

        let own = db.create_card(alice, "Own", "still mine", None).unwrap();
        assert!(db.delete_card(own, alice).unwrap());
        assert!(db.get_card(own).unwrap().is_none());
    }

    #[test]
    fn activity_lists_latest_events_for_either_side() {
        let db = db();
        let alice = user(&db, "alice");
        let bob = user(&db, "bob");
        let carol = user(&db, "carol");
        let now = Utc::now();

        let first = db.create_card(alice, "First", "one", None).unwrap();
        let second = db.create_card(alice, "Second", "two", None).unwrap();
        let unrelated = db.create_card(carol, "Other", "not ours", None).unwrap();
        db.send_card(first, alice, bob, now).unwrap();
        db.send_card(second, alice, bob, now + Duration::seconds(1)).unwrap();
        db.use_card(first, bob, now + Duration::seconds(2)).unwrap();
        db.send_card(unrelated, carol, alice, now + Duration::seconds(3)).unwrap();

        let bobs = db.recent_activity(bob, 5).unwrap();
        assert_eq!(bobs.len(), 3);
        assert_eq!(bobs[0].card_title, "First");
        assert_eq!(bobs[0].transaction_type, TransactionKind::Use);
        assert_eq!(bobs[1].card_title, "Second");
        assert_eq!(bobs[0].creator_id, alice);

        assert_eq!(db.recent_activity(bob, 2).unwrap().len(), 2);
        assert_eq!(db.recent_activity(alice, 10).unwrap().len(), 4);
    }
}
