use anyhow::Result;
use rusqlite::{OptionalExtension, params};

use crate::Database;
use crate::models::{INVITE_COLUMNS, InviteRow, InviteWithUserRow, USER_COLUMNS, UserRow, columns};

impl Database {
    pub fn are_friends(&self, user_id: i64, friend_id: i64) -> Result<bool> {
        self.with_conn(|conn| {
            let found: Option<i64> = conn
                .query_row(
                    "SELECT 1 FROM friends WHERE user_id = ?1 AND friend_id = ?2",
                    params![user_id, friend_id],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(found.is_some())
        })
    }

    /// The user's friends, most recent friendship first.
    pub fn list_friends(&self, user_id: i64) -> Result<Vec<UserRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM friends f
                 JOIN users u ON u.id = f.friend_id
                 WHERE f.user_id = ?1
                 ORDER BY f.updated_at DESC, f.id DESC",
                columns("u", &USER_COLUMNS)
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([user_id], |row| UserRow::from_row(row, 0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn get_invite(&self, from_user_id: i64, to_user_id: i64) -> Result<Option<InviteRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM friend_invites i WHERE i.from_user_id = ?1 AND i.to_user_id = ?2",
                columns("i", &INVITE_COLUMNS)
            );
            let row = conn
                .query_row(&sql, params![from_user_id, to_user_id], |row| {
                    InviteRow::from_row(row, 0)
                })
                .optional()?;
            Ok(row)
        })
    }

    /// Create a pending invite. A second invite for the same direction
    /// violates the UNIQUE constraint.
    pub fn create_invite(&self, from_user_id: i64, to_user_id: i64) -> Result<i64> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO friend_invites (from_user_id, to_user_id) VALUES (?1, ?2)",
                params![from_user_id, to_user_id],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    /// Accept a pending invite and insert the friendship in both directions,
    /// all in one transaction. A pending invite the other way is settled too.
    /// Returns false if there was no pending invite.
    pub fn accept_invite(&self, from_user_id: i64, to_user_id: i64) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let changed = tx.execute(
                "UPDATE friend_invites SET status = 'accepted', updated_at = datetime('now')
                 WHERE from_user_id = ?1 AND to_user_id = ?2 AND status = 'pending'",
                params![from_user_id, to_user_id],
            )?;
            if changed == 0 {
                return Ok(false);
            }
            tx.execute(
                "UPDATE friend_invites SET status = 'accepted', updated_at = datetime('now')
                 WHERE from_user_id = ?2 AND to_user_id = ?1 AND status = 'pending'",
                params![from_user_id, to_user_id],
            )?;

            // OR IGNORE: the pair may predate this invite.
            let mut insert = tx.prepare(
                "INSERT OR IGNORE INTO friends (user_id, friend_id) VALUES (?1, ?2)",
            )?;
            insert.execute(params![to_user_id, from_user_id])?;
            insert.execute(params![from_user_id, to_user_id])?;
            drop(insert);

            tx.commit()?;
            Ok(true)
        })
    }

    /// Returns false if there was no pending invite.
    pub fn reject_invite(&self, from_user_id: i64, to_user_id: i64) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "UPDATE friend_invites SET status = 'rejected', updated_at = datetime('now')
                 WHERE from_user_id = ?1 AND to_user_id = ?2 AND status = 'pending'",
                params![from_user_id, to_user_id],
            )?;
            Ok(changed == 1)
        })
    }

    /// Invites the user sent, joined with the invitee, most recent first.
    pub fn list_sent_invites(&self, user_id: i64) -> Result<Vec<InviteWithUserRow>> {
        self.query_invites_with_user("i.from_user_id = ?1", "i.to_user_id", user_id)
    }

    /// Invites the user received, joined with the inviter, most recent first.
    pub fn list_received_invites(&self, user_id: i64) -> Result<Vec<InviteWithUserRow>> {
        self.query_invites_with_user("i.to_user_id = ?1", "i.from_user_id", user_id)
    }

    /// Batch-fetch the invites `from_user_id` sent to any of `to_user_ids`.
    pub fn invites_from(&self, from_user_id: i64, to_user_ids: &[i64]) -> Result<Vec<InviteRow>> {
        if to_user_ids.is_empty() {
            return Ok(vec![]);
        }

        self.with_conn(|conn| {
            let placeholders: Vec<String> =
                (2..=to_user_ids.len() + 1).map(|i| format!("?{}", i)).collect();
            let sql = format!(
                "SELECT {} FROM friend_invites i WHERE i.from_user_id = ?1 AND i.to_user_id IN ({})",
                columns("i", &INVITE_COLUMNS),
                placeholders.join(", ")
            );

            let mut stmt = conn.prepare(&sql)?;
            let mut params: Vec<&dyn rusqlite::types::ToSql> = Vec::with_capacity(to_user_ids.len() + 1);
            params.push(&from_user_id);
            params.extend(to_user_ids.iter().map(|id| id as &dyn rusqlite::types::ToSql));

            let rows = stmt
                .query_map(params.as_slice(), |row| InviteRow::from_row(row, 0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    fn query_invites_with_user(
        &self,
        predicate: &str,
        other_side: &str,
        user_id: i64,
    ) -> Result<Vec<InviteWithUserRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {}, {} FROM friend_invites i
                 JOIN users u ON u.id = {}
                 WHERE {}
                 ORDER BY i.updated_at DESC, i.id DESC",
                columns("u", &USER_COLUMNS),
                columns("i", &INVITE_COLUMNS),
                other_side,
                predicate
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([user_id], |row| {
                    Ok(InviteWithUserRow {
                        user: UserRow::from_row(row, 0)?,
                        invite: InviteRow::from_row(row, USER_COLUMNS.len())?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}
