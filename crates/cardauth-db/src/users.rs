use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, params};

use crate::models::{USER_COLUMNS, UserRow, columns};
use crate::{Database, like_pattern};

impl Database {
    /// Insert a user and return the new id. `password_hash` must already be
    /// a PHC string.
    pub fn create_user(
        &self,
        username: &str,
        email: &str,
        password_hash: &str,
        nickname: &str,
    ) -> Result<i64> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO users (username, email, password, nickname) VALUES (?1, ?2, ?3, ?4)",
                params![username, email, password_hash, nickname],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    pub fn get_user_by_id(&self, id: i64) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "id = ?1", &id))
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "username = ?1", &username))
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "email = ?1", &email))
    }

    /// All users, newest first.
    pub fn list_users(&self) -> Result<Vec<UserRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM users u ORDER BY u.created_at DESC, u.id DESC",
                columns("u", &USER_COLUMNS)
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([], |row| UserRow::from_row(row, 0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Substring match on username or nickname.
    pub fn search_users(&self, query: &str, limit: u32) -> Result<Vec<UserRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM users u
                 WHERE u.username LIKE ?1 ESCAPE '\\' OR u.nickname LIKE ?1 ESCAPE '\\'
                 ORDER BY u.username
                 LIMIT ?2",
                columns("u", &USER_COLUMNS)
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params![like_pattern(query), limit], |row| UserRow::from_row(row, 0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Substring match on username or nickname, or an exact e-mail match.
    pub fn search_users_by_name_or_email(&self, query: &str, limit: u32) -> Result<Vec<UserRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM users u
                 WHERE u.username LIKE ?1 ESCAPE '\\'
                    OR u.nickname LIKE ?1 ESCAPE '\\'
                    OR u.email = ?2
                 ORDER BY u.username
                 LIMIT ?3",
                columns("u", &USER_COLUMNS)
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params![like_pattern(query), query, limit], |row| {
                    UserRow::from_row(row, 0)
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Update the editable profile fields. `None` leaves a field untouched.
    /// Returns false if the user does not exist.
    pub fn update_user_profile(
        &self,
        id: i64,
        nickname: Option<&str>,
        email: Option<&str>,
    ) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "UPDATE users
                 SET nickname = COALESCE(?2, nickname),
                     email = COALESCE(?3, email),
                     updated_at = datetime('now')
                 WHERE id = ?1",
                params![id, nickname, email],
            )?;
            Ok(changed == 1)
        })
    }
}

fn query_user(
    conn: &Connection,
    predicate: &str,
    value: &dyn rusqlite::ToSql,
) -> Result<Option<UserRow>> {
    let sql = format!(
        "SELECT {} FROM users u WHERE u.{}",
        columns("u", &USER_COLUMNS),
        predicate
    );
    let mut stmt = conn.prepare(&sql)?;
    let row = stmt
        .query_row([value], |row| UserRow::from_row(row, 0))
        .optional()?;
    Ok(row)
}

#[cfg(test)]
mod tests {
    use crate::is_unique_violation;
    use crate::test_support::{db, user};

    #[test]
    fn lookup_by_each_unique_key() {
        let db = db();
        let id = user(&db, "alice");

        assert_eq!(db.get_user_by_id(id).unwrap().unwrap().username, "alice");
        assert_eq!(db.get_user_by_username("alice").unwrap().unwrap().id, id);
        assert_eq!(db.get_user_by_email("alice@example.com").unwrap().unwrap().id, id);
        assert!(db.get_user_by_username("bob").unwrap().is_none());
    }

    #[test]
    fn duplicate_email_is_rejected() {
        let db = db();
        user(&db, "alice");
        let err = db
            .create_user("alice2", "alice@example.com", "hash", "")
            .unwrap_err();
        assert!(is_unique_violation(&err));
    }

    #[test]
    fn search_matches_substrings_and_exact_email() {
        let db = db();
        user(&db, "alice");
        user(&db, "malice");
        user(&db, "bob");

        let names: Vec<String> = db
            .search_users("lic", 10)
            .unwrap()
            .into_iter()
            .map(|u| u.username)
            .collect();
        assert_eq!(names, vec!["alice", "malice"]);

        let by_email = db
            .search_users_by_name_or_email("bob@example.com", 25)
            .unwrap();
        assert_eq!(by_email.len(), 1);
        assert_eq!(by_email[0].username, "bob");

        // Wildcards in the query are literal.
        assert!(db.search_users("%", 10).unwrap().is_empty());
    }

    #[test]
    fn search_respects_limit() {
        let db = db();
        for i in 0..5 {
            user(&db, &format!("user{i}"));
        }
        assert_eq!(db.search_users("user", 3).unwrap().len(), 3);
    }

    #[test]
    fn profile_update_keeps_unset_fields() {
        let db = db();
        let id = user(&db, "alice");

        assert!(db.update_user_profile(id, Some("Ally"), None).unwrap());
        let row = db.get_user_by_id(id).unwrap().unwrap();
        assert_eq!(row.nickname, "Ally");
        assert_eq!(row.email, "alice@example.com");

        assert!(!db.update_user_profile(999, Some("ghost"), None).unwrap());
    }
}
