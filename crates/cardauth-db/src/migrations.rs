use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 =
        conn.query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        conn.execute_batch(
            "
            CREATE TABLE users (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                username    TEXT NOT NULL UNIQUE,
                email       TEXT NOT NULL UNIQUE,
                password    TEXT NOT NULL,
                nickname    TEXT NOT NULL DEFAULT '',
                created_at  TEXT NOT NULL DEFAULT (datetime('now')),
                updated_at  TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE cards (
                id                      INTEGER PRIMARY KEY AUTOINCREMENT,
                title                   TEXT NOT NULL,
                description             TEXT NOT NULL,
                creator_id              INTEGER NOT NULL REFERENCES users(id),
                owner_id                INTEGER NOT NULL REFERENCES users(id),
                status                  TEXT NOT NULL DEFAULT 'active'
                                        CHECK (status IN ('active', 'used', 'expired')),
                expires_at              TEXT,
                created_at              TEXT NOT NULL DEFAULT (datetime('now')),
                updated_at              TEXT NOT NULL DEFAULT (datetime('now')),
                last_transaction_at     TEXT,
                last_transaction_type   TEXT
            );

            CREATE INDEX idx_cards_creator ON cards(creator_id, created_at);
            CREATE INDEX idx_cards_owner ON cards(owner_id, created_at);
            CREATE INDEX idx_cards_expiry ON cards(status, expires_at);

            -- Audit log outlives deleted cards, so card_id carries no FK.
            CREATE TABLE card_transactions (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                card_id         INTEGER NOT NULL,
                from_user_id    INTEGER NOT NULL REFERENCES users(id),
                to_user_id      INTEGER NOT NULL REFERENCES users(id),
                type            TEXT NOT NULL CHECK (type IN ('send', 'use')),
                created_at      TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE INDEX idx_transactions_card ON card_transactions(card_id);
            CREATE INDEX idx_transactions_from ON card_transactions(from_user_id, created_at);
            CREATE INDEX idx_transactions_to ON card_transactions(to_user_id, created_at);

            CREATE TABLE friends (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id     INTEGER NOT NULL REFERENCES users(id),
                friend_id   INTEGER NOT NULL REFERENCES users(id),
                updated_at  TEXT NOT NULL DEFAULT (datetime('now')),
                UNIQUE(user_id, friend_id)
            );

            CREATE TABLE friend_invites (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                from_user_id    INTEGER NOT NULL REFERENCES users(id),
                to_user_id      INTEGER NOT NULL REFERENCES users(id),
                status          TEXT NOT NULL DEFAULT 'pending'
                                CHECK (status IN ('pending', 'accepted', 'rejected')),
                created_at      TEXT NOT NULL DEFAULT (datetime('now')),
                updated_at      TEXT NOT NULL DEFAULT (datetime('now')),
                UNIQUE(from_user_id, to_user_id)
            );

            CREATE INDEX idx_invites_to ON friend_invites(to_user_id, updated_at);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_are_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        run(&conn).unwrap();
        run(&conn).unwrap();

        let versions: i64 = conn
            .query_row("SELECT COUNT(*) FROM schema_version", [], |r| r.get(0))
            .unwrap();
        assert_eq!(versions, 1);
    }
}
