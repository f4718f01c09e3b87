//! SQLite schema definitions for user collections
//!
//! Tables:
//! - cards: One row per card per user, scraped attributes inline
//! - card_tags: User-assigned labels, one row per tag

use rusqlite::{Connection, Result};

/// Create all tables in the database
pub fn create_tables(conn: &Connection) -> Result<()> {
    conn.execute(
        r#"
        CREATE TABLE IF NOT EXISTS cards (
            username TEXT NOT NULL,
            cert_number TEXT NOT NULL,
            player_name TEXT NOT NULL DEFAULT '',
            set_name TEXT NOT NULL DEFAULT '',
            subset TEXT NOT NULL DEFAULT '',
            variation TEXT NOT NULL DEFAULT '',
            grade_label TEXT NOT NULL DEFAULT '',
            image_url TEXT NOT NULL,
            source_link TEXT NOT NULL,
            added_at TEXT DEFAULT (datetime('now')),
            PRIMARY KEY (username, cert_number)
        )
        "#,
        [],
    )?;

    conn.execute(
        r#"
        CREATE TABLE IF NOT EXISTS card_tags (
            username TEXT NOT NULL,
            cert_number TEXT NOT NULL,
            tag TEXT NOT NULL,
            PRIMARY KEY (username, cert_number, tag),
            FOREIGN KEY (username, cert_number) REFERENCES cards(username, cert_number)
        )
        "#,
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_cards_username ON cards(username)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_card_tags_tag ON card_tags(username, tag)",
        [],
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn test_create_tables_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        create_tables(&conn).unwrap();
        create_tables(&conn).unwrap();

        let count: i64 = conn
            .query_row(
                "SELECT count(*) FROM sqlite_master WHERE type = 'table' AND name IN ('cards', 'card_tags')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 2);
    }
}
