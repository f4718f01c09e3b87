//! SQLite repository for CRUD operations on user collections

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use super::schema::create_tables;
use crate::scraper::CardRecord;

/// How a listed collection is ordered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    /// Insertion order, oldest first
    #[default]
    Added,
    /// Grade descending; ungraded cards last
    Grade,
    /// Set name ascending
    SetName,
}

impl SortOrder {
    /// Parse the `sort_by` query value; anything unknown is insertion order.
    pub fn from_query(value: Option<&str>) -> Self {
        match value {
            Some("grade") => SortOrder::Grade,
            Some("set_name") => SortOrder::SetName,
            _ => SortOrder::Added,
        }
    }
}

/// Repository for per-user card collections
pub struct CardRepository {
    conn: Connection,
}

impl CardRepository {
    /// Open a repository, initializing the database if needed
    pub fn new(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating database directory {:?}", parent))?;
        }
        let conn = Connection::open(db_path)
            .with_context(|| format!("opening database {:?}", db_path))?;
        create_tables(&conn)?;
        Ok(Self { conn })
    }

    /// In-memory repository, used by tests
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        create_tables(&conn)?;
        Ok(Self { conn })
    }

    /// Insert a card into a user's collection.
    ///
    /// Returns `false` when the user already owns that cert number. Records
    /// with empty scraped fields are stored as-is; a degraded scrape still
    /// counts as an addition.
    pub fn add_card(&self, username: &str, record: &CardRecord) -> Result<bool> {
        if self.get_card(username, &record.cert_number)?.is_some() {
            return Ok(false);
        }

        self.conn.execute(
            r#"
            INSERT INTO cards (
                username, cert_number, player_name, set_name,
                subset, variation, grade_label, image_url, source_link
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
            params![
                username,
                record.cert_number,
                record.player_name,
                record.set_name,
                record.subset,
                record.variation,
                record.grade_label,
                record.image_url,
                record.source_link,
            ],
        )?;

        for tag in &record.tags {
            self.conn.execute(
                "INSERT OR IGNORE INTO card_tags (username, cert_number, tag) VALUES (?1, ?2, ?3)",
                params![username, record.cert_number, tag],
            )?;
        }

        Ok(true)
    }

    /// Look up a single card
    pub fn get_card(&self, username: &str, cert_number: &str) -> Result<Option<CardRecord>> {
        let record = self
            .conn
            .query_row(
                r#"
                SELECT cert_number, player_name, set_name, subset,
                       variation, grade_label, image_url, source_link
                FROM cards WHERE username = ?1 AND cert_number = ?2
                "#,
                params![username, cert_number],
                row_to_record,
            )
            .optional()?;

        match record {
            Some(mut record) => {
                record.tags = self.tags_for(username, &record.cert_number)?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    /// Remove a card and its tags. Returns `false` when the card was absent.
    pub fn remove_card(&self, username: &str, cert_number: &str) -> Result<bool> {
        self.conn.execute(
            "DELETE FROM card_tags WHERE username = ?1 AND cert_number = ?2",
            params![username, cert_number],
        )?;
        let removed = self.conn.execute(
            "DELETE FROM cards WHERE username = ?1 AND cert_number = ?2",
            params![username, cert_number],
        )?;
        Ok(removed > 0)
    }

    /// List a user's cards, optionally filtered to one tag, in the given order
    pub fn list_cards(
        &self,
        username: &str,
        tag: Option<&str>,
        sort: SortOrder,
    ) -> Result<Vec<CardRecord>> {
        let mut records = match tag {
            Some(tag) => {
                let mut stmt = self.conn.prepare(
                    r#"
                    SELECT c.cert_number, c.player_name, c.set_name, c.subset,
                           c.variation, c.grade_label, c.image_url, c.source_link
                    FROM cards c
                    JOIN card_tags t
                      ON t.username = c.username AND t.cert_number = c.cert_number
                    WHERE c.username = ?1 AND t.tag = ?2
                    ORDER BY c.rowid
                    "#,
                )?;
                let rows = stmt.query_map(params![username, tag], row_to_record)?;
                rows.collect::<rusqlite::Result<Vec<_>>>()?
            }
            None => {
                let mut stmt = self.conn.prepare(
                    r#"
                    SELECT cert_number, player_name, set_name, subset,
                           variation, grade_label, image_url, source_link
                    FROM cards WHERE username = ?1
                    ORDER BY rowid
                    "#,
                )?;
                let rows = stmt.query_map(params![username], row_to_record)?;
                rows.collect::<rusqlite::Result<Vec<_>>>()?
            }
        };

        for record in &mut records {
            record.tags = self.tags_for(username, &record.cert_number)?;
        }

        match sort {
            SortOrder::Added => {}
            SortOrder::Grade => {
                records.sort_by(|a, b| {
                    let ka = a.grade_numeric().unwrap_or(-1.0);
                    let kb = b.grade_numeric().unwrap_or(-1.0);
                    kb.total_cmp(&ka)
                });
            }
            SortOrder::SetName => records.sort_by(|a, b| a.set_name.cmp(&b.set_name)),
        }

        Ok(records)
    }

    /// Attach a tag to a card. Tags are stored trimmed and lowercased.
    /// Returns `false` when the tag is already present.
    pub fn add_tag(&self, username: &str, cert_number: &str, tag: &str) -> Result<bool> {
        let tag = normalize_tag(tag);
        anyhow::ensure!(!tag.is_empty(), "tag must not be empty");
        anyhow::ensure!(
            self.get_card(username, cert_number)?.is_some(),
            "card not found"
        );

        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO card_tags (username, cert_number, tag) VALUES (?1, ?2, ?3)",
            params![username, cert_number, tag],
        )?;
        Ok(inserted > 0)
    }

    /// Detach a tag from a card. Returns `false` when it was not set.
    pub fn remove_tag(&self, username: &str, cert_number: &str, tag: &str) -> Result<bool> {
        let tag = normalize_tag(tag);
        let removed = self.conn.execute(
            "DELETE FROM card_tags WHERE username = ?1 AND cert_number = ?2 AND tag = ?3",
            params![username, cert_number, tag],
        )?;
        Ok(removed > 0)
    }

    /// Every tag a user has put on any card
    pub fn all_tags(&self, username: &str) -> Result<BTreeSet<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT DISTINCT tag FROM card_tags WHERE username = ?1")?;
        let rows = stmt.query_map(params![username], |row| row.get::<_, String>(0))?;
        Ok(rows.collect::<rusqlite::Result<BTreeSet<_>>>()?)
    }

    /// Histogram over the leading grade token; ungraded cards land in "N/A"
    pub fn grade_counts(&self, username: &str) -> Result<BTreeMap<String, u32>> {
        let mut counts = BTreeMap::new();
        for record in self.list_cards(username, None, SortOrder::Added)? {
            let bucket = record
                .grade_label
                .split_whitespace()
                .next()
                .unwrap_or("N/A")
                .to_string();
            *counts.entry(bucket).or_insert(0) += 1;
        }
        Ok(counts)
    }

    /// Users owning at least one card
    pub fn usernames(&self) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT DISTINCT username FROM cards ORDER BY username")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn tags_for(&self, username: &str, cert_number: &str) -> Result<BTreeSet<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT tag FROM card_tags WHERE username = ?1 AND cert_number = ?2")?;
        let rows = stmt.query_map(params![username, cert_number], |row| {
            row.get::<_, String>(0)
        })?;
        Ok(rows.collect::<rusqlite::Result<BTreeSet<_>>>()?)
    }
}

fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<CardRecord> {
    Ok(CardRecord {
        cert_number: row.get(0)?,
        player_name: row.get(1)?,
        set_name: row.get(2)?,
        subset: row.get(3)?,
        variation: row.get(4)?,
        grade_label: row.get(5)?,
        image_url: row.get(6)?,
        source_link: row.get(7)?,
        tags: BTreeSet::new(),
    })
}

fn normalize_tag(tag: &str) -> String {
    tag.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(cert: &str, grade: &str, set_name: &str) -> CardRecord {
        let mut record = CardRecord::stub(cert);
        record.grade_label = grade.to_string();
        record.set_name = set_name.to_string();
        record
    }

    #[test]
    fn test_add_and_get_card() {
        let repo = CardRepository::in_memory().unwrap();
        let card = record("V1", "10 Pristine", "2021 Donruss Optic");

        assert!(repo.add_card("alice", &card).unwrap());
        let stored = repo.get_card("alice", "V1").unwrap().unwrap();
        assert_eq!(stored.grade_label, "10 Pristine");
        assert_eq!(stored.image_url, card.image_url);

        assert!(repo.get_card("bob", "V1").unwrap().is_none());
    }

    #[test]
    fn test_duplicate_add_is_rejected_per_user() {
        let repo = CardRepository::in_memory().unwrap();
        let card = record("V1", "", "");

        assert!(repo.add_card("alice", &card).unwrap());
        assert!(!repo.add_card("alice", &card).unwrap());
        // A different user may own the same cert.
        assert!(repo.add_card("bob", &card).unwrap());
    }

    #[test]
    fn test_remove_card_also_drops_tags() {
        let repo = CardRepository::in_memory().unwrap();
        repo.add_card("alice", &record("V1", "", "")).unwrap();
        repo.add_tag("alice", "V1", "rookie").unwrap();

        assert!(repo.remove_card("alice", "V1").unwrap());
        assert!(!repo.remove_card("alice", "V1").unwrap());
        assert!(repo.all_tags("alice").unwrap().is_empty());
    }

    #[test]
    fn test_tag_normalization_and_duplicates() {
        let repo = CardRepository::in_memory().unwrap();
        repo.add_card("alice", &record("V1", "", "")).unwrap();

        assert!(repo.add_tag("alice", "V1", "  Rookie ").unwrap());
        assert!(!repo.add_tag("alice", "V1", "rookie").unwrap());
        assert!(repo.add_tag("alice", "V1", "").is_err());
        assert!(repo.add_tag("alice", "MISSING", "rookie").is_err());

        let stored = repo.get_card("alice", "V1").unwrap().unwrap();
        assert!(stored.tags.contains("rookie"));

        assert!(repo.remove_tag("alice", "V1", "ROOKIE").unwrap());
        assert!(!repo.remove_tag("alice", "V1", "rookie").unwrap());
    }

    #[test]
    fn test_list_filtered_by_tag() {
        let repo = CardRepository::in_memory().unwrap();
        repo.add_card("alice", &record("V1", "", "")).unwrap();
        repo.add_card("alice", &record("V2", "", "")).unwrap();
        repo.add_tag("alice", "V2", "vintage").unwrap();

        let all = repo.list_cards("alice", None, SortOrder::Added).unwrap();
        assert_eq!(all.len(), 2);

        let vintage = repo
            .list_cards("alice", Some("vintage"), SortOrder::Added)
            .unwrap();
        assert_eq!(vintage.len(), 1);
        assert_eq!(vintage[0].cert_number, "V2");
    }

    #[test]
    fn test_sort_by_grade_puts_ungraded_last() {
        let repo = CardRepository::in_memory().unwrap();
        repo.add_card("alice", &record("V1", "8.5 Mint", "")).unwrap();
        repo.add_card("alice", &record("V2", "", "")).unwrap();
        repo.add_card("alice", &record("V3", "10 Pristine (98)", ""))
            .unwrap();

        let sorted = repo.list_cards("alice", None, SortOrder::Grade).unwrap();
        let certs: Vec<_> = sorted.iter().map(|c| c.cert_number.as_str()).collect();
        assert_eq!(certs, ["V3", "V1", "V2"]);
    }

    #[test]
    fn test_sort_by_set_name() {
        let repo = CardRepository::in_memory().unwrap();
        repo.add_card("alice", &record("V1", "", "2021 Topps")).unwrap();
        repo.add_card("alice", &record("V2", "", "1999 Upper Deck"))
            .unwrap();

        let sorted = repo.list_cards("alice", None, SortOrder::SetName).unwrap();
        assert_eq!(sorted[0].cert_number, "V2");
    }

    #[test]
    fn test_grade_counts() {
        let repo = CardRepository::in_memory().unwrap();
        repo.add_card("alice", &record("V1", "10 Pristine", "")).unwrap();
        repo.add_card("alice", &record("V2", "10 Pristine (98)", ""))
            .unwrap();
        repo.add_card("alice", &record("V3", "", "")).unwrap();

        let counts = repo.grade_counts("alice").unwrap();
        assert_eq!(counts.get("10"), Some(&2));
        assert_eq!(counts.get("N/A"), Some(&1));
    }

    #[test]
    fn test_usernames() {
        let repo = CardRepository::in_memory().unwrap();
        repo.add_card("bob", &record("V1", "", "")).unwrap();
        repo.add_card("alice", &record("V2", "", "")).unwrap();

        assert_eq!(repo.usernames().unwrap(), ["alice", "bob"]);
    }
}
