//! Durable item store backed by SQLite.
//!
//! One row per story: `(id, headline, link, created_at)` with a `UNIQUE`
//! constraint on `link`. The constraint is what makes overlapping runs
//! safe: two runs can both snapshot the same seen-set and race to commit
//! overlapping batches, but the second writer's conflicting rows are
//! skipped rather than duplicated, so no two committed records ever share
//! a link.
//!
//! The store is append-only from the pipeline's point of view; [`SqliteStore::purge`]
//! exists for the out-of-band administrative bulk delete.

use crate::error::StoreError;
use crate::models::{CommitResult, Item};
use chrono::Utc;
use rusqlite::{Connection, params};
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, info, instrument};

/// Narrow seam between the pipeline and its persistence engine.
///
/// The pipeline needs exactly two operations: a snapshot of the live
/// identity set, and an atomic batch append. Keeping this a trait lets the
/// orchestrator tests inject failing or in-memory stores.
pub trait ItemStore {
    /// Snapshot of every link currently recorded. Used as the dedup
    /// oracle; taken once per run, not re-queried per item.
    fn current_links(&self) -> Result<HashSet<String>, StoreError>;

    /// Append a batch atomically: all rows visible afterward, or none.
    ///
    /// Rows whose link already exists are skipped (another writer got
    /// there first) and excluded from the accepted set. An empty batch is
    /// a no-op returning an empty result.
    fn commit(&mut self, items: &[Item]) -> Result<CommitResult, StoreError>;
}

/// SQLite-backed [`ItemStore`].
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open (or create) the store at `path` and ensure the schema exists.
    ///
    /// Parent directories are created as needed. WAL journaling keeps
    /// readers unblocked while a commit is in flight.
    #[instrument(level = "info", skip_all, fields(path = %path.as_ref().display()))]
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    StoreError::Unavailable(format!(
                        "cannot create store directory {}: {e}",
                        parent.display()
                    ))
                })?;
            }
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
        Self::init_schema(&conn)?;
        info!("Item store ready");
        Ok(Self { conn })
    }

    /// In-memory store, used by tests.
    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;
        Ok(Self { conn })
    }

    fn init_schema(conn: &Connection) -> Result<(), StoreError> {
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS items (
                id         INTEGER PRIMARY KEY,
                headline   TEXT NOT NULL,
                link       TEXT NOT NULL UNIQUE,
                created_at TEXT NOT NULL
            );
            ",
        )?;
        Ok(())
    }

    /// The `n` most recently stored items, newest first.
    ///
    /// Serves the manual re-notification trigger, which bypasses
    /// extraction and dedup entirely.
    pub fn recent(&self, n: usize) -> Result<Vec<Item>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT headline, link FROM items ORDER BY id DESC LIMIT ?1")?;
        let rows = stmt.query_map(params![n as i64], |row| {
            Ok(Item {
                headline: row.get(0)?,
                link: row.get(1)?,
            })
        })?;
        let items = rows.collect::<Result<Vec<_>, _>>()?;
        Ok(items)
    }

    /// Administrative bulk delete of every stored record.
    ///
    /// # Returns
    ///
    /// The number of rows deleted.
    pub fn purge(&mut self) -> Result<usize, StoreError> {
        let deleted = self.conn.execute("DELETE FROM items", [])?;
        info!(deleted, "Purged item store");
        Ok(deleted)
    }

    /// Number of live records.
    pub fn len(&self) -> Result<usize, StoreError> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM items", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

impl ItemStore for SqliteStore {
    fn current_links(&self) -> Result<HashSet<String>, StoreError> {
        let mut stmt = self.conn.prepare("SELECT link FROM items")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let links = rows.collect::<Result<HashSet<_>, _>>()?;
        Ok(links)
    }

    #[instrument(level = "info", skip_all, fields(batch = items.len()))]
    fn commit(&mut self, items: &[Item]) -> Result<CommitResult, StoreError> {
        if items.is_empty() {
            return Ok(CommitResult::default());
        }

        let created_at = Utc::now().to_rfc3339();
        let tx = self.conn.transaction()?;
        let mut result = CommitResult::default();
        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO items (headline, link, created_at) VALUES (?1, ?2, ?3)",
            )?;
            for item in items {
                let changed = stmt.execute(params![item.headline, item.link, created_at])?;
                if changed == 1 {
                    result.accepted.push(item.clone());
                } else {
                    debug!(link = %item.link, "Link already recorded; skipping row");
                    result.skipped_existing += 1;
                }
            }
        }
        tx.commit()?;

        info!(
            rows_written = result.rows_written(),
            skipped_existing = result.skipped_existing,
            "Committed batch"
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(headline: &str, link: &str) -> Item {
        Item {
            headline: headline.to_string(),
            link: link.to_string(),
        }
    }

    #[test]
    fn test_commit_then_current_links() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let batch = vec![
            item("One", "https://example.com/one"),
            item("Two", "https://example.com/two"),
        ];

        let result = store.commit(&batch).unwrap();
        assert_eq!(result.rows_written(), 2);
        assert_eq!(result.accepted, batch);

        let links = store.current_links().unwrap();
        assert!(links.contains("https://example.com/one"));
        assert!(links.contains("https://example.com/two"));
        assert_eq!(links.len(), 2);
    }

    #[test]
    fn test_empty_commit_is_noop() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let result = store.commit(&[]).unwrap();
        assert_eq!(result.rows_written(), 0);
        assert_eq!(store.len().unwrap(), 0);
    }

    #[test]
    fn test_duplicate_link_is_skipped_not_fatal() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        store.commit(&[item("One", "https://example.com/one")]).unwrap();

        // Second writer shows up with an overlapping batch.
        let result = store
            .commit(&[
                item("One again", "https://example.com/one"),
                item("Two", "https://example.com/two"),
            ])
            .unwrap();

        assert_eq!(result.rows_written(), 1);
        assert_eq!(result.skipped_existing, 1);
        assert_eq!(result.accepted, vec![item("Two", "https://example.com/two")]);
        assert_eq!(store.len().unwrap(), 2);
    }

    #[test]
    fn test_recommit_of_same_batch_writes_nothing() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let batch = vec![item("One", "https://example.com/one")];

        store.commit(&batch).unwrap();
        let second = store.commit(&batch).unwrap();

        assert_eq!(second.rows_written(), 0);
        assert_eq!(second.skipped_existing, 1);
        assert_eq!(store.len().unwrap(), 1);
    }

    #[test]
    fn test_recent_returns_newest_first() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        store.commit(&[item("Oldest", "https://example.com/1")]).unwrap();
        store.commit(&[item("Middle", "https://example.com/2")]).unwrap();
        store.commit(&[item("Newest", "https://example.com/3")]).unwrap();

        let recent = store.recent(2).unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].headline, "Newest");
        assert_eq!(recent[1].headline, "Middle");
    }

    #[test]
    fn test_purge_empties_store_and_reports_count() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        store
            .commit(&[
                item("One", "https://example.com/one"),
                item("Two", "https://example.com/two"),
            ])
            .unwrap();

        assert_eq!(store.purge().unwrap(), 2);
        assert_eq!(store.len().unwrap(), 0);
        assert!(store.current_links().unwrap().is_empty());
    }
}
