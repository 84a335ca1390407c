use crate::traits::RecordStore;
use crate::{InstructionRecord, NewInstruction, RecordId, StoreError};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS instructions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    title TEXT NOT NULL,
    content TEXT NOT NULL,
    pdf_path TEXT NOT NULL DEFAULT '',
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_instructions_title ON instructions(title);
";

const SELECT_COLUMNS: &str = "SELECT id, title, content, pdf_path, created_at FROM instructions";

type RawRow = (i64, String, String, String, String);

/// SQLite-backed store. Ids come from `AUTOINCREMENT` and are never reused.
pub struct SqliteRecordStore {
    conn: Mutex<Connection>,
}

impl SqliteRecordStore {
    /// Open or create a database file with the instructions schema.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = 5000;",
        )?;
        debug!(path = %path.display(), "opened sqlite record store");
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|error| StoreError::Poisoned(error.to_string()))
    }
}

fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
    ))
}

fn into_record(
    (id, title, content, pdf_path, created_at): RawRow,
) -> Result<InstructionRecord, StoreError> {
    let id = u64::try_from(id)
        .map_err(|_| StoreError::InvalidRecord(format!("negative record id {id}")))?;
    let created_at = DateTime::parse_from_rfc3339(&created_at)
        .map_err(|error| {
            StoreError::InvalidRecord(format!(
                "record {id} has bad created_at '{created_at}': {error}"
            ))
        })?
        .with_timezone(&Utc);

    Ok(InstructionRecord {
        id: RecordId(id),
        title,
        content,
        pdf_path,
        created_at,
    })
}

impl RecordStore for SqliteRecordStore {
    fn insert(&self, record: NewInstruction) -> Result<RecordId, StoreError> {
        record.validate()?;
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO instructions (title, content, pdf_path, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                record.title,
                record.content,
                record.pdf_path,
                Utc::now().to_rfc3339()
            ],
        )?;
        let id = conn.last_insert_rowid();
        u64::try_from(id)
            .map(RecordId)
            .map_err(|_| StoreError::InvalidRecord(format!("negative record id {id}")))
    }

    fn list_all(&self) -> Result<Vec<InstructionRecord>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!("{SELECT_COLUMNS} ORDER BY id"))?;
        let rows = stmt.query_map([], read_row)?;

        let mut records = Vec::new();
        for row in rows {
            records.push(into_record(row?)?);
        }
        Ok(records)
    }

    fn find_by_title(&self, title: &str) -> Result<Option<InstructionRecord>, StoreError> {
        let conn = self.lock()?;
        let row = conn
            .query_row(
                &format!("{SELECT_COLUMNS} WHERE title = ?1 ORDER BY id LIMIT 1"),
                params![title],
                read_row,
            )
            .optional()?;

        row.map(into_record).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn records_survive_reopening_the_file() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("db").join("instructions_database.db");

        let id = {
            let store = SqliteRecordStore::open(&path)?;
            store.insert(NewInstruction::new("Guide", "Summary:\nx", "uploads/guide.pdf")?)?
        };

        let reopened = SqliteRecordStore::open(&path)?;
        let records = reopened.list_all()?;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, id);
        assert_eq!(records[0].pdf_path, "uploads/guide.pdf");
        Ok(())
    }

    #[test]
    fn find_by_title_is_exact_and_prefers_first_insert() -> Result<(), StoreError> {
        let store = SqliteRecordStore::open_in_memory()?;
        store.insert(NewInstruction::new("Guide", "first", "")?)?;
        store.insert(NewInstruction::new("Guide", "second", "")?)?;
        store.insert(NewInstruction::new("Other", "third", "")?)?;

        let found = store.find_by_title("Guide")?;
        assert_eq!(found.map(|record| record.content), Some("first".to_string()));
        assert!(store.find_by_title("Gui")?.is_none());
        Ok(())
    }

    #[test]
    fn list_all_is_in_insertion_order() -> Result<(), StoreError> {
        let store = SqliteRecordStore::open_in_memory()?;
        for title in ["c", "a", "b"] {
            store.insert(NewInstruction::new(title, "body", "")?)?;
        }

        let titles: Vec<_> = store
            .list_all()?
            .into_iter()
            .map(|record| record.title)
            .collect();
        assert_eq!(titles, vec!["c", "a", "b"]);
        Ok(())
    }
}
