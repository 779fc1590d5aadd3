mod collections;
pub mod models;


use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

pub use models::*;
pub(crate) use collections::to_body;

/// Document store over SQLite.
///
/// Every collection lives in one `documents` table keyed by
/// `(collection, id)`, with the body stored as a JSON object. Writes go
/// through a single connection behind a mutex, so read-modify-write
/// operations on the same document never interleave.
pub struct Database {
    conn: Arc<Mutex<Connection>>,
    path: PathBuf,
}

impl Database {
    pub fn new(db_path: &Path) -> Result<Self> {
        let conn = Connection::open(db_path)
            .with_context(|| format!("Failed to open database at {}", db_path.display()))?;

        // Enable WAL mode for concurrent reads
        conn.execute_batch(
            "
            PRAGMA journal_mode=WAL;
            PRAGMA synchronous=NORMAL;
            PRAGMA temp_store=MEMORY;
        ",
        )?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
            path: db_path.to_path_buf(),
        };

        db.init_schema()?;

        Ok(db)
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS documents (
                collection TEXT NOT NULL,
                id TEXT NOT NULL,
                data TEXT NOT NULL,
                created_at TEXT NOT NULL DEFAULT (datetime('now')),
                updated_at TEXT NOT NULL DEFAULT (datetime('now')),
                PRIMARY KEY (collection, id)
            );

            CREATE INDEX IF NOT EXISTS idx_documents_collection ON documents(collection);

            CREATE TABLE IF NOT EXISTS error_log (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp TEXT NOT NULL,
                command TEXT NOT NULL,
                error TEXT NOT NULL,
                context TEXT
            );
            "#,
        )?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    // =========================================================================
    // Generic document operations
    // =========================================================================

    /// Read every document of a collection, in insertion order.
    pub fn list_documents(&self, collection: Collection) -> Result<Vec<Document>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, data FROM documents WHERE collection = ? ORDER BY rowid",
        )?;
        let rows = stmt
            .query_map(params![collection.as_str()], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(id, data)| -> Result<Document> {
                Ok(Document { data: parse_body(&data)?, id })
            })
            .collect()
    }

    pub fn get_document(&self, collection: Collection, id: &str) -> Result<Option<Document>> {
        let conn = self.conn.lock().unwrap();
        let data: Option<String> = conn
            .query_row(
                "SELECT data FROM documents WHERE collection = ? AND id = ?",
                params![collection.as_str(), id],
                |row| row.get(0),
            )
            .optional()?;

        data.map(|data| -> Result<Document> {
            Ok(Document {
                id: id.to_string(),
                data: parse_body(&data)?,
            })
        })
        .transpose()
    }

    /// Write a document, replacing any existing body.
    pub fn set_document(&self, collection: Collection, id: &str, data: &Map<String, Value>) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        write_body(&conn, collection, id, data)
    }

    /// Create a document under a generated id.
    pub fn add_document(&self, collection: Collection, data: &Map<String, Value>) -> Result<String> {
        let id = uuid::Uuid::new_v4().simple().to_string();
        self.set_document(collection, &id, data)?;
        Ok(id)
    }

    /// Create the document only if the id is free. Returns whether it was written.
    pub fn create_document(&self, collection: Collection, id: &str, data: &Map<String, Value>) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO documents (collection, id, data) VALUES (?, ?, ?)",
            params![collection.as_str(), id, serde_json::to_string(data)?],
        )?;
        Ok(inserted > 0)
    }

    /// Upsert with merge semantics: nested objects are merged key by key,
    /// every other value in `patch` replaces the stored one. Fields absent
    /// from `patch` are left untouched. Returns true when the document was
    /// created by this call.
    pub fn merge_document(&self, collection: Collection, id: &str, patch: &Map<String, Value>) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let existing = read_body(&conn, collection, id)?;
        let created = existing.is_none();
        let mut body = existing.unwrap_or_default();
        merge_json(&mut body, patch);
        write_body(&conn, collection, id, &body)?;
        Ok(created)
    }

    /// Atomically read, modify and write an existing document.
    ///
    /// Returns `None` when the document does not exist, otherwise the
    /// closure's result.
    pub fn update_document<T>(
        &self,
        collection: Collection,
        id: &str,
        f: impl FnOnce(&mut Map<String, Value>) -> T,
    ) -> Result<Option<T>> {
        let conn = self.conn.lock().unwrap();
        let Some(mut body) = read_body(&conn, collection, id)? else {
            return Ok(None);
        };
        let out = f(&mut body);
        write_body(&conn, collection, id, &body)?;
        Ok(Some(out))
    }

    /// Returns true if a document was removed.
    pub fn delete_document(&self, collection: Collection, id: &str) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let deleted = conn.execute(
            "DELETE FROM documents WHERE collection = ? AND id = ?",
            params![collection.as_str(), id],
        )?;
        Ok(deleted > 0)
    }

    pub fn count_documents(&self, collection: Collection) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        let count = conn.query_row(
            "SELECT COUNT(*) FROM documents WHERE collection = ?",
            params![collection.as_str()],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    // =========================================================================
    // Error log
    // =========================================================================

    /// Append an entry and keep only the newest `max_entries`.
    pub fn append_error_entry(&self, entry: &ErrorEntry, max_entries: usize) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO error_log (timestamp, command, error, context) VALUES (?1, ?2, ?3, ?4)",
            params![entry.timestamp, entry.command, entry.error, entry.context],
        )?;
        conn.execute(
            "DELETE FROM error_log WHERE id NOT IN (SELECT id FROM error_log ORDER BY id DESC LIMIT ?1)",
            params![max_entries as i64],
        )?;
        Ok(())
    }

    /// Logged errors, oldest first.
    pub fn get_error_entries(&self) -> Result<Vec<ErrorEntry>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT timestamp, command, error, context FROM error_log ORDER BY id")?;
        let entries = stmt
            .query_map([], |row| {
                Ok(ErrorEntry {
                    timestamp: row.get(0)?,
                    command: row.get(1)?,
                    error: row.get(2)?,
                    context: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    pub fn clear_error_entries(&self) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        Ok(conn.execute("DELETE FROM error_log", [])?)
    }

    pub fn get_counts(&self) -> Result<CollectionCounts> {
        Ok(CollectionCounts {
            reviewers: self.count_documents(Collection::Reviewers)?,
            videos: self.count_documents(Collection::Videos)?,
            restaurants: self.count_documents(Collection::Restaurants)?,
        })
    }
}

fn parse_body(data: &str) -> Result<Map<String, Value>> {
    match serde_json::from_str::<Value>(data)? {
        Value::Object(map) => Ok(map),
        other => anyhow::bail!("Stored document is not an object: {}", other),
    }
}

fn read_body(conn: &Connection, collection: Collection, id: &str) -> Result<Option<Map<String, Value>>> {
    let data: Option<String> = conn
        .query_row(
            "SELECT data FROM documents WHERE collection = ? AND id = ?",
            params![collection.as_str(), id],
            |row| row.get(0),
        )
        .optional()?;
    data.as_deref().map(parse_body).transpose()
}

fn write_body(conn: &Connection, collection: Collection, id: &str, data: &Map<String, Value>) -> Result<()> {
    let now = chrono::Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO documents (collection, id, data, updated_at) VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(collection, id) DO UPDATE SET data = excluded.data, updated_at = excluded.updated_at",
        params![collection.as_str(), id, serde_json::to_string(data)?, now],
    )?;
    Ok(())
}

/// Deep-merge `patch` into `target`. Objects merge recursively; arrays and
/// scalars are replaced.
pub fn merge_json(target: &mut Map<String, Value>, patch: &Map<String, Value>) {
    for (key, value) in patch {
        match (target.get_mut(key), value) {
            (Some(Value::Object(existing)), Value::Object(incoming)) => {
                merge_json(existing, incoming);
            }
            _ => {
                target.insert(key.clone(), value.clone());
            }
        }
    }
}
