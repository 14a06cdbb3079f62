//! Storage layer for RANALONE documents.
//!
//! Every collection lives in one SQLite table of JSON bodies keyed by
//! `(collection, id)`. Queries filter and order on JSON fields through
//! `json_extract`.
//!
//! ## Change events
//!
//! Creating a post or governance log, and any write to `network_status`,
//! appends a row to the `change_events` outbox in the same transaction as the
//! write. The outbox is drained by [`crate::jobs::dispatch_changes`], which
//! runs the matching trigger for each event.
//!
//! ## Batches
//!
//! [`WriteBatch`] groups inserts, overwrites, merges and counter increments;
//! [`Storage::commit`] applies them in one transaction, so either every
//! operation lands or none does.

pub mod collections;

pub use collections::{Collection, Query, CURRENT, MAIN};

use crate::models::timestamp;
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// File name of the database inside the data directory.
pub const DB_FILE: &str = "ranalone.db";

/// A stored document together with its id.
#[derive(Debug, Clone)]
pub struct Document<T> {
    pub id: String,
    pub data: T,
}

/// Kind of change recorded in the outbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Created,
    Written,
}

impl ChangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Written => "written",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "created" => Some(Self::Created),
            "written" => Some(Self::Written),
            _ => None,
        }
    }
}

/// One unprocessed outbox row.
#[derive(Debug, Clone)]
pub struct ChangeEvent {
    pub seq: i64,
    pub collection: Collection,
    pub doc_id: String,
    pub kind: ChangeKind,
}

/// A single write inside a [`WriteBatch`].
#[derive(Debug, Clone)]
enum WriteOp {
    Set {
        collection: Collection,
        id: String,
        body: Value,
    },
    Merge {
        collection: Collection,
        id: String,
        fields: Value,
    },
    Increment {
        collection: Collection,
        id: String,
        field: String,
        by: i64,
    },
}

/// A group of writes applied atomically by [`Storage::commit`].
#[derive(Debug, Clone, Default)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create or overwrite a document.
    pub fn set<T: Serialize>(&mut self, collection: Collection, id: &str, doc: &T) -> Result<()> {
        self.ops.push(WriteOp::Set {
            collection,
            id: id.to_string(),
            body: serde_json::to_value(doc)?,
        });
        Ok(())
    }

    /// Add a document under a fresh id and return the id.
    pub fn insert<T: Serialize>(&mut self, collection: Collection, doc: &T) -> Result<String> {
        let id = generate_id();
        self.set(collection, &id, doc)?;
        Ok(id)
    }

    /// Overwrite the given top-level fields, creating the document if absent.
    pub fn merge(&mut self, collection: Collection, id: &str, fields: Value) {
        self.ops.push(WriteOp::Merge {
            collection,
            id: id.to_string(),
            fields,
        });
    }

    /// Add `by` to a numeric field. Fails the whole batch if the document is missing.
    pub fn increment(&mut self, collection: Collection, id: &str, field: &str, by: i64) {
        self.ops.push(WriteOp::Increment {
            collection,
            id: id.to_string(),
            field: field.to_string(),
            by,
        });
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

/// Document store over a single SQLite database.
pub struct Storage {
    /// Data directory holding the database (`None` for in-memory stores)
    pub root: Option<PathBuf>,
    conn: Connection,
}

impl Storage {
    /// Open existing storage in the given data directory.
    pub fn open(data_dir: &Path) -> Result<Self> {
        let db_path = data_dir.join(DB_FILE);
        if !db_path.exists() {
            return Err(Error::NotInitialized);
        }

        let conn = Connection::open(&db_path)?;
        Self::init_schema(&conn)?;

        Ok(Self {
            root: Some(data_dir.to_path_buf()),
            conn,
        })
    }

    /// Create the data directory and database if needed, then open it.
    pub fn init(data_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(data_dir)?;

        let conn = Connection::open(data_dir.join(DB_FILE))?;
        Self::init_schema(&conn)?;

        Ok(Self {
            root: Some(data_dir.to_path_buf()),
            conn,
        })
    }

    /// Check if storage exists in the given data directory.
    pub fn exists(data_dir: &Path) -> bool {
        data_dir.join(DB_FILE).exists()
    }

    /// Open a throwaway in-memory store.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;
        Ok(Self { root: None, conn })
    }

    /// Initialize the SQLite schema.
    fn init_schema(conn: &Connection) -> Result<()> {
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS documents (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                collection TEXT NOT NULL,
                id TEXT NOT NULL,
                body TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                UNIQUE (collection, id)
            );

            CREATE INDEX IF NOT EXISTS idx_documents_collection ON documents(collection);

            CREATE TABLE IF NOT EXISTS change_events (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                collection TEXT NOT NULL,
                doc_id TEXT NOT NULL,
                kind TEXT NOT NULL,
                processed INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_change_events_pending ON change_events(processed, seq);
            "#,
        )?;
        Ok(())
    }

    // === Document Reads ===

    /// Get a document by id, or `None` if it does not exist.
    pub fn get<T: DeserializeOwned>(&self, collection: Collection, id: &str) -> Result<Option<T>> {
        match read_body(&self.conn, collection, id)? {
            Some(body) => Ok(Some(serde_json::from_value(body)?)),
            None => Ok(None),
        }
    }

    /// Get a document by id, failing with `NotFound` if it does not exist.
    pub fn get_required<T: DeserializeOwned>(&self, collection: Collection, id: &str) -> Result<T> {
        self.get(collection, id)?
            .ok_or_else(|| Error::NotFound(format!("{}/{} not found", collection, id)))
    }

    /// Run a query and deserialize every matching document.
    pub fn query<T: DeserializeOwned>(&self, query: &Query) -> Result<Vec<Document<T>>> {
        let (tail, params) = query.to_sql();
        let sql = format!("SELECT id, body FROM documents{}", tail);

        let mut stmt = self.conn.prepare(&sql)?;
        let rows: Vec<(String, String)> = stmt
            .query_map(params_from_iter(params.iter()), |row| {
                Ok((row.get(0)?, row.get(1)?))
            })?
            .collect::<std::result::Result<_, _>>()?;

        let mut docs = Vec::with_capacity(rows.len());
        for (id, body) in rows {
            docs.push(Document {
                id,
                data: serde_json::from_str(&body)?,
            });
        }
        Ok(docs)
    }

    /// Count documents matching a query (order and limit are ignored).
    pub fn count(&self, query: &Query) -> Result<usize> {
        let unbounded = Query {
            order: None,
            limit: None,
            ..query.clone()
        };
        let (tail, params) = unbounded.to_sql();
        let sql = format!("SELECT COUNT(*) FROM documents{}", tail);
        let count: i64 = self
            .conn
            .query_row(&sql, params_from_iter(params.iter()), |row| row.get(0))?;
        Ok(count as usize)
    }

    // === Document Writes ===

    /// Create or overwrite a document.
    pub fn set<T: Serialize>(&self, collection: Collection, id: &str, doc: &T) -> Result<()> {
        let mut batch = WriteBatch::new();
        batch.set(collection, id, doc)?;
        self.commit(batch)
    }

    /// Add a document under a fresh id and return the id.
    pub fn insert<T: Serialize>(&self, collection: Collection, doc: &T) -> Result<String> {
        let mut batch = WriteBatch::new();
        let id = batch.insert(collection, doc)?;
        self.commit(batch)?;
        Ok(id)
    }

    /// Overwrite the given top-level fields, creating the document if absent.
    pub fn merge(&self, collection: Collection, id: &str, fields: Value) -> Result<()> {
        let mut batch = WriteBatch::new();
        batch.merge(collection, id, fields);
        self.commit(batch)
    }

    /// Add `by` to a numeric field of an existing document.
    pub fn increment(&self, collection: Collection, id: &str, field: &str, by: i64) -> Result<()> {
        let mut batch = WriteBatch::new();
        batch.increment(collection, id, field, by);
        self.commit(batch)
    }

    /// Read-modify-write one document inside a transaction.
    ///
    /// Returns `None` without writing if the document does not exist.
    pub fn update<T, F>(&self, collection: Collection, id: &str, f: F) -> Result<Option<T>>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce(&mut T),
    {
        let tx = self.conn.unchecked_transaction()?;
        let Some(body) = read_body(&tx, collection, id)? else {
            return Ok(None);
        };

        let mut doc: T = serde_json::from_value(body)?;
        f(&mut doc);
        write_body(&tx, collection, id, &serde_json::to_value(&doc)?)?;
        tx.commit()?;

        Ok(Some(doc))
    }

    /// Apply every operation of a batch in one transaction.
    pub fn commit(&self, batch: WriteBatch) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;

        for op in batch.ops {
            match op {
                WriteOp::Set {
                    collection,
                    id,
                    body,
                } => write_body(&tx, collection, &id, &body)?,
                WriteOp::Merge {
                    collection,
                    id,
                    fields,
                } => {
                    let mut body = read_body(&tx, collection, &id)?
                        .unwrap_or_else(|| Value::Object(Map::new()));
                    merge_fields(&mut body, fields)?;
                    write_body(&tx, collection, &id, &body)?;
                }
                WriteOp::Increment {
                    collection,
                    id,
                    field,
                    by,
                } => {
                    let mut body = read_body(&tx, collection, &id)?.ok_or_else(|| {
                        Error::NotFound(format!("{}/{} not found", collection, id))
                    })?;
                    increment_field(&mut body, &field, by)?;
                    write_body(&tx, collection, &id, &body)?;
                }
            }
        }

        tx.commit()?;
        Ok(())
    }

    // === Change Events ===

    /// Unprocessed change events, oldest first.
    pub fn pending_events(&self, limit: usize) -> Result<Vec<ChangeEvent>> {
        let mut stmt = self.conn.prepare(
            "SELECT seq, collection, doc_id, kind FROM change_events
             WHERE processed = 0 ORDER BY seq ASC LIMIT ?1",
        )?;
        let rows: Vec<(i64, String, String, String)> = stmt
            .query_map([limit as i64], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
            })?
            .collect::<std::result::Result<_, _>>()?;

        let mut events = Vec::with_capacity(rows.len());
        for (seq, collection, doc_id, kind) in rows {
            let collection = Collection::parse(&collection).ok_or_else(|| {
                Error::Other(format!("Unknown collection in change event: {}", collection))
            })?;
            let kind = ChangeKind::parse(&kind)
                .ok_or_else(|| Error::Other(format!("Unknown change kind: {}", kind)))?;
            events.push(ChangeEvent {
                seq,
                collection,
                doc_id,
                kind,
            });
        }
        Ok(events)
    }

    /// Mark a change event as handled.
    pub fn mark_event_processed(&self, seq: i64) -> Result<()> {
        self.conn.execute(
            "UPDATE change_events SET processed = 1 WHERE seq = ?1",
            [seq],
        )?;
        Ok(())
    }

    /// Number of unprocessed change events.
    pub fn pending_event_count(&self) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM change_events WHERE processed = 0",
            [],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    /// Get the storage root path.
    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }
}

fn read_body(conn: &Connection, collection: Collection, id: &str) -> Result<Option<Value>> {
    let body: Option<String> = conn
        .query_row(
            "SELECT body FROM documents WHERE collection = ?1 AND id = ?2",
            params![collection.as_str(), id],
            |row| row.get(0),
        )
        .optional()?;
    match body {
        Some(body) => Ok(Some(serde_json::from_str(&body)?)),
        None => Ok(None),
    }
}

/// Upsert a document body and record a change event if the collection fires one.
fn write_body(conn: &Connection, collection: Collection, id: &str, body: &Value) -> Result<()> {
    let now = timestamp::format(&Utc::now());
    let existed: bool = conn
        .query_row(
            "SELECT 1 FROM documents WHERE collection = ?1 AND id = ?2",
            params![collection.as_str(), id],
            |_| Ok(()),
        )
        .optional()?
        .is_some();

    conn.execute(
        "INSERT INTO documents (collection, id, body, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?4)
         ON CONFLICT(collection, id) DO UPDATE SET body = excluded.body, updated_at = excluded.updated_at",
        params![collection.as_str(), id, serde_json::to_string(body)?, now],
    )?;

    let kind = if !existed && collection.fires_on_create() {
        Some(ChangeKind::Created)
    } else if collection.fires_on_write() {
        Some(ChangeKind::Written)
    } else {
        None
    };

    if let Some(kind) = kind {
        conn.execute(
            "INSERT INTO change_events (collection, doc_id, kind, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![collection.as_str(), id, kind.as_str(), now],
        )?;
    }

    Ok(())
}

fn merge_fields(body: &mut Value, fields: Value) -> Result<()> {
    let Value::Object(patch) = fields else {
        return Err(Error::InvalidInput("merge fields must be an object".to_string()));
    };
    let Value::Object(target) = body else {
        return Err(Error::Other("stored document is not an object".to_string()));
    };
    for (key, value) in patch {
        target.insert(key, value);
    }
    Ok(())
}

fn increment_field(body: &mut Value, field: &str, by: i64) -> Result<()> {
    let Value::Object(target) = body else {
        return Err(Error::Other("stored document is not an object".to_string()));
    };
    let current = target.get(field).and_then(Value::as_i64).unwrap_or(0);
    target.insert(field.to_string(), Value::from(current + by));
    Ok(())
}

/// Generate a fresh document id (20 lowercase hex chars).
pub fn generate_id() -> String {
    let mut id = uuid::Uuid::new_v4().simple().to_string();
    id.truncate(20);
    id
}

/// Format a timestamp as a query value.
pub fn at(time: DateTime<Utc>) -> Value {
    Value::String(timestamp::format(&time))
}
