//! Local document catalog.
//!
//! Mirrors document listings fetched from the service so that they can still
//! be browsed when the service is unreachable.

pub mod schema;

use chrono::{DateTime, SecondsFormat, Utc};
use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, Connection, OptionalExtension, Row};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::api::types::Document;
use crate::keys::normalize_search;

/// A listing read back from the catalog.
#[derive(Debug, Clone)]
pub struct CachedListing {
  /// Documents in the order the service returned them
  pub documents: Vec<Document>,
  /// When the listing was stored
  pub cached_at: DateTime<Utc>,
}

/// SQLite-backed catalog
pub struct Catalog {
  conn: Mutex<Connection>,
}

impl Catalog {
  /// Open or create the catalog at `path`, or at the default location.
  pub fn open(path: Option<&Path>) -> Result<Self> {
    let path = match path {
      Some(p) => p.to_path_buf(),
      None => Self::default_path()?,
    };

    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create catalog directory: {}", e))?;
    }

    let conn = Connection::open(&path)
      .map_err(|e| eyre!("Failed to open catalog at {}: {}", path.display(), e))?;

    Self::from_connection(conn)
  }

  pub fn open_in_memory() -> Result<Self> {
    let conn = Connection::open_in_memory()
      .map_err(|e| eyre!("Failed to open in-memory catalog: {}", e))?;
    Self::from_connection(conn)
  }

  fn from_connection(conn: Connection) -> Result<Self> {
    let catalog = Self {
      conn: Mutex::new(conn),
    };
    catalog.run_migrations()?;
    Ok(catalog)
  }

  /// Get the default catalog path
  pub fn default_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("docdesk").join("catalog.db"))
  }

  /// Run database migrations
  fn run_migrations(&self) -> Result<()> {
    let conn = self.lock()?;
    conn
      .execute_batch("PRAGMA foreign_keys = ON;")
      .map_err(|e| eyre!("Failed to enable foreign keys: {}", e))?;
    conn
      .execute_batch(schema::SCHEMA)
      .map_err(|e| eyre!("Failed to run catalog migrations: {}", e))?;
    Ok(())
  }

  fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
    self.conn.lock().map_err(|e| eyre!("Lock poisoned: {}", e))
  }

  /// Replace the stored listing for `search` and upsert its documents.
  pub fn store_listing(&self, search: &str, documents: &[Document]) -> Result<()> {
    let mut conn = self.lock()?;
    let hash = listing_hash(search);

    let tx = conn
      .transaction()
      .map_err(|e| eyre!("Failed to begin transaction: {}", e))?;

    tx.execute(
      "DELETE FROM listing_results WHERE query_hash = ?",
      params![hash],
    )
    .map_err(|e| eyre!("Failed to delete old listing: {}", e))?;

    tx.execute(
      "INSERT OR REPLACE INTO listings (query_hash, search, cached_at, result_count)
       VALUES (?, ?, ?, ?)",
      params![hash, normalize_search(search), timestamp(&Utc::now()), documents.len()],
    )
    .map_err(|e| eyre!("Failed to store listing: {}", e))?;

    for (position, document) in documents.iter().enumerate() {
      upsert(&tx, document)?;
      tx.execute(
        "INSERT INTO listing_results (query_hash, document_id, position)
         VALUES (?, ?, ?)",
        params![hash, document.id, position],
      )
      .map_err(|e| eyre!("Failed to store listing entry: {}", e))?;
    }

    tx.commit()
      .map_err(|e| eyre!("Failed to commit transaction: {}", e))?;

    Ok(())
  }

  /// Read back the listing stored for `search`.
  pub fn listing(&self, search: &str) -> Result<Option<CachedListing>> {
    let conn = self.lock()?;
    let hash = listing_hash(search);

    let cached_at: Option<String> = conn
      .query_row(
        "SELECT cached_at FROM listings WHERE query_hash = ?",
        params![hash],
        |row| row.get(0),
      )
      .optional()
      .map_err(|e| eyre!("Failed to read listing: {}", e))?;

    let Some(cached_at) = cached_at else {
      return Ok(None);
    };

    let mut stmt = conn
      .prepare(
        "SELECT d.id, d.name, d.description, d.file_size, d.mime_type, d.url,
                d.created_at, d.updated_at
         FROM documents d
         INNER JOIN listing_results lr ON d.id = lr.document_id
         WHERE lr.query_hash = ?
         ORDER BY lr.position",
      )
      .map_err(|e| eyre!("Failed to prepare listing query: {}", e))?;

    let documents = stmt
      .query_map(params![hash], document_from_row)
      .map_err(|e| eyre!("Failed to query listing: {}", e))?
      .collect::<rusqlite::Result<Vec<_>>>()
      .map_err(|e| eyre!("Failed to read listed document: {}", e))?;

    Ok(Some(CachedListing {
      documents,
      cached_at: parse_timestamp(&cached_at)?,
    }))
  }

  pub fn get_document(&self, document_id: &str) -> Result<Option<Document>> {
    let conn = self.lock()?;
    conn
      .query_row(
        "SELECT id, name, description, file_size, mime_type, url, created_at, updated_at
         FROM documents WHERE id = ?",
        params![document_id],
        document_from_row,
      )
      .optional()
      .map_err(|e| eyre!("Failed to read document {}: {}", document_id, e))
  }

  pub fn store_document(&self, document: &Document) -> Result<()> {
    let conn = self.lock()?;
    upsert(&conn, document)
  }
}

fn upsert(conn: &Connection, document: &Document) -> Result<()> {
  conn
    .execute(
      "INSERT OR REPLACE INTO documents
         (id, name, description, file_size, mime_type, url, created_at, updated_at)
       VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
      params![
        document.id,
        document.name,
        document.description,
        document.file_size,
        document.mime_type,
        document.url,
        timestamp(&document.created_at),
        timestamp(&document.updated_at),
      ],
    )
    .map_err(|e| eyre!("Failed to store document {}: {}", document.id, e))?;
  Ok(())
}

fn document_from_row(row: &Row<'_>) -> rusqlite::Result<Document> {
  let created_at: String = row.get(6)?;
  let updated_at: String = row.get(7)?;
  Ok(Document {
    id: row.get(0)?,
    name: row.get(1)?,
    description: row.get(2)?,
    file_size: row.get(3)?,
    mime_type: row.get(4)?,
    url: row.get(5)?,
    created_at: column_timestamp(6, &created_at)?,
    updated_at: column_timestamp(7, &updated_at)?,
  })
}

/// Fixed-width UTC timestamps so the schema's text comparison is chronological.
/// Nanosecond precision keeps documents identical after a round trip.
fn timestamp(at: &DateTime<Utc>) -> String {
  at.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| eyre!("Failed to parse timestamp '{}': {}", s, e))
}

fn column_timestamp(column: usize, s: &str) -> rusqlite::Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| {
      rusqlite::Error::FromSqlConversionFailure(column, rusqlite::types::Type::Text, Box::new(e))
    })
}

/// SHA256 of the normalised search, for stable fixed-length listing keys
fn listing_hash(search: &str) -> String {
  let mut hasher = Sha256::new();
  hasher.update(normalize_search(search).as_bytes());
  hex::encode(hasher.finalize())
}
