//! SQLite-backed cache store.

use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, Connection};

use super::traits::{CacheStore, Response};

/// Persistent cache store, one row per cached response.
///
/// The connection is mutex-guarded; every trait call runs as a single
/// statement or transaction, so individual calls are atomic but
/// sequences of calls are not.
pub struct SqliteStore {
  conn: Mutex<Connection>,
}

impl SqliteStore {
  /// Open (creating if needed) the store at the default location.
  pub fn open() -> Result<Self> {
    let path = Self::default_path()?;

    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create cache directory: {}", e))?;
    }

    let conn = Connection::open(&path)
      .map_err(|e| eyre!("Failed to open cache database at {}: {}", path.display(), e))?;

    Self::from_connection(conn)
  }

  /// Open the store at an explicit path.
  pub fn open_at(path: &Path) -> Result<Self> {
    let conn = Connection::open(path)
      .map_err(|e| eyre!("Failed to open cache database at {}: {}", path.display(), e))?;
    Self::from_connection(conn)
  }

  /// In-memory store, for tests.
  pub fn open_in_memory() -> Result<Self> {
    let conn =
      Connection::open_in_memory().map_err(|e| eyre!("Failed to open in-memory database: {}", e))?;
    Self::from_connection(conn)
  }

  fn from_connection(conn: Connection) -> Result<Self> {
    let store = Self {
      conn: Mutex::new(conn),
    };
    store.run_migrations()?;
    Ok(store)
  }

  /// Get the default database path.
  fn default_path() -> Result<std::path::PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("offcache").join("cache.db"))
  }

  fn run_migrations(&self) -> Result<()> {
    let conn = self.lock()?;

    conn
      .execute_batch(CACHE_SCHEMA)
      .map_err(|e| eyre!("Failed to run cache migrations: {}", e))?;

    Ok(())
  }

  fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
    self.conn.lock().map_err(|e| eyre!("Lock poisoned: {}", e))
  }
}

/// Schema for cache tables.
const CACHE_SCHEMA: &str = r#"
-- Cache generations: one row per named bucket
CREATE TABLE IF NOT EXISTS generations (
    label TEXT PRIMARY KEY,
    created_at TEXT NOT NULL
);

-- Captured responses (serialized JSON), keyed by generation + URL
CREATE TABLE IF NOT EXISTS cache_entries (
    generation TEXT NOT NULL,
    url TEXT NOT NULL,
    data BLOB NOT NULL,
    cached_at TEXT NOT NULL,
    PRIMARY KEY (generation, url)
);

CREATE INDEX IF NOT EXISTS idx_cache_entries_url ON cache_entries(url);
"#;

#[async_trait]
impl CacheStore for SqliteStore {
  async fn open(&self, label: &str) -> Result<()> {
    let conn = self.lock()?;
    open_generation(&conn, label)?;
    Ok(())
  }

  async fn put(&self, label: &str, response: Response) -> Result<()> {
    let conn = self.lock()?;
    open_generation(&conn, label)?;
    put_entry(&conn, label, &response)?;
    Ok(())
  }

  async fn add_all(&self, label: &str, responses: Vec<Response>) -> Result<()> {
    let conn = self.lock()?;

    conn
      .execute("BEGIN TRANSACTION", [])
      .map_err(|e| eyre!("Failed to begin transaction: {}", e))?;

    let stored = (|| -> Result<()> {
      open_generation(&conn, label)?;
      for response in &responses {
        put_entry(&conn, label, response)?;
      }
      Ok(())
    })();

    match stored {
      Ok(()) => {
        conn
          .execute("COMMIT", [])
          .map_err(|e| eyre!("Failed to commit transaction: {}", e))?;
        Ok(())
      }
      Err(e) => {
        // Best-effort rollback; the original error is the one that matters
        let _ = conn.execute("ROLLBACK", []);
        Err(e)
      }
    }
  }

  async fn match_in(&self, label: &str, url: &str) -> Result<Option<Response>> {
    let conn = self.lock()?;

    let mut stmt = conn
      .prepare("SELECT data FROM cache_entries WHERE generation = ? AND url = ?")
      .map_err(|e| eyre!("Failed to prepare query: {}", e))?;

    let data: Option<Vec<u8>> = stmt.query_row(params![label, url], |row| row.get(0)).ok();

    match data {
      Some(data) => Ok(Some(deserialize_entry(&data)?)),
      None => Ok(None),
    }
  }

  async fn match_any(&self, url: &str) -> Result<Option<Response>> {
    let conn = self.lock()?;

    let mut stmt = conn
      .prepare(
        "SELECT data FROM cache_entries WHERE url = ?
         ORDER BY generation LIMIT 1",
      )
      .map_err(|e| eyre!("Failed to prepare query: {}", e))?;

    let data: Option<Vec<u8>> = stmt.query_row(params![url], |row| row.get(0)).ok();

    match data {
      Some(data) => Ok(Some(deserialize_entry(&data)?)),
      None => Ok(None),
    }
  }

  async fn keys(&self) -> Result<Vec<String>> {
    let conn = self.lock()?;

    let mut stmt = conn
      .prepare("SELECT label FROM generations ORDER BY label")
      .map_err(|e| eyre!("Failed to prepare query: {}", e))?;

    let labels = stmt
      .query_map([], |row| row.get(0))
      .map_err(|e| eyre!("Failed to query generations: {}", e))?
      .filter_map(|r| r.ok())
      .collect();

    Ok(labels)
  }

  async fn entries(&self, label: &str) -> Result<Vec<String>> {
    let conn = self.lock()?;

    let mut stmt = conn
      .prepare("SELECT url FROM cache_entries WHERE generation = ? ORDER BY url")
      .map_err(|e| eyre!("Failed to prepare query: {}", e))?;

    let urls = stmt
      .query_map(params![label], |row| row.get(0))
      .map_err(|e| eyre!("Failed to query entries: {}", e))?
      .filter_map(|r| r.ok())
      .collect();

    Ok(urls)
  }

  async fn delete(&self, label: &str) -> Result<bool> {
    let conn = self.lock()?;

    conn
      .execute(
        "DELETE FROM cache_entries WHERE generation = ?",
        params![label],
      )
      .map_err(|e| eyre!("Failed to delete cache entries: {}", e))?;

    let deleted = conn
      .execute("DELETE FROM generations WHERE label = ?", params![label])
      .map_err(|e| eyre!("Failed to delete generation: {}", e))?;

    Ok(deleted > 0)
  }
}

fn open_generation(conn: &Connection, label: &str) -> Result<()> {
  conn
    .execute(
      "INSERT OR IGNORE INTO generations (label, created_at) VALUES (?, ?)",
      params![label, Utc::now().to_rfc3339()],
    )
    .map_err(|e| eyre!("Failed to open generation {}: {}", label, e))?;
  Ok(())
}

fn put_entry(conn: &Connection, label: &str, response: &Response) -> Result<()> {
  let data =
    serde_json::to_vec(response).map_err(|e| eyre!("Failed to serialize response: {}", e))?;

  conn
    .execute(
      "INSERT OR REPLACE INTO cache_entries (generation, url, data, cached_at)
       VALUES (?, ?, ?, ?)",
      params![label, response.url, data, response.cached_at.to_rfc3339()],
    )
    .map_err(|e| eyre!("Failed to store entry: {}", e))?;

  Ok(())
}

fn deserialize_entry(data: &[u8]) -> Result<Response> {
  serde_json::from_slice(data).map_err(|e| eyre!("Failed to deserialize cached response: {}", e))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn test_put_then_match_roundtrip() {
    let store = SqliteStore::open_in_memory().unwrap();
    store
      .put(
        "v1",
        Response::new("/", 200, Some("text/html".into()), b"home".to_vec()),
      )
      .await
      .unwrap();

    let hit = store.match_in("v1", "/").await.unwrap().unwrap();
    assert_eq!(hit.status, 200);
    assert_eq!(hit.content_type.as_deref(), Some("text/html"));
    assert_eq!(hit.body, b"home");
  }

  #[tokio::test]
  async fn test_put_creates_generation_implicitly() {
    let store = SqliteStore::open_in_memory().unwrap();
    store
      .put("v1", Response::new("/", 200, None, vec![]))
      .await
      .unwrap();

    assert_eq!(store.keys().await.unwrap(), vec!["v1"]);
  }

  #[tokio::test]
  async fn test_match_any_across_generations() {
    let store = SqliteStore::open_in_memory().unwrap();
    store
      .put("v0", Response::new("/old-only", 200, None, vec![]))
      .await
      .unwrap();
    store.open("v1").await.unwrap();

    assert!(store.match_any("/old-only").await.unwrap().is_some());
    assert!(store.match_in("v1", "/old-only").await.unwrap().is_none());
  }

  #[tokio::test]
  async fn test_delete_removes_entries_too() {
    let store = SqliteStore::open_in_memory().unwrap();
    store
      .put("v0", Response::new("/", 200, None, vec![]))
      .await
      .unwrap();

    assert!(store.delete("v0").await.unwrap());
    assert!(!store.delete("v0").await.unwrap());
    assert!(store.match_any("/").await.unwrap().is_none());
  }

  #[tokio::test]
  async fn test_add_all_is_atomic_batch() {
    let store = SqliteStore::open_in_memory().unwrap();
    store
      .add_all(
        "v1",
        vec![
          Response::new("/", 200, None, vec![]),
          Response::new("/static/style.css", 200, None, vec![]),
          Response::new("/static/manifest.json", 200, None, vec![]),
        ],
      )
      .await
      .unwrap();

    assert_eq!(store.entries("v1").await.unwrap().len(), 3);
  }
}
