//! Core trait and types for the cache store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use color_eyre::Result;
use serde::{Deserialize, Serialize};

/// A captured response, as stored in a cache generation.
///
/// The body is kept opaque; the worker never inspects it beyond passing
/// it back to the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
  /// The request URL this response was captured for (site-relative path
  /// for manifest assets, e.g. "/static/style.css").
  pub url: String,
  /// HTTP status code.
  pub status: u16,
  /// Content-Type header, if the origin sent one.
  pub content_type: Option<String>,
  /// Raw response body.
  pub body: Vec<u8>,
  /// When this response was captured.
  pub cached_at: DateTime<Utc>,
}

impl Response {
  /// Create a new response captured now.
  pub fn new(
    url: impl Into<String>,
    status: u16,
    content_type: Option<String>,
    body: Vec<u8>,
  ) -> Self {
    Self {
      url: url.into(),
      status,
      content_type,
      body,
      cached_at: Utc::now(),
    }
  }

  /// True for 2xx statuses, mirroring the usual ok-range check.
  pub fn ok(&self) -> bool {
    (200..300).contains(&self.status)
  }
}

/// Trait for cache store backends.
///
/// A store holds named cache generations, each mapping request URLs to
/// captured responses. Individual calls are atomic; multi-call sequences
/// are not, matching the guarantees of the platform stores this
/// abstracts over.
#[async_trait]
pub trait CacheStore: Send + Sync {
  /// Create the named generation if it does not exist yet.
  async fn open(&self, label: &str) -> Result<()>;

  /// Store one response under its URL in the named generation,
  /// replacing any previous entry for that URL.
  async fn put(&self, label: &str, response: Response) -> Result<()>;

  /// Store a batch of responses into the named generation, creating the
  /// generation if needed. All entries land or none do.
  async fn add_all(&self, label: &str, responses: Vec<Response>) -> Result<()>;

  /// Look up a URL in one generation.
  async fn match_in(&self, label: &str, url: &str) -> Result<Option<Response>>;

  /// Look up a URL across all generations. When several generations
  /// hold the URL, the first label in sorted order wins.
  async fn match_any(&self, url: &str) -> Result<Option<Response>>;

  /// All generation labels, sorted.
  async fn keys(&self) -> Result<Vec<String>>;

  /// URLs stored in one generation, sorted. Empty if the generation
  /// does not exist.
  async fn entries(&self, label: &str) -> Result<Vec<String>>;

  /// Delete a generation and everything in it. Returns whether it
  /// existed.
  async fn delete(&self, label: &str) -> Result<bool>;
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_response_ok_range() {
    assert!(Response::new("/", 200, None, vec![]).ok());
    assert!(Response::new("/", 299, None, vec![]).ok());
    assert!(!Response::new("/", 304, None, vec![]).ok());
    assert!(!Response::new("/", 404, None, vec![]).ok());
    assert!(!Response::new("/", 500, None, vec![]).ok());
  }
}
