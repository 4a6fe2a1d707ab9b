//! Network fetch abstraction and the reqwest-backed implementation.

use async_trait::async_trait;
use color_eyre::{eyre::eyre, Result};
use url::Url;

use crate::cache::Response;

/// Trait for the network collaborator.
///
/// Implementations return `Ok` for any HTTP response (the status travels
/// inside [`Response`]); only transport-level failures are errors. That
/// split is what lets the worker pass 404s through during fetch handling
/// while still treating them as install failures.
#[async_trait]
pub trait NetworkFetch: Send + Sync {
  /// Fetch one URL. Site-relative paths are resolved by the
  /// implementation.
  async fn fetch(&self, url: &str) -> Result<Response>;
}

/// HTTP fetcher that resolves site-relative paths against a configured
/// origin.
pub struct HttpFetcher {
  client: reqwest::Client,
  origin: Url,
}

impl HttpFetcher {
  pub fn new(origin: &str) -> Result<Self> {
    let origin =
      Url::parse(origin).map_err(|e| eyre!("Invalid site origin {}: {}", origin, e))?;

    Ok(Self {
      client: reqwest::Client::new(),
      origin,
    })
  }

  fn resolve(&self, url: &str) -> Result<Url> {
    if url.starts_with("http://") || url.starts_with("https://") {
      Url::parse(url).map_err(|e| eyre!("Invalid request URL {}: {}", url, e))
    } else {
      self
        .origin
        .join(url)
        .map_err(|e| eyre!("Failed to resolve {} against {}: {}", url, self.origin, e))
    }
  }
}

#[async_trait]
impl NetworkFetch for HttpFetcher {
  async fn fetch(&self, url: &str) -> Result<Response> {
    let target = self.resolve(url)?;

    let resp = self
      .client
      .get(target)
      .send()
      .await
      .map_err(|e| eyre!("Network fetch for {} failed: {}", url, e))?;

    let status = resp.status().as_u16();
    let content_type = resp
      .headers()
      .get(reqwest::header::CONTENT_TYPE)
      .and_then(|v| v.to_str().ok())
      .map(String::from);

    let body = resp
      .bytes()
      .await
      .map_err(|e| eyre!("Failed to read response body for {}: {}", url, e))?
      .to_vec();

    Ok(Response::new(url, status, content_type, body))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_resolve_site_relative_path() {
    let fetcher = HttpFetcher::new("http://localhost:5000").unwrap();
    let url = fetcher.resolve("/static/style.css").unwrap();
    assert_eq!(url.as_str(), "http://localhost:5000/static/style.css");
  }

  #[test]
  fn test_resolve_absolute_url_passes_through() {
    let fetcher = HttpFetcher::new("http://localhost:5000").unwrap();
    let url = fetcher.resolve("https://cdn.example.org/app.js").unwrap();
    assert_eq!(url.as_str(), "https://cdn.example.org/app.js");
  }

  #[test]
  fn test_invalid_origin_rejected() {
    assert!(HttpFetcher::new("not a url").is_err());
  }
}
