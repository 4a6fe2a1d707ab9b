//! The offline cache manager: install, activate, fetch interception.
//!
//! Each operation is stateless with respect to the others; everything
//! shared lives in the cache store. The manager is generic over its two
//! collaborators so a test harness can drive it without a network or a
//! database.

use std::sync::Arc;

use color_eyre::{eyre::eyre, Result};
use futures::future;
use tracing::{debug, info};

use crate::cache::{CacheStore, Response};
use crate::config::CacheConfig;
use crate::net::NetworkFetch;

/// A response produced by fetch handling, tagged with which path
/// answered it.
#[derive(Debug, Clone)]
pub struct Served {
  pub response: Response,
  pub source: ServeSource,
}

/// Which of the three fetch-handling paths produced a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServeSource {
  /// Found in a cache generation; the network was never touched.
  Cache,
  /// Cache miss, answered by the network.
  Network,
  /// Cache miss and network failure, answered by the cached fallback
  /// path.
  Fallback,
}

/// Offline cache manager.
///
/// Maintains exactly one named cache generation holding the fixed asset
/// manifest, purges all other generations on activation, and serves
/// intercepted requests cache-first with network fallback.
pub struct OfflineCacheManager<S: CacheStore, N: NetworkFetch> {
  store: Arc<S>,
  net: Arc<N>,
  label: String,
  manifest: Vec<String>,
  fallback_path: String,
}

impl<S: CacheStore, N: NetworkFetch> OfflineCacheManager<S, N> {
  pub fn new(store: Arc<S>, net: Arc<N>, config: &CacheConfig) -> Self {
    Self {
      store,
      net,
      label: config.label.clone(),
      manifest: config.manifest.clone(),
      fallback_path: config.fallback_path.clone(),
    }
  }

  /// Current generation label.
  pub fn label(&self) -> &str {
    &self.label
  }

  /// Install: fetch every manifest asset and store the batch into the
  /// current generation.
  ///
  /// All-or-nothing: the fetches run as one concurrent batch, and a
  /// single failure (transport error or non-2xx status) fails the whole
  /// step before anything is stored. Retry is the caller's problem.
  pub async fn on_install(&self) -> Result<()> {
    let fetched =
      future::try_join_all(self.manifest.iter().map(|path| self.net.fetch(path)))
        .await
        .map_err(|e| e.wrap_err("Install aborted: manifest asset fetch failed"))?;

    if let Some(bad) = fetched.iter().find(|r| !r.ok()) {
      return Err(eyre!(
        "Install aborted: asset {} returned status {}",
        bad.url,
        bad.status
      ));
    }

    self.store.open(&self.label).await?;
    self.store.add_all(&self.label, fetched).await?;

    info!(label = %self.label, assets = self.manifest.len(), "offline worker installed");
    Ok(())
  }

  /// Activate: delete every generation whose label is not current.
  ///
  /// Deletions run concurrently with no ordering between them; the step
  /// completes only once all have settled, and any failure fails the
  /// step. Returns how many stale generations were purged.
  pub async fn on_activate(&self) -> Result<usize> {
    let stale: Vec<String> = self
      .store
      .keys()
      .await?
      .into_iter()
      .filter(|label| *label != self.label)
      .collect();

    future::try_join_all(stale.iter().map(|label| self.store.delete(label))).await?;

    info!(label = %self.label, purged = stale.len(), "offline worker activated");
    Ok(stale.len())
  }

  /// Fetch interception: cache first, then network, then the cached
  /// fallback path.
  ///
  /// The three paths are strictly sequential. A network response is
  /// returned as-is and never written back to the store (no
  /// populate-on-miss).
  pub async fn on_fetch(&self, url: &str) -> Result<Served> {
    if let Some(response) = self.lookup(url).await? {
      debug!(url, "serving from cache");
      return Ok(Served {
        response,
        source: ServeSource::Cache,
      });
    }

    match self.net.fetch(url).await {
      Ok(response) => {
        debug!(url, "cache miss, served from network");
        Ok(Served {
          response,
          source: ServeSource::Network,
        })
      }
      Err(net_err) => {
        debug!(url, fallback = %self.fallback_path, "cache miss and network failure, trying fallback");
        match self.lookup(&self.fallback_path).await? {
          Some(response) => Ok(Served {
            response,
            source: ServeSource::Fallback,
          }),
          None => Err(net_err.wrap_err(format!(
            "No cached entry for {} and fallback {} is not cached either",
            url, self.fallback_path
          ))),
        }
      }
    }
  }

  /// Plain network fetch, bypassing the cache entirely. Used while the
  /// worker does not yet control request routing.
  pub async fn network_only(&self, url: &str) -> Result<Served> {
    let response = self.net.fetch(url).await?;
    Ok(Served {
      response,
      source: ServeSource::Network,
    })
  }

  /// Match a URL in the current generation first, then across all
  /// generations.
  async fn lookup(&self, url: &str) -> Result<Option<Response>> {
    if let Some(hit) = self.store.match_in(&self.label, url).await? {
      return Ok(Some(hit));
    }
    self.store.match_any(url).await
  }
}
