//! Lifecycle events and the host-side dispatcher.
//!
//! The platform contract is three independently delivered events. The
//! host awaits each operation to settlement before the dispatch returns
//! (the "held open" semantics of lifecycle events) and enforces the
//! phase ordering: activate only after a successful install, and fetch
//! interception only once the worker has taken control.

use color_eyre::{eyre::eyre, Result};

use crate::cache::CacheStore;
use crate::net::NetworkFetch;
use crate::worker::{OfflineCacheManager, Served};

/// Lifecycle events delivered to the worker.
#[derive(Debug, Clone)]
pub enum LifecycleEvent {
  /// First registration, or update of the worker itself.
  Install,
  /// Delivered after install completes; the worker takes control.
  Activate,
  /// An outgoing request was intercepted.
  Fetch(String),
}

/// Host that owns a worker and routes lifecycle events to it.
pub struct WorkerHost<S: CacheStore, N: NetworkFetch> {
  manager: OfflineCacheManager<S, N>,
  installed: bool,
  activated: bool,
}

impl<S: CacheStore, N: NetworkFetch> WorkerHost<S, N> {
  pub fn new(manager: OfflineCacheManager<S, N>) -> Self {
    Self {
      manager,
      installed: false,
      activated: false,
    }
  }

  /// Deliver one event and wait for its handler to settle.
  ///
  /// Fetch events yield a response; install and activate yield `None`.
  /// Until activation succeeds, intercepted fetches pass straight
  /// through to the network.
  pub async fn dispatch(&mut self, event: LifecycleEvent) -> Result<Option<Served>> {
    match event {
      LifecycleEvent::Install => {
        self.manager.on_install().await?;
        self.installed = true;
        Ok(None)
      }
      LifecycleEvent::Activate => {
        if !self.installed {
          return Err(eyre!("Activate delivered before a successful install"));
        }
        self.manager.on_activate().await?;
        self.activated = true;
        Ok(None)
      }
      LifecycleEvent::Fetch(url) => {
        let served = if self.activated {
          self.manager.on_fetch(&url).await?
        } else {
          self.manager.network_only(&url).await?
        };
        Ok(Some(served))
      }
    }
  }

  /// Whether the worker controls request routing yet.
  pub fn in_control(&self) -> bool {
    self.activated
  }

  pub fn manager(&self) -> &OfflineCacheManager<S, N> {
    &self.manager
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::{MemoryStore, Response};
  use crate::config::CacheConfig;
  use crate::worker::ServeSource;

  use async_trait::async_trait;
  use std::sync::atomic::{AtomicU32, Ordering};
  use std::sync::Arc;

  /// Answers every URL with a 200 and counts calls.
  struct EchoFetcher {
    calls: AtomicU32,
  }

  impl EchoFetcher {
    fn new() -> Self {
      Self {
        calls: AtomicU32::new(0),
      }
    }
  }

  #[async_trait]
  impl NetworkFetch for EchoFetcher {
    async fn fetch(&self, url: &str) -> Result<Response> {
      self.calls.fetch_add(1, Ordering::SeqCst);
      Ok(Response::new(url, 200, None, url.as_bytes().to_vec()))
    }
  }

  fn host(
    store: Arc<MemoryStore>,
    net: Arc<EchoFetcher>,
  ) -> WorkerHost<MemoryStore, EchoFetcher> {
    WorkerHost::new(OfflineCacheManager::new(
      store,
      net,
      &CacheConfig::default(),
    ))
  }

  #[tokio::test]
  async fn test_activate_rejected_before_install() {
    let mut host = host(Arc::new(MemoryStore::new()), Arc::new(EchoFetcher::new()));

    assert!(host.dispatch(LifecycleEvent::Activate).await.is_err());
    assert!(!host.in_control());
  }

  #[tokio::test]
  async fn test_fetch_passes_through_until_activated() {
    let store = Arc::new(MemoryStore::new());
    store
      .put(
        "association-chat-v1",
        Response::new("/", 200, None, b"cached".to_vec()),
      )
      .await
      .unwrap();

    let net = Arc::new(EchoFetcher::new());
    let mut host = host(store, net.clone());

    // Not yet in control: even a cached URL goes to the network
    let served = host
      .dispatch(LifecycleEvent::Fetch("/".into()))
      .await
      .unwrap()
      .unwrap();
    assert_eq!(served.source, ServeSource::Network);
    assert_eq!(net.calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn test_full_lifecycle_takes_control() {
    let store = Arc::new(MemoryStore::new());
    let net = Arc::new(EchoFetcher::new());
    let mut host = host(store, net.clone());

    assert!(host
      .dispatch(LifecycleEvent::Install)
      .await
      .unwrap()
      .is_none());
    assert!(host
      .dispatch(LifecycleEvent::Activate)
      .await
      .unwrap()
      .is_none());
    assert!(host.in_control());

    // Now in control: the installed asset is served from cache
    let calls_before = net.calls.load(Ordering::SeqCst);
    let served = host
      .dispatch(LifecycleEvent::Fetch("/".into()))
      .await
      .unwrap()
      .unwrap();
    assert_eq!(served.source, ServeSource::Cache);
    assert_eq!(net.calls.load(Ordering::SeqCst), calls_before);
  }
}
