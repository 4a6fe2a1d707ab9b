//! Offline-first asset cache worker.
//!
//! Pre-caches a fixed manifest of static assets into a named cache
//! generation, purges stale generations on activation, and answers
//! intercepted requests cache-first with network fallback and a
//! last-resort cached root document.
//!
//! The three lifecycle operations live on
//! [`worker::OfflineCacheManager`]; [`event::WorkerHost`] adds the
//! platform-side ordering contract on top. Both collaborators (the
//! cache store and the network) are trait seams with production and
//! in-memory implementations.

pub mod cache;
pub mod config;
pub mod event;
pub mod net;
pub mod worker;

pub use cache::{CacheStore, MemoryStore, Response, SqliteStore};
pub use config::Config;
pub use event::{LifecycleEvent, WorkerHost};
pub use net::{HttpFetcher, NetworkFetch};
pub use worker::{OfflineCacheManager, ServeSource, Served};
