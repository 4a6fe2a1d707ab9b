//! Cache store abstraction and backends.
//!
//! A store holds named "generations": versioned buckets of captured
//! responses keyed by request URL. The worker keeps exactly one
//! generation current, purges the rest on activation, and answers
//! matches across all generations.

mod memory;
mod sqlite;
mod traits;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::{CacheStore, Response};
