/// Durable SQLite cache for lookup and detail payloads
///
/// Architecture:
/// - Domain: keys, the three-state lookup result and pending writes
/// - Infrastructure: diesel models, the single writer thread and the reader API
pub mod domain;
pub mod infrastructure;

pub use domain::entities::{normalize_title, CacheLookup, DetailKind, PendingWrite, SearchKey};
pub use infrastructure::persistent_cache::PersistentCache;
pub use infrastructure::writer::{BatchSink, CacheWriter, SinkError, WriterConfig};
