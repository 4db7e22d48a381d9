// ============================================================================
// CACHE MODULE - Identity-scoped response cache
// ============================================================================

pub mod backend;
pub mod error;
pub mod headers;
pub mod invalidation;
pub mod memory;
pub mod store;

pub use backend::{CacheBackend, RedisBackend};
pub use error::{CacheError, CacheResult};
pub use headers::{CacheErrorReason, CacheStatus};
pub use invalidation::{CacheInvalidator, InvalidationSummary};
pub use memory::InMemoryBackend;
pub use store::{CacheStore, PutOutcome};
