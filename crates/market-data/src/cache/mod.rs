//! Result cache for normalized provider responses.

mod store;
mod ttl;

pub use store::{CacheStats, CacheStore};
pub use ttl::TtlPolicy;
