//! Polling cache for casewatch.
//!
//! The scheduling and de-duplication authority for every periodic read:
//! - One entry per `ResourceKey`, created on first subscription and evicted
//!   when the last subscriber leaves
//! - A repeating refresh timer per entry at the shortest requested interval
//! - At most one fetch in flight per key; ticks and invalidations that find
//!   a fetch in flight join it instead of issuing another
//! - Stale-while-revalidate: failures keep the last good value

pub mod cache;
pub mod config;
pub mod entry;

pub use cache::PollingCache;
pub use config::CacheConfig;
pub use entry::{CacheEntry, Callback, Invalidation, SubscriptionHandle};
