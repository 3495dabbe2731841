//! Data fetch client for casewatch read endpoints.
//!
//! Issues GET requests against the resource path a `ResourceKey` maps to and
//! decodes the body into the typed shape for that resource. The client never
//! touches cache state; scheduling and de-duplication belong to the polling
//! cache.

pub mod client;
pub mod error;

pub use client::{Fetcher, HttpFetcher, DEFAULT_TIMEOUT};
pub use error::{FetchError, FetchResult};
