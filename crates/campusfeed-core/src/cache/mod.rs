//! Offline asset cache.
//!
//! Cache-first, network-fallback storage of HTTP responses, grouped into
//! named namespaces. One namespace is live at a time; activating a new one
//! purges the rest.
//!
//! - `OfflineCache`: install / activate / fetch-or-populate
//! - `CacheStorage`: pluggable backend (`MemoryCacheStorage`, `DiskCacheStorage`)
//! - `Fetcher`: the network (`HttpFetcher`)

pub mod error;
pub mod fetcher;
pub mod offline;
pub mod storage;

pub use error::CacheError;
pub use fetcher::{Fetcher, HttpFetcher, Request, Response};
pub use offline::{CacheSource, OfflineCache};
pub use storage::{CacheStorage, CachedData, DiskCacheStorage, MemoryCacheStorage, RequestKey};
