//! Core library for campusfeed.
//!
//! Aggregates campus content (news, sports news, events, blogs, clubs) from a
//! serverless search function and a document table, and provides an offline
//! asset cache with versioned namespaces.
//!
//! - [`api`]: HTTP seams for the search function and the document table
//! - [`cache`]: cache-first / network-fallback asset cache
//! - [`content`]: content client, preference-driven dispatcher, content store
//! - [`models`]: content items, categories, user preferences

pub mod api;
pub mod cache;
pub mod config;
pub mod content;
pub mod models;
pub mod utils;

pub use api::FetchError;
pub use cache::{CacheError, OfflineCache};
pub use config::Config;
pub use content::{ContentClient, FeedSession};
