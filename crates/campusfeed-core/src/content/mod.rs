//! Personalized content feeds.
//!
//! A [`PreferenceHandle`] carries the user's preference profile with a
//! version counter. The [`Dispatcher`] watches it and, for every new version
//! with a preference present, fans out one search per category through the
//! [`ContentClient`]. Results flow over a channel into the [`ContentStore`],
//! which [`FeedSession`] owns and drains.

pub mod client;
pub mod dispatch;
pub mod session;
pub mod store;

pub use client::{normalize_blogs, ContentClient};
pub use dispatch::{Dispatcher, PreferenceHandle, PreferenceSnapshot};
pub use session::FeedSession;
pub use store::{ContentStore, ContentUpdate, LoadStatus, Scope, Slice};
