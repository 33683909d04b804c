//! Data models for campus content.
//!
//! - `ContentItem`, `SearchHit`: documents from the search function and table
//! - `Category`: the five content categories and their wire names
//! - `UserPreference`: the preference profile that drives personalized feeds

pub mod content;
pub mod preference;

pub use content::{Category, ContentItem, SearchHit};
pub use preference::{SportsPreference, UserPreference};
