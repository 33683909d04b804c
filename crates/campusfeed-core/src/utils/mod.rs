//! Utility functions for text and date normalization.

pub mod format;

// Re-export commonly used functions at module level
pub use format::{normalize_date, parse_content_date, sanitize_excerpt, truncate_string};
