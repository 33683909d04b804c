//! Content store: one slice per category and scope.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::api::FetchError;
use crate::models::{Category, ContentItem};

/// Which source a slice is filled from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    /// Search function results for the user's preferences
    Personalized,
    /// Every document of the category, from the document table
    All,
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Scope::Personalized => write!(f, "personalized"),
            Scope::All => write!(f, "all"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum LoadStatus {
    #[default]
    Idle,
    Loading,
    Ready,
    Failed(String),
}

impl LoadStatus {
    /// Ready or failed.
    pub fn is_settled(&self) -> bool {
        matches!(self, LoadStatus::Ready | LoadStatus::Failed(_))
    }
}

impl std::fmt::Display for LoadStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoadStatus::Idle => write!(f, "idle"),
            LoadStatus::Loading => write!(f, "loading"),
            LoadStatus::Ready => write!(f, "ready"),
            LoadStatus::Failed(reason) => write!(f, "failed: {}", reason),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Slice {
    pub status: LoadStatus,
    pub items: Vec<ContentItem>,
    /// When `items` was last replaced
    pub updated_at: Option<DateTime<Utc>>,
    /// Newest fetch generation seen for this slice. Results from older
    /// generations are dropped.
    pub generation: u64,
}

/// Messages from background fetches to the store owner.
///
/// `generation` is the preference version for personalized fetches and a
/// refresh counter for table scans.
#[derive(Debug)]
pub enum ContentUpdate {
    /// A fetch for the slice has been issued
    Started {
        scope: Scope,
        category: Category,
        generation: u64,
    },
    /// A fetch for the slice has resolved
    Finished {
        scope: Scope,
        category: Category,
        generation: u64,
        result: Result<Vec<ContentItem>, FetchError>,
    },
}

/// Application state for content: ten slices, five categories in each scope.
#[derive(Debug, Clone)]
pub struct ContentStore {
    slices: HashMap<(Scope, Category), Slice>,
}

impl Default for ContentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ContentStore {
    pub fn new() -> Self {
        let slices = [Scope::Personalized, Scope::All]
            .into_iter()
            .flat_map(|scope| Category::ALL.into_iter().map(move |c| ((scope, c), Slice::default())))
            .collect();
        Self { slices }
    }

    pub fn slice(&self, scope: Scope, category: Category) -> &Slice {
        // Every (scope, category) pair is created in new()
        &self.slices[&(scope, category)]
    }

    fn slice_mut(&mut self, scope: Scope, category: Category) -> &mut Slice {
        self.slices.entry((scope, category)).or_default()
    }

    /// Mark every slice of a scope as loading for a new generation, before
    /// its fetches have reported back. Until results of that generation
    /// arrive the scope is not settled.
    pub fn begin(&mut self, scope: Scope, generation: u64) {
        for category in Category::ALL {
            let slice = self.slice_mut(scope, category);
            slice.status = LoadStatus::Loading;
            slice.generation = slice.generation.max(generation);
        }
    }

    /// Apply an update. A successful fetch replaces the items; a failed one
    /// keeps whatever was there and only records the failure. Updates from a
    /// generation older than the slice's are ignored.
    pub fn apply(&mut self, update: ContentUpdate) {
        let (scope, category, generation) = match &update {
            ContentUpdate::Started { scope, category, generation }
            | ContentUpdate::Finished { scope, category, generation, .. } => (*scope, *category, *generation),
        };
        let slice = self.slice_mut(scope, category);
        if generation < slice.generation {
            debug!(%scope, %category, generation, current = slice.generation, "Dropping stale content update");
            return;
        }
        slice.generation = generation;

        match update {
            ContentUpdate::Started { .. } => {
                slice.status = LoadStatus::Loading;
            }
            ContentUpdate::Finished { result: Ok(items), .. } => {
                slice.items = items;
                slice.status = LoadStatus::Ready;
                slice.updated_at = Some(Utc::now());
            }
            ContentUpdate::Finished { result: Err(e), .. } => {
                slice.status = LoadStatus::Failed(e.to_string());
            }
        }
    }

    /// True once every slice of the scope has either loaded or failed.
    pub fn is_settled(&self, scope: Scope) -> bool {
        Category::ALL
            .iter()
            .all(|&c| self.slice(scope, c).status.is_settled())
    }

    /// Slices of a scope that failed, with their reason.
    pub fn failures(&self, scope: Scope) -> Vec<(Category, String)> {
        Category::ALL
            .iter()
            .filter_map(|&c| match &self.slice(scope, c).status {
                LoadStatus::Failed(reason) => Some((c, reason.clone())),
                _ => None,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn items(ids: &[&str]) -> Vec<ContentItem> {
        ids.iter()
            .map(|id| ContentItem {
                id: Some(id.to_string()),
                ..Default::default()
            })
            .collect()
    }

    #[test]
    fn test_new_store_has_idle_slices() {
        let store = ContentStore::new();
        for scope in [Scope::Personalized, Scope::All] {
            for category in Category::ALL {
                let slice = store.slice(scope, category);
                assert_eq!(slice.status, LoadStatus::Idle);
                assert!(slice.items.is_empty());
            }
            assert!(!store.is_settled(scope));
        }
    }

    #[test]
    fn test_success_replaces_items() {
        let mut store = ContentStore::new();
        store.apply(ContentUpdate::Finished {
            scope: Scope::All,
            category: Category::Clubs,
            generation: 0,
            result: Ok(items(&["a", "b"])),
        });
        store.apply(ContentUpdate::Finished {
            scope: Scope::All,
            category: Category::Clubs,
            generation: 0,
            result: Ok(items(&["c"])),
        });

        let slice = store.slice(Scope::All, Category::Clubs);
        assert_eq!(slice.status, LoadStatus::Ready);
        assert_eq!(slice.items, items(&["c"]));
        assert!(slice.updated_at.is_some());
        // Other scope untouched
        assert_eq!(store.slice(Scope::Personalized, Category::Clubs).status, LoadStatus::Idle);
    }

    #[test]
    fn test_failure_keeps_previous_items() {
        let mut store = ContentStore::new();
        store.apply(ContentUpdate::Finished {
            scope: Scope::Personalized,
            category: Category::Blogs,
            generation: 1,
            result: Ok(items(&["kept"])),
        });
        store.apply(ContentUpdate::Started {
            scope: Scope::Personalized,
            category: Category::Blogs,
            generation: 2,
        });
        assert_eq!(store.slice(Scope::Personalized, Category::Blogs).status, LoadStatus::Loading);

        store.apply(ContentUpdate::Finished {
            scope: Scope::Personalized,
            category: Category::Blogs,
            generation: 2,
            result: Err(FetchError::RateLimited),
        });

        let slice = store.slice(Scope::Personalized, Category::Blogs);
        assert!(matches!(slice.status, LoadStatus::Failed(_)));
        assert_eq!(slice.items, items(&["kept"]));
        assert_eq!(store.failures(Scope::Personalized).len(), 1);
        assert_eq!(store.failures(Scope::Personalized)[0].0, Category::Blogs);
    }

    #[test]
    fn test_settled_once_every_slice_resolves() {
        let mut store = ContentStore::new();
        for (i, category) in Category::ALL.into_iter().enumerate() {
            let result = if i == 0 {
                Err(FetchError::ServerError("boom".to_string()))
            } else {
                Ok(vec![])
            };
            store.apply(ContentUpdate::Finished {
                scope: Scope::Personalized,
                category,
                generation: 1,
                result,
            });
        }
        assert!(store.is_settled(Scope::Personalized));
        assert!(!store.is_settled(Scope::All));
    }

    #[test]
    fn test_begin_unsettles_scope_until_new_generation_reports() {
        let mut store = ContentStore::new();
        for category in Category::ALL {
            store.apply(ContentUpdate::Finished {
                scope: Scope::Personalized,
                category,
                generation: 1,
                result: Ok(items(&["old"])),
            });
        }
        assert!(store.is_settled(Scope::Personalized));

        store.begin(Scope::Personalized, 2);
        assert!(!store.is_settled(Scope::Personalized));
        assert_eq!(store.slice(Scope::Personalized, Category::News).status, LoadStatus::Loading);
        // Items stay visible while the new generation loads
        assert_eq!(store.slice(Scope::Personalized, Category::News).items, items(&["old"]));
        assert!(!store.is_settled(Scope::All));
    }

    #[test]
    fn test_stale_generation_is_dropped() {
        let mut store = ContentStore::new();
        store.begin(Scope::Personalized, 3);

        // A late result from an earlier preference version
        store.apply(ContentUpdate::Finished {
            scope: Scope::Personalized,
            category: Category::Events,
            generation: 2,
            result: Ok(items(&["stale"])),
        });
        let slice = store.slice(Scope::Personalized, Category::Events);
        assert_eq!(slice.status, LoadStatus::Loading);
        assert!(slice.items.is_empty());

        store.apply(ContentUpdate::Finished {
            scope: Scope::Personalized,
            category: Category::Events,
            generation: 3,
            result: Ok(items(&["fresh"])),
        });
        let slice = store.slice(Scope::Personalized, Category::Events);
        assert_eq!(slice.status, LoadStatus::Ready);
        assert_eq!(slice.items, items(&["fresh"]));
        assert_eq!(slice.generation, 3);
    }
}
