//! Content client over the search function and the document table.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use reqwest::Client;
use tracing::{debug, warn};

use crate::api::{
    decode_search_envelope, DocumentTable, DynamoTable, FetchError, LambdaInvoker, SearchFunction,
    SearchRequest,
};
use crate::config::Config;
use crate::models::{Category, ContentItem};
use crate::utils::{normalize_date, parse_content_date, sanitize_excerpt};

/// HTTP request timeout in seconds.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Fetches and normalizes content.
/// Clone is cheap - both sources sit behind an Arc.
#[derive(Clone)]
pub struct ContentClient {
    search: Arc<dyn SearchFunction>,
    table: Arc<dyn DocumentTable>,
}

impl ContentClient {
    pub fn new(search: Arc<dyn SearchFunction>, table: Arc<dyn DocumentTable>) -> Self {
        Self { search, table }
    }

    /// Build HTTP-backed sources from configuration, sharing one connection pool.
    pub fn from_config(config: &Config) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        let search = LambdaInvoker::with_client(
            http.clone(),
            config.search_endpoint()?,
            config.function_name()?,
        );
        let table = DynamoTable::with_client(http, config.table_endpoint()?, &config.table_name);
        Ok(Self::new(Arc::new(search), Arc::new(table)))
    }

    /// Search one category with the user's category string.
    pub async fn fetch_category(
        &self,
        category: Category,
        categories: &str,
    ) -> Result<Vec<ContentItem>, FetchError> {
        let request = SearchRequest {
            index: category.index_name().to_string(),
            categories: categories.to_string(),
        };
        let payload = self.search.invoke(&request).await?;
        let hits = decode_search_envelope(&payload)?;
        debug!(%category, hits = hits.len(), "Search results decoded");

        let mut items: Vec<ContentItem> = hits.into_iter().map(|h| h.into_item()).collect();
        if category == Category::Blogs {
            for item in &mut items {
                sanitize_item(item);
            }
        }
        Ok(items)
    }

    /// Every item of a category, straight from the document table.
    /// Blogs come back sanitized and sorted most recent first.
    pub async fn fetch_all(&self, category: Category) -> Result<Vec<ContentItem>, FetchError> {
        let mut items = self.table.scan_document_type(category.document_type()).await?;
        debug!(%category, count = items.len(), "Table scan complete");

        if category == Category::Blogs {
            normalize_blogs(&mut items);
        }
        Ok(items)
    }
}

fn sanitize_item(item: &mut ContentItem) {
    item.excerpt = item.excerpt.as_deref().map(sanitize_excerpt);
}

/// Sanitize excerpts, normalize `dateModified` to `YYYY-MM-DD` and sort by
/// it, most recent first. Items without a usable date go last, in their
/// original order.
pub fn normalize_blogs(items: &mut [ContentItem]) {
    for item in items.iter_mut() {
        sanitize_item(item);
        if let Some(raw) = item.date_modified.as_deref() {
            if parse_content_date(raw).is_none() {
                warn!(id = ?item.id, date = raw, "Unparseable blog date");
            }
            item.date_modified = Some(normalize_date(raw));
        }
    }

    items.sort_by_key(|item| {
        std::cmp::Reverse(item.date_modified.as_deref().and_then(parse_content_date))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    /// Answers every invocation with the same envelope and records requests.
    struct FixedSearch {
        document: serde_json::Value,
        requests: Mutex<Vec<SearchRequest>>,
    }

    #[async_trait]
    impl SearchFunction for FixedSearch {
        async fn invoke(&self, request: &SearchRequest) -> Result<Vec<u8>, FetchError> {
            self.requests.lock().unwrap().push(request.clone());
            let inner = serde_json::to_string(&self.document).unwrap();
            Ok(serde_json::to_vec(&inner).unwrap())
        }
    }

    struct FixedTable {
        items: Vec<ContentItem>,
    }

    #[async_trait]
    impl DocumentTable for FixedTable {
        async fn scan_document_type(&self, document_type: &str) -> Result<Vec<ContentItem>, FetchError> {
            Ok(self
                .items
                .iter()
                .filter(|i| i.field_str("documentType") == Some(document_type))
                .cloned()
                .collect())
        }
    }

    fn item(value: serde_json::Value) -> ContentItem {
        serde_json::from_value(value).unwrap()
    }

    fn make_client(document: serde_json::Value, items: Vec<ContentItem>) -> (ContentClient, Arc<FixedSearch>) {
        let search = Arc::new(FixedSearch {
            document,
            requests: Mutex::new(Vec::new()),
        });
        let table = Arc::new(FixedTable { items });
        (ContentClient::new(search.clone(), table), search)
    }

    #[tokio::test]
    async fn test_fetch_category_sanitizes_blog_excerpts_only() {
        let document = json!({"hits": {"hits": [
            {"_id": "b1", "_source": {"excerpt": "<p>Hello <b>World</b></p>"}}
        ]}});
        let (client, search) = make_client(document, vec![]);

        let blogs = client.fetch_category(Category::Blogs, "Advising").await.unwrap();
        assert_eq!(blogs[0].excerpt.as_deref(), Some("Hello World"));
        assert_eq!(blogs[0].id.as_deref(), Some("b1"));

        let news = client.fetch_category(Category::News, "Advising").await.unwrap();
        assert_eq!(news[0].excerpt.as_deref(), Some("<p>Hello <b>World</b></p>"));

        let requests = search.requests.lock().unwrap();
        assert_eq!(requests[0].index, "blogs");
        assert_eq!(requests[0].categories, "Advising");
        assert_eq!(requests[1].index, "news");
    }

    #[tokio::test]
    async fn test_fetch_category_surfaces_malformed_envelope() {
        let (client, _) = make_client(json!({"results": []}), vec![]);
        let err = client.fetch_category(Category::Events, "x").await.unwrap_err();
        assert!(matches!(err, FetchError::MalformedResponse { .. }));
    }

    #[tokio::test]
    async fn test_fetch_all_blogs_sorted_most_recent_first() {
        let items = vec![
            item(json!({"id": "old", "documentType": "blogs", "dateModified": "2023-01-05", "excerpt": "<i>old</i>"})),
            item(json!({"id": "undated", "documentType": "blogs"})),
            item(json!({"id": "new", "documentType": "blogs", "dateModified": "2023/2/10"})),
            item(json!({"id": "club", "documentType": "clubs"})),
        ];
        let (client, _) = make_client(json!({}), items);

        let blogs = client.fetch_all(Category::Blogs).await.unwrap();
        let ids: Vec<_> = blogs.iter().map(|b| b.id.as_deref().unwrap()).collect();
        assert_eq!(ids, vec!["new", "old", "undated"]);
        assert_eq!(blogs[0].date_modified.as_deref(), Some("2023-02-10"));
        assert_eq!(blogs[1].excerpt.as_deref(), Some("old"));
    }

    #[tokio::test]
    async fn test_fetch_all_clubs_untouched() {
        let items = vec![item(json!({"id": "c1", "documentType": "clubs", "excerpt": "<b>Chess</b>"}))];
        let (client, _) = make_client(json!({}), items);

        let clubs = client.fetch_all(Category::Clubs).await.unwrap();
        assert_eq!(clubs.len(), 1);
        assert_eq!(clubs[0].excerpt.as_deref(), Some("<b>Chess</b>"));
    }

    #[test]
    fn test_normalize_blogs_keeps_unparseable_dates() {
        let mut items = vec![item(json!({"id": "x", "dateModified": "sometime"}))];
        normalize_blogs(&mut items);
        assert_eq!(items[0].date_modified.as_deref(), Some("sometime"));
    }
}
