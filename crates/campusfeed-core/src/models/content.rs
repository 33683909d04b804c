use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Content categories, one store slice per category and scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Category {
    News,
    SportsNews,
    Events,
    Blogs,
    Clubs,
}

impl Category {
    /// All categories, in dispatch order.
    pub const ALL: [Category; 5] = [
        Category::News,
        Category::SportsNews,
        Category::Events,
        Category::Blogs,
        Category::Clubs,
    ];

    /// Search index queried by the search function.
    /// Sports news lives in the news index; only the category string differs.
    pub fn index_name(&self) -> &'static str {
        match self {
            Category::News | Category::SportsNews => "news",
            Category::Events => "events",
            Category::Blogs => "blogs",
            Category::Clubs => "clubs",
        }
    }

    /// Value of the `documentType` attribute in the document table.
    pub fn document_type(&self) -> &'static str {
        self.index_name()
    }

    /// Name of the state slice, as the front-end knows it.
    pub fn slice_name(&self) -> &'static str {
        match self {
            Category::News => "news",
            Category::SportsNews => "sportsNews",
            Category::Events => "events",
            Category::Blogs => "blogs",
            Category::Clubs => "clubs",
        }
    }

    /// Whether this category is queried with the sports preferences.
    pub fn uses_sports_query(&self) -> bool {
        matches!(self, Category::SportsNews)
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.slice_name())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "news" => Ok(Category::News),
            "sportsnews" | "sports-news" | "sports" => Ok(Category::SportsNews),
            "events" => Ok(Category::Events),
            "blogs" => Ok(Category::Blogs),
            "clubs" => Ok(Category::Clubs),
            other => Err(format!("unknown category: {}", other)),
        }
    }
}

/// A document from either content source.
///
/// Only the fields the client normalizes are typed; every other attribute is
/// carried through untouched in `fields`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContentItem {
    #[serde(
        default,
        deserialize_with = "string_or_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub excerpt: Option<String>,
    #[serde(
        rename = "dateModified",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub date_modified: Option<String>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl ContentItem {
    /// Look up an untyped attribute as a string, e.g. `title`.
    pub fn field_str(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(Value::as_str)
    }

    /// Best-effort display title.
    pub fn title(&self) -> &str {
        self.field_str("title")
            .or_else(|| self.field_str("name"))
            .or(self.id.as_deref())
            .unwrap_or("(untitled)")
    }
}

/// One element of the search envelope's `hits.hits` array.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    #[serde(rename = "_id", default)]
    pub id: Option<String>,
    #[serde(rename = "_source")]
    pub source: ContentItem,
}

impl SearchHit {
    /// Convert into a content item, falling back to the hit id.
    pub fn into_item(self) -> ContentItem {
        let mut item = self.source;
        if item.id.is_none() {
            item.id = self.id;
        }
        item
    }
}

fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_wire_names() {
        assert_eq!(Category::SportsNews.index_name(), "news");
        assert_eq!(Category::SportsNews.slice_name(), "sportsNews");
        assert_eq!(Category::Blogs.document_type(), "blogs");
        assert_eq!("sportsNews".parse::<Category>(), Ok(Category::SportsNews));
        assert_eq!("CLUBS".parse::<Category>(), Ok(Category::Clubs));
        assert!("weather".parse::<Category>().is_err());
    }

    #[test]
    fn test_content_item_keeps_unknown_fields() {
        let json = r#"{"id": 42, "title": "Open House", "excerpt": "<p>Hi</p>", "dateModified": "2023-01-05", "link": "https://example.edu/x"}"#;
        let item: ContentItem = serde_json::from_str(json).expect("parse item");

        assert_eq!(item.id.as_deref(), Some("42"));
        assert_eq!(item.excerpt.as_deref(), Some("<p>Hi</p>"));
        assert_eq!(item.date_modified.as_deref(), Some("2023-01-05"));
        assert_eq!(item.title(), "Open House");
        assert_eq!(item.field_str("link"), Some("https://example.edu/x"));

        let back = serde_json::to_value(&item).expect("serialize item");
        assert_eq!(back["dateModified"], "2023-01-05");
        assert_eq!(back["link"], "https://example.edu/x");
    }

    #[test]
    fn test_search_hit_fills_missing_id() {
        let hit: SearchHit =
            serde_json::from_str(r#"{"_id": "abc", "_source": {"title": "T"}}"#).expect("parse hit");
        assert_eq!(hit.into_item().id.as_deref(), Some("abc"));

        let hit: SearchHit =
            serde_json::from_str(r#"{"_id": "abc", "_source": {"id": "own"}}"#).expect("parse hit");
        assert_eq!(hit.into_item().id.as_deref(), Some("own"));
    }
}
