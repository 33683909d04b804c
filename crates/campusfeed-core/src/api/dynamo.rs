//! Document table access over the JSON scan protocol.

use std::future::Future;

use async_trait::async_trait;
use reqwest::{header, Client};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Number, Value};
use tracing::{debug, warn};

use super::FetchError;
use crate::models::ContentItem;

/// Target header value for the scan operation.
const SCAN_TARGET: &str = "DynamoDB_20120810.Scan";

/// Content type expected by the table endpoint.
const AMZ_JSON: &str = "application/x-amz-json-1.0";

/// Upper bound on scan pages, in case the table keeps returning a
/// continuation key.
const MAX_SCAN_PAGES: usize = 100;

/// A managed document table holding every content item.
#[async_trait]
pub trait DocumentTable: Send + Sync {
    /// Return every item whose `documentType` equals `document_type`.
    /// Order is unspecified.
    async fn scan_document_type(&self, document_type: &str) -> Result<Vec<ContentItem>, FetchError>;
}

/// Scans a table through its HTTP endpoint.
#[derive(Clone)]
pub struct DynamoTable {
    client: Client,
    endpoint: String,
    table_name: String,
}

#[derive(Debug, Serialize)]
struct ScanRequest<'a> {
    #[serde(rename = "TableName")]
    table_name: &'a str,
    #[serde(rename = "FilterExpression")]
    filter_expression: &'static str,
    #[serde(rename = "ExpressionAttributeNames")]
    expression_attribute_names: Value,
    #[serde(rename = "ExpressionAttributeValues")]
    expression_attribute_values: Value,
    #[serde(rename = "ExclusiveStartKey", skip_serializing_if = "Option::is_none")]
    exclusive_start_key: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct ScanResponse {
    #[serde(rename = "Items", default)]
    items: Vec<Map<String, Value>>,
    #[serde(rename = "LastEvaluatedKey", default)]
    last_evaluated_key: Option<Value>,
}

impl DynamoTable {
    pub fn with_client(client: Client, endpoint: &str, table_name: &str) -> Self {
        Self {
            client,
            endpoint: endpoint.to_string(),
            table_name: table_name.to_string(),
        }
    }

    fn scan_request(&self, document_type: &str, start_key: Option<Value>) -> ScanRequest<'_> {
        ScanRequest {
            table_name: &self.table_name,
            filter_expression: "#dtype = :dname",
            expression_attribute_names: json!({ "#dtype": "documentType" }),
            expression_attribute_values: json!({ ":dname": { "S": document_type } }),
            exclusive_start_key: start_key,
        }
    }

    async fn scan_page(&self, request: &ScanRequest<'_>) -> Result<ScanResponse, FetchError> {
        let response = self
            .client
            .post(&self.endpoint)
            .header("X-Amz-Target", SCAN_TARGET)
            .header(header::CONTENT_TYPE, AMZ_JSON)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(FetchError::from_status(status, &body));
        }

        serde_json::from_str(&body).map_err(|e| FetchError::malformed("scan response", e.to_string()))
    }
}

#[async_trait]
impl DocumentTable for DynamoTable {
    async fn scan_document_type(&self, document_type: &str) -> Result<Vec<ContentItem>, FetchError> {
        let table = self;
        let raw_items = follow_pages(MAX_SCAN_PAGES, move |start_key| {
            let request = table.scan_request(document_type, start_key);
            async move { table.scan_page(&request).await }
        })
        .await?;
        debug!(table = %self.table_name, document_type, count = raw_items.len(), "Scanned table");

        raw_items
            .into_iter()
            .map(|raw| {
                let plain = Value::Object(decode_item(raw)?);
                serde_json::from_value::<ContentItem>(plain)
                    .map_err(|e| FetchError::malformed("table item", e.to_string()))
            })
            .collect()
    }
}

/// Request pages until one arrives without a continuation key, passing each
/// page's `LastEvaluatedKey` as the next start key. Stops after `max_pages`.
async fn follow_pages<F, Fut>(
    max_pages: usize,
    mut fetch_page: F,
) -> Result<Vec<Map<String, Value>>, FetchError>
where
    F: FnMut(Option<Value>) -> Fut,
    Fut: Future<Output = Result<ScanResponse, FetchError>>,
{
    let mut items = Vec::new();
    let mut start_key = None;

    for page in 1..=max_pages {
        let response = fetch_page(start_key.take()).await?;
        debug!(page, count = response.items.len(), "Scanned table page");
        items.extend(response.items);

        match response.last_evaluated_key {
            Some(key) if !key.is_null() => start_key = Some(key),
            _ => return Ok(items),
        }
    }

    warn!(max_pages, "Scan stopped at page limit");
    Ok(items)
}

/// Convert a typed item (`{"title": {"S": "x"}}`) into plain JSON.
pub fn decode_item(raw: Map<String, Value>) -> Result<Map<String, Value>, FetchError> {
    raw.into_iter()
        .map(|(name, value)| decode_attribute(value).map(|v| (name, v)))
        .collect()
}

fn decode_attribute(value: Value) -> Result<Value, FetchError> {
    let Value::Object(mut typed) = value else {
        return Err(FetchError::malformed("attribute value", "expected a typed object"));
    };
    let Some(tag) = typed.keys().next().cloned() else {
        return Err(FetchError::malformed("attribute value", "empty typed object"));
    };
    let inner = typed.remove(&tag).unwrap_or(Value::Null);

    match (tag.as_str(), inner) {
        ("S", s @ Value::String(_)) => Ok(s),
        ("N", Value::String(n)) => Ok(decode_number(&n)),
        ("BOOL", b @ Value::Bool(_)) => Ok(b),
        ("NULL", _) => Ok(Value::Null),
        ("L", Value::Array(list)) => list
            .into_iter()
            .map(decode_attribute)
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        ("M", Value::Object(map)) => decode_item(map).map(Value::Object),
        ("SS", Value::Array(set)) => Ok(Value::Array(set)),
        ("NS", Value::Array(set)) => Ok(Value::Array(
            set.into_iter()
                .map(|n| match n {
                    Value::String(s) => decode_number(&s),
                    other => other,
                })
                .collect(),
        )),
        // Binary values stay base64 encoded
        ("B", b) | ("BS", b) => Ok(b),
        (tag, _) => Err(FetchError::malformed(
            "attribute value",
            format!("unsupported or mistyped tag {}", tag),
        )),
    }
}

fn decode_number(raw: &str) -> Value {
    if let Ok(i) = raw.parse::<i64>() {
        return Value::Number(i.into());
    }
    raw.parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
        .unwrap_or_else(|| Value::String(raw.to_string()))
}
