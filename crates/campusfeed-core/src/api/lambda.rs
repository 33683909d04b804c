//! Search function invocation and envelope decoding.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use super::FetchError;
use crate::models::SearchHit;

/// Invoke API path; the function name is appended between the two parts.
const INVOKE_PATH_PREFIX: &str = "2015-03-31/functions";

/// Header set by the function runtime when the handler itself failed.
const FUNCTION_ERROR_HEADER: &str = "x-amz-function-error";

/// Payload sent to the search function.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchRequest {
    pub index: String,
    pub categories: String,
}

/// A serverless search function. Returns the raw invocation payload.
#[async_trait]
pub trait SearchFunction: Send + Sync {
    async fn invoke(&self, request: &SearchRequest) -> Result<Vec<u8>, FetchError>;
}

/// Invokes a deployed function over the HTTP invoke API.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct LambdaInvoker {
    client: Client,
    endpoint: String,
    function_name: String,
}

#[derive(Debug, Deserialize)]
struct FunctionErrorBody {
    #[serde(rename = "errorMessage", default)]
    error_message: Option<String>,
}

impl LambdaInvoker {
    /// Build an invoker sharing an existing connection pool.
    pub fn with_client(client: Client, endpoint: &str, function_name: &str) -> Self {
        Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            function_name: function_name.to_string(),
        }
    }

    fn invoke_url(&self) -> String {
        format!(
            "{}/{}/{}/invocations",
            self.endpoint, INVOKE_PATH_PREFIX, self.function_name
        )
    }
}

#[async_trait]
impl SearchFunction for LambdaInvoker {
    async fn invoke(&self, request: &SearchRequest) -> Result<Vec<u8>, FetchError> {
        let url = self.invoke_url();
        debug!(function = %self.function_name, index = %request.index, "Invoking search function");

        let response = self.client.post(&url).json(request).send().await?;

        let status = response.status();
        let function_error = response
            .headers()
            .get(FUNCTION_ERROR_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let payload = response.bytes().await?;

        let result = invocation_result(status, function_error, payload.to_vec());
        if let Err(FetchError::FunctionError { kind, .. }) = &result {
            warn!(function = %self.function_name, kind = %kind, "Search function reported an error");
        }
        result
    }
}

/// Map an invocation response to its payload. A non-success status is a
/// service error; a function error header means the handler itself failed,
/// even though the invoke call succeeded.
fn invocation_result(
    status: StatusCode,
    function_error: Option<String>,
    payload: Vec<u8>,
) -> Result<Vec<u8>, FetchError> {
    if !status.is_success() {
        return Err(FetchError::from_status(status, &String::from_utf8_lossy(&payload)));
    }

    if let Some(kind) = function_error {
        let message = serde_json::from_slice::<FunctionErrorBody>(&payload)
            .ok()
            .and_then(|b| b.error_message)
            .unwrap_or_else(|| FetchError::truncate_body(&String::from_utf8_lossy(&payload)));
        return Err(FetchError::FunctionError { kind, message });
    }

    Ok(payload)
}

/// Decode the search function's result envelope.
///
/// The invocation payload is a JSON string whose contents are themselves a
/// JSON document of the form `{"hits": {"hits": [{"_source": {...}}]}}`.
pub fn decode_search_envelope(payload: &[u8]) -> Result<Vec<SearchHit>, FetchError> {
    let inner: String = serde_json::from_slice(payload)
        .map_err(|e| FetchError::malformed("outer payload", e.to_string()))?;

    let document: Value = serde_json::from_str(&inner)
        .map_err(|e| FetchError::malformed("inner document", e.to_string()))?;

    let hits = document
        .get("hits")
        .and_then(|h| h.get("hits"))
        .cloned()
        .ok_or_else(|| FetchError::malformed("hits.hits", "path not present in search result"))?;

    serde_json::from_value(hits).map_err(|e| FetchError::malformed("hits.hits", e.to_string()))
}
