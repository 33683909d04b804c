use thiserror::Error;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Rate limited by the content service")]
    RateLimited,

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("Search function failed ({kind}): {message}")]
    FunctionError { kind: String, message: String },

    #[error("Malformed response ({stage}): {detail}")]
    MalformedResponse { stage: &'static str, detail: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl FetchError {
    /// Truncate a response body to avoid logging excessive data
    pub(crate) fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let mut end = MAX_ERROR_BODY_LENGTH;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
        }
    }

    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let truncated = Self::truncate_body(body);
        match status.as_u16() {
            401 | 403 => FetchError::AccessDenied(truncated),
            404 => FetchError::NotFound(truncated),
            429 => FetchError::RateLimited,
            500..=599 => FetchError::ServerError(truncated),
            _ => FetchError::InvalidResponse(format!("Status {}: {}", status, truncated)),
        }
    }

    pub(crate) fn malformed(stage: &'static str, detail: impl Into<String>) -> Self {
        FetchError::MalformedResponse {
            stage,
            detail: detail.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn test_from_status_mapping() {
        assert!(matches!(
            FetchError::from_status(StatusCode::FORBIDDEN, "nope"),
            FetchError::AccessDenied(_)
        ));
        assert!(matches!(
            FetchError::from_status(StatusCode::NOT_FOUND, ""),
            FetchError::NotFound(_)
        ));
        assert!(matches!(
            FetchError::from_status(StatusCode::TOO_MANY_REQUESTS, ""),
            FetchError::RateLimited
        ));
        assert!(matches!(
            FetchError::from_status(StatusCode::BAD_GATEWAY, "upstream"),
            FetchError::ServerError(_)
        ));
        assert!(matches!(
            FetchError::from_status(StatusCode::BAD_REQUEST, "bad"),
            FetchError::InvalidResponse(_)
        ));
    }

    #[test]
    fn test_truncate_body() {
        let short = "short body";
        assert_eq!(FetchError::truncate_body(short), short);

        let long = "x".repeat(MAX_ERROR_BODY_LENGTH + 20);
        let truncated = FetchError::truncate_body(&long);
        assert!(truncated.starts_with(&"x".repeat(MAX_ERROR_BODY_LENGTH)));
        assert!(truncated.contains("520 total bytes"));
    }
}
