//! Error types for feed operations.

use thiserror::Error;

/// Errors that can occur while querying a token or value source.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Unexpected HTTP status: {0}")]
    HttpStatus(u16),

    #[error("Failed to parse response: {0}")]
    ParseError(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("No pair found for token: {0}")]
    NotFound(String),

    #[error("Value missing or not positive for token: {0}")]
    MissingValue(String),

    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },
}

impl From<reqwest::Error> for FeedError {
    fn from(err: reqwest::Error) -> Self {
        // Request URLs can carry credentials in the query string.
        let err = err.without_url();
        if err.is_timeout() {
            FeedError::Timeout(err.to_string())
        } else if let Some(status) = err.status() {
            FeedError::from_status(status.as_u16())
        } else if err.is_decode() {
            FeedError::ParseError(err.to_string())
        } else {
            FeedError::RequestFailed(err.to_string())
        }
    }
}

impl From<serde_json::Error> for FeedError {
    fn from(err: serde_json::Error) -> Self {
        FeedError::ParseError(err.to_string())
    }
}

impl FeedError {
    /// Map a non-success HTTP status to an error.
    pub fn from_status(status: u16) -> Self {
        match status {
            429 => FeedError::RateLimitExceeded,
            408 | 504 => FeedError::Timeout(format!("HTTP {}", status)),
            other => FeedError::HttpStatus(other),
        }
    }

    /// Returns true if this error is transient and likely to succeed next cycle.
    pub fn is_transient(&self) -> bool {
        match self {
            FeedError::RequestFailed(_) | FeedError::Timeout(_) | FeedError::RateLimitExceeded => {
                true
            }
            FeedError::HttpStatus(status) => *status >= 500,
            FeedError::ParseError(_)
            | FeedError::NotFound(_)
            | FeedError::MissingValue(_)
            | FeedError::Rpc { .. } => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_status() {
        assert!(matches!(FeedError::from_status(429), FeedError::RateLimitExceeded));
        assert!(matches!(FeedError::from_status(504), FeedError::Timeout(_)));
        assert!(matches!(FeedError::from_status(404), FeedError::HttpStatus(404)));
    }

    #[test]
    fn test_is_transient() {
        assert!(FeedError::RateLimitExceeded.is_transient());
        assert!(FeedError::HttpStatus(503).is_transient());
        assert!(!FeedError::HttpStatus(401).is_transient());
        assert!(!FeedError::NotFound("mint".into()).is_transient());
    }

    #[test]
    fn test_from_serde_error() {
        let err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        assert!(matches!(FeedError::from(err), FeedError::ParseError(_)));
    }
}
