//! # API Errors
//!
//! Classification of Cloudflare API failures.

use thiserror::Error;

/// Classified failure of a Cloudflare API call
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// The remote object does not exist
    #[error("remote object not found")]
    NotFound,
    /// The request was rejected; retrying the same request cannot succeed
    #[error("rejected by Cloudflare: {}", .0.join("; "))]
    Validation(Vec<String>),
    /// Network failure, rate limiting or a server-side error
    #[error("transient Cloudflare API failure: {0}")]
    Transient(String),
}

impl ApiError {
    /// Classify a non-success HTTP response
    ///
    /// 404 is `NotFound`; 408, 429 and 5xx are `Transient`; every other status
    /// is `Validation` carrying the API's error messages.
    pub fn from_status(status: u16, messages: Vec<String>) -> Self {
        match status {
            404 => ApiError::NotFound,
            408 | 429 | 500..=599 => {
                let detail = if messages.is_empty() {
                    format!("HTTP {status}")
                } else {
                    format!("HTTP {status}: {}", messages.join("; "))
                };
                ApiError::Transient(detail)
            }
            _ => {
                if messages.is_empty() {
                    ApiError::Validation(vec![format!("HTTP {status}")])
                } else {
                    ApiError::Validation(messages)
                }
            }
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::NotFound)
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(error: reqwest::Error) -> Self {
        match error.status() {
            Some(status) => ApiError::from_status(status.as_u16(), vec![error.to_string()]),
            None => ApiError::Transient(error.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_404_is_not_found() {
        assert_eq!(ApiError::from_status(404, vec![]), ApiError::NotFound);
    }

    #[test]
    fn test_rate_limit_and_server_errors_are_transient() {
        for status in [408, 429, 500, 502, 503] {
            assert!(
                matches!(ApiError::from_status(status, vec![]), ApiError::Transient(_)),
                "status {status} should be transient"
            );
        }
    }

    #[test]
    fn test_client_errors_keep_messages() {
        let err = ApiError::from_status(400, vec!["domain is invalid".to_string()]);
        assert_eq!(err, ApiError::Validation(vec!["domain is invalid".to_string()]));
        assert_eq!(err.to_string(), "rejected by Cloudflare: domain is invalid");
    }

    #[test]
    fn test_client_error_without_messages_names_status() {
        assert_eq!(
            ApiError::from_status(403, vec![]),
            ApiError::Validation(vec!["HTTP 403".to_string()])
        );
    }
}
