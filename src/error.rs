use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use thiserror::Error;
use url::Url;

use crate::azure::transport::TransportError;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Request cancelled")]
    Cancelled,

    #[error("Request deadline exceeded")]
    DeadlineExceeded,

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Http(#[from] HttpError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("Invalid header value: {0}")]
    InvalidHeader(#[from] reqwest::header::InvalidHeaderValue),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Whether a caller could reasonably try the same request again.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Transport(_) => true,
            Error::Http(err) => {
                err.status == StatusCode::TOO_MANY_REQUESTS || err.status.is_server_error()
            }
            _ => false,
        }
    }
}

/// A response from Azure DevOps whose status code was outside `[200, 400)`.
#[derive(Error, Debug, Clone)]
#[error(
    "Azure DevOps API HTTP error: code={} url={:?} body={:?}",
    .status.as_u16(),
    .url.as_str(),
    String::from_utf8_lossy(.body)
)]
pub struct HttpError {
    pub status: StatusCode,
    /// The request URL after resolution against the client's base URL.
    pub url: Url,
    pub body: Vec<u8>,
}

impl HttpError {
    pub fn is_not_found(&self) -> bool {
        self.status == StatusCode::NOT_FOUND
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status == StatusCode::UNAUTHORIZED || self.status == StatusCode::FORBIDDEN
    }
}

/// The response body was not the JSON shape the caller asked for.
///
/// Status and headers are kept so callers can still inspect them. The raw body
/// is not retained.
#[derive(Error, Debug)]
#[error("Failed to decode response (status {}): {source}", .status.as_u16())]
pub struct DecodeError {
    pub status: StatusCode,
    pub headers: HeaderMap,
    #[source]
    pub source: serde_json::Error,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn http_error(status: u16, body: &str) -> HttpError {
        HttpError {
            status: StatusCode::from_u16(status).unwrap(),
            url: Url::parse("https://dev.azure.com/org/_apis/git/repositories?api-version=7.0")
                .unwrap(),
            body: body.as_bytes().to_vec(),
        }
    }

    #[test]
    fn test_http_error_display_includes_code_url_and_body() {
        let err = http_error(404, "not found");
        assert_eq!(
            err.to_string(),
            "Azure DevOps API HTTP error: code=404 \
             url=\"https://dev.azure.com/org/_apis/git/repositories?api-version=7.0\" \
             body=\"not found\""
        );
    }

    #[test]
    fn test_http_error_classification() {
        assert!(http_error(404, "").is_not_found());
        assert!(http_error(401, "").is_unauthorized());
        assert!(http_error(403, "").is_unauthorized());
        assert!(!http_error(500, "").is_not_found());
    }

    #[test]
    fn test_is_retryable() {
        assert!(Error::Http(http_error(503, "")).is_retryable());
        assert!(Error::Http(http_error(429, "")).is_retryable());
        assert!(!Error::Http(http_error(404, "")).is_retryable());
        assert!(Error::Transport(TransportError::Other("reset".to_string())).is_retryable());
        assert!(!Error::Cancelled.is_retryable());
    }

    #[test]
    fn test_decode_error_display() {
        let source = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err = DecodeError {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            source,
        };
        assert!(err.to_string().starts_with("Failed to decode response (status 200)"));
    }
}
