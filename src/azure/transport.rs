use std::sync::{Arc, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::{Client, Request, StatusCode};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error(transparent)]
    Reqwest(#[from] reqwest::Error),

    #[error("{0}")]
    Other(String),
}

/// A response whose body has already been read in full.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

/// Executes prepared requests. Implementations read the whole body before
/// returning so the underlying connection can be released.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn execute(&self, request: Request) -> Result<RawResponse, TransportError>;
}

#[derive(Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("azdevops/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn execute(&self, request: Request) -> Result<RawResponse, TransportError> {
        let response = self.client.execute(request).await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?.to_vec();

        Ok(RawResponse {
            status,
            headers,
            body,
        })
    }
}

/// The transport used by clients that are not given one explicitly.
pub fn default_transport() -> Arc<dyn HttpTransport> {
    static SHARED: OnceLock<Arc<ReqwestTransport>> = OnceLock::new();
    let shared = SHARED.get_or_init(|| Arc::new(ReqwestTransport::new(Client::new())));
    shared.clone()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_transport_is_shared() {
        let a = default_transport();
        let b = default_transport();
        assert!(std::ptr::addr_eq(Arc::as_ptr(&a), Arc::as_ptr(&b)));
    }

    #[test]
    fn test_with_timeout_builds_client() {
        assert!(ReqwestTransport::with_timeout(Duration::from_secs(1)).is_ok());
    }
}
