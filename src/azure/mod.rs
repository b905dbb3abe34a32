pub mod auth;
pub mod client;
pub mod rate_limiter;
pub mod request;
pub mod transport;

pub use auth::BasicAuth;
pub use client::{AzureDevOpsClient, API_VERSION};
pub use rate_limiter::{RateLimiter, RateLimiterRegistry};
pub use request::{ApiRequest, ApiResponse};
pub use transport::{default_transport, HttpTransport, RawResponse, ReqwestTransport, TransportError};
