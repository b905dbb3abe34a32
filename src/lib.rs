pub mod azure;
pub mod config;
pub mod context;
pub mod error;
pub mod models;

pub use azure::{AzureDevOpsClient, RateLimiter, RateLimiterRegistry};
pub use config::{Config, ConnectionConfig, RateLimitConfig};
pub use context::Context;
pub use error::{Error, Result};
