use std::sync::Arc;

use reqwest::Request;
use serde::de::DeserializeOwned;
use url::Url;

use crate::azure::auth::BasicAuth;
use crate::azure::rate_limiter::{RateLimiter, RateLimiterRegistry};
use crate::azure::request::{encode_path, ApiRequest, ApiResponse};
use crate::azure::transport::{default_transport, HttpTransport};
use crate::config::ConnectionConfig;
use crate::context::Context;
use crate::error::{DecodeError, Error, HttpError, Result};
use crate::models::{ListRepositoriesByProjectOrOrgArgs, ListRepositoriesResponse, RepositoryValue};

pub const API_VERSION: &str = "7.0";

/// Client for the Azure DevOps REST API.
pub struct AzureDevOpsClient {
    transport: Arc<dyn HttpTransport>,
    config: Arc<ConnectionConfig>,
    base_url: Url,
    rate_limiter: Arc<RateLimiter>,
    auth: BasicAuth,
}

impl AzureDevOpsClient {
    /// Builds a client for one code host connection. `urn` keys the shared rate
    /// limiter in `registry`. When `transport` is `None` the shared reqwest
    /// transport is used. No requests are made here.
    pub fn new(
        urn: &str,
        config: Arc<ConnectionConfig>,
        transport: Option<Arc<dyn HttpTransport>>,
        registry: &RateLimiterRegistry,
    ) -> Result<Self> {
        let base_url = Url::parse(&config.url)?;
        if base_url.cannot_be_a_base() {
            return Err(Error::Config(format!(
                "Azure DevOps URL cannot be used as a base: {}",
                config.url
            )));
        }

        let auth = BasicAuth::new(&config.username, &config.token)?;
        let transport = transport.unwrap_or_else(default_transport);
        tracing::debug!("Created Azure DevOps client {} for {}", urn, base_url);

        Ok(Self {
            transport,
            config,
            base_url,
            rate_limiter: registry.get(urn),
            auth,
        })
    }

    /// Lists the repositories of an organization (`org`) or a project
    /// (`org/project`), in the order Azure DevOps returns them.
    pub async fn list_repositories_by_project_or_org(
        &self,
        ctx: &Context,
        args: &ListRepositoriesByProjectOrOrgArgs,
    ) -> Result<Vec<RepositoryValue>> {
        let path = format!(
            "{}/_apis/git/repositories",
            encode_path(&args.project_or_org_name)
        );
        let request = ApiRequest::get(path).query("api-version", API_VERSION);

        tracing::info!("Listing repositories for: {}", args.project_or_org_name);
        let response: ApiResponse<ListRepositoriesResponse> = self.execute(ctx, request).await?;
        Ok(response.data.value)
    }

    /// Runs one request through the pipeline: resolve against the base URL,
    /// sign, wait for the rate limiter, send, then classify and decode.
    ///
    /// A status outside `[200, 400)` yields [`Error::Http`] with the raw body
    /// and no decoding. A body that is not valid JSON for `T` yields
    /// [`Error::Decode`], which still carries the response headers.
    pub async fn execute<T: DeserializeOwned>(
        &self,
        ctx: &Context,
        request: ApiRequest,
    ) -> Result<ApiResponse<T>> {
        let url = self.base_url.join(&request.reference())?;

        let mut http_request = Request::new(request.method, url.clone());
        *http_request.headers_mut() = request.headers;
        self.auth.authenticate(&mut http_request);

        self.rate_limiter.wait(ctx).await?;

        tracing::debug!("Fetching: {}", url);
        let response = ctx.run(self.transport.execute(http_request)).await??;

        if !is_success(response.status.as_u16()) {
            return Err(HttpError {
                status: response.status,
                url,
                body: response.body,
            }
            .into());
        }

        match serde_json::from_slice(&response.body) {
            Ok(data) => Ok(ApiResponse {
                status: response.status,
                headers: response.headers,
                data,
            }),
            Err(source) => Err(DecodeError {
                status: response.status,
                headers: response.headers,
                source,
            }
            .into()),
        }
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn rate_limiter(&self) -> &Arc<RateLimiter> {
        &self.rate_limiter
    }
}

fn is_success(status: u16) -> bool {
    (200..400).contains(&status)
}
