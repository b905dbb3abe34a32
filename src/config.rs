use crate::error::{Error, Result};
use secrecy::SecretString;
use std::env;

pub const DEFAULT_URL: &str = "https://dev.azure.com";

/// Slowest accepted self-imposed rate: one request per hour.
pub const MIN_REQUESTS_PER_SECOND: f64 = 1.0 / 3600.0;

#[derive(Debug)]
pub struct Config {
    pub connection: ConnectionConfig,
    pub requests_per_second: f64,
    pub burst: u32,
    pub timeout_secs: u64,
}

/// One Azure DevOps code host connection.
#[derive(Debug)]
pub struct ConnectionConfig {
    pub url: String,
    pub username: String,
    pub token: SecretString,
    /// Projects in `org/project` form.
    pub projects: Vec<String>,
    pub orgs: Vec<String>,
}

impl ConnectionConfig {
    /// Every configured scope: organizations first, then projects.
    pub fn scopes(&self) -> impl Iterator<Item = &str> {
        self.orgs
            .iter()
            .chain(self.projects.iter())
            .map(String::as_str)
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let url = lookup("AZURE_DEVOPS_URL").unwrap_or_else(|| DEFAULT_URL.to_string());

        let username = lookup("AZURE_DEVOPS_USERNAME").ok_or_else(|| {
            Error::Config("AZURE_DEVOPS_USERNAME environment variable not set".to_string())
        })?;

        let token = lookup("AZURE_DEVOPS_TOKEN").ok_or_else(|| {
            Error::Config("AZURE_DEVOPS_TOKEN environment variable not set".to_string())
        })?;

        let projects = lookup("AZURE_DEVOPS_PROJECTS")
            .map(|v| split_list(&v))
            .unwrap_or_default();

        let orgs = lookup("AZURE_DEVOPS_ORGS")
            .map(|v| split_list(&v))
            .unwrap_or_default();

        let requests_per_second: f64 = parse_var(&lookup, "AZURE_DEVOPS_REQUESTS_PER_SECOND")?
            .unwrap_or(RateLimitConfig::default().requests_per_second);
        if !requests_per_second.is_finite()
            || requests_per_second < 0.0
            || (requests_per_second > 0.0 && requests_per_second < MIN_REQUESTS_PER_SECOND)
        {
            return Err(Error::Config(format!(
                "AZURE_DEVOPS_REQUESTS_PER_SECOND must be 0 (unlimited) or at least {}: {}",
                MIN_REQUESTS_PER_SECOND, requests_per_second
            )));
        }

        let burst: u32 = parse_var(&lookup, "AZURE_DEVOPS_BURST")?
            .unwrap_or(RateLimitConfig::default().burst);

        let timeout_secs: u64 = parse_var(&lookup, "AZURE_DEVOPS_TIMEOUT_SECS")?.unwrap_or(30);

        Ok(Self {
            connection: ConnectionConfig {
                url,
                username,
                token: SecretString::from(token),
                projects,
                orgs,
            },
            requests_per_second,
            burst,
            timeout_secs,
        })
    }
}

fn parse_var<F, T>(lookup: &F, key: &str) -> Result<Option<T>>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        Some(v) => v
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| Error::Config(format!("{} is not a valid number: {}", key, v))),
        None => Ok(None),
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateLimitConfig {
    /// `0` disables limiting.
    pub requests_per_second: f64,
    pub burst: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_second: 10.0,
            burst: 10,
        }
    }
}

impl From<&Config> for RateLimitConfig {
    fn from(config: &Config) -> Self {
        Self {
            requests_per_second: config.requests_per_second,
            burst: config.burst,
        }
    }
}
