use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use reqwest::header::{HeaderValue, AUTHORIZATION};
use reqwest::Request;
use secrecy::{ExposeSecret, SecretString};

use crate::error::Result;

/// Signs requests with HTTP basic auth. Azure DevOps accepts a personal access
/// token as the password.
#[derive(Clone)]
pub struct BasicAuth {
    username: String,
    header: HeaderValue,
}

impl BasicAuth {
    pub fn new(username: &str, password: &SecretString) -> Result<Self> {
        let encoded = BASE64.encode(format!("{}:{}", username, password.expose_secret()));
        let mut header = HeaderValue::from_str(&format!("Basic {}", encoded))?;
        header.set_sensitive(true);

        Ok(Self {
            username: username.to_string(),
            header,
        })
    }

    /// Sets the `Authorization` header, replacing any existing value.
    pub fn authenticate(&self, request: &mut Request) {
        request.headers_mut().insert(AUTHORIZATION, self.header.clone());
    }
}

impl std::fmt::Debug for BasicAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BasicAuth")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}
