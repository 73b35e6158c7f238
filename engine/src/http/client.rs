//! HTTP client implementation

use std::time::Duration;

use reqwest::{header, Client};
use serde::de::DeserializeOwned;
use tracing::{debug, error};

use crate::errors::EngineError;

const USER_AGENT: &str = concat!("shipyard/", env!("CARGO_PKG_VERSION"));

/// HTTP client for source provider APIs
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    /// Create a new HTTP client
    pub fn new(timeout: Duration) -> Result<Self, EngineError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self { client })
    }

    /// POST without a body, authenticated with a bearer token
    ///
    /// Non-success responses become [`EngineError::AuthError`]; the bearer
    /// token never appears in the message.
    pub async fn post_empty<T: DeserializeOwned>(
        &self,
        url: &str,
        bearer: &str,
        accept: &str,
    ) -> Result<T, EngineError> {
        debug!("POST {}", url);

        let response = self
            .client
            .post(url)
            .header(header::AUTHORIZATION, format!("Bearer {}", bearer))
            .header(header::ACCEPT, accept)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!("HTTP POST failed: {} - {}", status, body);
            return Err(EngineError::AuthError(format!("{}: {}", status, body)));
        }

        let body = response.json().await?;
        Ok(body)
    }
}
