// src/utils/http.rs
use std::time::Duration;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::config::HttpConfig;
use crate::error::{DossierResult, DossierError};

/// HTTP client shared by the adapters
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    /// Create a new HTTP client
    pub fn new(user_agent: Option<String>, timeout_secs: Option<u64>) -> DossierResult<Self> {
        let user_agent = user_agent.unwrap_or_else(|| format!("dossier/{}", env!("CARGO_PKG_VERSION")));
        let timeout = Duration::from_secs(timeout_secs.unwrap_or(30));

        let client = Client::builder()
            .timeout(timeout)
            .user_agent(&user_agent)
            .build()
            .map_err(|e| DossierError::NetworkError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client })
    }

    pub fn from_config(config: &HttpConfig) -> DossierResult<Self> {
        Self::new(Some(config.user_agent.clone()), Some(config.timeout_seconds))
    }

    /// Make a GET request
    pub async fn get(&self, url: &str) -> DossierResult<Response> {
        debug!("GET {}", url);

        self.client
            .get(url)
            .send()
            .await
            .map_err(|e| DossierError::NetworkError(format!("Failed to GET {}: {}", url, e)))
    }

    /// GET a page and return its body; non-success statuses are errors
    pub async fn get_text(&self, url: &str) -> DossierResult<String> {
        let response = self.get(url).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(DossierError::NetworkError(format!("GET {} returned {}", url, status)));
        }

        response
            .text()
            .await
            .map_err(|e| DossierError::NetworkError(format!("Failed to read body of {}: {}", url, e)))
    }

    /// GET a JSON document
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> DossierResult<T> {
        let response = self.get(url).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(DossierError::NetworkError(format!("GET {} returned {}", url, status)));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| DossierError::SerializationError(format!("Invalid JSON from {}: {}", url, e)))
    }
}
