// src/scanner/client.rs
use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;
use url::Url;

use crate::config::{HttpConfig, ZapConfig};
use crate::error::{DossierResult, DossierError};
use crate::utils::HttpClient;

/// Control API of the active-scan engine
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ScanEngine: Send + Sync {
    /// Start a fresh named session, replacing one with the same name when `overwrite`
    async fn create_session(&self, name: &str, overwrite: bool) -> DossierResult<()>;

    /// Start spidering `url`; returns the scan id
    async fn submit_discovery_scan(&self, url: &str) -> DossierResult<u32>;

    async fn discovery_status(&self, scan_id: u32) -> DossierResult<u8>;

    /// Start the active scan of `url`; returns the scan id
    async fn submit_active_scan(&self, url: &str) -> DossierResult<u32>;

    async fn active_scan_status(&self, scan_id: u32) -> DossierResult<u8>;

    /// Rendered HTML report of everything the engine knows
    async fn retrieve_html_report(&self) -> DossierResult<String>;
}

#[derive(Debug, Deserialize)]
struct ScanResponse {
    scan: String,
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    status: String,
}

/// `ScanEngine` over the ZAP JSON API
pub struct ZapClient {
    http: HttpClient,
    base_url: Url,
    api_key: String,
}

impl ZapClient {
    pub fn new(http: HttpClient, api_url: &str, api_key: impl Into<String>) -> DossierResult<Self> {
        let base_url = Url::parse(api_url)
            .map_err(|e| DossierError::ConfigError(format!("Invalid scan engine URL {}: {}", api_url, e)))?;

        Ok(Self {
            http,
            base_url,
            api_key: api_key.into(),
        })
    }

    pub fn from_config(zap: &ZapConfig, http: &HttpConfig) -> DossierResult<Self> {
        Self::new(HttpClient::from_config(http)?, &zap.api_url(), zap.api_key.clone())
    }

    /// Build `{base}/{path}` with the API key and `params` in the query string
    fn endpoint(&self, path: &str, params: &[(&str, &str)]) -> DossierResult<Url> {
        let mut url = self
            .base_url
            .join(path)
            .map_err(|e| DossierError::ConfigError(format!("Invalid API path {}: {}", path, e)))?;

        url.query_pairs_mut()
            .append_pair("apikey", &self.api_key)
            .extend_pairs(params.iter().copied());

        Ok(url)
    }

    async fn call<T: serde::de::DeserializeOwned>(&self, stage: &str, path: &str, params: &[(&str, &str)]) -> DossierResult<T> {
        let url = self.endpoint(path, params)?;
        debug!("Scan engine call: {}", stage);

        self.http
            .get_json::<T>(url.as_str())
            .await
            .map_err(|e| unavailable(stage, e))
    }
}

fn unavailable(stage: &str, error: DossierError) -> DossierError {
    DossierError::EngineUnavailable {
        stage: stage.to_string(),
        message: error.to_string(),
    }
}

fn parse_scan_id(stage: &str, response: ScanResponse) -> DossierResult<u32> {
    response.scan.trim().parse().map_err(|_| DossierError::EngineUnavailable {
        stage: stage.to_string(),
        message: format!("unexpected scan id {:?}", response.scan),
    })
}

/// Percent complete, capped at 100
fn parse_progress(stage: &str, response: StatusResponse) -> DossierResult<u8> {
    let progress: u32 = response.status.trim().parse().map_err(|_| DossierError::EngineUnavailable {
        stage: stage.to_string(),
        message: format!("unexpected status {:?}", response.status),
    })?;

    Ok(progress.min(100) as u8)
}

#[async_trait]
impl ScanEngine for ZapClient {
    async fn create_session(&self, name: &str, overwrite: bool) -> DossierResult<()> {
        let overwrite = overwrite.to_string();
        let _: serde_json::Value = self
            .call("new session", "JSON/core/action/newSession/", &[("name", name), ("overwrite", &overwrite)])
            .await?;
        Ok(())
    }

    async fn submit_discovery_scan(&self, url: &str) -> DossierResult<u32> {
        let response = self.call("spider submit", "JSON/spider/action/scan/", &[("url", url)]).await?;
        parse_scan_id("spider submit", response)
    }

    async fn discovery_status(&self, scan_id: u32) -> DossierResult<u8> {
        let scan_id = scan_id.to_string();
        let response = self.call("spider status", "JSON/spider/view/status/", &[("scanId", &scan_id)]).await?;
        parse_progress("spider status", response)
    }

    async fn submit_active_scan(&self, url: &str) -> DossierResult<u32> {
        let response = self.call("active scan submit", "JSON/ascan/action/scan/", &[("url", url)]).await?;
        parse_scan_id("active scan submit", response)
    }

    async fn active_scan_status(&self, scan_id: u32) -> DossierResult<u8> {
        let scan_id = scan_id.to_string();
        let response = self.call("active scan status", "JSON/ascan/view/status/", &[("scanId", &scan_id)]).await?;
        parse_progress("active scan status", response)
    }

    async fn retrieve_html_report(&self) -> DossierResult<String> {
        let url = self.endpoint("OTHER/core/other/htmlreport/", &[])?;

        self.http
            .get_text(url.as_str())
            .await
            .map_err(|e| DossierError::RetrievalFailure(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> ZapClient {
        let http = HttpClient::new(None, Some(1)).unwrap();
        ZapClient::new(http, "http://127.0.0.1:8080", "secret key").unwrap()
    }

    #[test]
    fn test_endpoint_carries_api_key_and_params() {
        let url = client()
            .endpoint("JSON/spider/action/scan/", &[("url", "http://example.com")])
            .unwrap();

        assert_eq!(
            url.as_str(),
            "http://127.0.0.1:8080/JSON/spider/action/scan/?apikey=secret+key&url=http%3A%2F%2Fexample.com"
        );
    }

    #[test]
    fn test_status_parsing_caps_progress() {
        let parse = |s: &str| parse_progress("status", StatusResponse { status: s.to_string() });

        assert_eq!(parse("42").unwrap(), 42);
        assert_eq!(parse(" 100 ").unwrap(), 100);
        assert_eq!(parse("250").unwrap(), 100);
        assert!(matches!(parse("does_not_exist"), Err(DossierError::EngineUnavailable { .. })));
    }

    #[test]
    fn test_invalid_engine_url_is_a_config_error() {
        let http = HttpClient::new(None, Some(1)).unwrap();
        assert!(matches!(
            ZapClient::new(http, "not a url", "key"),
            Err(DossierError::ConfigError(_))
        ));
    }

    #[tokio::test]
    async fn test_unreachable_engine_is_unavailable() {
        let http = HttpClient::new(None, Some(1)).unwrap();
        // Port 9 (discard) is closed on test machines
        let client = ZapClient::new(http, "http://127.0.0.1:9", "key").unwrap();

        let result = client.create_session("session_x", true).await;
        assert!(matches!(result, Err(DossierError::EngineUnavailable { .. })));
    }
}
