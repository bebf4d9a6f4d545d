use serde::{Serialize, Deserialize};
use std::path::PathBuf;

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Config {
    pub paths: PathsConfig,
    pub output: OutputConfig,
    pub http: HttpConfig,
    pub shodan: ShodanConfig,
    pub sucuri: SucuriConfig,
    pub zap: ZapConfig,
}

/// Input files shared by the whole pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathsConfig {
    pub targets_file: PathBuf,
    pub cover_image: PathBuf,
    /// Where temporary cover pages are written; the system temp dir when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scratch_dir: Option<PathBuf>,
}

/// Per-tool output directories plus the composite directory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    pub remote_lookup: PathBuf,
    pub site_reputation: PathBuf,
    pub active_scan: PathBuf,
    pub composite: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpConfig {
    pub user_agent: String,
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShodanConfig {
    pub base_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SucuriConfig {
    pub base_url: String,
    /// Shell command template; `{url}` and `{output}` are substituted (quoted)
    pub renderer_command: String,
    pub render_timeout_seconds: u64,
}

/// Scan engine process and control API settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZapConfig {
    pub executable: PathBuf,
    pub api_key: String,
    pub host: String,
    pub port: u16,
    /// When false the engine is expected to be running already
    pub manage_process: bool,
    pub warmup_seconds: u64,
    pub poll_interval_ms: u64,
    pub max_wait_seconds: u64,
    pub max_status_errors: u32,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            targets_file: PathBuf::from("domains_test.txt"),
            cover_image: PathBuf::from("first_page.jpg"),
            scratch_dir: None,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            remote_lookup: PathBuf::from("shodan_reports"),
            site_reputation: PathBuf::from("sucuri_reports"),
            active_scan: PathBuf::from("zap_reports"),
            composite: PathBuf::from("full_reports"),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: format!("dossier/{}", env!("CARGO_PKG_VERSION")),
            timeout_seconds: 60,
        }
    }
}

impl Default for ShodanConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.shodan.io/host".to_string(),
        }
    }
}

impl Default for SucuriConfig {
    fn default() -> Self {
        Self {
            base_url: "https://sitecheck.sucuri.net/results".to_string(),
            renderer_command:
                "chromium --headless --disable-gpu --no-sandbox --print-to-pdf={output} {url}".to_string(),
            render_timeout_seconds: 120,
        }
    }
}

impl Default for ZapConfig {
    fn default() -> Self {
        Self {
            executable: PathBuf::from("/opt/zaproxy/zap.sh"),
            api_key: "change-me".to_string(),
            host: "127.0.0.1".to_string(),
            port: 8080,
            manage_process: true,
            warmup_seconds: 10,
            poll_interval_ms: 2000,
            max_wait_seconds: 3600,
            max_status_errors: 5,
        }
    }
}

impl ZapConfig {
    /// Base URL of the engine's control API
    pub fn api_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}
