// src/scanner/process.rs
use std::process::Stdio;
use std::time::Duration;
use tokio::process::{Child, Command};
use tracing::{info, warn};

use crate::config::ZapConfig;
use crate::error::{DossierResult, DossierError};

/// Handle on the scan engine daemon for the length of one batch.
///
/// `stop` terminates the process at most once; dropping an unstopped handle
/// still kills the child.
#[derive(Debug)]
pub struct EngineProcess {
    child: Option<Child>,
}

impl EngineProcess {
    /// Spawn the engine and wait out its warm-up interval
    pub async fn start(config: &ZapConfig) -> DossierResult<Self> {
        info!("Starting scan engine: {}", config.executable.display());

        let child = Command::new(&config.executable)
            .arg("-daemon")
            .arg("-host")
            .arg(&config.host)
            .arg("-port")
            .arg(config.port.to_string())
            .arg("-config")
            .arg(format!("api.key={}", config.api_key))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| DossierError::EngineUnavailable {
                stage: "startup".to_string(),
                message: format!("Failed to launch {}: {}", config.executable.display(), e),
            })?;

        if config.warmup_seconds > 0 {
            info!("Waiting {} seconds for the scan engine to come up", config.warmup_seconds);
            tokio::time::sleep(Duration::from_secs(config.warmup_seconds)).await;
        }

        Ok(Self { child: Some(child) })
    }

    pub fn is_running(&self) -> bool {
        self.child.is_some()
    }

    /// Kill the engine and wait for it to exit; later calls do nothing
    pub async fn stop(&mut self) -> DossierResult<()> {
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };

        info!("Stopping scan engine");
        if let Err(e) = child.kill().await {
            warn!("Failed to kill scan engine: {}", e);
            return Err(DossierError::ExternalToolError {
                tool: "zap".to_string(),
                message: format!("Failed to stop scan engine: {}", e),
            });
        }

        Ok(())
    }
}
