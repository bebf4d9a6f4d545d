// src/plugins/zap.rs
use std::path::PathBuf;
use async_trait::async_trait;
use tokio::fs;
use tracing::info;

use crate::config::ZapConfig;
use crate::core::{OutputLayout, Target, Tool, ToolAdapter};
use crate::error::{DossierResult, DossierError};
use crate::scanner::{EngineProcess, PollPolicy, ScanEngine, ScanSession};

/// Active-scan adapter. Owns the engine process for the whole batch and
/// runs one scan session per target.
pub struct ZapAdapter {
    config: ZapConfig,
    engine: Box<dyn ScanEngine>,
    process: Option<EngineProcess>,
    policy: PollPolicy,
    output_dir: PathBuf,
}

impl ZapAdapter {
    pub fn new(config: ZapConfig, engine: Box<dyn ScanEngine>, layout: &OutputLayout) -> Self {
        Self {
            policy: PollPolicy::from_config(&config),
            output_dir: layout.dir(Tool::ActiveScan).clone(),
            config,
            engine,
            process: None,
        }
    }

    pub fn with_policy(mut self, policy: PollPolicy) -> Self {
        self.policy = policy;
        self
    }
}

#[async_trait]
impl ToolAdapter for ZapAdapter {
    fn tool(&self) -> Tool {
        Tool::ActiveScan
    }

    async fn setup(&mut self) -> DossierResult<()> {
        fs::create_dir_all(&self.output_dir)
            .await
            .map_err(|e| DossierError::file(&self.output_dir, e))?;

        if self.config.manage_process {
            self.process = Some(EngineProcess::start(&self.config).await?);
        } else {
            info!("Using running scan engine at {}", self.config.api_url());
        }

        Ok(())
    }

    async fn run_target(&mut self, target: &Target) -> DossierResult<PathBuf> {
        let mut session = ScanSession::new(self.engine.as_ref(), target.clone(), &self.output_dir, self.policy.clone());
        session.run().await
    }

    async fn cleanup(&mut self) -> DossierResult<()> {
        match self.process.take() {
            Some(mut process) => process.stop().await,
            None => Ok(()),
        }
    }
}
