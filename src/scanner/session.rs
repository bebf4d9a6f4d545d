// src/scanner/session.rs
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio::fs;
use tracing::{debug, info, warn};

use crate::config::ZapConfig;
use crate::core::Target;
use crate::error::{DossierResult, DossierError};
use crate::reporting::convert_report;
use super::client::ScanEngine;

/// Progress of one target through the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SessionState {
    NotStarted,
    SessionCreated,
    SpiderRunning,
    SpiderDone,
    ActiveScanRunning,
    ActiveScanDone,
    RawReportRetrieved,
    Converted,
    Terminal,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::NotStarted => "session setup",
            SessionState::SessionCreated => "spider submit",
            SessionState::SpiderRunning => "spider",
            SessionState::SpiderDone => "active scan submit",
            SessionState::ActiveScanRunning => "active scan",
            SessionState::ActiveScanDone => "report retrieval",
            SessionState::RawReportRetrieved => "report conversion",
            SessionState::Converted | SessionState::Terminal => "done",
        };
        f.write_str(name)
    }
}

/// How long and how often to wait on the engine's background jobs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_wait: Duration,
    /// Consecutive failed status calls tolerated before giving up
    pub max_status_errors: u32,
}

impl PollPolicy {
    pub fn from_config(config: &ZapConfig) -> Self {
        Self {
            interval: Duration::from_millis(config.poll_interval_ms),
            max_wait: Duration::from_secs(config.max_wait_seconds),
            max_status_errors: config.max_status_errors,
        }
    }
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self::from_config(&ZapConfig::default())
    }
}

#[derive(Debug, Clone, Copy)]
enum Job {
    Discovery,
    Active,
}

/// Drives one target from a fresh engine session to the final PDF
pub struct ScanSession<'a> {
    engine: &'a dyn ScanEngine,
    target: Target,
    name: String,
    policy: PollPolicy,
    state: SessionState,
    spider_progress: u8,
    active_progress: u8,
    raw_path: PathBuf,
    final_path: PathBuf,
}

impl<'a> ScanSession<'a> {
    pub fn new(engine: &'a dyn ScanEngine, target: Target, output_dir: &Path, policy: PollPolicy) -> Self {
        let stem = target.sanitized_stem();

        Self {
            engine,
            name: format!("session_{}_{}", target.address, target.name),
            raw_path: output_dir.join(format!("raw_{}.html", stem)),
            final_path: output_dir.join(format!("{}.pdf", stem)),
            target,
            policy,
            state: SessionState::NotStarted,
            spider_progress: 0,
            active_progress: 0,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn raw_path(&self) -> &Path {
        &self.raw_path
    }

    pub fn final_path(&self) -> &Path {
        &self.final_path
    }

    /// Spider and active-scan progress as last reported
    pub fn progress(&self) -> (u8, u8) {
        (self.spider_progress, self.active_progress)
    }

    fn advance(&mut self, state: SessionState) {
        debug!("{} [{}]: {:?} -> {:?}", self.name, self.target, self.state, state);
        self.state = state;
    }

    /// Run every stage in order and return the final report path.
    ///
    /// On error the session stays in the state that failed.
    pub async fn run(&mut self) -> DossierResult<PathBuf> {
        let url = self.target.url();
        info!("Starting scan session {} for {}", self.name, url);

        self.engine.create_session(&self.name, true).await?;
        self.advance(SessionState::SessionCreated);

        let spider_id = self.engine.submit_discovery_scan(&url).await?;
        self.advance(SessionState::SpiderRunning);
        self.wait_for(Job::Discovery, spider_id).await?;
        self.advance(SessionState::SpiderDone);

        let scan_id = self.engine.submit_active_scan(&url).await?;
        self.advance(SessionState::ActiveScanRunning);
        self.wait_for(Job::Active, scan_id).await?;
        self.advance(SessionState::ActiveScanDone);

        self.retrieve_raw_report().await?;
        self.advance(SessionState::RawReportRetrieved);

        convert_report(&self.raw_path, &self.final_path, &self.target).await?;
        self.advance(SessionState::Converted);

        self.advance(SessionState::Terminal);
        Ok(self.final_path.clone())
    }

    async fn status(&self, job: Job, scan_id: u32) -> DossierResult<u8> {
        match job {
            Job::Discovery => self.engine.discovery_status(scan_id).await,
            Job::Active => self.engine.active_scan_status(scan_id).await,
        }
    }

    fn record(&mut self, job: Job, progress: u8) {
        match job {
            Job::Discovery => self.spider_progress = progress,
            Job::Active => self.active_progress = progress,
        }
    }

    /// Poll at a fixed interval until the job reports 100%
    async fn wait_for(&mut self, job: Job, scan_id: u32) -> DossierResult<()> {
        let started = Instant::now();
        let max_errors = self.policy.max_status_errors.max(1);
        let mut errors = 0;

        loop {
            match self.status(job, scan_id).await {
                Ok(progress) => {
                    errors = 0;
                    let progress = progress.min(100);
                    self.record(job, progress);
                    debug!("{} {}: {}%", self.name, self.state, progress);

                    if progress == 100 {
                        return Ok(());
                    }
                }
                Err(e) => {
                    errors += 1;
                    warn!("{} {} status failed ({}/{}): {}", self.name, self.state, errors, max_errors, e);

                    if errors >= max_errors {
                        return Err(DossierError::EngineUnavailable {
                            stage: self.state.to_string(),
                            message: e.to_string(),
                        });
                    }
                }
            }

            if started.elapsed() >= self.policy.max_wait {
                return Err(DossierError::ScanTimeout {
                    stage: self.state.to_string(),
                    seconds: self.policy.max_wait.as_secs(),
                });
            }

            tokio::time::sleep(self.policy.interval).await;
        }
    }

    async fn retrieve_raw_report(&self) -> DossierResult<()> {
        let html = self.engine.retrieve_html_report().await?;
        if html.trim().is_empty() {
            return Err(DossierError::RetrievalFailure(format!(
                "scan engine returned an empty report for {}",
                self.target
            )));
        }

        if let Some(parent) = self.raw_path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| DossierError::file(parent, e))?;
        }
        fs::write(&self.raw_path, html)
            .await
            .map_err(|e| DossierError::file(&self.raw_path, e))?;

        info!("Raw report saved: {}", self.raw_path.display());
        Ok(())
    }
}
