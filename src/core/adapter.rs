// src/core/adapter.rs
use std::path::PathBuf;
use std::time::{Duration, Instant};
use async_trait::async_trait;
use tracing::{info, warn, error};

use crate::error::DossierResult;
use super::target::Target;
use super::tool::Tool;

/// A scanning tool wrapped for batch execution.
///
/// `run_adapter` calls `setup` once, `run_target` for every target in order,
/// then `cleanup` exactly once, whatever happened in between.
#[async_trait]
pub trait ToolAdapter: Send {
    fn tool(&self) -> Tool;

    /// Acquire batch-wide resources (output directory, engine process, ...)
    async fn setup(&mut self) -> DossierResult<()> {
        Ok(())
    }

    /// Produce this tool's artifact for one target and return its path
    async fn run_target(&mut self, target: &Target) -> DossierResult<PathBuf>;

    /// Release whatever `setup` acquired
    async fn cleanup(&mut self) -> DossierResult<()> {
        Ok(())
    }
}

/// Outcome of one adapter over a whole batch
#[derive(Debug)]
pub struct AdapterReport {
    pub tool: Tool,
    pub produced: Vec<(Target, PathBuf)>,
    pub failed: Vec<(Target, String)>,
    pub execution_time: Duration,
}

impl AdapterReport {
    fn new(tool: Tool) -> Self {
        Self {
            tool,
            produced: Vec::new(),
            failed: Vec::new(),
            execution_time: Duration::ZERO,
        }
    }
}

/// Run `adapter` over `targets` sequentially.
///
/// Per-target failures are logged and recorded, never propagated. A setup
/// failure marks every target failed. Cleanup runs on every path.
pub async fn run_adapter(adapter: &mut dyn ToolAdapter, targets: &[Target]) -> AdapterReport {
    let tool = adapter.tool();
    let start_time = Instant::now();
    let mut report = AdapterReport::new(tool);

    info!("Running {} on {} targets", tool, targets.len());

    match adapter.setup().await {
        Ok(()) => {
            for target in targets {
                info!("[{}] Processing {}", tool, target);

                match adapter.run_target(target).await {
                    Ok(path) => {
                        info!("[{}] {}: report saved to {}", tool, target, path.display());
                        report.produced.push((target.clone(), path));
                    }
                    Err(e) => {
                        error!("[{}] {}: {}", tool, target, e);
                        report.failed.push((target.clone(), e.to_string()));
                    }
                }
            }
        }
        Err(e) => {
            error!("[{}] setup failed: {}", tool, e);
            report.failed.extend(
                targets.iter().map(|t| (t.clone(), format!("setup failed: {}", e)))
            );
        }
    }

    if let Err(e) = adapter.cleanup().await {
        warn!("[{}] cleanup failed: {}", tool, e);
    }

    report.execution_time = start_time.elapsed();
    info!(
        "{} finished in {:?}: {} produced, {} failed",
        tool, report.execution_time, report.produced.len(), report.failed.len()
    );

    report
}
