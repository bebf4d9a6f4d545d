// src/engine/workflow.rs
use std::path::PathBuf;
use chrono::{DateTime, Utc};
use tracing::{info, warn, error};

use crate::config::Config;
use crate::core::{run_adapter, AdapterReport, OutputLayout, Target, Tool, ToolAdapter, ToolRun};
use crate::error::DossierResult;
use crate::plugins::{ShodanAdapter, SucuriAdapter, ZapAdapter};
use crate::reporting::{ArtifactCorrelator, AssemblyOutcome, ReportAssembler};
use crate::scanner::ZapClient;
use crate::utils::HttpClient;

/// Overall outcome of a pipeline run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStatus {
    /// Every selected tool succeeded and every target got a composite
    Success,
    Partial,
    /// No composite was written
    Failed,
}

#[derive(Debug)]
pub struct PipelineResult {
    pub tools: Vec<AdapterReport>,
    pub composites: Vec<PathBuf>,
    pub skipped: Vec<Target>,
    pub assembly_failures: Vec<(Target, String)>,
    pub status: PipelineStatus,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_seconds: u64,
}

/// Runs the selected tools over the whole batch, then assembles per target
pub struct Pipeline {
    config: Config,
    layout: OutputLayout,
}

impl Pipeline {
    pub fn new(config: Config) -> Self {
        let layout = OutputLayout::from_config(&config.output);
        Self { config, layout }
    }

    pub fn layout(&self) -> &OutputLayout {
        &self.layout
    }

    /// Build the adapter for `tool` from configuration
    pub fn create_adapter(&self, tool: Tool) -> DossierResult<Box<dyn ToolAdapter>> {
        let adapter: Box<dyn ToolAdapter> = match tool {
            Tool::RemoteLookup => Box::new(ShodanAdapter::new(
                &self.config.shodan,
                HttpClient::from_config(&self.config.http)?,
                self.layout.clone(),
            )),
            Tool::SiteReputation => Box::new(SucuriAdapter::new(&self.config.sucuri, self.layout.clone())),
            Tool::ActiveScan => Box::new(ZapAdapter::new(
                self.config.zap.clone(),
                Box::new(ZapClient::from_config(&self.config.zap, &self.config.http)?),
                &self.layout,
            )),
        };

        Ok(adapter)
    }

    /// Run each selected tool over every target, in fixed tool order
    pub async fn run_tools(&self, targets: &[Target], run: &ToolRun) -> DossierResult<Vec<AdapterReport>> {
        let mut adapters = Vec::new();
        for tool in run.iter() {
            adapters.push(self.create_adapter(tool)?);
        }

        Ok(Self::run_adapters(adapters, targets).await)
    }

    /// Run prepared adapters one after another, each over the whole batch
    pub async fn run_adapters(mut adapters: Vec<Box<dyn ToolAdapter>>, targets: &[Target]) -> Vec<AdapterReport> {
        adapters.sort_by_key(|adapter| adapter.tool());

        let mut reports = Vec::with_capacity(adapters.len());
        for adapter in adapters.iter_mut() {
            let report = run_adapter(adapter.as_mut(), targets).await;
            info!(
                "{} finished in {:.1}s: {} produced, {} failed",
                report.tool,
                report.execution_time.as_secs_f64(),
                report.produced.len(),
                report.failed.len()
            );
            reports.push(report);
        }

        reports
    }

    fn assembler(&self) -> ReportAssembler {
        ReportAssembler::new(ArtifactCorrelator::new(self.layout.clone()), self.config.paths.cover_image.clone())
            .with_scratch_dir(self.config.paths.scratch_dir.clone())
    }

    /// Assemble a composite per target from whatever is on disk
    pub async fn assemble(&self, targets: &[Target], run: &ToolRun) -> PipelineResult {
        let start_time = Utc::now();
        let assembler = self.assembler();
        let mut result = PipelineResult {
            tools: Vec::new(),
            composites: Vec::new(),
            skipped: Vec::new(),
            assembly_failures: Vec::new(),
            status: PipelineStatus::Failed,
            start_time,
            end_time: start_time,
            duration_seconds: 0,
        };

        for target in targets {
            match assembler.assemble(target, run).await {
                Ok(AssemblyOutcome::Written { path, .. }) => result.composites.push(path),
                Ok(AssemblyOutcome::Skipped) => result.skipped.push(target.clone()),
                Err(e) => {
                    error!("[merge] {}: {}", target, e);
                    result.assembly_failures.push((target.clone(), e.to_string()));
                }
            }
        }

        result.finish();
        result
    }

    /// Full run: tools first, then assembly
    pub async fn execute(&self, targets: &[Target], run: &ToolRun) -> DossierResult<PipelineResult> {
        let start_time = Utc::now();
        info!("Starting pipeline with tools [{}] on {} targets", run, targets.len());

        if run.is_empty() {
            warn!("No tools selected");
        }

        let tools = self.run_tools(targets, run).await?;
        let mut result = self.assemble(targets, run).await;
        result.tools = tools;
        result.start_time = start_time;
        result.finish();

        info!("Pipeline completed with status {:?}", result.status);
        Ok(result)
    }
}

impl PipelineResult {
    fn finish(&mut self) {
        self.end_time = Utc::now();
        self.duration_seconds = (self.end_time - self.start_time).num_seconds().max(0) as u64;

        let tools_clean = self.tools.iter().all(|t| t.failed.is_empty());
        self.status = if self.composites.is_empty() {
            PipelineStatus::Failed
        } else if tools_clean && self.skipped.is_empty() && self.assembly_failures.is_empty() {
            PipelineStatus::Success
        } else {
            PipelineStatus::Partial
        };
    }
}
