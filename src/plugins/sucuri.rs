// src/plugins/sucuri.rs
use std::path::PathBuf;
use async_trait::async_trait;
use tokio::fs;
use tracing::{debug, error, info};

use crate::config::SucuriConfig;
use crate::core::{OutputLayout, Target, Tool, ToolAdapter};
use crate::error::{DossierResult, DossierError};
use crate::utils::shell;

/// Site-reputation adapter: prints the public report page to PDF through
/// an external renderer command
pub struct SucuriAdapter {
    base_url: String,
    renderer_command: String,
    timeout_secs: u64,
    layout: OutputLayout,
}

impl SucuriAdapter {
    pub fn new(config: &SucuriConfig, layout: OutputLayout) -> Self {
        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            renderer_command: config.renderer_command.clone(),
            timeout_secs: config.render_timeout_seconds,
            layout,
        }
    }

    pub fn report_url(&self, target: &Target) -> String {
        format!("{}/{}", self.base_url, target.name)
    }

    pub fn command_for(&self, target: &Target, output: &std::path::Path) -> String {
        let url = self.report_url(target);
        let output = output.to_string_lossy();

        shell::render_template(&self.renderer_command, &[("url", url.as_str()), ("output", output.as_ref())])
    }
}

#[async_trait]
impl ToolAdapter for SucuriAdapter {
    fn tool(&self) -> Tool {
        Tool::SiteReputation
    }

    async fn setup(&mut self) -> DossierResult<()> {
        let dir = self.layout.dir(Tool::SiteReputation);
        fs::create_dir_all(dir).await.map_err(|e| DossierError::file(dir, e))
    }

    async fn run_target(&mut self, target: &Target) -> DossierResult<PathBuf> {
        let output = self.layout.expected_path(Tool::SiteReputation, target);
        let command = self.command_for(target, &output);

        info!("Rendering {}", self.report_url(target));
        debug!("Renderer command: {}", command);

        // A leftover PDF must not pass for this run's output
        match fs::remove_file(&output).await {
            Ok(()) => debug!("Removed previous report {}", output.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(DossierError::file(&output, e)),
        }

        let result = shell::execute_command_with_timeout(&command, self.timeout_secs).await?;
        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            error!("Renderer failed for {}: {}", target, stderr.trim());
            return Err(DossierError::ExternalToolError {
                tool: "renderer".to_string(),
                message: format!("exited with {}: {}", result.status, stderr.trim()),
            });
        }

        if !output.is_file() {
            return Err(DossierError::ExternalToolError {
                tool: "renderer".to_string(),
                message: format!("no PDF written to {}", output.display()),
            });
        }

        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adapter(dir: &std::path::Path, renderer_command: &str) -> SucuriAdapter {
        let config = SucuriConfig {
            renderer_command: renderer_command.to_string(),
            render_timeout_seconds: 5,
            ..SucuriConfig::default()
        };
        SucuriAdapter::new(&config, OutputLayout::under(dir))
    }

    #[test]
    fn test_command_uses_report_url_and_dot_preserving_path() {
        let adapter = adapter(std::path::Path::new("/out"), "render {url} --to {output}");
        let target = Target::parse("203.0.113.5 : example.com");
        let output = adapter.layout.expected_path(Tool::SiteReputation, &target);

        assert_eq!(output, PathBuf::from("/out/sucuri_reports/203.0.113.5_example.com.pdf"));
        assert_eq!(
            adapter.command_for(&target, &output),
            "render 'https://sitecheck.sucuri.net/results/example.com' --to '/out/sucuri_reports/203.0.113.5_example.com.pdf'"
        );
    }

    #[tokio::test]
    async fn test_renderer_output_is_returned() {
        let dir = tempfile::tempdir().unwrap();
        let mut adapter = adapter(dir.path(), "printf '%%PDF-1.5' > {output}");
        let target = Target::parse("10.0.0.1 : a.org");

        adapter.setup().await.unwrap();
        let path = adapter.run_target(&target).await.unwrap();

        assert_eq!(path, dir.path().join("sucuri_reports/10.0.0.1_a.org.pdf"));
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_renderer_failures_are_errors() {
        let dir = tempfile::tempdir().unwrap();
        let target = Target::parse("10.0.0.1 : a.org");

        let mut failing = adapter(dir.path(), "echo boom >&2; exit 2");
        failing.setup().await.unwrap();
        assert!(matches!(
            failing.run_target(&target).await,
            Err(DossierError::ExternalToolError { .. })
        ));

        let mut silent = adapter(dir.path(), "true {url} {output}");
        assert!(matches!(
            silent.run_target(&target).await,
            Err(DossierError::ExternalToolError { ref message, .. }) if message.starts_with("no PDF")
        ));
    }

    #[tokio::test]
    async fn test_stale_report_is_not_reused() {
        let dir = tempfile::tempdir().unwrap();
        let target = Target::parse("10.0.0.1 : a.org");

        let mut silent = adapter(dir.path(), "true {url} {output}");
        silent.setup().await.unwrap();
        let stale = silent.layout.expected_path(Tool::SiteReputation, &target);
        std::fs::write(&stale, b"%PDF-1.5 from an earlier run").unwrap();

        assert!(matches!(
            silent.run_target(&target).await,
            Err(DossierError::ExternalToolError { ref message, .. }) if message.starts_with("no PDF")
        ));
        assert!(!stale.exists());
    }
}
