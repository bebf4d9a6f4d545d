// src/reporting/assemble.rs
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tokio::fs;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::core::{Target, Tool, ToolRun};
use crate::error::{DossierResult, DossierError};
use super::correlate::ArtifactCorrelator;
use super::pdf;

/// What the assembler did for one target
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssemblyOutcome {
    Written {
        path: PathBuf,
        sections: Vec<Tool>,
        pages: usize,
    },
    /// No tool artifact was found; nothing was written
    Skipped,
}

/// Builds the composite dossier: cover page followed by each found artifact
pub struct ReportAssembler {
    correlator: ArtifactCorrelator,
    cover_image: PathBuf,
    /// Cover image bytes, read and validated on first use
    background: OnceCell<Option<Vec<u8>>>,
    scratch_dir: Option<PathBuf>,
}

impl ReportAssembler {
    pub fn new(correlator: ArtifactCorrelator, cover_image: impl Into<PathBuf>) -> Self {
        Self {
            correlator,
            cover_image: cover_image.into(),
            background: OnceCell::new(),
            scratch_dir: None,
        }
    }

    /// Write temporary cover pages under `dir` instead of the system temp dir
    pub fn with_scratch_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.scratch_dir = dir;
        self
    }

    pub fn cover_title(target: &Target) -> String {
        format!("Security Evaluation of: {}", target.name)
    }

    async fn load_background(&self) -> Option<Vec<u8>> {
        let bytes = match fs::read(&self.cover_image).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Cover image {} unavailable, using a plain cover: {}", self.cover_image.display(), e);
                return None;
            }
        };

        if let Err(e) = pdf::cover_page("", Some(bytes.as_slice())) {
            warn!("Cover image {} is not a usable JPEG, using a plain cover: {}", self.cover_image.display(), e);
            return None;
        }

        Some(bytes)
    }

    async fn cover_background(&self) -> Option<&[u8]> {
        self.background
            .get_or_init(|| self.load_background())
            .await
            .as_deref()
    }

    /// Render the cover into a temporary file that is removed when dropped
    async fn write_cover(&self, target: &Target) -> DossierResult<NamedTempFile> {
        let title = Self::cover_title(target);
        let background = self.cover_background().await;

        let mut cover = pdf::cover_page(&title, background)?;

        let mut builder = tempfile::Builder::new();
        builder.prefix("cover_").suffix(".pdf");

        let scratch = self.scratch_dir.clone().unwrap_or_else(std::env::temp_dir);
        fs::create_dir_all(&scratch).await.map_err(|e| DossierError::file(&scratch, e))?;
        let file = builder.tempfile_in(&scratch).map_err(|e| DossierError::file(&scratch, e))?;

        pdf::save_document(&mut cover, file.path())?;
        debug!("Cover page for {} written to {}", target, file.path().display());

        Ok(file)
    }

    /// Assemble the composite for `target` from the artifacts of `run`.
    ///
    /// Overwrites any earlier composite. The temporary cover page is gone
    /// when this returns, whatever the outcome.
    pub async fn assemble(&self, target: &Target, run: &ToolRun) -> DossierResult<AssemblyOutcome> {
        let cover = self.write_cover(target).await?;
        let correlation = self.correlator.correlate(target, run);

        if correlation.is_empty() {
            warn!("No reports to merge for {}", target);
            return Ok(AssemblyOutcome::Skipped);
        }

        if !correlation.missing.is_empty() {
            let missing: Vec<&str> = correlation.missing.iter().map(|t| t.id()).collect();
            warn!("Missing reports for {}: {}", target, missing.join(", "));
        }

        let mut documents = vec![pdf::load_document(cover.path())?];
        let mut sections = Vec::new();

        for artifact in &correlation.found {
            match pdf::load_document(&artifact.path) {
                Ok(document) => {
                    documents.push(document);
                    sections.push(artifact.tool);
                }
                Err(e) => warn!("Skipping unreadable {} report for {}: {}", artifact.tool, target, e),
            }
        }

        if sections.is_empty() {
            warn!("No reports to merge for {}", target);
            return Ok(AssemblyOutcome::Skipped);
        }

        let mut merged = pdf::merge_documents(documents)?;
        let pages = merged.get_pages().len();

        let path = self.correlator.layout().composite_path(target);
        ensure_parent(&path).await?;
        pdf::save_document(&mut merged, &path)?;

        info!("Composite report for {} saved: {} ({} pages)", target, path.display(), pages);

        Ok(AssemblyOutcome::Written { path, sections, pages })
    }
}

async fn ensure_parent(path: &Path) -> DossierResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| DossierError::file(parent, e))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::OutputLayout;
    use crate::reporting::pdf::{Block, PdfDocument, Span};
    use crate::utils::log_capture::LogCapture;

    struct Fixture {
        _root: tempfile::TempDir,
        layout: OutputLayout,
        scratch: PathBuf,
    }

    impl Fixture {
        fn new() -> Self {
            let root = tempfile::tempdir().unwrap();
            let layout = OutputLayout::under(root.path());
            let scratch = root.path().join("scratch");
            std::fs::create_dir_all(&scratch).unwrap();
            Self { _root: root, layout, scratch }
        }

        fn assembler(&self) -> ReportAssembler {
            ReportAssembler::new(ArtifactCorrelator::new(self.layout.clone()), self.scratch.join("missing.jpg"))
                .with_scratch_dir(Some(self.scratch.clone()))
        }

        fn write_artifact(&self, tool: Tool, target: &Target, pages: usize) {
            let path = self.layout.expected_path(tool, target);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();

            let mut doc = PdfDocument::new();
            doc.push(Block::Title(format!("{} report", tool)));
            for page in 1..pages {
                doc.push(Block::PageBreak);
                doc.push(Block::Paragraph(vec![Span::plain(format!("page {}", page + 1))]));
            }
            doc.save(&path).unwrap();
        }

        fn scratch_is_empty(&self) -> bool {
            std::fs::read_dir(&self.scratch).unwrap().next().is_none()
        }
    }

    #[tokio::test]
    async fn test_two_tool_scenario() {
        let fixture = Fixture::new();
        let target = Target::parse("203.0.113.5 : example.com");
        fixture.write_artifact(Tool::RemoteLookup, &target, 1);
        fixture.write_artifact(Tool::SiteReputation, &target, 1);

        let (run, _) = ToolRun::parse("shodan,sucuri");
        let outcome = fixture.assembler().assemble(&target, &run).await.unwrap();

        let expected = fixture.layout.composite.join("203.0.113.5_example_com.pdf");
        assert_eq!(outcome, AssemblyOutcome::Written {
            path: expected.clone(),
            sections: vec![Tool::RemoteLookup, Tool::SiteReputation],
            pages: 3,
        });
        assert_eq!(pdf::page_count(&expected).unwrap(), 3);
        assert!(fixture.scratch_is_empty());
    }

    #[tokio::test]
    async fn test_partial_artifacts_are_merged() {
        let fixture = Fixture::new();
        let target = Target::parse("203.0.113.5 : example.com");
        fixture.write_artifact(Tool::RemoteLookup, &target, 2);

        let outcome = fixture.assembler().assemble(&target, &ToolRun::all()).await.unwrap();

        match outcome {
            AssemblyOutcome::Written { sections, pages, .. } => {
                assert_eq!(sections, vec![Tool::RemoteLookup]);
                assert_eq!(pages, 3);
            }
            AssemblyOutcome::Skipped => panic!("expected a composite"),
        }
        assert!(fixture.scratch_is_empty());
    }

    #[tokio::test]
    async fn test_nothing_found_writes_nothing() {
        let fixture = Fixture::new();
        let target = Target::parse("203.0.113.5 : example.com");

        let outcome = fixture.assembler().assemble(&target, &ToolRun::all()).await.unwrap();

        assert_eq!(outcome, AssemblyOutcome::Skipped);
        assert!(!fixture.layout.composite_path(&target).exists());
        assert!(fixture.scratch_is_empty());
    }

    #[tokio::test]
    async fn test_assembly_is_repeatable_and_overwrites() {
        let fixture = Fixture::new();
        let target = Target::parse("10.0.0.1 : a.b.org");
        fixture.write_artifact(Tool::SiteReputation, &target, 1);
        fixture.write_artifact(Tool::ActiveScan, &target, 2);

        let assembler = fixture.assembler();
        let first = assembler.assemble(&target, &ToolRun::all()).await.unwrap();
        let second = assembler.assemble(&target, &ToolRun::all()).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(pdf::page_count(&fixture.layout.composite_path(&target)).unwrap(), 4);
        assert!(fixture.scratch_is_empty());
    }

    #[tokio::test]
    async fn test_unreadable_artifact_is_excluded() {
        let fixture = Fixture::new();
        let target = Target::parse("10.0.0.1 : a.org");
        let bogus = fixture.layout.expected_path(Tool::ActiveScan, &target);
        std::fs::create_dir_all(bogus.parent().unwrap()).unwrap();
        std::fs::write(&bogus, b"not a pdf").unwrap();

        let outcome = fixture.assembler().assemble(&target, &ToolRun::all()).await.unwrap();

        assert_eq!(outcome, AssemblyOutcome::Skipped);
        assert!(fixture.scratch_is_empty());
    }

    #[tokio::test]
    async fn test_fixture_artifacts_have_requested_pages() {
        let fixture = Fixture::new();
        let target = Target::parse("10.0.0.1 : a.org");
        fixture.write_artifact(Tool::ActiveScan, &target, 3);

        assert_eq!(pdf::page_count(&fixture.layout.expected_path(Tool::ActiveScan, &target)).unwrap(), 3);
    }

    #[tokio::test]
    async fn test_partial_artifacts_warn_once_per_target() {
        let fixture = Fixture::new();
        let target = Target::parse("203.0.113.5 : example.com");
        fixture.write_artifact(Tool::RemoteLookup, &target, 1);

        let logs = LogCapture::default();
        let _guard = logs.install();
        fixture.assembler().assemble(&target, &ToolRun::all()).await.unwrap();

        let warnings = logs.warnings_about("example.com");
        assert_eq!(warnings.len(), 1, "{:?}", warnings);
        assert!(warnings[0].contains("sucuri, zap"));
    }

    #[tokio::test]
    async fn test_empty_target_and_missing_cover_warn_once() {
        let fixture = Fixture::new();
        let first = Target::parse("203.0.113.5 : example.com");
        let second = Target::parse("198.51.100.7 : other.net");
        fixture.write_artifact(Tool::SiteReputation, &second, 1);

        let logs = LogCapture::default();
        let _guard = logs.install();
        let assembler = fixture.assembler();
        assembler.assemble(&first, &ToolRun::all()).await.unwrap();
        assembler.assemble(&second, &ToolRun::all()).await.unwrap();

        let warnings = logs.warnings_about("example.com");
        assert_eq!(warnings.len(), 1, "{:?}", warnings);
        assert!(warnings[0].contains("No reports to merge"));
        assert_eq!(logs.warnings_about("missing.jpg").len(), 1);
    }

    #[test]
    fn test_cover_title_uses_raw_line_for_degraded_targets() {
        assert_eq!(
            ReportAssembler::cover_title(&Target::parse("not a target")),
            "Security Evaluation of: not a target"
        );
    }
}
