// src/reporting/correlate.rs
use std::path::PathBuf;
use tracing::debug;

use crate::core::{OutputLayout, Target, Tool, ToolRun};

/// A tool output file found on disk for one target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub tool: Tool,
    pub path: PathBuf,
}

/// Result of probing every selected tool for one target
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Correlation {
    /// Present artifacts in merge order
    pub found: Vec<Artifact>,
    /// Selected tools with nothing on disk
    pub missing: Vec<Tool>,
}

impl Correlation {
    pub fn is_empty(&self) -> bool {
        self.found.is_empty()
    }
}

/// Locates tool artifacts by each tool's naming convention
pub struct ArtifactCorrelator {
    layout: OutputLayout,
}

impl ArtifactCorrelator {
    pub fn new(layout: OutputLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> &OutputLayout {
        &self.layout
    }

    /// Probe the expected path of every tool in `run`.
    ///
    /// A missing file only means the tool produced nothing for this target.
    pub fn correlate(&self, target: &Target, run: &ToolRun) -> Correlation {
        let mut correlation = Correlation::default();

        for tool in run.iter() {
            let path = self.layout.expected_path(tool, target);
            if path.is_file() {
                debug!("Found {} artifact for {}: {}", tool, target, path.display());
                correlation.found.push(Artifact { tool, path });
            } else {
                debug!("No {} artifact for {} at {}", tool, target, path.display());
                correlation.missing.push(tool);
            }
        }

        correlation
    }
}
