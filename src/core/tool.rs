// src/core/tool.rs
use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use serde::{Serialize, Deserialize};
use tracing::warn;

use crate::config::OutputConfig;
use crate::error::DossierError;
use super::target::Target;

/// The fixed set of scanning tools. Declaration order is merge order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Tool {
    RemoteLookup,
    SiteReputation,
    ActiveScan,
}

/// How a tool derives its per-target file stem
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamingConvention {
    /// `{address}_{name}`
    DotPreserving,
    /// `{address}_{name}` with `.` in the name replaced by `_`
    DotToUnderscore,
}

impl Tool {
    pub const ALL: [Tool; 3] = [Tool::RemoteLookup, Tool::SiteReputation, Tool::ActiveScan];

    /// Token used on the command line and in prompts
    pub fn id(&self) -> &'static str {
        match self {
            Tool::RemoteLookup => "shodan",
            Tool::SiteReputation => "sucuri",
            Tool::ActiveScan => "zap",
        }
    }

    // The site-reputation tool keeps dots in its file names while the other
    // two substitute them. Existing artifacts on disk depend on this.
    pub fn naming(&self) -> NamingConvention {
        match self {
            Tool::SiteReputation => NamingConvention::DotPreserving,
            Tool::RemoteLookup | Tool::ActiveScan => NamingConvention::DotToUnderscore,
        }
    }
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for Tool {
    type Err = DossierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "shodan" => Ok(Tool::RemoteLookup),
            "sucuri" => Ok(Tool::SiteReputation),
            "zap" => Ok(Tool::ActiveScan),
            other => Err(DossierError::InvalidInput(format!("Unknown tool: {}", other))),
        }
    }
}

impl NamingConvention {
    pub fn file_stem(&self, target: &Target) -> String {
        match self {
            NamingConvention::DotPreserving => target.verbatim_stem(),
            NamingConvention::DotToUnderscore => target.sanitized_stem(),
        }
    }
}

/// Tools selected for one invocation, iterated in merge order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolRun {
    tools: BTreeSet<Tool>,
}

impl ToolRun {
    pub fn new(tools: impl IntoIterator<Item = Tool>) -> Self {
        Self {
            tools: tools.into_iter().collect(),
        }
    }

    pub fn all() -> Self {
        Self::new(Tool::ALL)
    }

    /// Parse a comma- or semicolon-separated selection.
    ///
    /// Unknown tokens are logged and returned alongside the run; they never
    /// make the selection fail.
    pub fn parse(input: &str) -> (Self, Vec<String>) {
        let mut tools = BTreeSet::new();
        let mut unknown = Vec::new();

        for token in input.split([',', ';']).map(str::trim).filter(|t| !t.is_empty()) {
            match token.parse::<Tool>() {
                Ok(tool) => {
                    tools.insert(tool);
                }
                Err(_) => {
                    warn!("Unknown tool requested: {}", token);
                    unknown.push(token.to_string());
                }
            }
        }

        (Self { tools }, unknown)
    }

    pub fn contains(&self, tool: Tool) -> bool {
        self.tools.contains(&tool)
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = Tool> + '_ {
        self.tools.iter().copied()
    }
}

impl fmt::Display for ToolRun {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ids: Vec<&str> = self.iter().map(|t| t.id()).collect();
        f.write_str(&ids.join(","))
    }
}

/// Where every tool writes and where composites go
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLayout {
    pub remote_lookup: PathBuf,
    pub site_reputation: PathBuf,
    pub active_scan: PathBuf,
    pub composite: PathBuf,
}

impl OutputLayout {
    pub fn from_config(output: &OutputConfig) -> Self {
        Self {
            remote_lookup: output.remote_lookup.clone(),
            site_reputation: output.site_reputation.clone(),
            active_scan: output.active_scan.clone(),
            composite: output.composite.clone(),
        }
    }

    /// Default directory names resolved under `root`
    pub fn under(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self::from_config(&OutputConfig {
            remote_lookup: root.join("shodan_reports"),
            site_reputation: root.join("sucuri_reports"),
            active_scan: root.join("zap_reports"),
            composite: root.join("full_reports"),
        })
    }

    pub fn dir(&self, tool: Tool) -> &PathBuf {
        match tool {
            Tool::RemoteLookup => &self.remote_lookup,
            Tool::SiteReputation => &self.site_reputation,
            Tool::ActiveScan => &self.active_scan,
        }
    }

    /// Path of the PDF artifact `tool` produces for `target`
    pub fn expected_path(&self, tool: Tool, target: &Target) -> PathBuf {
        self.dir(tool)
            .join(format!("{}.pdf", tool.naming().file_stem(target)))
    }

    /// Path of the merged dossier for `target`
    pub fn composite_path(&self, target: &Target) -> PathBuf {
        self.composite.join(format!("{}.pdf", target.sanitized_stem()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_selection_ignores_unknown_tokens() {
        let (run, unknown) = ToolRun::parse(" Shodan ; zap,,nmap , ");

        assert!(run.contains(Tool::RemoteLookup));
        assert!(run.contains(Tool::ActiveScan));
        assert!(!run.contains(Tool::SiteReputation));
        assert_eq!(unknown, vec!["nmap".to_string()]);
    }

    #[test]
    fn test_iteration_is_fixed_order() {
        let (run, _) = ToolRun::parse("zap,sucuri,shodan,zap");
        let order: Vec<Tool> = run.iter().collect();

        assert_eq!(order, Tool::ALL.to_vec());
        assert_eq!(run.to_string(), "shodan,sucuri,zap");
        assert!(ToolRun::parse("").0.is_empty());
    }

    #[test]
    fn test_expected_paths_respect_each_naming_convention() {
        let layout = OutputLayout::from_config(&OutputConfig::default());
        let target = Target::parse("203.0.113.5 : example.com");

        assert_eq!(
            layout.expected_path(Tool::RemoteLookup, &target),
            PathBuf::from("shodan_reports/203.0.113.5_example_com.pdf")
        );
        assert_eq!(
            layout.expected_path(Tool::SiteReputation, &target),
            PathBuf::from("sucuri_reports/203.0.113.5_example.com.pdf")
        );
        assert_eq!(
            layout.expected_path(Tool::ActiveScan, &target),
            PathBuf::from("zap_reports/203.0.113.5_example_com.pdf")
        );
        assert_eq!(
            layout.composite_path(&target),
            PathBuf::from("full_reports/203.0.113.5_example_com.pdf")
        );
    }
}
