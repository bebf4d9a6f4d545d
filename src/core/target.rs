// src/core/target.rs
use std::fmt;
use std::path::Path;
use serde::{Serialize, Deserialize};
use tokio::fs;
use tracing::{debug, info, warn};

use crate::error::{DossierResult, DossierError};

/// One `ADDRESS : NAME` entry of the persisted target list.
///
/// Parsing never fails: a line that does not split into exactly two tokens
/// on `:` keeps the whole trimmed line as `name` and leaves `address` empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Target {
    pub address: String,
    pub name: String,
}

impl Target {
    pub fn new(address: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            name: name.into(),
        }
    }

    /// Parse a persisted line, degrading instead of failing
    pub fn parse(line: &str) -> Self {
        let parts: Vec<&str> = line.split(':').collect();

        match parts.as_slice() {
            [address, name] => Self::new(address.trim(), name.trim()),
            _ => {
                warn!("Malformed target line, using it as a bare name: {}", line.trim());
                Self::new("", line.trim())
            }
        }
    }

    /// True when the line could not be split into address and name
    pub fn is_degraded(&self) -> bool {
        self.address.is_empty()
    }

    /// URL handed to the scan engine
    pub fn url(&self) -> String {
        format!("http://{}", self.name)
    }

    /// `{address}_{name}` with dots in the name replaced by underscores
    pub fn sanitized_stem(&self) -> String {
        format!("{}_{}", self.address, self.name.replace('.', "_"))
    }

    /// `{address}_{name}` with the name left untouched
    pub fn verbatim_stem(&self) -> String {
        format!("{}_{}", self.address, self.name)
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_degraded() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{} : {}", self.address, self.name)
        }
    }
}

/// Line-oriented store backing the target list
pub struct TargetList;

impl TargetList {
    /// Read all non-blank lines, trimmed, in file order
    pub async fn load(path: &Path) -> DossierResult<Vec<String>> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| DossierError::file(path, format!("Failed to read target list: {}", e)))?;

        let lines: Vec<String> = content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect();

        debug!("Read {} target lines from {}", lines.len(), path.display());
        Ok(lines)
    }

    /// Overwrite the store with `lines`, one per line
    pub async fn save(path: &Path, lines: &[String]) -> DossierResult<()> {
        let mut content = String::new();
        for line in lines {
            content.push_str(line);
            content.push('\n');
        }

        fs::write(path, content)
            .await
            .map_err(|e| DossierError::file(path, format!("Failed to write target list: {}", e)))?;

        info!("Saved {} targets to {}", lines.len(), path.display());
        Ok(())
    }

    pub fn parse_all(lines: &[String]) -> Vec<Target> {
        lines.iter().map(|line| Target::parse(line)).collect()
    }

    /// Load and parse in one step
    pub async fn load_targets(path: &Path) -> DossierResult<Vec<Target>> {
        let lines = Self::load(path).await?;
        Ok(Self::parse_all(&lines))
    }
}
