// src/utils/shell.rs
use std::process::Output;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::error::{DossierResult, DossierError};

/// Execute a shell command with a timeout
pub async fn execute_command_with_timeout(cmd: &str, timeout_secs: u64) -> DossierResult<Output> {
    debug!("Executing command with timeout {}: {}", timeout_secs, cmd);

    let command_future = Command::new("sh")
        .arg("-c")
        .arg(cmd)
        .kill_on_drop(true)
        .output();

    match tokio::time::timeout(std::time::Duration::from_secs(timeout_secs), command_future).await {
        Ok(result) => result.map_err(|e| DossierError::ExternalToolError {
            tool: "sh".to_string(),
            message: format!("Failed to execute command: {}: {}", cmd, e),
        }),
        Err(_) => {
            warn!("Command timed out after {} seconds: {}", timeout_secs, cmd);
            Err(DossierError::ExternalToolError {
                tool: "sh".to_string(),
                message: format!("Command timed out after {} seconds: {}", timeout_secs, cmd),
            })
        }
    }
}

/// Single-quote `arg` for `sh`
pub fn quote(arg: &str) -> String {
    format!("'{}'", arg.replace('\'', r"'\''"))
}

/// Substitute `{name}` placeholders in a command template with quoted values
pub fn render_template(template: &str, values: &[(&str, &str)]) -> String {
    values.iter().fold(template.to_string(), |command, (name, value)| {
        command.replace(&format!("{{{}}}", name), &quote(value))
    })
}
