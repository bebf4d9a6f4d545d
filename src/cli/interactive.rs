// src/cli/interactive.rs
use std::path::Path;
use dialoguer::{theme::ColorfulTheme, Input, Select};
use tracing::info;

use crate::core::{TargetList, Tool, ToolRun};
use crate::error::DossierResult;

/// Operator prompts for the target list and the tool selection
pub struct Prompter {
    theme: ColorfulTheme,
}

impl Default for Prompter {
    fn default() -> Self {
        Self::new()
    }
}

impl Prompter {
    pub fn new() -> Self {
        Self {
            theme: ColorfulTheme::default(),
        }
    }

    /// Offer to reuse `store` or overwrite it with manually entered targets
    pub async fn choose_targets(&self, store: &Path) -> DossierResult<()> {
        let reuse = format!("Use existing {}", store.display());
        let choices = [reuse.as_str(), "Enter targets manually (e.g. 1.2.3.4 : example.com)"];

        let selection = Select::with_theme(&self.theme)
            .with_prompt("Choose target input method")
            .default(0)
            .items(&choices)
            .interact()?;

        if selection == 1 {
            println!("Enter 'IP : domain' pairs, one per line. Leave blank to finish:");
            let lines = collect_until_blank(std::iter::from_fn(|| Some(self.read_entry())))?;
            TargetList::save(store, &lines).await?;
        }

        Ok(())
    }

    fn read_entry(&self) -> DossierResult<String> {
        let entry: String = Input::with_theme(&self.theme)
            .with_prompt(">")
            .allow_empty(true)
            .interact_text()?;
        Ok(entry)
    }

    /// Ask which tools to run; unknown names are ignored
    pub fn select_tools(&self) -> DossierResult<ToolRun> {
        let names: Vec<&str> = Tool::ALL.iter().map(|t| t.id()).collect();
        let input: String = Input::with_theme(&self.theme)
            .with_prompt(format!("Enter any combination of: {} (e.g. 'shodan,sucuri')", names.join(", ")))
            .interact_text()?;

        let (run, _) = ToolRun::parse(&input);
        info!("Selected tools: {}", run);

        Ok(run)
    }
}

/// Trimmed entries up to the first blank one; the first failed read aborts
pub fn collect_until_blank<E>(entries: impl IntoIterator<Item = Result<String, E>>) -> Result<Vec<String>, E> {
    let mut lines = Vec::new();
    for entry in entries {
        let entry = entry?;
        let entry = entry.trim();
        if entry.is_empty() {
            break;
        }
        lines.push(entry.to_string());
    }
    Ok(lines)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DossierError;

    fn ok(entry: &str) -> DossierResult<String> {
        Ok(entry.to_string())
    }

    #[test]
    fn test_manual_entry_stops_at_first_blank() {
        let entries = vec![ok("1.2.3.4 : a.com "), ok("  5.6.7.8:b.org"), ok("   "), ok("9.9.9.9 : ignored.net")];

        assert_eq!(collect_until_blank(entries).unwrap(), vec!["1.2.3.4 : a.com", "5.6.7.8:b.org"]);
        assert!(collect_until_blank(Vec::<DossierResult<String>>::new()).unwrap().is_empty());
    }

    #[test]
    fn test_manual_entry_read_failure_aborts() {
        let entries = vec![
            ok("1.2.3.4 : a.com"),
            Err(DossierError::PromptError("terminal closed".to_string())),
            ok("5.6.7.8 : b.org"),
        ];

        assert!(matches!(collect_until_blank(entries), Err(DossierError::PromptError(_))));
    }
}
