// src/cli/commands.rs
use std::path::{Path, PathBuf};
use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use crate::config::Config;
use crate::core::{Target, TargetList, Tool, ToolRun};
use crate::engine::{Pipeline, PipelineResult};
use crate::error::DossierResult;
use super::interactive::Prompter;

#[derive(Parser, Debug)]
#[command(name = "dossier")]
#[command(about = "Scan IP:domain targets with several tools and merge the results into one PDF per target")]
#[command(version)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    #[arg(long, global = true, help = "Enable debug logging")]
    pub verbose: bool,

    #[arg(long, short, global = true, help = "Path to a configuration file")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Run the selected tools, then merge their reports per target
    Run {
        #[arg(short, long, help = "Tools to run, e.g. 'shodan,sucuri' (prompted when omitted)")]
        tools: Option<String>,

        #[arg(long, help = "Target list file (defaults to the configured one)")]
        targets: Option<PathBuf>,

        #[arg(long, help = "Do not prompt; reuse the target list and run all tools unless --tools is given")]
        no_prompt: bool,
    },

    /// Host lookup reports only
    Shodan {
        #[arg(long, help = "Reuse the target list without prompting")]
        no_prompt: bool,
    },

    /// Site reputation reports only
    Sucuri {
        #[arg(long, help = "Reuse the target list without prompting")]
        no_prompt: bool,
    },

    /// Active scan reports only
    Zap {
        #[arg(long, help = "Reuse the target list without prompting")]
        no_prompt: bool,
    },

    /// Merge existing tool reports without running any tool
    Merge {
        #[arg(short, long, default_value = "shodan,sucuri,zap", help = "Tools whose reports are merged")]
        tools: String,

        #[arg(long, help = "Target list file (defaults to the configured one)")]
        targets: Option<PathBuf>,
    },

    /// Initialize the configuration
    Init {
        #[arg(short, long, help = "Force overwrite existing configuration")]
        force: bool,
    },
}

impl Commands {
    /// What running without a subcommand means
    pub fn interactive() -> Self {
        Commands::Run {
            tools: None,
            targets: None,
            no_prompt: false,
        }
    }
}

pub async fn execute_command(command: &Commands, config: &Config, config_path: Option<&Path>) -> Result<()> {
    match command {
        Commands::Run { tools, targets, no_prompt } => {
            handle_run_command(tools.as_deref(), targets.as_deref(), *no_prompt, config).await
        }
        Commands::Shodan { no_prompt } => handle_tool_command(Tool::RemoteLookup, *no_prompt, config).await,
        Commands::Sucuri { no_prompt } => handle_tool_command(Tool::SiteReputation, *no_prompt, config).await,
        Commands::Zap { no_prompt } => handle_tool_command(Tool::ActiveScan, *no_prompt, config).await,
        Commands::Merge { tools, targets } => handle_merge_command(tools, targets.as_deref(), config).await,
        Commands::Init { force } => handle_init_command(*force, config_path),
    }
}

/// Parse a tool list given on the command line; unknown names are logged and dropped
pub fn parse_tool_selection(input: &str) -> ToolRun {
    ToolRun::parse(input).0
}

async fn load_targets(path: &Path) -> Result<Vec<Target>> {
    let targets = TargetList::load_targets(path)
        .await
        .with_context(|| format!("Cannot read target list {}", path.display()))?;

    let degraded = targets.iter().filter(|t| t.is_degraded()).count();
    if degraded > 0 {
        warn!("{} target lines could not be split into address and name", degraded);
    }

    Ok(targets)
}

/// Load the target list, then settle the tool selection
async fn prepare_run(
    targets_file: &Path,
    tools: Option<&str>,
    no_prompt: bool,
    select_tools: impl FnOnce() -> DossierResult<ToolRun>,
) -> Result<(Vec<Target>, ToolRun)> {
    let targets = load_targets(targets_file).await?;

    let run = match tools {
        Some(list) => parse_tool_selection(list),
        None if no_prompt => ToolRun::all(),
        None => select_tools()?,
    };

    Ok((targets, run))
}

async fn handle_run_command(tools: Option<&str>, targets: Option<&Path>, no_prompt: bool, config: &Config) -> Result<()> {
    let targets_file = targets.unwrap_or(&config.paths.targets_file);
    let prompter = Prompter::new();

    if !no_prompt {
        prompter.choose_targets(targets_file).await?;
    }

    let (targets, run) = prepare_run(targets_file, tools, no_prompt, || prompter.select_tools()).await?;
    let pipeline = Pipeline::new(config.clone());
    let result = pipeline.execute(&targets, &run).await?;

    print_summary(&result);
    Ok(())
}

async fn handle_tool_command(tool: Tool, no_prompt: bool, config: &Config) -> Result<()> {
    let targets_file = &config.paths.targets_file;

    if !no_prompt {
        Prompter::new().choose_targets(targets_file).await?;
    }

    let targets = load_targets(targets_file).await?;
    let pipeline = Pipeline::new(config.clone());
    let reports = pipeline.run_tools(&targets, &ToolRun::new([tool])).await?;

    for report in reports {
        println!("{}: {} reports written, {} failed", report.tool, report.produced.len(), report.failed.len());
        for (target, error) in &report.failed {
            println!("  {} - {}", target, error);
        }
    }

    Ok(())
}

async fn handle_merge_command(tools: &str, targets: Option<&Path>, config: &Config) -> Result<()> {
    let run = parse_tool_selection(tools);
    let targets = load_targets(targets.unwrap_or(&config.paths.targets_file)).await?;

    let result = Pipeline::new(config.clone()).assemble(&targets, &run).await;
    print_summary(&result);

    Ok(())
}

fn handle_init_command(force: bool, config_path: Option<&Path>) -> Result<()> {
    let path = Config::init(config_path, force)?;
    info!("Configuration initialized");
    println!("Configuration written to {}", path.display());
    Ok(())
}

fn print_summary(result: &PipelineResult) {
    println!();
    for report in &result.tools {
        println!("{}: {} reports written, {} failed", report.tool, report.produced.len(), report.failed.len());
        for (target, error) in &report.failed {
            println!("  {} - {}", target, error);
        }
    }

    for path in &result.composites {
        println!("Merged report: {}", path.display());
    }
    for target in &result.skipped {
        println!("No reports to merge for {}", target);
    }
    for (target, error) in &result.assembly_failures {
        println!("Merge failed for {}: {}", target, error);
    }

    println!("Finished with status {:?} in {}s", result.status, result.duration_seconds);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::log_capture::LogCapture;

    #[test]
    fn test_subcommands_parse() {
        let args = Args::parse_from(["dossier", "run", "--tools", "shodan;zap", "--no-prompt"]);
        assert_eq!(args.command, Some(Commands::Run {
            tools: Some("shodan;zap".to_string()),
            targets: None,
            no_prompt: true,
        }));

        let args = Args::parse_from(["dossier", "--verbose", "zap", "--no-prompt"]);
        assert!(args.verbose);
        assert_eq!(args.command, Some(Commands::Zap { no_prompt: true }));

        let args = Args::parse_from(["dossier", "merge", "-c", "custom.toml"]);
        assert_eq!(args.config, Some(PathBuf::from("custom.toml")));
        assert_eq!(args.command, Some(Commands::Merge {
            tools: "shodan,sucuri,zap".to_string(),
            targets: None,
        }));

        assert!(Args::parse_from(["dossier"]).command.is_none());
    }

    #[test]
    fn test_tool_selection_ignores_unknown() {
        let run = parse_tool_selection("nmap, sucuri");
        assert_eq!(run, ToolRun::new([Tool::SiteReputation]));
    }

    #[test]
    fn test_unknown_tool_is_warned_once() {
        let logs = LogCapture::default();
        let _guard = logs.install();

        parse_tool_selection("nmap, sucuri");

        assert_eq!(logs.warnings_about("nmap").len(), 1);
    }

    #[tokio::test]
    async fn test_missing_target_list_fails_before_tool_prompt() {
        let dir = tempfile::tempdir().unwrap();
        let mut prompted = false;

        let result = prepare_run(&dir.path().join("absent.txt"), None, false, || {
            prompted = true;
            Ok(ToolRun::all())
        })
        .await;

        assert!(result.is_err());
        assert!(!prompted);
    }

    #[tokio::test]
    async fn test_prepare_run_prompts_only_without_tools() {
        let dir = tempfile::tempdir().unwrap();
        let targets = dir.path().join("domains_test.txt");
        std::fs::write(&targets, "203.0.113.5 : example.com\n").unwrap();

        let (loaded, run) = prepare_run(&targets, None, false, || Ok(ToolRun::new([Tool::ActiveScan]))).await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(run, ToolRun::new([Tool::ActiveScan]));

        let (_, run) = prepare_run(&targets, Some("shodan"), false, || panic!("tools were given")).await.unwrap();
        assert_eq!(run, ToolRun::new([Tool::RemoteLookup]));

        let (_, run) = prepare_run(&targets, None, true, || panic!("no prompting")).await.unwrap();
        assert_eq!(run, ToolRun::all());
    }

    #[tokio::test]
    async fn test_missing_target_list_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.paths.targets_file = dir.path().join("absent.txt");

        let command = Commands::Merge { tools: "shodan".to_string(), targets: None };
        let result = execute_command(&command, &config, None).await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_merge_without_artifacts_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let targets = dir.path().join("domains_test.txt");
        std::fs::write(&targets, "203.0.113.5 : example.com\n").unwrap();

        let mut config = Config::default();
        config.output.composite = dir.path().join("full_reports");
        config.output.remote_lookup = dir.path().join("shodan_reports");
        config.paths.scratch_dir = Some(dir.path().join("scratch"));

        let command = Commands::Merge { tools: "shodan".to_string(), targets: Some(targets) };
        execute_command(&command, &config, None).await.unwrap();

        assert!(!dir.path().join("full_reports").exists());
    }
}
