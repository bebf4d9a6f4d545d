pub mod cli;
pub mod config;
pub mod core;
pub mod engine;
pub mod error;
pub mod plugins;
pub mod reporting;
pub mod scanner;
pub mod utils;

// Re-export main types for easier access
pub use cli::App;
pub use config::Config;
pub use core::{Target, TargetList, Tool, ToolAdapter, ToolRun, OutputLayout};
pub use engine::{Pipeline, PipelineResult};
pub use error::{DossierError, DossierResult};
pub use reporting::{ArtifactCorrelator, ReportAssembler, AssemblyOutcome};
