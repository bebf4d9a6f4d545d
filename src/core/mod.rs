mod adapter;
mod target;
mod tool;

pub use adapter::{ToolAdapter, AdapterReport, run_adapter};
pub use target::{Target, TargetList};
pub use tool::{Tool, ToolRun, NamingConvention, OutputLayout};
