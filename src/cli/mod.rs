pub mod app;
mod commands;
mod interactive;

pub use app::App;
pub use commands::{execute_command, parse_tool_selection, Args, Commands};
pub use interactive::{collect_until_blank, Prompter};
