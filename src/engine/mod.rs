mod workflow;

pub use workflow::{Pipeline, PipelineResult, PipelineStatus};
