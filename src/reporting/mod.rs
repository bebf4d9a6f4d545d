pub mod pdf;
mod assemble;
mod convert;
mod correlate;

pub use assemble::{ReportAssembler, AssemblyOutcome};
pub use convert::{convert_report, extract_blocks, summarize, highlight_severity, RawBlock, SummaryItem};
pub use correlate::{ArtifactCorrelator, Artifact, Correlation};
