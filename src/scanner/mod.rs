mod client;
mod process;
mod session;

pub use client::{ScanEngine, ZapClient};
#[cfg(test)]
pub use client::MockScanEngine;
pub use process::EngineProcess;
pub use session::{ScanSession, SessionState, PollPolicy};
