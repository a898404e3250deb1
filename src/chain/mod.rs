//! Orchestration layer: the bounded decision loop, its audit trail, and
//! the prompts it feeds the oracle.

mod history;
mod orchestrator;
pub mod prompt;

pub use history::{ChainOutcome, ChainResult, EntryKind, HistoryEntry};
pub use orchestrator::{ChainConfig, SessionOrchestrator};
pub use prompt::{DUMP_ALIAS, TASK_COMPLETE, TASK_ERROR};
