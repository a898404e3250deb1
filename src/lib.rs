//! # Replpilot
//!
//! Async automation harness for prompt-driven interactive subprocesses.
//!
//! Replpilot spawns a long-lived REPL-style program (a Python `pdb`
//! session by default), exchanges line-oriented commands with it over
//! pipes, frames each reply by detecting a literal prompt marker in the
//! output, and drives the session through a bounded decision loop in
//! which an external oracle (an LLM) picks the next command from the
//! accumulated transcript.
//!
//! ## Layers
//!
//! - [`SessionChannel`]: owns one subprocess; `start` / `send_and_await` /
//!   `stop` over three pipes, with timeout-bounded, prompt-delimited reads.
//! - [`SessionOrchestrator`]: runs the step loop against a
//!   [`DecisionOracle`], keeps the append-only history, and always
//!   produces a structured [`ChainResult`].
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use replpilot::{
//!     ChainConfig, OpenRouterOracle, OracleConfig, SessionChannel, SessionConfig,
//!     SessionOrchestrator,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), replpilot::Error> {
//!     let channel = SessionChannel::new(SessionConfig::pdb("bug.py"));
//!     let oracle = OpenRouterOracle::new(OracleConfig::new(
//!         std::env::var("OPENROUTER_API_KEY").unwrap_or_default(),
//!         "openai/gpt-3.5-turbo",
//!     ))?;
//!
//!     let config = ChainConfig::new("Why does divide() raise?", "bug.py").max_steps(10);
//!     let result = SessionOrchestrator::new(channel, oracle, config).run().await;
//!
//!     if let Some(summary) = result.final_summary {
//!         println!("{summary}");
//!     }
//!     Ok(())
//! }
//! ```

pub mod chain;
pub mod context;
pub mod error;
pub mod oracle;
pub mod session;

// Re-export main types for convenience
pub use chain::{
    ChainConfig, ChainOutcome, ChainResult, EntryKind, HistoryEntry, SessionOrchestrator,
};
pub use context::{CONTEXT_DUMP_COMMAND, FrameContext, extract_context, fetch_context};
pub use error::{Error, OracleError, SessionError};
pub use oracle::{DecisionOracle, ERROR_PREFIX, OpenRouterOracle, OracleConfig};
pub use session::{Output, PDB_PROMPT, SessionChannel, SessionConfig};
