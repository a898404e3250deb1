//! Context-extraction collaborator boundary.
//!
//! Inside the debugged process, a helper module walks the live call stack
//! and prints one JSON object describing the current frame. That
//! introspection has no equivalent out here; this module only speaks the
//! textual protocol: send the fixed dump command, then locate and parse
//! the JSON payload in the captured stdout. Parse failure is soft - the
//! session continues with no context.

use std::time::Duration;

use log::{debug, warn};
use serde::Deserialize;
use serde_json::Value;

use crate::error::SessionError;
use crate::session::{Output, SessionChannel};

/// The fixed command that makes the helper module print its JSON context
/// dump inside the debugger.
pub const CONTEXT_DUMP_COMMAND: &str =
    "import dump_pdb_context; print(dump_pdb_context.pdb_get_context_json())";

/// Source location of the frame the debugger is stopped at.
#[derive(Debug, Clone, Deserialize)]
pub struct FrameLocation {
    pub filename: String,
    pub lineno: u64,
    pub function: String,
}

/// Typed view of the context dump.
///
/// The helper serializes arbitrary Python values, so everything below the
/// location stays loosely typed.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FrameContext {
    #[serde(default)]
    pub location: Option<FrameLocation>,

    #[serde(default)]
    pub locals: serde_json::Map<String, Value>,

    #[serde(default)]
    pub arguments: serde_json::Map<String, Value>,

    #[serde(default)]
    pub call_stack: Vec<Value>,
}

/// Locate and parse the JSON payload in a command's stdout.
///
/// The payload is found heuristically between the first `{` and the last
/// `}` - the debugger may print other output around it. Returns `None`
/// when no well-formed object can be recovered.
pub fn extract_context(output: &Output) -> Option<Value> {
    if !output.stderr.is_empty() {
        warn!(
            "Diagnostics received during context dump: {:?}",
            output.stderr
        );
    }
    if output.stdout.is_empty() {
        warn!("No stdout received for context dump command");
        return None;
    }

    let joined: String = output.stdout.concat();
    let first = joined.find('{')?;
    let last = joined.rfind('}')?;
    if last <= first {
        warn!("Could not locate a JSON object in context dump output");
        return None;
    }

    match serde_json::from_str(&joined[first..=last]) {
        Ok(value) => {
            debug!("Parsed context dump");
            Some(value)
        }
        Err(e) => {
            warn!("Failed to parse context dump JSON: {e}");
            None
        }
    }
}

/// Parse a context dump into the typed [`FrameContext`] view.
pub fn extract_frame_context(output: &Output) -> Option<FrameContext> {
    let value = extract_context(output)?;
    match serde_json::from_value(value) {
        Ok(ctx) => Some(ctx),
        Err(e) => {
            warn!("Context dump did not match the expected shape: {e}");
            None
        }
    }
}

/// Execute the context dump command on a live channel and parse the
/// result. Parse failure yields `Ok(None)`, not an error.
pub async fn fetch_context(
    channel: &mut SessionChannel,
    timeout: Duration,
) -> Result<Option<Value>, SessionError> {
    let output = channel.send_and_await(CONTEXT_DUMP_COMMAND, timeout).await?;
    Ok(extract_context(&output))
}
