//! Audit trail for one orchestration run.

use serde::Serialize;

use crate::session::Output;

/// What a history entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    /// The startup banner captured by `start()`, before any command.
    InitialCapture,

    /// A command that was sent to the subprocess.
    Command,

    /// The final-summary request issued after `task_complete`.
    SummaryRequest,

    /// The oracle call itself failed (an `"error:"`-prefixed reply).
    OracleError,

    /// The oracle declared it cannot proceed (`task_error`).
    OracleAbort,
}

/// One round of the decision loop, append-only once recorded.
#[derive(Debug, Clone, Serialize)]
pub struct HistoryEntry {
    /// Step index: 0 for the pre-loop captures, then 1..N.
    pub step: usize,

    /// What this entry records.
    pub kind: EntryKind,

    /// The command actually sent to the subprocess, after any alias
    /// rewrite. `None` for entries that sent nothing.
    pub executed_command: Option<String>,

    /// The oracle's raw suggestion, verbatim.
    pub suggested_command: Option<String>,

    /// The prompt that was sent to the oracle for this round.
    pub oracle_prompt: Option<String>,

    /// The subprocess output produced by this round.
    pub output: Option<Output>,
}

impl HistoryEntry {
    /// Entry for the startup banner.
    pub fn initial_capture(output: Output) -> Self {
        Self {
            step: 0,
            kind: EntryKind::InitialCapture,
            executed_command: None,
            suggested_command: None,
            oracle_prompt: None,
            output: Some(output),
        }
    }

    /// Entry for an executed command.
    pub fn command(
        step: usize,
        executed: impl Into<String>,
        suggested: impl Into<String>,
        oracle_prompt: Option<String>,
        output: Output,
    ) -> Self {
        Self {
            step,
            kind: EntryKind::Command,
            executed_command: Some(executed.into()),
            suggested_command: Some(suggested.into()),
            oracle_prompt,
            output: Some(output),
        }
    }

    /// Entry for the final-summary request.
    pub fn summary_request(
        step: usize,
        suggested: impl Into<String>,
        summary_prompt: String,
    ) -> Self {
        Self {
            step,
            kind: EntryKind::SummaryRequest,
            executed_command: None,
            suggested_command: Some(suggested.into()),
            oracle_prompt: Some(summary_prompt),
            output: None,
        }
    }

    /// Entry for a failed oracle call.
    pub fn oracle_error(step: usize, reply: impl Into<String>, oracle_prompt: String) -> Self {
        Self {
            step,
            kind: EntryKind::OracleError,
            executed_command: None,
            suggested_command: Some(reply.into()),
            oracle_prompt: Some(oracle_prompt),
            output: None,
        }
    }

    /// Entry for an oracle-declared abort.
    pub fn oracle_abort(step: usize, suggested: impl Into<String>, oracle_prompt: String) -> Self {
        Self {
            step,
            kind: EntryKind::OracleAbort,
            executed_command: None,
            suggested_command: Some(suggested.into()),
            oracle_prompt: Some(oracle_prompt),
            output: None,
        }
    }
}

/// How the orchestration run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChainOutcome {
    /// The oracle declared the task complete and produced a summary.
    Completed,

    /// The run failed: start failure, oracle failure, or `task_error`.
    Errored,

    /// The step budget ran out before a terminal command.
    Exhausted,

    /// The subprocess died mid-run.
    ChannelDied,
}

/// The structured report produced exactly once per run.
#[derive(Debug, Clone, Serialize)]
pub struct ChainResult {
    /// Ordered audit trail; step indices are 0 for the pre-loop captures,
    /// then strictly increasing 1..N.
    pub history: Vec<HistoryEntry>,

    /// The oracle's final summary, or the failure summary for errored
    /// runs. `None` when the step budget was exhausted.
    pub final_summary: Option<String>,

    /// How the run terminated.
    pub outcome: ChainOutcome,
}

impl ChainResult {
    /// Count entries that actually sent a command to the subprocess.
    pub fn executed_commands(&self) -> usize {
        self.history
            .iter()
            .filter(|e| e.executed_command.is_some())
            .count()
    }

    /// Iterate over the loop entries (step >= 1).
    pub fn steps(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.history.iter().filter(|e| e.step >= 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_serializes_to_json() {
        let result = ChainResult {
            history: vec![
                HistoryEntry::initial_capture(Output::completed(vec!["banner".into()], vec![])),
                HistoryEntry::command(
                    1,
                    "next",
                    "next",
                    Some("prompt".into()),
                    Output::completed(vec![], vec![]),
                ),
            ],
            final_summary: None,
            outcome: ChainOutcome::Exhausted,
        };

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["outcome"], "exhausted");
        assert_eq!(json["history"][0]["kind"], "initial_capture");
        assert_eq!(json["history"][1]["executed_command"], "next");
    }

    #[test]
    fn test_executed_command_count() {
        let result = ChainResult {
            history: vec![
                HistoryEntry::initial_capture(Output::default()),
                HistoryEntry::command(1, "next", "next", None, Output::default()),
                HistoryEntry::summary_request(2, "task_complete", "summary prompt".into()),
            ],
            final_summary: Some("done".into()),
            outcome: ChainOutcome::Completed,
        };
        assert_eq!(result.executed_commands(), 1);
        assert_eq!(result.steps().count(), 2);
    }
}
