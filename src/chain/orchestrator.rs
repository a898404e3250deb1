//! The bounded decision loop driving one debugging session.

use std::time::Duration;

use log::{error, info, warn};

use super::history::{ChainOutcome, ChainResult, HistoryEntry};
use super::prompt::{DUMP_ALIAS, TASK_COMPLETE, TASK_ERROR, step_prompt, summary_prompt};
use crate::context::CONTEXT_DUMP_COMMAND;
use crate::oracle::{DecisionOracle, is_error_reply};
use crate::session::{Output, SessionChannel};

/// Configuration for one orchestration run.
#[derive(Debug, Clone)]
pub struct ChainConfig {
    /// The task the oracle is asked to solve.
    pub task: String,

    /// Identity of the debugged target, embedded in oracle prompts.
    pub target: String,

    /// Maximum number of decision-loop steps.
    pub max_steps: usize,

    /// Timeout for ordinary command/response exchanges.
    pub command_timeout: Duration,

    /// Timeout for the (slower) context-dump command.
    pub context_timeout: Duration,
}

impl ChainConfig {
    /// Create a configuration with the default budgets.
    pub fn new(task: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            task: task.into(),
            target: target.into(),
            max_steps: 10,
            command_timeout: Duration::from_secs(5),
            context_timeout: Duration::from_secs(15),
        }
    }

    /// Override the step budget.
    pub fn max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }
}

/// Drives the closed decision loop: read output, ask the oracle, forward
/// the chosen command, repeat until a terminal condition.
///
/// Owns the [`SessionChannel`] exclusively for the duration of the run -
/// the protocol is single-writer, single-reader by design. The channel is
/// always stopped before the result is returned, on every terminal path.
pub struct SessionOrchestrator<O> {
    channel: SessionChannel,
    oracle: O,
    config: ChainConfig,
}

impl<O: DecisionOracle> SessionOrchestrator<O> {
    /// Create an orchestrator over a not-yet-started channel.
    pub fn new(channel: SessionChannel, oracle: O, config: ChainConfig) -> Self {
        Self {
            channel,
            oracle,
            config,
        }
    }

    /// Run the decision loop to completion and produce the final report.
    ///
    /// Never fails past this boundary: every terminal path - including
    /// start failure and a dead subprocess - is folded into the returned
    /// [`ChainResult`].
    pub async fn run(mut self) -> ChainResult {
        let mut history: Vec<HistoryEntry> = Vec::new();

        if let Err(e) = self.channel.start().await {
            error!("Failed to start session: {e}");
            self.channel.stop().await;
            return ChainResult {
                history,
                final_summary: Some(format!("Error: failed to start session: {e}")),
                outcome: ChainOutcome::Errored,
            };
        }

        let initial = self.channel.initial_output().cloned().unwrap_or_default();
        info!(
            "Initial state captured: {} stdout / {} stderr lines",
            initial.stdout.len(),
            initial.stderr.len()
        );
        history.push(HistoryEntry::initial_capture(initial));

        // The debugger stops at the first executable line; a full context
        // dump right away gives the oracle something to work from.
        let mut latest: Output = match self
            .channel
            .send_and_await(CONTEXT_DUMP_COMMAND, self.config.context_timeout)
            .await
        {
            Ok(output) => {
                history.push(HistoryEntry::command(
                    0,
                    CONTEXT_DUMP_COMMAND,
                    "initial dump",
                    None,
                    output.clone(),
                ));
                output
            }
            Err(e) => {
                warn!("Session died during the initial context dump: {e}");
                return self.finish(history, ChainOutcome::ChannelDied, Some(died_summary()))
                    .await;
            }
        };

        let mut outcome = ChainOutcome::Exhausted;
        let mut final_summary: Option<String> = None;

        for step in 1..=self.config.max_steps {
            info!("--- Chain step {step}/{} ---", self.config.max_steps);

            let prompt = step_prompt(&self.config.task, &self.config.target, &latest);
            let suggestion = self.oracle.ask(&prompt).await;

            if is_error_reply(&suggestion) {
                error!("Oracle failed to provide a command: {suggestion}");
                history.push(HistoryEntry::oracle_error(step, suggestion.clone(), prompt));
                final_summary = Some(suggestion);
                outcome = ChainOutcome::Errored;
                break;
            }

            let command = suggestion.trim();

            if command.eq_ignore_ascii_case(TASK_COMPLETE) {
                info!("Oracle declared the task complete; requesting final summary");
                let sprompt = summary_prompt(&self.config.task, &self.config.target);
                let summary = self.oracle.ask(&sprompt).await;
                history.push(HistoryEntry::summary_request(step, suggestion.clone(), sprompt));
                final_summary = Some(summary);
                outcome = ChainOutcome::Completed;
                break;
            }

            if command.eq_ignore_ascii_case(TASK_ERROR) {
                warn!("Oracle declared it cannot proceed");
                history.push(HistoryEntry::oracle_abort(step, suggestion.clone(), prompt));
                final_summary = Some(format!(
                    "Oracle declared {TASK_ERROR}. Last suggestion: '{command}'"
                ));
                outcome = ChainOutcome::Errored;
                break;
            }

            // Only the 'dump' alias is rewritten; everything else is
            // forwarded verbatim, malformed or not. Whatever diagnostics
            // come back feed the next oracle prompt.
            let executed = if command.eq_ignore_ascii_case(DUMP_ALIAS) {
                CONTEXT_DUMP_COMMAND.to_string()
            } else {
                command.to_string()
            };

            match self
                .channel
                .send_and_await(&executed, self.config.command_timeout)
                .await
            {
                Ok(output) => {
                    history.push(HistoryEntry::command(
                        step,
                        executed,
                        suggestion,
                        Some(prompt),
                        output.clone(),
                    ));
                    latest = output;

                    if !self.channel.is_alive() {
                        warn!("Subprocess terminated during step {step}");
                        final_summary = Some(died_summary());
                        outcome = ChainOutcome::ChannelDied;
                        break;
                    }
                }
                Err(e) => {
                    warn!("Channel broke during step {step}: {e}");
                    final_summary = Some(died_summary());
                    outcome = ChainOutcome::ChannelDied;
                    break;
                }
            }
        }

        self.finish(history, outcome, final_summary).await
    }

    async fn finish(
        mut self,
        history: Vec<HistoryEntry>,
        outcome: ChainOutcome,
        final_summary: Option<String>,
    ) -> ChainResult {
        self.channel.stop().await;
        info!("Chain finished: {outcome:?}");
        ChainResult {
            history,
            final_summary,
            outcome,
        }
    }
}

fn died_summary() -> String {
    "Error: session subprocess terminated unexpectedly.".to_string()
}
