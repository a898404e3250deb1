//! Oracle prompt construction.

use crate::context::CONTEXT_DUMP_COMMAND;
use crate::session::Output;

/// Reserved oracle reply: the task is done and a summary should follow.
pub const TASK_COMPLETE: &str = "task_complete";

/// Reserved oracle reply: the oracle cannot proceed.
pub const TASK_ERROR: &str = "task_error";

/// Alias reply rewritten to [`CONTEXT_DUMP_COMMAND`] before sending.
pub const DUMP_ALIAS: &str = "dump";

/// Build the per-step prompt embedding the task, the target identity and
/// the most recent subprocess output.
pub fn step_prompt(task: &str, target: &str, output: &Output) -> String {
    let parts = [
        format!(
            "You are an AI assistant controlling a Python debugger (pdb) to solve the following task: '{task}'."
        ),
        format!("You are debugging the script: '{target}'."),
        "The PDB session is live. Below is the most recent output from PDB, including stdout and stderr.".to_string(),
        "Your goal is to issue PDB commands to gather information and ultimately answer the task.".to_string(),
        "Standard PDB commands are available (e.g., next, step, continue, print <var>, where, list, args, locals, up, down, until, return, quit).".to_string(),
        format!(
            "You can also use the special command 'dump'. This will execute: `{CONTEXT_DUMP_COMMAND}` to get a JSON dump of the current frame, locals, and globals."
        ),
        "Based on the PDB output and the task, decide the *single* next PDB command to execute.".to_string(),
        format!(
            "If you believe you have enough information to answer the task, your command must be '{TASK_COMPLETE}'."
        ),
        format!(
            "If you encounter an unrecoverable error, or determine you cannot proceed or solve the task with PDB, your command must be '{TASK_ERROR}'."
        ),
        format!(
            "IMPORTANT: Return ONLY the PDB command itself (e.g., 'next', 'print my_variable', 'dump', '{TASK_COMPLETE}', '{TASK_ERROR}'). Do not include any explanations, conversational text, or markdown."
        ),
        "\n--- PDB Output ---".to_string(),
        "STDOUT:".to_string(),
        output.stdout_text(),
        "STDERR:".to_string(),
        output.stderr_text(),
        "\n--- End PDB Output ---".to_string(),
        format!("\nTask: {task}"),
        "\nWhat is the next PDB command? Return only the command:".to_string(),
    ];
    parts.join("\n")
}

/// Build the final-summary prompt issued after the oracle declares the
/// task complete.
pub fn summary_prompt(task: &str, target: &str) -> String {
    let parts = [
        format!(
            "You have been operating a Python debugger (pdb) on the script '{target}' to work on the task: '{task}'."
        ),
        format!(
            "You have just issued the '{TASK_COMPLETE}' command, indicating you have sufficient information to answer the task."
        ),
        "Please provide a concise summary of your findings and the direct answer to the initial task.".to_string(),
        "Focus on answering the original task based on your step-by-step analysis during the debugging session.".to_string(),
        "Do not output any PDB commands or debugging instructions. Provide only the summary and answer.".to_string(),
    ];
    parts.join("\n")
}
