//! Session configuration.

use std::path::Path;
use std::time::Duration;

/// The prompt pdb prints when it is ready for the next command.
/// The trailing space is significant.
pub const PDB_PROMPT: &str = "(Pdb) ";

/// Configuration for one interactive subprocess session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Program to execute (interpreter or binary).
    pub program: String,

    /// Arguments passed to the program.
    pub args: Vec<String>,

    /// Extra environment variables for the subprocess, applied on top of
    /// the inherited environment.
    pub env: Vec<(String, String)>,

    /// Literal prompt marker signalling readiness for the next command.
    pub prompt_marker: String,

    /// Command sent to request a graceful exit during `stop()`.
    pub quit_command: String,

    /// Timeout for consuming the startup banner up to the first prompt.
    pub start_timeout: Duration,

    /// Default timeout for a command/response exchange.
    pub command_timeout: Duration,

    /// Grace period for the quit handshake before the process is killed.
    pub stop_timeout: Duration,

    /// Readiness-poll interval inside `read_until_prompt`.
    pub poll_interval: Duration,
}

impl SessionConfig {
    /// Create a configuration for an arbitrary prompt-driven program.
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            env: Vec::new(),
            prompt_marker: PDB_PROMPT.to_string(),
            quit_command: "quit".to_string(),
            start_timeout: Duration::from_secs(5),
            command_timeout: Duration::from_secs(5),
            stop_timeout: Duration::from_secs(5),
            poll_interval: Duration::from_millis(100),
        }
    }

    /// Create a configuration that runs `python3 -m pdb <script>`.
    ///
    /// Prepends the current working directory to `PYTHONPATH` so the
    /// context-extraction helper module is importable from inside pdb.
    pub fn pdb(target_script: impl AsRef<Path>) -> Self {
        let script = target_script.as_ref().to_string_lossy().into_owned();
        let mut config = Self::new(
            "python3",
            vec!["-m".to_string(), "pdb".to_string(), script],
        );

        let pythonpath = match std::env::var("PYTHONPATH") {
            Ok(existing) if !existing.is_empty() => format!(".:{existing}"),
            _ => ".".to_string(),
        };
        config.env.push(("PYTHONPATH".to_string(), pythonpath));
        config
    }

    /// Override the prompt marker.
    pub fn prompt_marker(mut self, marker: impl Into<String>) -> Self {
        self.prompt_marker = marker.into();
        self
    }

    /// Override the quit command.
    pub fn quit_command(mut self, command: impl Into<String>) -> Self {
        self.quit_command = command.into();
        self
    }

    /// Override the default command timeout.
    pub fn command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    /// Add an environment variable for the subprocess.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pdb_config_shape() {
        let config = SessionConfig::pdb("target.py");
        assert_eq!(config.program, "python3");
        assert_eq!(config.args, vec!["-m", "pdb", "target.py"]);
        assert_eq!(config.prompt_marker, "(Pdb) ");
        assert!(config
            .env
            .iter()
            .any(|(k, v)| k == "PYTHONPATH" && v.starts_with('.')));
    }

    #[test]
    fn test_builder_overrides() {
        let config = SessionConfig::new("sh", vec!["-i".to_string()])
            .prompt_marker("$ ")
            .quit_command("exit");
        assert_eq!(config.prompt_marker, "$ ");
        assert_eq!(config.quit_command, "exit");
    }
}
