//! The interactive subprocess channel.
//!
//! Owns one prompt-driven subprocess and provides the command/response
//! primitive over its three standard pipes: write one command line, then
//! read both output streams until the prompt marker signals readiness for
//! the next command.

use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use log::{debug, error, info, warn};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::mpsc;
use tokio::time::{Instant, timeout};

use super::buffer::PromptBuffer;
use super::config::SessionConfig;
use super::output::Output;
use crate::error::SessionError;

/// Bounded wait for the process to die after a forced kill.
const KILL_WAIT: Duration = Duration::from_secs(5);

/// Capacity of the stderr line queue.
const STDERR_QUEUE: usize = 256;

/// Channel to one interactive subprocess.
///
/// Strictly turn-based: a single caller writes one command, then reads the
/// framed reply. The channel multiplexes stdout and stderr internally;
/// stderr is drained line-by-line through a dedicated reader task so the
/// main read loop never blocks on it.
///
/// # Example
///
/// ```rust,no_run
/// use replpilot::{SessionChannel, SessionConfig};
/// use std::time::Duration;
///
/// # async fn example() -> Result<(), replpilot::Error> {
/// let mut channel = SessionChannel::new(SessionConfig::pdb("target.py"));
/// channel.start().await?;
///
/// let output = channel.send_and_await("next", Duration::from_secs(5)).await?;
/// println!("{}", output.stdout_text());
///
/// channel.stop().await;
/// # Ok(())
/// # }
/// ```
pub struct SessionChannel {
    /// Configuration for this session.
    config: SessionConfig,

    /// The subprocess handle (None when not started).
    child: Option<Child>,

    /// Subprocess stdin (owned exclusively).
    stdin: Option<ChildStdin>,

    /// Subprocess stdout, read raw so the prompt marker can be found
    /// mid-line.
    stdout: Option<ChildStdout>,

    /// Completed stderr lines forwarded by the reader task.
    stderr_rx: Option<mpsc::Receiver<String>>,

    /// Accumulated stdout bytes; carries bytes read past a detected prompt
    /// over to the next read cycle.
    buffer: PromptBuffer,

    /// Startup banner captured by `start()`, framed by the first prompt.
    initial_output: Option<Output>,

    /// Exit status of the most recently reaped subprocess.
    last_exit_status: Option<ExitStatus>,
}

/// One observation from the read loop.
enum ReadStep {
    Stdout(std::io::Result<usize>),
    StderrLine(String),
    StderrClosed,
    Idle,
}

impl SessionChannel {
    /// Create a channel for the given configuration. Does not spawn
    /// anything; call [`start`](Self::start).
    pub fn new(config: SessionConfig) -> Self {
        let buffer = PromptBuffer::new(config.prompt_marker.as_bytes().to_vec());
        Self {
            config,
            child: None,
            stdin: None,
            stdout: None,
            stderr_rx: None,
            buffer,
            initial_output: None,
            last_exit_status: None,
        }
    }

    /// Launch the subprocess and consume its startup banner up to the
    /// first prompt.
    ///
    /// Calling `start` on an already-started channel is a no-op with a
    /// warning. Fails with [`SessionError::Spawn`] if the program cannot be
    /// launched and [`SessionError::ExitedEarly`] if it dies before
    /// emitting the first prompt.
    pub async fn start(&mut self) -> Result<(), SessionError> {
        if self.child.is_some() {
            warn!("Session already started; ignoring start()");
            return Ok(());
        }

        let mut child = Command::new(&self.config.program)
            .args(&self.config.args)
            .envs(self.config.env.iter().map(|(k, v)| (k, v)))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| SessionError::Spawn {
                program: self.config.program.clone(),
                source: e,
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| std::io::Error::other("stdin pipe missing"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| std::io::Error::other("stdout pipe missing"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| std::io::Error::other("stderr pipe missing"))?;

        info!(
            "Started '{}' (pid {:?})",
            self.config.program,
            child.id()
        );

        // Dedicated reader task: forwards completed stderr lines so the
        // main loop can poll them without risking partial-line loss on
        // cancellation.
        let (tx, rx) = mpsc::channel(STDERR_QUEUE);
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if tx.send(line).await.is_err() {
                    break;
                }
            }
        });

        self.child = Some(child);
        self.stdin = Some(stdin);
        self.stdout = Some(stdout);
        self.stderr_rx = Some(rx);
        self.buffer.clear();
        self.last_exit_status = None;

        let initial = self.read_until_prompt(self.config.start_timeout).await;
        debug!(
            "Initial output: {} stdout / {} stderr lines",
            initial.stdout.len(),
            initial.stderr.len()
        );

        if !initial.prompt_seen && !self.is_alive() {
            let status = self.last_exit_status.and_then(|s| s.code());
            self.stop().await;
            return Err(SessionError::ExitedEarly { status });
        }

        self.initial_output = Some(initial);
        Ok(())
    }

    /// Read both streams until the prompt marker appears in stdout, the
    /// stdout stream ends, or the timeout elapses.
    ///
    /// Prompt detection splits the accumulated buffer at the *first*
    /// marker occurrence: everything before becomes completed lines, the
    /// marker is consumed, and the remainder stays buffered for the next
    /// call. End-of-stream flushes the buffer and returns immediately
    /// regardless of remaining timeout. A timeout is not an error: the
    /// partial result is returned with `prompt_seen == false` and a
    /// warning is logged.
    pub async fn read_until_prompt(&mut self, timeout: Duration) -> Output {
        if self.child.is_none() {
            warn!("read_until_prompt() on a channel that is not started");
            return Output::partial(Vec::new(), Vec::new());
        }

        let deadline = Instant::now() + timeout;
        let mut stdout_lines: Vec<String> = Vec::new();
        let mut stderr_lines: Vec<String> = Vec::new();
        let mut chunk = [0u8; 4096];

        loop {
            // Carryover from a previous read may already contain the next
            // prompt, so check before reading anything new.
            if let Some(before) = self.buffer.split_at_marker() {
                push_lines(&mut stdout_lines, &before);
                return Output::completed(stdout_lines, stderr_lines);
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            let poll = remaining.min(self.config.poll_interval);

            let step = match (self.stdout.as_mut(), self.stderr_rx.as_mut()) {
                (Some(out), Some(err)) => tokio::select! {
                    res = out.read(&mut chunk) => ReadStep::Stdout(res),
                    line = err.recv() => match line {
                        Some(line) => ReadStep::StderrLine(line),
                        None => ReadStep::StderrClosed,
                    },
                    () = tokio::time::sleep(poll) => ReadStep::Idle,
                },
                (Some(out), None) => tokio::select! {
                    res = out.read(&mut chunk) => ReadStep::Stdout(res),
                    () = tokio::time::sleep(poll) => ReadStep::Idle,
                },
                // stdout already hit end-of-stream in an earlier call
                (None, _) => break,
            };

            match step {
                ReadStep::Stdout(Ok(0)) => {
                    debug!("Subprocess stdout reached end-of-stream");
                    self.stdout = None;
                    self.record_exit();
                    let rest = self.buffer.take();
                    push_lines(&mut stdout_lines, &rest);
                    return Output::partial(stdout_lines, stderr_lines);
                }
                ReadStep::Stdout(Ok(n)) => self.buffer.extend(&chunk[..n]),
                ReadStep::Stdout(Err(e)) => {
                    // Transient; retried within the same timeout window.
                    warn!("Error reading subprocess stdout: {e}");
                }
                ReadStep::StderrLine(line) => stderr_lines.push(line),
                ReadStep::StderrClosed => self.stderr_rx = None,
                ReadStep::Idle => {}
            }
        }

        warn!(
            "Prompt marker {:?} not seen within {:?}; returning partial output",
            self.config.prompt_marker, timeout
        );
        let rest = self.buffer.take();
        push_lines(&mut stdout_lines, &rest);
        Output::partial(stdout_lines, stderr_lines)
    }

    /// Write a command line to the subprocess and read its framed reply.
    ///
    /// A failed write means the input pipe is broken (the subprocess has
    /// exited); the channel reaps the dead process before returning
    /// [`SessionError::BrokenPipe`].
    pub async fn send_and_await(
        &mut self,
        command: &str,
        read_timeout: Duration,
    ) -> Result<Output, SessionError> {
        let stdin = self.stdin.as_mut().ok_or(SessionError::NotStarted)?;

        let payload = format!("{command}\n");
        let write = async {
            stdin.write_all(payload.as_bytes()).await?;
            stdin.flush().await
        };
        if let Err(e) = write.await {
            warn!("Failed to write command to subprocess: {e}");
            self.stop().await;
            return Err(SessionError::BrokenPipe);
        }
        debug!("Sent command: {command}");

        Ok(self.read_until_prompt(read_timeout).await)
    }

    /// Write a command line and read its framed reply using the
    /// configured default [`SessionConfig::command_timeout`].
    pub async fn send_command(&mut self, command: &str) -> Result<Output, SessionError> {
        self.send_and_await(command, self.config.command_timeout)
            .await
    }

    /// Stop the subprocess: quit command, bounded graceful wait, then a
    /// forced kill with a second bounded wait.
    ///
    /// Idempotent - safe on an already-stopped or never-started channel.
    /// All pipe handles are released on every path and the channel may be
    /// `start`ed again afterwards.
    pub async fn stop(&mut self) {
        let Some(mut child) = self.child.take() else {
            debug!("stop() on a channel with no live process");
            return;
        };

        if let Ok(Some(status)) = child.try_wait() {
            info!("Subprocess already exited with {status}");
            self.last_exit_status = Some(status);
        } else {
            if let Some(mut stdin) = self.stdin.take() {
                let quit = format!("{}\n", self.config.quit_command);
                let write = async {
                    stdin.write_all(quit.as_bytes()).await?;
                    stdin.flush().await
                };
                match write.await {
                    Ok(()) => debug!("Sent quit command '{}'", self.config.quit_command),
                    Err(e) => warn!("Failed to send quit command: {e}"),
                }
                // Dropping stdin closes the pipe, which unblocks REPLs
                // waiting on input.
            }

            match timeout(self.config.stop_timeout, child.wait()).await {
                Ok(Ok(status)) => {
                    info!("Subprocess exited gracefully with {status}");
                    self.last_exit_status = Some(status);
                }
                Ok(Err(e)) => warn!("Error waiting for subprocess exit: {e}"),
                Err(_) => {
                    warn!(
                        "Subprocess did not exit within {:?} after quit; killing",
                        self.config.stop_timeout
                    );
                    if let Err(e) = child.start_kill() {
                        warn!("Failed to kill subprocess: {e}");
                    }
                    match timeout(KILL_WAIT, child.wait()).await {
                        Ok(Ok(status)) => self.last_exit_status = Some(status),
                        _ => error!("Subprocess failed to terminate after kill"),
                    }
                }
            }
        }

        self.stdin = None;
        self.stdout = None;
        self.stderr_rx = None;
        self.buffer.clear();
        debug!("Session resources cleaned up");
    }

    /// Check whether the subprocess is currently running.
    pub fn is_alive(&mut self) -> bool {
        match self.child.as_mut() {
            Some(child) => match child.try_wait() {
                Ok(Some(status)) => {
                    self.last_exit_status = Some(status);
                    false
                }
                Ok(None) => true,
                Err(e) => {
                    warn!("Failed to poll subprocess status: {e}");
                    false
                }
            },
            None => false,
        }
    }

    /// Check whether `start()` has been called without a matching `stop()`.
    pub fn is_started(&self) -> bool {
        self.child.is_some()
    }

    /// The startup banner captured by `start()`.
    pub fn initial_output(&self) -> Option<&Output> {
        self.initial_output.as_ref()
    }

    /// Exit code of the most recently reaped subprocess, if any.
    pub fn last_exit_code(&self) -> Option<i32> {
        self.last_exit_status.and_then(|s| s.code())
    }

    /// The configuration this channel was built with.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    fn record_exit(&mut self) {
        if let Some(child) = self.child.as_mut()
            && let Ok(Some(status)) = child.try_wait()
        {
            self.last_exit_status = Some(status);
        }
    }
}

/// Decode a byte region into completed lines.
fn push_lines(lines: &mut Vec<String>, data: &[u8]) {
    if data.is_empty() {
        return;
    }
    let text = String::from_utf8_lossy(data);
    lines.extend(text.lines().map(str::to_string));
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A minimal prompt-driven fake REPL built on /bin/sh: prints a
    /// banner and a prompt, then echoes each command back under a fresh
    /// prompt until told to quit.
    const FAKE_REPL: &str = r#"
printf 'banner line\n(Pdb) '
while read cmd; do
  case "$cmd" in
    quit) exit 0 ;;
    die) printf 'bye\n'; exit 3 ;;
    slow) printf 'thinking\n'; sleep 10 ;;
    stderr) printf 'oops\n' >&2; sleep 0.3; printf '(Pdb) ' ;;
    *) printf 'echo:%s\n(Pdb) ' "$cmd" ;;
  esac
done
"#;

    fn sh_config(script: &str) -> SessionConfig {
        let _ = env_logger::builder().is_test(true).try_init();
        SessionConfig::new("sh", vec!["-c".to_string(), script.to_string()])
    }

    #[tokio::test]
    async fn test_start_captures_banner() {
        let mut channel = SessionChannel::new(sh_config(FAKE_REPL));
        channel.start().await.unwrap();

        let initial = channel.initial_output().unwrap();
        assert!(initial.prompt_seen);
        assert_eq!(initial.stdout, vec!["banner line"]);

        channel.stop().await;
    }

    #[tokio::test]
    async fn test_start_twice_is_noop() {
        let mut channel = SessionChannel::new(sh_config(FAKE_REPL));
        channel.start().await.unwrap();
        channel.start().await.unwrap();
        assert!(channel.is_started());
        channel.stop().await;
    }

    #[tokio::test]
    async fn test_send_and_await_frames_reply() {
        let mut channel = SessionChannel::new(sh_config(FAKE_REPL));
        channel.start().await.unwrap();

        let output = channel
            .send_and_await("hello", Duration::from_secs(5))
            .await
            .unwrap();
        assert!(output.prompt_seen);
        assert_eq!(output.stdout, vec!["echo:hello"]);
        // The marker never leaks into returned stdout
        assert!(output.stdout.iter().all(|l| !l.contains("(Pdb) ")));

        channel.stop().await;
    }

    #[tokio::test]
    async fn test_carryover_past_marker_is_retained() {
        // Single write containing output, a prompt, and the start of the
        // next reply. The bytes after the marker must survive into the
        // next read cycle.
        let script = r#"printf 'abc(Pdb) def\n(Pdb) '; sleep 2"#;
        let mut channel = SessionChannel::new(sh_config(script));
        channel.start().await.unwrap();

        assert_eq!(channel.initial_output().unwrap().stdout, vec!["abc"]);

        let next = channel.read_until_prompt(Duration::from_secs(2)).await;
        assert!(next.prompt_seen);
        assert_eq!(next.stdout, vec!["def"]);

        channel.stop().await;
    }

    #[tokio::test]
    async fn test_eof_returns_before_timeout() {
        let mut channel = SessionChannel::new(sh_config(FAKE_REPL));
        channel.start().await.unwrap();

        let started = std::time::Instant::now();
        let output = channel
            .send_and_await("die", Duration::from_secs(30))
            .await
            .unwrap();
        assert!(started.elapsed() < Duration::from_secs(10));
        assert!(!output.prompt_seen);
        assert_eq!(output.stdout, vec!["bye"]);

        channel.stop().await;
        assert_eq!(channel.last_exit_code(), Some(3));
    }

    #[tokio::test]
    async fn test_send_command_uses_configured_timeout() {
        let config = sh_config(FAKE_REPL).command_timeout(Duration::from_millis(800));
        let mut channel = SessionChannel::new(config);
        channel.start().await.unwrap();

        let output = channel.send_command("hello").await.unwrap();
        assert!(output.prompt_seen);
        assert_eq!(output.stdout, vec!["echo:hello"]);

        // The configured default bounds the read: the `slow` reply never
        // prompts, so the call must come back once 800ms elapse.
        let started = std::time::Instant::now();
        let output = channel.send_command("slow").await.unwrap();
        assert!(!output.prompt_seen);
        assert_eq!(output.stdout, vec!["thinking"]);
        assert!(started.elapsed() < Duration::from_secs(5));

        channel.stop().await;
    }

    #[tokio::test]
    async fn test_timeout_returns_partial_output() {
        let mut channel = SessionChannel::new(sh_config(FAKE_REPL));
        channel.start().await.unwrap();

        let output = channel
            .send_and_await("slow", Duration::from_millis(800))
            .await
            .unwrap();
        assert!(!output.prompt_seen);
        assert_eq!(output.stdout, vec!["thinking"]);

        channel.stop().await;
    }

    #[tokio::test]
    async fn test_stderr_lines_recorded() {
        let mut channel = SessionChannel::new(sh_config(FAKE_REPL));
        channel.start().await.unwrap();

        let output = channel
            .send_and_await("stderr", Duration::from_secs(5))
            .await
            .unwrap();
        assert!(output.prompt_seen);
        assert_eq!(output.stderr, vec!["oops"]);

        channel.stop().await;
    }

    #[tokio::test]
    async fn test_broken_pipe_after_exit() {
        let mut channel = SessionChannel::new(sh_config(FAKE_REPL));
        channel.start().await.unwrap();

        let _ = channel
            .send_and_await("die", Duration::from_secs(5))
            .await
            .unwrap();

        // The process is gone; the next write must surface as BrokenPipe
        // and the channel must have reaped the child.
        let err = channel
            .send_and_await("anything", Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::BrokenPipe));
        assert!(!channel.is_started());
    }

    #[tokio::test]
    async fn test_stop_is_idempotent() {
        let mut channel = SessionChannel::new(sh_config(FAKE_REPL));
        channel.start().await.unwrap();

        channel.stop().await;
        assert!(!channel.is_started());
        channel.stop().await;
        assert!(!channel.is_started());

        // Never-started channels are safe to stop too
        let mut fresh = SessionChannel::new(sh_config(FAKE_REPL));
        fresh.stop().await;
        assert!(!fresh.is_started());
    }

    #[tokio::test]
    async fn test_restart_after_stop() {
        let mut channel = SessionChannel::new(sh_config(FAKE_REPL));
        channel.start().await.unwrap();
        channel.stop().await;

        channel.start().await.unwrap();
        let output = channel
            .send_and_await("again", Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(output.stdout, vec!["echo:again"]);
        channel.stop().await;
    }

    #[tokio::test]
    async fn test_spawn_failure() {
        let mut channel =
            SessionChannel::new(SessionConfig::new("definitely-not-a-real-binary", vec![]));
        let err = channel.start().await.unwrap_err();
        assert!(matches!(err, SessionError::Spawn { .. }));
    }

    #[tokio::test]
    async fn test_immediate_exit_is_start_error() {
        let script = r#"printf 'dying\n'; exit 1"#;
        let mut channel = SessionChannel::new(sh_config(script));
        let err = channel.start().await.unwrap_err();
        assert!(matches!(err, SessionError::ExitedEarly { .. }));
    }

    #[tokio::test]
    async fn test_send_before_start() {
        let mut channel = SessionChannel::new(sh_config(FAKE_REPL));
        let err = channel
            .send_and_await("next", Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::NotStarted));
    }
}
