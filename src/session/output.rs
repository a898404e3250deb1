//! Output type for a single command/response exchange.

use serde::Serialize;

/// Output produced by the subprocess in response to one command.
///
/// Immutable once returned: `stdout` holds the lines framed by the prompt
/// marker, `stderr` holds whatever diagnostic lines arrived during the same
/// read window. The two streams are independent and only loosely ordered
/// relative to each other.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Output {
    /// Completed stdout lines, prompt marker excluded.
    pub stdout: Vec<String>,

    /// Diagnostic (stderr) lines, recorded verbatim.
    pub stderr: Vec<String>,

    /// Whether the prompt marker was actually seen.
    ///
    /// `false` means the read ended on a timeout or on end-of-stream and the
    /// contents are best-effort partial output.
    pub prompt_seen: bool,
}

impl Output {
    /// Create an output whose framing prompt was detected.
    pub fn completed(stdout: Vec<String>, stderr: Vec<String>) -> Self {
        Self {
            stdout,
            stderr,
            prompt_seen: true,
        }
    }

    /// Create a best-effort output (timeout or end-of-stream before the
    /// prompt marker).
    pub fn partial(stdout: Vec<String>, stderr: Vec<String>) -> Self {
        Self {
            stdout,
            stderr,
            prompt_seen: false,
        }
    }

    /// Check whether both streams are empty.
    pub fn is_empty(&self) -> bool {
        self.stdout.is_empty() && self.stderr.is_empty()
    }

    /// Join the stdout lines for display.
    pub fn stdout_text(&self) -> String {
        self.stdout.join("\n")
    }

    /// Join the stderr lines for display.
    pub fn stderr_text(&self) -> String {
        self.stderr.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_completed_vs_partial() {
        let done = Output::completed(vec!["a".into()], vec![]);
        assert!(done.prompt_seen);

        let partial = Output::partial(vec![], vec!["warning".into()]);
        assert!(!partial.prompt_seen);
        assert!(!partial.is_empty());
    }

    #[test]
    fn test_display_text() {
        let out = Output::completed(vec!["one".into(), "two".into()], vec![]);
        assert_eq!(out.stdout_text(), "one\ntwo");
        assert_eq!(out.stderr_text(), "");
    }
}
