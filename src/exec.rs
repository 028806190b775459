//! Child-process execution.
//!
//! All external tools (package managers, per-tool scripts) run synchronously
//! through an [`Executor`].  Streaming execution drains stdout and stderr on
//! two scoped reader threads so a chatty child can never block on a full
//! pipe buffer before it is reaped.
use anyhow::{Context, Result};
use std::io::{BufRead as _, BufReader, Read};
use std::path::Path;
use std::process::{Command, Output, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::MerlinError;

static CANCELLED: AtomicBool = AtomicBool::new(false);

/// Record that the user asked to cancel the running command.
pub fn request_cancel() {
    CANCELLED.store(true, Ordering::SeqCst);
}

/// Whether a cancellation signal has been received.
#[must_use]
pub fn is_cancelled() -> bool {
    CANCELLED.load(Ordering::SeqCst)
}

/// Result of a command execution.
#[derive(Debug, Clone, Default)]
pub struct ExecResult {
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
    /// Whether the process exited with status zero.
    pub success: bool,
    /// Exit code; `None` when terminated by a signal.
    pub code: Option<i32>,
}

impl From<Output> for ExecResult {
    fn from(output: Output) -> Self {
        Self {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            success: output.status.success(),
            code: output.status.code(),
        }
    }
}

/// Abstraction over process execution so package providers and the script
/// runner can be exercised without spawning real tools.
pub trait Executor: Send + Sync + std::fmt::Debug {
    /// Run a command, failing with [`MerlinError::ExternalToolFailure`] on a
    /// non-zero exit.
    ///
    /// # Errors
    ///
    /// Returns an error if the process cannot be spawned or exits non-zero.
    fn run(&self, program: &str, args: &[&str]) -> Result<ExecResult>;

    /// Run a command and return its result whatever the exit status.
    ///
    /// # Errors
    ///
    /// Returns an error only if the process cannot be spawned.
    fn run_unchecked(&self, program: &str, args: &[&str]) -> Result<ExecResult>;

    /// Run `program` in `dir` with extra environment variables, passing every
    /// output line (stdout and stderr) to `on_line` as it arrives.
    ///
    /// The exit status is reported in the result, not as an error.
    ///
    /// # Errors
    ///
    /// Returns an error only if the process cannot be spawned or waited on.
    fn run_streaming(
        &self,
        dir: &Path,
        program: &Path,
        env: &[(&str, &str)],
        on_line: &(dyn Fn(&str) + Sync),
    ) -> Result<ExecResult>;

    /// Whether `program` is available on `PATH`.
    fn which(&self, program: &str) -> bool;
}

/// [`Executor`] that spawns real processes.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemExecutor;

impl Executor for SystemExecutor {
    fn run(&self, program: &str, args: &[&str]) -> Result<ExecResult> {
        let mut cmd = Command::new(program);
        cmd.args(args);
        execute_checked(cmd, program)
    }

    fn run_unchecked(&self, program: &str, args: &[&str]) -> Result<ExecResult> {
        let output = Command::new(program)
            .args(args)
            .output()
            .with_context(|| format!("failed to execute: {program}"))?;
        Ok(ExecResult::from(output))
    }

    fn run_streaming(
        &self,
        dir: &Path,
        program: &Path,
        env: &[(&str, &str)],
        on_line: &(dyn Fn(&str) + Sync),
    ) -> Result<ExecResult> {
        let mut cmd = Command::new(program);
        cmd.current_dir(dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        for (k, v) in env {
            cmd.env(k, v);
        }

        let mut child = cmd
            .spawn()
            .with_context(|| format!("failed to execute: {}", program.display()))?;
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let (out, err) = std::thread::scope(|s| {
            let out = s.spawn(move || drain(stdout, on_line));
            let err = s.spawn(move || drain(stderr, on_line));
            (
                out.join().unwrap_or_default(),
                err.join().unwrap_or_default(),
            )
        });

        let status = child
            .wait()
            .with_context(|| format!("waiting for {}", program.display()))?;
        Ok(ExecResult {
            stdout: out,
            stderr: err,
            success: status.success(),
            code: status.code(),
        })
    }

    fn which(&self, program: &str) -> bool {
        which::which(program).is_ok()
    }
}

/// Read `pipe` to completion line by line, forwarding each line.
fn drain<R: Read>(pipe: Option<R>, on_line: &(dyn Fn(&str) + Sync)) -> String {
    let Some(pipe) = pipe else {
        return String::new();
    };
    let mut captured = String::new();
    for line in BufReader::new(pipe).lines().map_while(std::io::Result::ok) {
        on_line(&line);
        captured.push_str(&line);
        captured.push('\n');
    }
    captured
}

/// Execute a command and return the result, failing on non-zero exit.
fn execute_checked(mut cmd: Command, label: &str) -> Result<ExecResult> {
    let output = cmd
        .output()
        .with_context(|| format!("failed to execute: {label}"))?;
    let result = ExecResult::from(output);
    if !result.success {
        return Err(MerlinError::ExternalToolFailure {
            tool: label.to_string(),
            exit_code: result.code.unwrap_or(-1),
            output: result.stderr.trim().to_string(),
        }
        .into());
    }
    Ok(result)
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn run_echo() {
        let result = SystemExecutor.run("echo", &["hello"]).unwrap();
        assert!(result.success, "echo command should succeed");
        assert_eq!(result.stdout.trim(), "hello");
    }

    #[test]
    fn run_failure_is_external_tool_failure() {
        let err = SystemExecutor.run("false", &[]).unwrap_err();
        let typed = err.downcast_ref::<MerlinError>();
        assert!(
            matches!(typed, Some(MerlinError::ExternalToolFailure { tool, .. }) if tool == "false"),
            "expected ExternalToolFailure, got {err:?}"
        );
    }

    #[test]
    fn run_unchecked_failure() {
        let result = SystemExecutor.run_unchecked("false", &[]).unwrap();
        assert!(!result.success, "non-zero exit should set success=false");
        assert_eq!(result.code, Some(1));
    }

    #[test]
    fn which_finds_known_program() {
        assert!(SystemExecutor.which("sh"), "sh should be found on Unix");
    }

    #[test]
    fn which_missing_program() {
        assert!(
            !SystemExecutor.which("this-program-does-not-exist-12345"),
            "non-existent program should not be found"
        );
    }

    #[cfg(unix)]
    #[test]
    fn run_streaming_forwards_both_streams() {
        use std::os::unix::fs::PermissionsExt as _;

        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("noisy.sh");
        std::fs::write(
            &script,
            "#!/bin/sh\necho \"out $GREETING\"\necho err >&2\nexit 3\n",
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let seen = Mutex::new(Vec::new());
        let result = SystemExecutor
            .run_streaming(dir.path(), &script, &[("GREETING", "hi")], &|line| {
                seen.lock().unwrap().push(line.to_string());
            })
            .unwrap();

        assert!(!result.success);
        assert_eq!(result.code, Some(3));
        assert_eq!(result.stdout, "out hi\n");
        assert_eq!(result.stderr, "err\n");
        let mut lines = seen.into_inner().unwrap();
        lines.sort();
        assert_eq!(lines, vec!["err".to_string(), "out hi".to_string()]);
    }
}
