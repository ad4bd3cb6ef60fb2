use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, warn};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecOutput {
    pub stdout: String,
    pub stderr: String,
    pub succeeded: bool,
    pub timed_out: bool,
}

impl ExecOutput {
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: String::new(),
            succeeded: true,
            timed_out: false,
        }
    }

    pub fn failure(stderr: impl Into<String>) -> Self {
        Self {
            stdout: String::new(),
            stderr: stderr.into(),
            succeeded: false,
            timed_out: false,
        }
    }

    pub fn timeout() -> Self {
        Self {
            timed_out: true,
            ..Self::default()
        }
    }

    /// Trimmed stdout when the command succeeded with non-empty output.
    pub fn trimmed_stdout(&self) -> Option<&str> {
        if !self.succeeded {
            return None;
        }
        let trimmed = self.stdout.trim();
        (!trimmed.is_empty()).then_some(trimmed)
    }
}

/// External command execution and file reads, injected so collectors can be
/// exercised without spawning real processes. Implementations never fail;
/// every problem is reported through [`ExecOutput`].
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, program: &str, args: &[&str], timeout: Duration) -> ExecOutput;

    async fn read_file(&self, path: &str) -> Option<String> {
        tokio::fs::read_to_string(path).await.ok()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

#[async_trait]
impl CommandRunner for SystemRunner {
    async fn run(&self, program: &str, args: &[&str], timeout: Duration) -> ExecOutput {
        debug!(program, ?args, timeout_ms = timeout.as_millis() as u64, "running command");

        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn();
        let child = match child {
            Ok(child) => child,
            Err(err) => {
                debug!(program, "failed to spawn: {}", err);
                return ExecOutput::failure(format!("failed to run {program}: {err}"));
            }
        };

        // Dropping the wait future on expiry drops the child, which kills it.
        match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => ExecOutput {
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                succeeded: output.status.success(),
                timed_out: false,
            },
            Ok(Err(err)) => ExecOutput::failure(format!("failed to wait for {program}: {err}")),
            Err(_) => {
                warn!(
                    "{} timed out after {} ms",
                    program,
                    timeout.as_millis()
                );
                ExecOutput::timeout()
            }
        }
    }
}
