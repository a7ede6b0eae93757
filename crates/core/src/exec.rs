// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! External command invocation with cancellation support.

use std::collections::HashMap;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::AsyncReadExt;
use tokio_util::sync::CancellationToken;

/// One external command to run: program, argument vector, and the complete
/// child environment.
///
/// The environment REPLACES the child's inherited environment rather than
/// extending it, so restic only ever sees the variables resched decided to
/// pass along.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub env: HashMap<String, String>,
}

impl Invocation {
    pub fn new(
        program: impl Into<String>,
        args: impl IntoIterator<Item = impl Into<String>>,
        env: HashMap<String, String>,
    ) -> Self {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            env,
        }
    }
}

/// Errors reported by a [`CommandRunner`].
///
/// An `Exit` error is deliberately incomplete: the runner does not know which
/// restic subcommand it was asked to run. Callers tag the failure with that
/// information before propagating it.
#[derive(Debug, thiserror::Error)]
pub enum ExecError {
    /// The command ran to completion with a non-zero exit status.
    #[error("exit code {code}")]
    Exit { code: i32, stderr: String },

    /// The execution context was cancelled before the command completed.
    #[error("cancelled")]
    Cancelled,

    /// The command could not be spawned at all.
    #[error("failed to spawn: {0}")]
    Spawn(#[source] std::io::Error),
}

/// Runs one external command to completion or cancellation.
///
/// The single seam between the backup operation and the operating system;
/// tests substitute a scripted implementation.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `inv` to completion, or return promptly with
    /// [`ExecError::Cancelled`] once `cancel` fires.
    ///
    /// Spawns exactly one child process per call.
    async fn run(&self, cancel: &CancellationToken, inv: Invocation) -> Result<(), ExecError>;
}

/// The real OS-level runner backed by `tokio::process`.
#[derive(Debug, Default)]
pub struct OsRunner;

#[async_trait]
impl CommandRunner for OsRunner {
    async fn run(&self, cancel: &CancellationToken, inv: Invocation) -> Result<(), ExecError> {
        let mut command = tokio::process::Command::new(&inv.program);
        command
            .args(&inv.args)
            .env_clear()
            .envs(&inv.env)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let cmd_span = tracing::info_span!(
            "restic.cmd",
            program = %inv.program,
            args = ?inv.args,
            exit_code = tracing::field::Empty,
        );

        let mut child = command.spawn().map_err(ExecError::Spawn)?;

        // Drain stderr concurrently so a chatty child cannot block on a full
        // pipe while we wait for its exit status.
        let stderr_task = child.stderr.take().map(|mut pipe| {
            tokio::spawn(async move {
                let mut buf = Vec::new();
                let _ = pipe.read_to_end(&mut buf).await;
                String::from_utf8_lossy(&buf).into_owned()
            })
        });

        let status = tokio::select! {
            status = child.wait() => status.map_err(ExecError::Spawn)?,
            _ = cancel.cancelled() => {
                // Best effort: the child receives SIGKILL; we do not wait for
                // it to die before reporting the cancellation.
                let _ = child.start_kill();
                return Err(ExecError::Cancelled);
            }
        };

        let stderr = match stderr_task {
            Some(task) => task.await.unwrap_or_default(),
            None => String::new(),
        };

        let code = status.code().unwrap_or(-1);
        cmd_span.record("exit_code", code);

        if status.success() {
            Ok(())
        } else {
            Err(ExecError::Exit { code, stderr })
        }
    }
}

#[cfg(test)]
#[path = "exec_tests.rs"]
mod tests;
