// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The backup operation: probe the repository, initialize it if needed,
//! then run `restic backup`.

use std::fmt;

use tokio_util::sync::CancellationToken;

use crate::exec::ExecError;
use crate::options::{Opt, Options, OptionsError};

/// The restic subcommand a failure originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResticCommand {
    Snapshots,
    Init,
    Backup,
}

impl fmt::Display for ResticCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResticCommand::Snapshots => "snapshots",
            ResticCommand::Init => "init",
            ResticCommand::Backup => "backup",
        };
        f.write_str(name)
    }
}

/// Errors raised by the backup operation.
#[derive(Debug, thiserror::Error)]
pub enum BackupError {
    /// The invocation options did not validate; no subprocess was spawned.
    #[error("backup options: {0}")]
    Options(#[from] OptionsError),

    /// restic exited with a non-zero status.
    #[error("restic {command}: exit code {exit_code}")]
    Restic {
        command: ResticCommand,
        exit_code: i32,
        stderr: String,
    },

    /// The operation was cancelled before this step completed.
    #[error("restic {command}: cancelled")]
    Cancelled { command: ResticCommand },

    /// restic could not be spawned at all.
    #[error("restic {command}: {source}")]
    Spawn {
        command: ResticCommand,
        #[source]
        source: std::io::Error,
    },
}

impl BackupError {
    fn tag(command: ResticCommand, err: ExecError) -> Self {
        match err {
            ExecError::Exit { code, stderr } => BackupError::Restic {
                command,
                exit_code: code,
                stderr,
            },
            ExecError::Cancelled => BackupError::Cancelled { command },
            ExecError::Spawn(source) => BackupError::Spawn { command, source },
        }
    }

    /// Captured restic stderr, if this failure carries any.
    pub fn stderr(&self) -> Option<&str> {
        match self {
            BackupError::Restic { stderr, .. } if !stderr.is_empty() => Some(stderr),
            _ => None,
        }
    }

    /// True when the failure is a cancellation rather than a genuine error.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, BackupError::Cancelled { .. })
    }
}

/// Create a backup of `path` using restic.
///
/// If the repository is not yet initialized an `init` is attempted first.
/// Option validation happens before any subprocess is spawned. A cancellation
/// detected at any step short-circuits immediately; already completed steps
/// (a successful `init`) are not rolled back.
pub async fn backup(
    cancel: &CancellationToken,
    path: &str,
    opts: &[Opt],
) -> Result<(), BackupError> {
    let options = Options::apply(opts)?;

    if !repo_initialized(cancel, &options).await {
        initialize_repo(cancel, &options).await?;
    }

    options
        .runner()
        .run(cancel, options.invocation(["backup", path]))
        .await
        .map_err(|err| BackupError::tag(ResticCommand::Backup, err))
}

/// Probe repository existence by listing snapshots.
///
/// Any failure is collapsed to "not initialized": the probe is cheap
/// existence detection, not diagnosis, so a connectivity or auth error leads
/// to an init attempt too. The probe error is logged so masked failures stay
/// visible.
async fn repo_initialized(cancel: &CancellationToken, options: &Options) -> bool {
    match options
        .runner()
        .run(cancel, options.invocation(["snapshots"]))
        .await
    {
        Ok(()) => true,
        Err(err) => {
            tracing::warn!(%err, "repo initialization check encountered error");
            false
        }
    }
}

async fn initialize_repo(
    cancel: &CancellationToken,
    options: &Options,
) -> Result<(), BackupError> {
    options
        .runner()
        .run(cancel, options.invocation(["init"]))
        .await
        .map_err(|err| BackupError::tag(ResticCommand::Init, err))
}

#[cfg(test)]
#[path = "backup_tests.rs"]
mod tests;
