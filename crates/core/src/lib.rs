// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Core library for resched: scheduling restic backups and handling
//! graceful shutdown.
//!
//! The [`Scheduler`] turns a schedule expression (a cron expression or the
//! special value [`SCHEDULE_ONCE`]) into recurring or one-shot executions of
//! a backup function, serialized behind a single-slot gate. The default
//! backup function is [`backup`], which drives the restic executable through
//! a pluggable [`CommandRunner`].

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod backup;
mod exec;
mod options;
mod scheduler;

#[cfg(test)]
mod test_support;

pub use backup::{backup, BackupError, ResticCommand};
pub use exec::{CommandRunner, ExecError, Invocation, OsRunner};
pub use options::{
    with_env, with_password, with_repository, with_restic, with_runner, Opt, Options,
    OptionsError, ENV_RESTIC_PASSWORD, ENV_RESTIC_PASSWORD_COMMAND, ENV_RESTIC_PASSWORD_FILE,
    ENV_RESTIC_REPOSITORY, ENV_RESTIC_REPOSITORY_FILE,
};
pub use scheduler::{BackupFn, ScheduleError, Scheduler, SCHEDULE_ONCE};
