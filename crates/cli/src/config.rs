// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Flag and environment configuration for the resched binary.
//!
//! Every flag can also be set through a `RESCHED_*` environment variable.
//! The repository and password-file flags are convenience shortcuts: a
//! `RESTIC_*` variable already present in the process environment always
//! wins over them.

use std::collections::HashMap;

use clap::Parser;
use resched_core::{ENV_RESTIC_PASSWORD_FILE, ENV_RESTIC_REPOSITORY};

#[derive(Debug, Parser)]
#[command(name = "resched", version, about = "Schedule restic backups")]
pub struct Config {
    /// Interval in which backups should be taken: a cron expression or "once".
    #[arg(long, env = "RESCHED_BACKUP_SCHEDULE", default_value = "@hourly")]
    pub backup_schedule: String,

    /// Directory to back up.
    #[arg(long, env = "RESCHED_BACKUP_PATH", default_value = "/")]
    pub backup_path: String,

    /// Location of the restic repository.
    ///
    /// Ignored if the RESTIC_REPOSITORY environment variable is set.
    #[arg(long, env = "RESCHED_RESTIC_REPOSITORY")]
    pub restic_repository: Option<String>,

    /// Path to a file containing the restic repository password.
    ///
    /// Ignored if the RESTIC_PASSWORD_FILE environment variable is set.
    #[arg(long, env = "RESCHED_RESTIC_PASSWORD_FILE")]
    pub restic_password_file: Option<String>,
}

impl Config {
    /// The environment propagated to restic: the full process environment
    /// with the repository and password-file flags filled in wherever the
    /// corresponding `RESTIC_*` variable is absent or empty.
    pub fn restic_env(&self) -> HashMap<String, String> {
        let mut env: HashMap<String, String> = std::env::vars().collect();
        overlay(
            &mut env,
            ENV_RESTIC_REPOSITORY,
            self.restic_repository.as_deref(),
        );
        overlay(
            &mut env,
            ENV_RESTIC_PASSWORD_FILE,
            self.restic_password_file.as_deref(),
        );
        env
    }
}

fn overlay(env: &mut HashMap<String, String>, key: &str, value: Option<&str>) {
    let Some(value) = value else { return };
    if value.is_empty() {
        return;
    }
    if env.get(key).is_some_and(|existing| !existing.is_empty()) {
        // Environment beats flags.
        return;
    }
    env.insert(key.to_string(), value.to_string());
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
