// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Accumulable invocation options for calls to restic.
//!
//! Options are applied in order onto a defaulted [`Options`] record, which is
//! then validated once before the first subprocess is spawned and never
//! mutated afterwards.

use std::collections::HashMap;
use std::sync::Arc;

use crate::exec::{CommandRunner, Invocation, OsRunner};

/// Names of restic environment variables resched needs to keep track of.
pub const ENV_RESTIC_REPOSITORY: &str = "RESTIC_REPOSITORY";
pub const ENV_RESTIC_REPOSITORY_FILE: &str = "RESTIC_REPOSITORY_FILE";
pub const ENV_RESTIC_PASSWORD: &str = "RESTIC_PASSWORD";
pub const ENV_RESTIC_PASSWORD_FILE: &str = "RESTIC_PASSWORD_FILE";
pub const ENV_RESTIC_PASSWORD_COMMAND: &str = "RESTIC_PASSWORD_COMMAND";

/// Each group must be satisfied by at least one non-empty variable.
const REQUIRED_ENV: [&[&str]; 2] = [
    &[ENV_RESTIC_REPOSITORY, ENV_RESTIC_REPOSITORY_FILE],
    &[
        ENV_RESTIC_PASSWORD,
        ENV_RESTIC_PASSWORD_FILE,
        ENV_RESTIC_PASSWORD_COMMAND,
    ],
];

/// Errors raised while applying or validating options.
#[derive(Debug, thiserror::Error)]
pub enum OptionsError {
    #[error("environment requires one of: {}", alternatives.join(", "))]
    MissingEnv { alternatives: &'static [&'static str] },
}

/// One option-application step.
///
/// An `Opt` mutates the accumulating [`Options`] record. Options are cloneable
/// so the scheduler can re-apply the same list on every firing.
#[derive(Clone)]
pub struct Opt(Arc<dyn Fn(&mut Options) + Send + Sync>);

impl Opt {
    fn new(f: impl Fn(&mut Options) + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }
}

/// Validated configuration for invoking restic.
#[derive(Clone)]
pub struct Options {
    restic: String,
    env: HashMap<String, String>,
    runner: Arc<dyn CommandRunner>,
}

impl std::fmt::Debug for Options {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Options")
            .field("restic", &self.restic)
            .field("env", &self.env)
            .finish_non_exhaustive()
    }
}

impl Options {
    /// Build an `Options` record: set defaults, apply `opts` in order, then
    /// validate.
    pub fn apply(opts: &[Opt]) -> Result<Self, OptionsError> {
        // Defaults; may be overwritten further down the line.
        let mut options = Self {
            restic: "restic".to_string(),
            env: HashMap::new(),
            runner: Arc::new(OsRunner),
        };

        for opt in opts {
            (opt.0)(&mut options);
        }

        options.validate()?;
        Ok(options)
    }

    fn validate(&self) -> Result<(), OptionsError> {
        for alternatives in REQUIRED_ENV {
            let satisfied = alternatives
                .iter()
                .any(|var| self.env.get(*var).is_some_and(|v| !v.is_empty()));
            if !satisfied {
                return Err(OptionsError::MissingEnv { alternatives });
            }
        }
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn env(&self) -> &HashMap<String, String> {
        &self.env
    }

    pub(crate) fn runner(&self) -> &Arc<dyn CommandRunner> {
        &self.runner
    }

    /// Build a restic invocation with this record's environment.
    pub(crate) fn invocation(
        &self,
        args: impl IntoIterator<Item = impl Into<String>>,
    ) -> Invocation {
        Invocation::new(&self.restic, args, self.env.clone())
    }
}

/// Add the passed key/value pairs to the environment used to call restic.
///
/// A key that already has a value is overwritten with a warning: callers
/// applying options later in the list intentionally win.
pub fn with_env(env: HashMap<String, String>) -> Opt {
    Opt::new(move |options| {
        for (key, value) in &env {
            if options.env.contains_key(key) {
                tracing::warn!(key = %key, "replacing existing value in restic environment");
            }
            options.env.insert(key.clone(), value.clone());
        }
    })
}

/// Set the `RESTIC_REPOSITORY` environment variable.
pub fn with_repository(repo: impl Into<String>) -> Opt {
    with_env(HashMap::from([(
        ENV_RESTIC_REPOSITORY.to_string(),
        repo.into(),
    )]))
}

/// Set the `RESTIC_PASSWORD` environment variable.
pub fn with_password(password: impl Into<String>) -> Opt {
    with_env(HashMap::from([(
        ENV_RESTIC_PASSWORD.to_string(),
        password.into(),
    )]))
}

/// Override the restic executable path.
pub fn with_restic(path: impl Into<String>) -> Opt {
    let path = path.into();
    Opt::new(move |options| options.restic = path.clone())
}

/// Substitute the command runner used to invoke restic.
///
/// Intended for testing: it allows exercising restic invocations without
/// calling the real executable.
pub fn with_runner(runner: Arc<dyn CommandRunner>) -> Opt {
    Opt::new(move |options| options.runner = runner.clone())
}

#[cfg(test)]
#[path = "options_tests.rs"]
mod tests;
