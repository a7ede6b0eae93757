// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scheduling of recurring and one-shot backup jobs.
//!
//! The scheduler owns the single-slot concurrency gate and the shutdown
//! signal. Schedule expressions are either a cron expression (five or six
//! fields, or a preset like `@hourly`) or the special value
//! [`SCHEDULE_ONCE`], which runs the job immediately in a separate task.

use std::str::FromStr;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use cron::Schedule;
use futures_util::future::BoxFuture;
use parking_lot::Mutex;
use tokio::sync::{Notify, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::backup::{backup, BackupError};
use crate::options::Opt;

/// Special schedule value signaling that a job should be executed only once,
/// immediately.
pub const SCHEDULE_ONCE: &str = "once";

/// The scheduled function: called whenever it is time to create a backup.
///
/// Defaults to [`backup`]; tests substitute their own.
pub type BackupFn = Arc<
    dyn Fn(CancellationToken, String, Vec<Opt>) -> BoxFuture<'static, Result<(), BackupError>>
        + Send
        + Sync,
>;

/// Errors returned synchronously by scheduling calls.
#[derive(Debug, thiserror::Error)]
pub enum ScheduleError {
    #[error("add cron entry {schedule:?}: {source}")]
    Cron {
        schedule: String,
        #[source]
        source: cron::error::Error,
    },
}

/// Schedules backup jobs and coordinates graceful shutdown.
///
/// At most one job body executes at any instant, scheduler-wide: every
/// firing acquires a single-permit gate before running. [`Scheduler::shutdown`]
/// reuses that gate as a drain barrier.
pub struct Scheduler {
    backup_fn: Option<BackupFn>,
    inner: OnceLock<Arc<Inner>>,
}

struct Inner {
    backup_fn: BackupFn,
    /// Capacity exactly 1. `shutdown` relies on this: acquiring the last
    /// permit is only possible once no job is mid-execution, which gives
    /// "wait for drain" without a separate completion tracker.
    gate: Semaphore,
    /// Write-once broadcast; never un-cancelled.
    shutdown: CancellationToken,
    entries: Mutex<Vec<Entry>>,
    /// Nudges the dispatch loop to re-evaluate its sleep after registration.
    wakeup: Notify,
}

struct Entry {
    schedule: Schedule,
    job: Job,
}

type Job = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    /// A scheduler running the real backup operation.
    pub fn new() -> Self {
        Self {
            backup_fn: None,
            inner: OnceLock::new(),
        }
    }

    /// A scheduler running a custom scheduled function instead of [`backup`].
    pub fn with_backup_fn<F>(backup_fn: F) -> Self
    where
        F: Fn(CancellationToken, String, Vec<Opt>) -> BoxFuture<'static, Result<(), BackupError>>
            + Send
            + Sync
            + 'static,
    {
        Self {
            backup_fn: Some(Arc::new(backup_fn)),
            inner: OnceLock::new(),
        }
    }

    /// Lazy one-time setup, safe under concurrent first calls.
    fn inner(&self) -> &Arc<Inner> {
        self.inner.get_or_init(|| {
            Arc::new(Inner {
                backup_fn: self.backup_fn.clone().unwrap_or_else(default_backup_fn),
                gate: Semaphore::new(1),
                shutdown: CancellationToken::new(),
                entries: Mutex::new(Vec::new()),
                wakeup: Notify::new(),
            })
        })
    }

    /// Ensure the backup function is called according to `schedule`.
    ///
    /// With [`SCHEDULE_ONCE`] the job is launched immediately as an
    /// independent task and this returns without waiting for it; its outcome
    /// is observable only through logging. Otherwise `schedule` is parsed as
    /// a cron expression and a parse failure registers nothing.
    pub fn schedule_backup(
        &self,
        schedule: &str,
        path: &str,
        opts: Vec<Opt>,
    ) -> Result<(), ScheduleError> {
        let inner = self.inner();

        info!(schedule = %schedule, path = %path, "adding backup job");
        let job = inner.new_job(path.to_string(), opts);
        if schedule == SCHEDULE_ONCE {
            tokio::spawn(job());
            return Ok(());
        }

        let parsed = parse_schedule(schedule)?;
        inner.entries.lock().push(Entry {
            schedule: parsed,
            job,
        });
        inner.wakeup.notify_one();
        Ok(())
    }

    /// Run the dispatch loop in the calling task.
    ///
    /// Returns once [`Scheduler::shutdown`] raises the shutdown signal.
    pub async fn run(&self) {
        let inner = self.inner();
        loop {
            let now = Utc::now();
            let next = inner.next_fire_time(&now);

            tokio::select! {
                _ = inner.shutdown.cancelled() => break,
                _ = inner.wakeup.notified() => continue,
                _ = sleep_until(next) => inner.fire_due(&now),
            }
        }
        info!("scheduler dispatch loop stopped");
    }

    /// Gracefully shut down the scheduler.
    ///
    /// Raises the shutdown signal (stopping the dispatch loop and cancelling
    /// every outstanding job context), then blocks until any currently
    /// running job has finished or observed the cancellation and exited.
    /// Safe to call even if nothing was ever scheduled.
    pub async fn shutdown(&self) {
        // Init here so the signal and gate exist even without any schedule.
        let inner = self.inner();

        info!("shutting down scheduler");
        inner.shutdown.cancel();

        // Wait for running jobs by acquiring the gate. The permit is
        // forgotten, keeping the gate closed so nothing can start after
        // shutdown. This method is expected to be called at most once per
        // process lifetime.
        if let Ok(permit) = inner.gate.acquire().await {
            permit.forget();
        }
        info!("scheduler shutdown complete");
    }

    #[cfg(test)]
    pub(crate) fn entry_count(&self) -> usize {
        self.inner().entries.lock().len()
    }
}

impl Inner {
    /// Wrap the backup function into a job body that observes shutdown and
    /// serializes behind the gate.
    fn new_job(self: &Arc<Self>, path: String, opts: Vec<Opt>) -> Job {
        let inner = Arc::clone(self);
        Arc::new(move || {
            let inner = Arc::clone(&inner);
            let path = path.clone();
            let opts = opts.clone();
            Box::pin(async move { inner.run_job(path, opts).await })
        })
    }

    async fn run_job(&self, path: String, opts: Vec<Opt>) {
        // The job context derives from the shutdown signal, not from any
        // caller-supplied context: shutdown cancels every outstanding job.
        let cancel = self.shutdown.child_token();

        let permit = tokio::select! {
            permit = self.gate.acquire() => match permit {
                Ok(permit) => permit,
                Err(_) => return,
            },
            _ = cancel.cancelled() => {
                info!("shutdown requested before job start; skipping backup");
                return;
            }
        };

        info!(path = %path, "beginning backup");
        match (self.backup_fn)(cancel, path, opts).await {
            Ok(()) => info!("backup successfully completed"),
            Err(err) if err.is_cancelled() => info!(%err, "backup aborted by shutdown"),
            Err(err) => {
                warn!(%err, "error during backup");
                if let Some(stderr) = err.stderr() {
                    warn!(stderr = %stderr, "restic stderr");
                }
            }
        }

        drop(permit);
    }

    fn next_fire_time(&self, after: &DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.entries
            .lock()
            .iter()
            .filter_map(|entry| entry.schedule.after(after).next())
            .min()
    }

    /// Launch every entry whose next fire time after `after` has passed.
    fn fire_due(&self, after: &DateTime<Utc>) {
        let now = Utc::now();
        let entries = self.entries.lock();
        for entry in entries.iter() {
            let due = entry
                .schedule
                .after(after)
                .next()
                .is_some_and(|at| at <= now);
            if due {
                tokio::spawn((entry.job)());
            }
        }
    }
}

fn default_backup_fn() -> BackupFn {
    Arc::new(|cancel, path, opts| Box::pin(async move { backup(&cancel, &path, &opts).await }))
}

/// Parse a schedule expression.
///
/// The cron crate expects a seconds field; classic five-field expressions
/// are normalized by prepending `0` so they fire at second zero.
fn parse_schedule(schedule: &str) -> Result<Schedule, ScheduleError> {
    let normalized = if !schedule.starts_with('@') && schedule.split_whitespace().count() == 5 {
        format!("0 {schedule}")
    } else {
        schedule.to_string()
    };

    Schedule::from_str(&normalized).map_err(|source| ScheduleError::Cron {
        schedule: schedule.to_string(),
        source,
    })
}

async fn sleep_until(next: Option<DateTime<Utc>>) {
    match next {
        Some(at) => {
            let wait = (at - Utc::now()).to_std().unwrap_or(Duration::ZERO);
            tokio::time::sleep(wait).await;
        }
        // No entries registered: sleep until a wakeup or shutdown.
        None => std::future::pending().await,
    }
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
