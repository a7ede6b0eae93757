// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! resched: schedule restic backups and shut down gracefully on
//! SIGINT/SIGTERM.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod config;

use std::sync::Arc;

use clap::Parser;
use resched_core::{with_env, Scheduler};
use tracing_subscriber::EnvFilter;

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::parse();
    let scheduler = Arc::new(Scheduler::new());

    if !config.backup_schedule.is_empty() {
        scheduler.schedule_backup(
            &config.backup_schedule,
            &config.backup_path,
            vec![with_env(config.restic_env())],
        )?;
    }

    let run = {
        let scheduler = Arc::clone(&scheduler);
        tokio::spawn(async move { scheduler.run().await })
    };

    shutdown_signal().await?;

    // The single shutdown call for this process: stops the dispatch loop and
    // drains any in-flight backup before we exit.
    scheduler.shutdown().await;
    run.await?;
    Ok(())
}

/// Wait for SIGINT or SIGTERM.
async fn shutdown_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut term = signal(SignalKind::terminate())?;
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = term.recv() => {}
    }
    tracing::info!("shutdown signal received");
    Ok(())
}
