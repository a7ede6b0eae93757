// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scripted command runner used by backup and scheduler tests.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::exec::{CommandRunner, ExecError, Invocation};

/// One expected restic invocation: full argument vector (program first),
/// environment, and the exit code to replay.
pub(crate) struct ExpectedInvocation {
    pub args: Vec<String>,
    pub env: HashMap<String, String>,
    pub code: i32,
    pub stderr: String,
}

/// A runner that compares every call against a scripted list of expected
/// invocations and replays their exit codes. Honors cancellation the way the
/// real runner does: a cancelled token turns the call into
/// [`ExecError::Cancelled`].
pub(crate) struct ScriptedRunner {
    expected: Vec<ExpectedInvocation>,
    pos: Mutex<usize>,
}

impl ScriptedRunner {
    pub(crate) fn new(expected: Vec<ExpectedInvocation>) -> std::sync::Arc<Self> {
        std::sync::Arc::new(Self {
            expected,
            pos: Mutex::new(0),
        })
    }

    /// Number of calls made so far.
    pub(crate) fn calls(&self) -> usize {
        *self.pos.lock()
    }

    /// Assert that every scripted invocation was actually made.
    pub(crate) fn assert_complete(&self) {
        let pos = *self.pos.lock();
        assert_eq!(
            pos,
            self.expected.len(),
            "expected restic to be called {} times; was called {} times",
            self.expected.len(),
            pos
        );
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, cancel: &CancellationToken, inv: Invocation) -> Result<(), ExecError> {
        let pos = {
            let mut pos = self.pos.lock();
            assert!(
                *pos < self.expected.len(),
                "more restic calls than scripted: unexpected {:?}",
                inv
            );
            let current = *pos;
            *pos += 1;
            current
        };

        let expected = &self.expected[pos];
        let mut full_args = vec![inv.program.clone()];
        full_args.extend(inv.args.iter().cloned());
        assert_eq!(expected.args, full_args, "arguments don't match");
        assert_eq!(expected.env, inv.env, "environment doesn't match");

        if cancel.is_cancelled() {
            return Err(ExecError::Cancelled);
        }
        if expected.code != 0 {
            return Err(ExecError::Exit {
                code: expected.code,
                stderr: expected.stderr.clone(),
            });
        }
        Ok(())
    }
}
