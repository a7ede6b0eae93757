// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::collections::HashMap;

use super::*;

fn env_opt(key: &str, value: &str) -> Opt {
    with_env(HashMap::from([(key.to_string(), value.to_string())]))
}

#[yare::parameterized(
    repository_and_password = { vec![with_repository("/some/repo"), with_password("some password")] },
    repository_file_and_password = {
        vec![env_opt(ENV_RESTIC_REPOSITORY_FILE, "/path/to/some/file"), with_password("some password")]
    },
    repository_and_password_file = {
        vec![with_repository("/some/repo"), env_opt(ENV_RESTIC_PASSWORD_FILE, "/path/to/some/file")]
    },
    repository_and_password_command = {
        vec![with_repository("/some/repo"), env_opt(ENV_RESTIC_PASSWORD_COMMAND, "/path/to/some/command")]
    },
)]
fn apply_accepts_every_one_of_combination(opts: Vec<Opt>) {
    assert!(Options::apply(&opts).is_ok());
}

#[yare::parameterized(
    repository_missing = {
        vec![with_password("some password")],
        "environment requires one of: RESTIC_REPOSITORY, RESTIC_REPOSITORY_FILE"
    },
    password_missing = {
        vec![with_repository("/some/repo")],
        "environment requires one of: RESTIC_PASSWORD, RESTIC_PASSWORD_FILE, RESTIC_PASSWORD_COMMAND"
    },
    nothing_set = {
        vec![],
        "environment requires one of: RESTIC_REPOSITORY, RESTIC_REPOSITORY_FILE"
    },
)]
fn apply_rejects_missing_group(opts: Vec<Opt>, message: &str) {
    let err = Options::apply(&opts).unwrap_err();
    assert_eq!(err.to_string(), message);
}

#[test]
fn empty_value_does_not_satisfy_a_group() {
    let opts = vec![with_repository(""), with_password("some password")];
    assert!(Options::apply(&opts).is_err());
}

#[test]
fn later_env_option_overwrites_earlier() {
    let opts = vec![
        with_repository("/first"),
        with_repository("/second"),
        with_password("some password"),
    ];
    let options = Options::apply(&opts).unwrap();
    assert_eq!(
        options.env().get(ENV_RESTIC_REPOSITORY).map(String::as_str),
        Some("/second")
    );
}

#[test]
fn invocation_uses_default_executable() {
    let opts = vec![with_repository("/some/repo"), with_password("pw")];
    let options = Options::apply(&opts).unwrap();
    let inv = options.invocation(["snapshots"]);
    assert_eq!(inv.program, "restic");
    assert_eq!(inv.args, vec!["snapshots"]);
    assert_eq!(
        inv.env.get(ENV_RESTIC_REPOSITORY).map(String::as_str),
        Some("/some/repo")
    );
}

#[test]
fn with_restic_overrides_the_executable() {
    let opts = vec![
        with_repository("/some/repo"),
        with_password("pw"),
        with_restic("/opt/restic/restic"),
    ];
    let options = Options::apply(&opts).unwrap();
    assert_eq!(options.invocation(["init"]).program, "/opt/restic/restic");
}
