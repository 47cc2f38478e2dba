#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::wildcard_imports,
    clippy::indexing_slicing
)]
//! Integration tests for the `apply` command.
//!
//! These run the whole pipeline (configuration loading, task construction,
//! sequential execution and summary recording) against a scratch repository.

mod common;

use common::*;
use dotsync_cli::cli::ApplyOpts;
use dotsync_cli::logging::TaskStatus;
use dotsync_cli::tasks;

const FULL_CONFIG: &str = r#"
[vars]
email = "ada@example.com"

[[action]]
type = "copy"
source = "conf/app.ini"
target = "home/app.ini"

[[action]]
type = "mirror"
source = "A"
target = "C"

[[action]]
type = "template"
source = "git/gitconfig.tera"
target = "home/gitconfig"
name = "gitconfig"

[[action]]
type = "remove"
path = "home/stale"
recursive = true
"#;

fn full_repo() -> IntegrationTestContext {
    TestContextBuilder::new()
        .with_config(FULL_CONFIG)
        .with_file("conf/app.ini", "[ui]\ntheme = dark\n")
        .with_file("A/f1.txt", "hello")
        .with_file("A/B/f2.txt", "nested")
        .with_file("git/gitconfig.tera", "[user]\n\temail = {{ email }}\n")
        .with_file("home/stale/old.txt", "bye")
        .build()
}

#[test]
fn task_names_follow_file_order() {
    let ctx = TestContextBuilder::new()
        .with_config(
            r#"
[[action]]
type = "symlink"
source = "vimrc"
target = "~/.vimrc"
name = "vimrc"

[[action]]
type = "template"
source = "gitconfig.tera"
target = "home/gitconfig"

[[action]]
type = "run"
command = "echo hi"

[[watch]]
path = "Xresources"
command = "true"
"#,
        )
        .build();
    let config = ctx.load_config();
    let names: Vec<String> = tasks::all_apply_tasks(&config, true)
        .iter()
        .map(|t| t.name().to_string())
        .collect();
    insta::assert_snapshot!(names.join("\n"), @r"
    vimrc
    template home/gitconfig
    run echo hi
    watches
    ");
}

#[test]
fn apply_converges_every_action() {
    let ctx = full_repo();
    let (result, log) = ctx.apply(apply_opts());
    result.unwrap();

    assert_eq!(ctx.read("home/app.ini"), "[ui]\ntheme = dark\n");
    assert_eq!(ctx.read("C/f1.txt"), "hello");
    assert_eq!(ctx.read("C/B/f2.txt"), "nested");
    assert_eq!(
        ctx.read("home/gitconfig"),
        "[user]\n\temail = ada@example.com\n"
    );
    assert!(!ctx.path("home/stale").exists());

    let entries = log.task_entries();
    assert_eq!(entries.len(), 4);
    assert!(entries.iter().all(|e| e.status == TaskStatus::Ok));
}

#[test]
fn second_apply_changes_nothing() {
    let ctx = full_repo();
    ctx.apply(apply_opts()).0.unwrap();
    let before = std::fs::metadata(ctx.path("home/gitconfig"))
        .unwrap()
        .modified()
        .unwrap();

    let (result, log) = ctx.apply(apply_opts());
    result.unwrap();
    assert_eq!(log.failure_count(), 0);
    let after = std::fs::metadata(ctx.path("home/gitconfig"))
        .unwrap()
        .modified()
        .unwrap();
    assert_eq!(before, after);
}

#[test]
fn mirror_follows_source_changes() {
    let ctx = full_repo();
    ctx.apply(apply_opts()).0.unwrap();

    std::fs::remove_dir_all(ctx.path("A/B")).unwrap();
    ctx.write("A/f1.txt", "hello2");
    ctx.apply(apply_opts()).0.unwrap();

    let mut names: Vec<String> = std::fs::read_dir(ctx.path("C"))
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    assert_eq!(names, vec!["f1.txt"]);
    assert_eq!(ctx.read("C/f1.txt"), "hello2");
}

#[test]
fn conflict_stops_the_run() {
    let ctx = TestContextBuilder::new()
        .with_config(
            r#"
[[action]]
type = "symlink"
source = "vimrc"
target = "home/.vimrc"

[[action]]
type = "copy"
source = "vimrc"
target = "home/copied"
"#,
        )
        .with_file("vimrc", "set nu")
        .with_file("home/.vimrc/keep", "a real directory")
        .build();

    let (result, log) = ctx.apply(apply_opts());
    assert!(result.is_err());

    let entries = log.task_entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].status, TaskStatus::Failed);
    assert!(!ctx.path("home/copied").exists());
    assert_eq!(ctx.read("home/.vimrc/keep"), "a real directory");
}

#[test]
fn skip_filter_leaves_action_unapplied() {
    let ctx = full_repo();
    let opts = ApplyOpts {
        skip: vec!["gitconfig".to_string()],
        ..apply_opts()
    };
    let (result, log) = ctx.apply(opts);
    result.unwrap();

    assert!(!ctx.path("home/gitconfig").exists());
    let skipped: Vec<_> = log
        .task_entries()
        .into_iter()
        .filter(|e| e.status == TaskStatus::Skipped)
        .map(|e| e.name)
        .collect();
    assert_eq!(skipped, vec!["gitconfig"]);
}

#[test]
fn failing_command_is_fatal_unless_allowed() {
    let ctx = TestContextBuilder::new()
        .with_config(
            r#"
[[action]]
type = "run"
command = "exit 3"
allow_failure = true
silent = true

[[action]]
type = "run"
command = "exit 4"
silent = true
"#,
        )
        .build();

    let (result, log) = ctx.apply(apply_opts());
    let err = result.unwrap_err();
    assert!(format!("{err:#}").contains("exit 4"), "{err:#}");

    let entries = log.task_entries();
    assert_eq!(entries[0].status, TaskStatus::Skipped);
    assert_eq!(entries[0].message.as_deref(), Some("exit 3"));
    assert_eq!(entries[1].status, TaskStatus::Failed);
}

#[test]
fn missing_config_is_an_error() {
    let ctx = IntegrationTestContext::new();
    std::fs::remove_file(ctx.config_path()).unwrap();
    let (result, log) = ctx.apply(apply_opts());
    assert!(result.is_err());
    assert!(log.task_entries().is_empty());
}
