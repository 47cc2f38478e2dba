#![cfg(unix)]
#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::wildcard_imports,
    clippy::indexing_slicing
)]
//! Integration tests for `apply --watch`, driving the real binary.

mod common;

use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

use common::*;
use nix::sys::signal::{Signal, kill};
use nix::unistd::Pid;

const WATCH_CONFIG: &str = r#"
[settings]
interval_ms = 20

[[action]]
type = "template"
source = "motd.tera"
target = "home/motd"
watch = true
"#;

fn spawn_watch(ctx: &IntegrationTestContext) -> Child {
    Command::new(env!("CARGO_BIN_EXE_dotsync"))
        .arg("--config")
        .arg(ctx.config_path())
        .args(["apply", "--watch"])
        .env("XDG_CACHE_HOME", ctx.path("cache"))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("spawn dotsync")
}

/// Poll `check` every 20 ms until it holds or `limit` elapses.
fn wait_until(limit: Duration, mut check: impl FnMut() -> bool) -> bool {
    let started = Instant::now();
    while started.elapsed() < limit {
        if check() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(20));
    }
    false
}

#[test]
fn interrupt_stops_watch_with_success() {
    let ctx = TestContextBuilder::new()
        .with_config(WATCH_CONFIG)
        .with_file("motd.tera", "hi1")
        .build();
    let mut child = spawn_watch(&ctx);

    let rendered = wait_until(Duration::from_secs(10), || {
        std::fs::read_to_string(ctx.path("home/motd")).is_ok_and(|s| s == "hi1")
    });
    assert!(rendered, "initial apply did not render the template");

    // Edits made before the monitor is armed are absorbed, so keep editing
    // until one of them is picked up.
    let mut round = 1;
    let rerendered = wait_until(Duration::from_secs(10), || {
        round += 1;
        let expected = format!("hi{round}");
        ctx.write("motd.tera", &expected);
        wait_until(Duration::from_millis(300), || {
            std::fs::read_to_string(ctx.path("home/motd")).is_ok_and(|s| s == expected)
        })
    });
    assert!(rerendered, "watched template was not re-rendered");

    let pid = Pid::from_raw(i32::try_from(child.id()).unwrap());
    kill(pid, Signal::SIGINT).unwrap();

    let exited = wait_until(Duration::from_secs(10), || {
        child.try_wait().unwrap().is_some()
    });
    if !exited {
        let _ = child.kill();
    }
    let output = child.wait_with_output().unwrap();
    assert!(exited, "dotsync did not stop after SIGINT");
    assert_eq!(output.status.code(), Some(0));

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.matches("Watching 1 path(s)").count(), 1, "{stdout}");
    assert_eq!(stdout.matches("stopped watching").count(), 1, "{stdout}");
}

#[test]
fn watch_without_registrations_returns_immediately() {
    let ctx = TestContextBuilder::new()
        .with_config(
            r#"
[[action]]
type = "copy"
source = "a.txt"
target = "home/a.txt"
"#,
        )
        .with_file("a.txt", "a")
        .build();
    let mut child = spawn_watch(&ctx);

    let exited = wait_until(Duration::from_secs(10), || {
        child.try_wait().unwrap().is_some()
    });
    if !exited {
        let _ = child.kill();
    }
    let output = child.wait_with_output().unwrap();
    assert!(exited, "apply --watch with nothing to watch should not block");
    assert_eq!(output.status.code(), Some(0));
    assert_eq!(ctx.read("home/a.txt"), "a");
}
