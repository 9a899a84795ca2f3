//! The polychatd binary.

use std::io::{BufRead, BufReader};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use assert_cmd::prelude::*;

fn polychatd() -> Command {
    Command::cargo_bin("polychatd").unwrap()
}

#[test]
fn version_flag_prints_version() {
    for flag in ["--version", "-v", "-V"] {
        let output = polychatd().arg(flag).output().unwrap();
        assert!(output.status.success());
        let stdout = String::from_utf8_lossy(&output.stdout);
        assert_eq!(stdout.trim(), format!("polychatd {}", env!("CARGO_PKG_VERSION")));
    }
}

#[test]
fn help_flag_prints_usage() {
    let output = polychatd().arg("--help").output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("USAGE:"));
    assert!(stdout.contains("POLYCHAT_LISTEN"));
}

#[test]
fn unexpected_argument_fails() {
    let output = polychatd().arg("--bogus").output().unwrap();
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("unexpected argument '--bogus'"));
}

#[test]
fn starts_prints_ready_and_stops_on_sigterm() {
    let state = tempfile::tempdir().unwrap();
    let mut child = polychatd()
        .env("POLYCHAT_STATE_DIR", state.path())
        .env("POLYCHAT_CONFIG", state.path().join("hub.toml"))
        .env("POLYCHAT_LISTEN", "127.0.0.1:0")
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .unwrap();

    let stdout = child.stdout.take().unwrap();
    let mut line = String::new();
    BufReader::new(stdout).read_line(&mut line).unwrap();
    assert_eq!(line.trim(), "READY");

    let status = Command::new("kill")
        .args(["-TERM", &child.id().to_string()])
        .status()
        .unwrap();
    assert!(status.success());

    let deadline = Instant::now() + Duration::from_secs(5);
    let exit = loop {
        if let Some(exit) = child.try_wait().unwrap() {
            break exit;
        }
        if Instant::now() > deadline {
            let _ = child.kill();
            panic!("polychatd did not exit after SIGTERM");
        }
        std::thread::sleep(Duration::from_millis(20));
    };
    assert!(exit.success());

    let log = std::fs::read_to_string(state.path().join("hub.log")).unwrap();
    assert!(log.contains("--- polychatd: starting (pid: "));
}

#[test]
fn invalid_config_fails_startup() {
    let state = tempfile::tempdir().unwrap();
    let config = state.path().join("hub.toml");
    std::fs::write(&config, "[hub]\nrelay_workers = 0\n").unwrap();

    let output = polychatd()
        .env("POLYCHAT_STATE_DIR", state.path())
        .env("POLYCHAT_CONFIG", &config)
        .env("POLYCHAT_LISTEN", "127.0.0.1:0")
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("relay_workers"), "{stderr}");
}
