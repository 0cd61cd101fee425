//! Integration tests that run the `aterm` host binary as a process.

use std::io::{Read, Write};
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

const HOST: &str = env!("CARGO_BIN_EXE_aterm");
const SHELL: &str = env!("CARGO_BIN_EXE_aterm-shell");

fn spawn_host(driver: &[&str]) -> Child {
    Command::new(HOST)
        .arg("--")
        .args(driver)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("host must start")
}

/// Poll until the host exits, killing it and failing after `limit`.
fn wait_for_exit(host: &mut Child, limit: Duration) -> std::process::ExitStatus {
    let deadline = Instant::now() + limit;
    loop {
        if let Some(status) = host.try_wait().unwrap() {
            return status;
        }
        if Instant::now() >= deadline {
            let _ = host.kill();
            panic!("host still running {limit:?} after its driver finished");
        }
        thread::sleep(Duration::from_millis(50));
    }
}

/// The host exits with its driver even though stdin is still open.
#[cfg(unix)]
#[test]
fn host_exits_when_driver_exits_with_stdin_open() {
    let mut host = spawn_host(&["true"]);
    let _stdin = host.stdin.take();

    let status = wait_for_exit(&mut host, Duration::from_secs(10));

    assert!(status.success());
}

/// Everything the driver printed before exiting reaches stdout.
#[test]
fn host_flushes_driver_output_before_exit() {
    let mut host = spawn_host(&[SHELL]);
    let mut stdin = host.stdin.take().unwrap();
    stdin.write_all(b"exit\n").unwrap();

    let status = wait_for_exit(&mut host, Duration::from_secs(10));

    let mut stdout = String::new();
    host.stdout.take().unwrap().read_to_string(&mut stdout).unwrap();
    assert!(status.success());
    assert_eq!(stdout.lines().collect::<Vec<_>>(), ["init", "exit"]);
    drop(stdin);
}
