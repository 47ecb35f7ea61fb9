//! End-to-end tests against a real cooperating child process.
//!
//! Spawns the `victim` fixture binary (which holds a known i32 marker
//! value on its heap), attaches to it, and drives a full scan/narrow/
//! set-value/eliminate/fork cycle through the public library API.

use std::io::{BufRead, BufReader, Write};
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::Duration;

use subject_scan::scan::ScanId;
use subject_scan::subject::{self, Subject};
use subject_scan::value::{ScanType, SearchOp, Value};

fn victim_path() -> String {
    let manifest_dir = env!("CARGO_MANIFEST_DIR");
    format!("{}/target/debug/victim", manifest_dir)
}

struct Victim {
    child: Child,
    stdout: BufReader<std::process::ChildStdout>,
}

impl Victim {
    fn spawn() -> Victim {
        let mut child = Command::new(victim_path())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .spawn()
            .expect("failed to spawn victim fixture (run `cargo build` first)");

        let stdout = BufReader::new(child.stdout.take().unwrap());
        let mut victim = Victim { child, stdout };
        let greeting = victim.read_line();
        assert!(greeting.starts_with("ready"), "unexpected greeting: {greeting}");
        victim
    }

    fn pid(&self) -> i32 {
        self.child.id() as i32
    }

    fn read_line(&mut self) -> String {
        let mut line = String::new();
        self.stdout.read_line(&mut line).expect("victim stdout closed");
        line.trim().to_string()
    }

    fn send(&mut self, command: &str) -> String {
        let stdin = self.child.stdin.as_mut().unwrap();
        writeln!(stdin, "{command}").unwrap();
        stdin.flush().unwrap();
        self.read_line()
    }
}

impl Drop for Victim {
    fn drop(&mut self) {
        let _ = self.send("quit");
        let _ = self.child.wait();
    }
}

fn attach(victim: &Victim) -> Subject {
    // Give the fixture a moment to settle past its startup print.
    thread::sleep(Duration::from_millis(50));
    subject::attach(victim.pid()).expect("attach should succeed against a live child")
}

#[test]
fn full_narrow_cycle_finds_and_tracks_the_marker() {
    let victim = Victim::spawn();
    let mut target = attach(&victim);

    let scan_id: ScanId = target.begin_scan(ScanType::I32);
    let scan = target.scan_mut(scan_id).unwrap();
    scan.update(target.pid(), SearchOp::Equal, Some(Value::I32(1_234_554)))
        .expect("initial sweep should succeed");

    assert!(
        !target.scan(scan_id).unwrap().hits().is_empty(),
        "expected at least one hit for the marker value"
    );
}

#[test]
fn update_after_mutation_narrows_to_survivors() {
    let mut victim = Victim::spawn();
    let mut target = attach(&victim);

    let scan_id = target.begin_scan(ScanType::I32);
    {
        let scan = target.scan_mut(scan_id).unwrap();
        scan.update(target.pid(), SearchOp::Equal, Some(Value::I32(1_234_554)))
            .unwrap();
    }
    let before = target.scan(scan_id).unwrap().hits().len();
    assert!(before > 0);

    assert_eq!(victim.send("set 42"), "ok");

    {
        let scan = target.scan_mut(scan_id).unwrap();
        scan.update(target.pid(), SearchOp::Equal, Some(Value::I32(42)))
            .unwrap();
    }
    assert!(!target.scan(scan_id).unwrap().hits().is_empty());
}

#[test]
fn set_value_writes_through_to_the_live_process() {
    let mut victim = Victim::spawn();
    let mut target = attach(&victim);

    let scan_id = target.begin_scan(ScanType::I32);
    {
        let scan = target.scan_mut(scan_id).unwrap();
        scan.update(target.pid(), SearchOp::Equal, Some(Value::I32(1_234_554)))
            .unwrap();
        scan.set_value(target.pid(), Value::I32(999)).unwrap();
    }

    assert_eq!(victim.send("print"), "value 999");
}

#[test]
fn eliminate_removes_one_hit_and_fork_is_independent() {
    let victim = Victim::spawn();
    let mut target = attach(&victim);

    let scan_id = target.begin_scan(ScanType::I32);
    {
        let scan = target.scan_mut(scan_id).unwrap();
        scan.update(target.pid(), SearchOp::Equal, Some(Value::I32(1_234_554)))
            .unwrap();
    }

    let forked_id = target.fork_scan(scan_id).expect("fork should succeed");
    let original_len = target.scan(scan_id).unwrap().hits().len();
    assert_eq!(target.scan(forked_id).unwrap().hits().len(), original_len);

    if original_len > 0 {
        target.scan_mut(scan_id).unwrap().eliminate(0);
        assert_eq!(target.scan(scan_id).unwrap().hits().len(), original_len - 1);
        // The fork is untouched by eliminating on the original.
        assert_eq!(target.scan(forked_id).unwrap().hits().len(), original_len);
    }
}

#[test]
fn attach_to_nonexistent_pid_fails() {
    let err = subject::attach(i32::MAX).unwrap_err();
    let message = err.to_string();
    assert!(message.contains("attach"));
}
