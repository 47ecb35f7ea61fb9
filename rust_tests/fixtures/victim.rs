//! Cooperating test fixture: holds a known marker value in writable memory
//! and accepts line commands on stdin to mutate or report it. Spawned by
//! `scan_integration.rs` as a real process to attach to and scan.

use std::io::{self, BufRead, Write};

fn main() {
    let mut marker: i32 = 1_234_554;
    // Keep it on the heap so it isn't optimised into a register.
    let mut boxed = Box::new(marker);

    println!("ready {}", std::process::id());
    io::stdout().flush().ok();

    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = match line {
            Ok(l) => l,
            Err(_) => break,
        };
        let line = line.trim();

        if line == "quit" {
            break;
        } else if line == "print" {
            marker = *boxed;
            println!("value {marker}");
        } else if let Some(rest) = line.strip_prefix("set ") {
            if let Ok(v) = rest.trim().parse::<i32>() {
                *boxed = v;
                marker = v;
            }
            println!("ok");
        } else {
            println!("unknown");
        }
        io::stdout().flush().ok();
    }
}
