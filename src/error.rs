//! Error taxonomy for the scan engine.
//!
//! Mirrors the kinds (not type names) from the design: attach/detach
//! failures are fatal to the operation in flight, per-address I/O failures
//! are fatal only to that address or region, and allocation failure during
//! hit-list growth is fatal to the current operation while leaving existing
//! hits untouched.

use std::io;

/// Errors surfaced by the scan engine.
///
/// `InputError` never actually originates inside this crate's library
/// modules -- it exists here so the CLI can report malformed commands
/// through the same type it already uses for everything else.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ScanError {
    #[error("failed to attach to pid {pid}: {reason}")]
    Attach { pid: i32, reason: String },

    #[error("failed to wait for pid {pid} to stop: {reason}")]
    Wait { pid: i32, reason: String },

    #[error("failed to detach from pid {pid}: {reason}")]
    Detach { pid: i32, reason: String },

    #[error("failed to read /proc/{pid}/maps: {source}")]
    MapsRead { pid: i32, source: io::Error },

    #[error("failed to open /proc/{pid}/mem: {source}")]
    MemOpen { pid: i32, source: io::Error },

    #[error("failed to read memory at 0x{address:x}: {source}")]
    MemoryRead { address: u64, source: io::Error },

    #[error("failed to write memory at 0x{address:x}: {source}")]
    MemoryWrite { address: u64, source: io::Error },

    #[error("invalid command: {0}")]
    Input(String),

    #[error("failed to grow hit list past {attempted} entries")]
    ResourceExhaustion { attempted: usize },
}

pub type Result<T> = std::result::Result<T, ScanError>;
