//! Subject Controller: attach/detach lifecycle and the scoped-attachment
//! guard that every memory-touching operation runs inside of.
//!
//! The one hard invariant from the design (the target must never remain
//! stopped on any exit path) is enforced structurally here: `ScopedAttach`
//! issues `PTRACE_DETACH` from its `Drop` impl, so early returns, `?`
//! propagation, and panics all still resume the target. This replaces the
//! original's `goto EXIT:` convention with a type the compiler enforces.

use std::fs::{File, OpenOptions};

use nix::sys::ptrace;
use nix::sys::wait::{waitpid, WaitPidFlag};
use nix::unistd::Pid;

use crate::error::{Result, ScanError};
use crate::scan::{Scan, ScanId};
use crate::value::ScanType;

/// An attached target process plus the scans searching it.
///
/// `Subject` itself does not hold the process stopped between operations
/// -- see `ScopedAttach` for the per-operation attach/detach.
pub struct Subject {
    pid: i32,
    scans: Vec<Scan>,
    next_id: u64,
}

impl Subject {
    pub fn pid(&self) -> i32 {
        self.pid
    }

    /// Allocate a new uninitialised scan of `ty`, owned by this subject.
    ///
    /// Never fails on resource exhaustion alone -- that surfaces the first
    /// time `Scan::update` tries to grow the hit list.
    pub fn begin_scan(&mut self, ty: ScanType) -> ScanId {
        let id = ScanId(self.next_id);
        self.next_id += 1;
        self.scans.push(Scan::new(id, ty));
        eprintln!("[subject] pid {}: began scan {:?} ({ty})", self.pid, id);
        id
    }

    pub fn scan(&self, id: ScanId) -> Option<&Scan> {
        self.scans.iter().find(|s| s.id() == id)
    }

    pub fn scan_mut(&mut self, id: ScanId) -> Option<&mut Scan> {
        self.scans.iter_mut().find(|s| s.id() == id)
    }

    pub fn scans(&self) -> &[Scan] {
        &self.scans
    }

    /// Produce an independent fork of `id`'s hit list, owned by the same
    /// subject, and return its new id.
    pub fn fork_scan(&mut self, id: ScanId) -> Option<ScanId> {
        let forked = {
            let original = self.scan(id)?;
            let new_id = ScanId(self.next_id);
            self.next_id += 1;
            original.fork(new_id)
        };
        let new_id = forked.id();
        self.scans.push(forked);
        Some(new_id)
    }

    /// Drop one scan, unlinking it from this subject.
    pub fn free_scan(&mut self, id: ScanId) {
        self.scans.retain(|s| s.id() != id);
    }
}

/// Attach to `pid`, wait for it to stop, then immediately detach.
///
/// This round trip serves purely as a liveness + permission probe (per the
/// design): if either step fails, no `Subject` is created and the target
/// is left exactly as found. On success the target is left running.
pub fn attach(pid: i32) -> Result<Subject> {
    if pid <= 0 {
        return Err(ScanError::Attach {
            pid,
            reason: "pid must be positive".to_string(),
        });
    }

    {
        let _probe = ScopedAttach::acquire(pid)?;
    }
    // probe detaches here via ScopedAttach::drop; target is left running.

    eprintln!("[subject] attached to pid {pid}");
    Ok(Subject {
        pid,
        scans: Vec::new(),
        next_id: 0,
    })
}

/// RAII guard around one ptrace attach/wait/detach cycle, with access to
/// the target's `/proc/<pid>/mem` file for the duration of the guard.
///
/// Every operation that touches target memory (`Scan::update`,
/// `Scan::refresh`, `Scan::set_value`) acquires one of these for its
/// entire duration and lets it drop at the end -- detach always runs,
/// even if the operation returns early via `?`.
pub struct ScopedAttach {
    pid: i32,
    mem: File,
}

impl ScopedAttach {
    pub fn acquire(pid: i32) -> Result<ScopedAttach> {
        let target = Pid::from_raw(pid);

        ptrace::attach(target).map_err(|errno| ScanError::Attach {
            pid,
            reason: errno.to_string(),
        })?;

        if let Err(errno) = waitpid(target, Some(WaitPidFlag::empty())) {
            // We attached but never confirmed the stop; still try to
            // detach so we don't leave the target wedged.
            let _ = ptrace::detach(target, None);
            return Err(ScanError::Wait {
                pid,
                reason: errno.to_string(),
            });
        }

        let mem_path = format!("/proc/{pid}/mem");
        let mem = match OpenOptions::new().read(true).write(true).open(&mem_path) {
            Ok(f) => f,
            Err(source) => {
                let _ = ptrace::detach(target, None);
                return Err(ScanError::MemOpen { pid, source });
            }
        };

        Ok(ScopedAttach { pid, mem })
    }

    pub fn pid(&self) -> i32 {
        self.pid
    }

    pub fn mem_file(&mut self) -> &mut File {
        &mut self.mem
    }
}

impl Drop for ScopedAttach {
    fn drop(&mut self) {
        let target = Pid::from_raw(self.pid);
        if let Err(errno) = ptrace::detach(target, None) {
            eprintln!(
                "[subject] warning: failed to detach from pid {}: {}",
                self.pid, errno
            );
        }
    }
}

#[cfg(test)]
impl Subject {
    /// Construct a `Subject` without an actual `attach` probe, for tests
    /// that only exercise scan bookkeeping against a fake pid.
    pub(crate) fn for_test(pid: i32) -> Subject {
        Subject {
            pid,
            scans: Vec::new(),
            next_id: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_nonpositive_pid() {
        assert!(attach(0).is_err());
        assert!(attach(-5).is_err());
    }

    #[test]
    fn begin_scan_assigns_distinct_ids() {
        let mut subject = Subject {
            pid: 1,
            scans: Vec::new(),
            next_id: 0,
        };
        let a = subject.begin_scan(ScanType::U32);
        let b = subject.begin_scan(ScanType::F64);
        assert_ne!(a, b);
        assert_eq!(subject.scans().len(), 2);
    }

    #[test]
    fn free_scan_removes_exactly_one() {
        let mut subject = Subject {
            pid: 1,
            scans: Vec::new(),
            next_id: 0,
        };
        let a = subject.begin_scan(ScanType::U32);
        let b = subject.begin_scan(ScanType::U32);
        subject.free_scan(a);
        assert!(subject.scan(a).is_none());
        assert!(subject.scan(b).is_some());
    }
}
