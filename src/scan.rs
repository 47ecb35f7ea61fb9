//! Scan Session: one in-progress search against a subject's memory.
//!
//! A `Scan` starts `Uninitialized` -- no hits yet, every operation must go
//! through a full region sweep (`scanner::scan_region`) -- and becomes
//! `Refined` after its first successful `update`, from which point every
//! further narrowing re-checks only its existing hits (`filter::refine`)
//! instead of sweeping the whole address space again. This mirrors the
//! original's two-phase `memory_search` / `memory_filter` split.

use std::fs::File;

use crate::error::{Result, ScanError};
use crate::filter::{self, PREVIEW_CAP};
use crate::maps;
use crate::scanner;
use crate::subject::ScopedAttach;
use crate::value::{ScanType, SearchOp, Value};

/// Starting capacity for a fresh scan's hit list, matching the original's
/// fixed initial allocation before its doubling-`realloc` growth kicks in.
const INITIAL_HIT_CAPACITY: usize = 65_536;

/// Identifies one `Scan` owned by a `Subject`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScanId(pub(crate) u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Uninitialized,
    Refined,
}

/// One search in progress: its type, its current hit addresses, and a
/// capped preview of their values.
pub struct Scan {
    id: ScanId,
    ty: ScanType,
    state: State,
    hits: Vec<u64>,
    values: Vec<Value>,
}

impl Scan {
    pub(crate) fn new(id: ScanId, ty: ScanType) -> Scan {
        Scan {
            id,
            ty,
            state: State::Uninitialized,
            hits: Vec::new(),
            values: Vec::new(),
        }
    }

    pub fn id(&self) -> ScanId {
        self.id
    }

    pub fn scan_type(&self) -> ScanType {
        self.ty
    }

    pub fn hits(&self) -> &[u64] {
        &self.hits
    }

    /// Up to the first `filter::PREVIEW_CAP` hits' most recently read
    /// values, in the same order as the corresponding prefix of `hits`.
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn is_initialized(&self) -> bool {
        self.state == State::Refined
    }

    /// Narrow the scan by `op`/`needle`.
    ///
    /// On an uninitialised scan this sweeps every scannable region of
    /// `pid`'s address space (`needle` is required here -- there is
    /// nothing to narrow against yet). On an already-initialised scan it
    /// re-checks only the scan's existing hits.
    pub fn update(&mut self, pid: i32, op: SearchOp, needle: Option<Value>) -> Result<()> {
        let mut attach = ScopedAttach::acquire(pid)?;

        match self.state {
            State::Uninitialized => {
                let needle = needle.ok_or_else(|| {
                    ScanError::Input("the first update on a scan requires a value".to_string())
                })?;
                self.initial_sweep(pid, attach.mem_file(), op, needle)?;
                self.state = State::Refined;
            }
            State::Refined => {
                self.refine(attach.mem_file(), op, needle)?;
            }
        }

        Ok(())
    }

    /// Re-read every current hit's value without narrowing the hit list.
    /// Equivalent to `update` with `SearchOp::Unchanged`, except it never
    /// requires a value and is a no-op (returns `Ok`) on an uninitialised
    /// scan.
    pub fn refresh(&mut self, pid: i32) -> Result<()> {
        if self.state == State::Uninitialized {
            return Ok(());
        }
        let mut attach = ScopedAttach::acquire(pid)?;
        self.refine(attach.mem_file(), SearchOp::Unchanged, None)
    }

    /// Write `value` into every current hit address, freezing them.
    pub fn set_value(&mut self, pid: i32, value: Value) -> Result<()> {
        use std::io::{Seek, SeekFrom, Write};

        let mut attach = ScopedAttach::acquire(pid)?;
        let mem = attach.mem_file();
        let bytes = value.encode();

        for &addr in &self.hits {
            if let Err(source) = mem.seek(SeekFrom::Start(addr)) {
                eprintln!("[scan] set_value: failed to seek to 0x{addr:x}: {source}");
                continue;
            }
            if let Err(source) = mem.write_all(&bytes) {
                eprintln!("[scan] set_value: failed to write 0x{addr:x}: {source}");
                continue;
            }
        }

        for preview in self.values.iter_mut() {
            *preview = value;
        }
        Ok(())
    }

    /// Drop one hit by its index into `hits()`. Uses `Vec::remove`, which
    /// shifts exactly the elements after `index` -- the original's
    /// equivalent `memmove` undercounted that shift by one and left a
    /// stale trailing duplicate.
    pub fn eliminate(&mut self, index: usize) {
        if index >= self.hits.len() {
            return;
        }
        self.hits.remove(index);
        if index < self.values.len() {
            self.values.remove(index);
        }
    }

    /// Produce an independent copy of this scan's current state under a
    /// new id, owned by the same subject.
    pub(crate) fn fork(&self, new_id: ScanId) -> Scan {
        Scan {
            id: new_id,
            ty: self.ty,
            state: self.state,
            hits: self.hits.clone(),
            values: self.values.clone(),
        }
    }

    fn initial_sweep(&mut self, pid: i32, mem: &mut File, op: SearchOp, needle: Value) -> Result<()> {
        let regions = maps::read_maps(pid)?;
        let width = self.ty.size();
        // Starting capacity mirrors the original's fixed 65536-entry initial
        // allocation for a fresh scan's hit array.
        let mut hits = Vec::with_capacity(INITIAL_HIT_CAPACITY);

        for region in regions.iter().filter(|r| r.is_scannable()) {
            let result = scanner::scan_region(mem, region, width, op, needle, |addr| {
                push_checked(&mut hits, addr)
            });
            if let Err(err) = result {
                match err {
                    ScanError::MemoryRead { .. } => {
                        eprintln!(
                            "[scan] skipping region 0x{:x}-0x{:x} after read error: {err}",
                            region.offset,
                            region.end()
                        );
                        continue;
                    }
                    other => return Err(other),
                }
            }
        }

        // Re-read the survivors' actual values for preview: for ordered
        // operators the matching byte pattern need not equal `needle`
        // itself, only satisfy `op` against it.
        let mut width_buf = vec![0u8; width];
        let values = hits
            .iter()
            .take(PREVIEW_CAP)
            .filter_map(|&addr| filter::read_one(mem, self.ty, addr, &mut width_buf))
            .collect::<Vec<_>>();

        eprintln!(
            "[scan] pid {pid}: initial sweep ({:?}, {}) found {} hit(s)",
            op,
            self.ty,
            hits.len()
        );

        self.hits = hits;
        self.values = values;
        Ok(())
    }

    fn refine(&mut self, mem: &mut File, op: SearchOp, needle: Option<Value>) -> Result<()> {
        let (survivors, preview) = filter::refine(mem, self.ty, op, needle, &self.hits)?;
        eprintln!(
            "[scan] refine ({:?}): {} of {} hit(s) survive",
            op,
            survivors.len(),
            self.hits.len()
        );
        self.hits = survivors;
        self.values = preview;
        Ok(())
    }
}

/// Push `addr` onto `hits`, surfacing `ResourceExhaustion` instead of
/// aborting the process if the allocator cannot grow the vector -- the
/// original's manual `realloc`-doubling hit this same ceiling and bailed
/// the scan rather than crash.
fn push_checked(hits: &mut Vec<u64>, addr: u64) -> Result<()> {
    if hits.len() == hits.capacity() {
        let grow_to = (hits.capacity().max(1)) * 2;
        hits.try_reserve(grow_to - hits.capacity())
            .map_err(|_| ScanError::ResourceExhaustion { attempted: grow_to })?;
    }
    hits.push(addr);
    Ok(())
}

#[cfg(test)]
impl Scan {
    /// Seed a scan's hit list directly, bypassing a real sweep, for tests
    /// elsewhere in the crate that only need bookkeeping over known hits.
    pub(crate) fn set_hits_for_test(&mut self, hits: Vec<u64>) {
        self.hits = hits;
        self.state = State::Refined;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eliminate_drops_exactly_one_without_shifting_past_end() {
        let mut scan = Scan::new(ScanId(0), ScanType::U32);
        scan.hits = vec![10, 20, 30];
        scan.values = vec![Value::U32(1), Value::U32(2), Value::U32(3)];
        scan.eliminate(1);
        assert_eq!(scan.hits, vec![10, 30]);
        assert_eq!(scan.values, vec![Value::U32(1), Value::U32(3)]);
    }

    #[test]
    fn eliminate_out_of_range_is_a_no_op() {
        let mut scan = Scan::new(ScanId(0), ScanType::U32);
        scan.hits = vec![10];
        scan.eliminate(5);
        assert_eq!(scan.hits, vec![10]);
    }

    #[test]
    fn fork_copies_state_under_a_new_id() {
        let mut scan = Scan::new(ScanId(0), ScanType::F32);
        scan.hits = vec![1, 2, 3];
        scan.state = State::Refined;
        let forked = scan.fork(ScanId(1));
        assert_eq!(forked.id(), ScanId(1));
        assert_eq!(forked.hits(), scan.hits());
        assert!(forked.is_initialized());
    }

    #[test]
    fn push_checked_grows_and_appends() {
        let mut hits = Vec::new();
        for i in 0..10 {
            push_checked(&mut hits, i).unwrap();
        }
        assert_eq!(hits.len(), 10);
        assert_eq!(hits[9], 9);
    }
}
