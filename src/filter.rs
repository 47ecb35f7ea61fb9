//! Hit Filter: re-checks an existing hit list against a live process.
//!
//! Every scan narrowing after the first (`update` on a refined scan,
//! `refresh`, `eliminate`'s survivors) goes through here instead of back
//! through the region scanner -- the hit list is already known to be small
//! relative to the address space, so a targeted re-read of each address
//! beats a second full sweep.

use std::io::{Read, Seek, SeekFrom};

use crate::error::Result;
use crate::value::{compare, SearchOp, ScanType, Value};

/// Cap on how many survivor values are kept for preview/display.
pub const PREVIEW_CAP: usize = 32;

/// Re-read every address in `hits`, keep the ones that still satisfy `op`
/// against `needle`, and return the surviving addresses plus up to
/// `PREVIEW_CAP` of their freshly read values, both in ascending order.
///
/// A hit whose address can no longer be read (the mapping went away, the
/// process exited mid-pass, ...) is dropped silently rather than aborting
/// the whole filter -- one stale address must not cost the rest of the
/// scan.
pub fn refine(
    mem: &mut (impl Read + Seek),
    ty: ScanType,
    op: SearchOp,
    needle: Option<Value>,
    hits: &[u64],
) -> Result<(Vec<u64>, Vec<Value>)> {
    let width = ty.size();
    let mut buf = vec![0u8; width];
    let mut survivors = Vec::with_capacity(hits.len());
    let mut preview = Vec::with_capacity(PREVIEW_CAP.min(hits.len()));

    for &addr in hits {
        let current = match read_one(mem, ty, addr, &mut buf) {
            Some(value) => value,
            None => continue,
        };

        let keeps = match (op, needle) {
            (SearchOp::Unchanged, _) => true,
            (_, Some(needle)) => compare(op, current, needle),
            (_, None) => true,
        };
        if !keeps {
            continue;
        }

        survivors.push(addr);
        if preview.len() < PREVIEW_CAP {
            preview.push(current);
        }
    }

    Ok((survivors, preview))
}

/// Read and interpret the value at `addr` as `ty`, or `None` if the
/// address is no longer readable. `buf.len()` must equal `ty.size()`.
pub(crate) fn read_one(mem: &mut (impl Read + Seek), ty: ScanType, addr: u64, buf: &mut [u8]) -> Option<Value> {
    if mem.seek(SeekFrom::Start(addr)).is_err() {
        return None;
    }
    mem.read_exact(buf).ok()?;
    Some(Value::interpret(ty, buf))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn backing() -> Cursor<Vec<u8>> {
        let mut data = Vec::new();
        data.extend_from_slice(&10i32.to_le_bytes()); // addr 0
        data.extend_from_slice(&20i32.to_le_bytes()); // addr 4
        data.extend_from_slice(&30i32.to_le_bytes()); // addr 8
        Cursor::new(data)
    }

    #[test]
    fn keeps_only_hits_still_matching() {
        let mut mem = backing();
        let (survivors, preview) = refine(
            &mut mem,
            ScanType::I32,
            SearchOp::Equal,
            Some(Value::I32(20)),
            &[0, 4, 8],
        )
        .unwrap();
        assert_eq!(survivors, vec![4]);
        assert_eq!(preview, vec![Value::I32(20)]);
    }

    #[test]
    fn unreadable_address_is_dropped_not_fatal() {
        let mut mem = backing();
        let (survivors, _) = refine(
            &mut mem,
            ScanType::I32,
            SearchOp::GreaterEq,
            Some(Value::I32(0)),
            &[0, 4, 9_999],
        )
        .unwrap();
        assert_eq!(survivors, vec![0, 4]);
    }

    #[test]
    fn unchanged_keeps_every_readable_hit_regardless_of_value() {
        let mut mem = backing();
        let (survivors, preview) = refine(&mut mem, ScanType::I32, SearchOp::Unchanged, None, &[0, 4, 8]).unwrap();
        assert_eq!(survivors, vec![0, 4, 8]);
        assert_eq!(preview.len(), 3);
    }

    #[test]
    fn preview_is_capped_even_with_more_survivors() {
        let mut data = Vec::new();
        let mut addrs = Vec::new();
        for i in 0..(PREVIEW_CAP + 10) {
            addrs.push((i * 4) as u64);
            data.extend_from_slice(&1i32.to_le_bytes());
        }
        let mut mem = Cursor::new(data);
        let (survivors, preview) = refine(
            &mut mem,
            ScanType::I32,
            SearchOp::Equal,
            Some(Value::I32(1)),
            &addrs,
        )
        .unwrap();
        assert_eq!(survivors.len(), PREVIEW_CAP + 10);
        assert_eq!(preview.len(), PREVIEW_CAP);
    }
}
