//! Region Scanner: the wide-sweep pass over one memory region.
//!
//! Streams the region through a fixed 64 KiB buffer. `Equal` performs a
//! byte-exact pattern search (matches at any byte offset); ordered
//! operators stride by the scan type's width, counted from the region's
//! start.
//!
//! Boundary handling (spec's open question): for `Equal` we overlap
//! successive buffer refills by `width - 1` bytes so a needle straddling a
//! refill is never missed. For the ordered (aligned) path we instead pick
//! a chunk size that is always a multiple of `width` -- since every
//! supported width (1/2/4/8) divides the buffer size evenly, no stride
//! position ever straddles a refill, so no overlap is needed there either.
//! Both are valid resolutions named in the design notes; we use whichever
//! is simplest for each access pattern.

use std::io::{Read, Seek, SeekFrom};

use crate::error::{Result, ScanError};
use crate::maps::Region;
use crate::value::{compare, SearchOp, Value};

const BUFFER_SIZE: usize = 64 * 1024;

/// Stream `region` through `mem` and hand every match's absolute address
/// to `record`. `record` returns `Err` only on allocation failure
/// (`ResourceExhaustion`), which aborts the region immediately.
///
/// `mem` must support both `Read` and `Seek` on the same handle -- in
/// production this is one `/proc/<pid>/mem` file, which cannot be borrowed
/// twice at once, so the two capabilities are taken as a single bound
/// rather than two separate parameters.
pub fn scan_region(
    mem: &mut (impl Read + Seek),
    region: &Region,
    ty_size: usize,
    op: SearchOp,
    needle: Value,
    mut record: impl FnMut(u64) -> Result<()>,
) -> Result<()> {
    mem.seek(SeekFrom::Start(region.offset))
        .map_err(|source| ScanError::MemoryRead {
            address: region.offset,
            source,
        })?;

    let needle_bytes = needle.encode();
    debug_assert_eq!(needle_bytes.len(), ty_size);

    if op == SearchOp::Equal {
        scan_equal(mem, region, &needle_bytes, &mut record)
    } else {
        scan_ordered(mem, region, ty_size, op, needle, &mut record)
    }
}

fn scan_equal(
    mem: &mut impl Read,
    region: &Region,
    needle: &[u8],
    record: &mut impl FnMut(u64) -> Result<()>,
) -> Result<()> {
    let overlap = needle.len().saturating_sub(1);
    let mut buffer = vec![0u8; BUFFER_SIZE];
    let mut carry = 0usize; // bytes of previous tail already sitting at buffer[0..carry]
    let mut region_offset = region.offset;
    let mut remaining = region.size;

    loop {
        if remaining == 0 && carry == 0 {
            break;
        }

        let want = (BUFFER_SIZE - carry).min(remaining as usize);
        let n = if want == 0 {
            0
        } else {
            read_some(mem, &mut buffer[carry..carry + want], region_offset)?
        };
        let cursor_size = carry + n;
        let is_final = n == 0 || (n as u64) < want as u64;

        remaining = remaining.saturating_sub(n as u64);
        // `chunk_start` is the absolute address of buffer[0].
        let chunk_start = region_offset - carry as u64;

        let bound = if is_final { cursor_size } else { cursor_size.saturating_sub(overlap) };

        let mut i = 0;
        while i + needle.len() <= cursor_size && i < bound {
            if &buffer[i..i + needle.len()] == needle {
                record(chunk_start + i as u64)?;
            }
            i += 1;
        }

        if is_final {
            break;
        }

        // Carry the final `overlap` bytes forward for the next refill.
        let new_carry = overlap.min(cursor_size);
        buffer.copy_within(cursor_size - new_carry..cursor_size, 0);
        carry = new_carry;
        region_offset += n as u64;
    }

    Ok(())
}

fn scan_ordered(
    mem: &mut impl Read,
    region: &Region,
    width: usize,
    op: SearchOp,
    needle: Value,
    record: &mut impl FnMut(u64) -> Result<()>,
) -> Result<()> {
    // BUFFER_SIZE is a multiple of every supported width (1/2/4/8), so a
    // full buffer never splits a stride item across refills.
    debug_assert_eq!(BUFFER_SIZE % width, 0);

    let mut buffer = vec![0u8; BUFFER_SIZE];
    let mut region_offset = region.offset;
    let mut remaining = region.size;

    while remaining > 0 {
        let want = (BUFFER_SIZE as u64).min(remaining) as usize;
        let n = read_some(mem, &mut buffer[..want], region_offset)?;
        if n == 0 {
            break;
        }

        let mut i = 0;
        while i + width <= n {
            let candidate = Value::interpret(needle.scan_type(), &buffer[i..i + width]);
            if compare(op, candidate, needle) {
                record(region_offset + i as u64)?;
            }
            i += width;
        }

        remaining = remaining.saturating_sub(n as u64);
        region_offset += n as u64;

        if n < want {
            break; // short read: end of region, not of the sweep
        }
    }

    Ok(())
}

fn read_some(mem: &mut impl Read, buf: &mut [u8], address: u64) -> Result<usize> {
    if buf.is_empty() {
        return Ok(0);
    }
    match mem.read(buf) {
        Ok(n) => Ok(n),
        Err(source) => Err(ScanError::MemoryRead { address, source }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn region(offset: u64, size: u64) -> Region {
        Region {
            offset,
            size,
            read: true,
            write: true,
            exec: false,
            perms: "rw-p".to_string(),
            pathname: String::new(),
        }
    }

    #[test]
    fn equal_finds_byte_exact_matches_unaligned() {
        // needle 0xAABB appears at offset 1 (unaligned) in this buffer.
        let data = vec![0x00, 0xAA, 0xBB, 0x00, 0xAA, 0xBB];
        let mut cursor = Cursor::new(data);
        let region = region(0, 6);
        let mut hits = Vec::new();
        scan_region(
            &mut cursor,
            &region,
            2,
            SearchOp::Equal,
            Value::U16(0xBBAA),
            |addr| {
                hits.push(addr);
                Ok(())
            },
        )
        .unwrap();
        assert_eq!(hits, vec![1, 4]);
    }

    #[test]
    fn equal_match_spanning_a_refill_is_not_missed() {
        // Force a tiny needle across what would be a buffer boundary by
        // scanning a region larger than BUFFER_SIZE with the match placed
        // exactly at the boundary.
        let boundary = BUFFER_SIZE;
        let mut data = vec![0u8; boundary * 2];
        let needle = 0xDEADBEEFu32.to_le_bytes();
        let straddle_offset = boundary - 2;
        data[straddle_offset..straddle_offset + 4].copy_from_slice(&needle);

        let mut cursor = Cursor::new(data);
        let region = region(0, (boundary * 2) as u64);
        let mut hits = Vec::new();
        scan_region(
            &mut cursor,
            &region,
            4,
            SearchOp::Equal,
            Value::U32(0xDEADBEEF),
            |addr| {
                hits.push(addr);
                Ok(())
            },
        )
        .unwrap();
        assert_eq!(hits, vec![straddle_offset as u64]);
    }

    #[test]
    fn ordered_scan_strides_by_width_from_region_start() {
        let mut data = Vec::new();
        data.extend_from_slice(&10i32.to_le_bytes());
        data.extend_from_slice(&20i32.to_le_bytes());
        data.extend_from_slice(&30i32.to_le_bytes());
        let mut cursor = Cursor::new(data);
        let region = region(0, 12);
        let mut hits = Vec::new();
        scan_region(
            &mut cursor,
            &region,
            4,
            SearchOp::GreaterEq,
            Value::I32(15),
            |addr| {
                hits.push(addr);
                Ok(())
            },
        )
        .unwrap();
        assert_eq!(hits, vec![4, 8]);
    }

    #[test]
    fn short_read_ends_region_without_error() {
        let data = vec![1u8, 2, 3];
        let mut cursor = Cursor::new(data);
        // Claim the region is bigger than the backing data; Cursor just
        // returns 0 (EOF) once exhausted, which must not be an error.
        let region = region(0, 1000);
        let mut hits = Vec::new();
        let result = scan_region(
            &mut cursor,
            &region,
            1,
            SearchOp::Equal,
            Value::U8(2),
            |addr| {
                hits.push(addr);
                Ok(())
            },
        );
        assert!(result.is_ok());
        assert_eq!(hits, vec![1]);
    }
}
