//! Interactive REPL: tokenizes commands and drives a `Subject`'s scans.
//!
//! Mirrors the original's command set (`exact`/`about`/`set`/`bounded`/
//! `refresh`/`eliminate`/`quit`, plus their one-letter aliases) but expands
//! `about` and `bounded` into the pair of `GreaterEq`/`LessEq` updates the
//! original's own command loop performs, rather than threading a fused
//! "approximate" operator through the scan/filter layers.

use std::io::{BufRead, Write};

use crate::error::{Result, ScanError};
use crate::scan::ScanId;
use crate::subject::Subject;
use crate::value::{Value, SearchOp, APPROX_EPSILON};

/// Run the REPL against every scan currently owned by `subject`, reading
/// commands from `input` and writing prompts/results to `output`.
pub fn run(subject: &mut Subject, scans: &[ScanId], input: impl BufRead, mut output: impl Write) -> Result<()> {
    let mut lines = input.lines();

    loop {
        write!(output, "> ").ok();
        output.flush().ok();

        let line = match lines.next() {
            Some(Ok(line)) => line,
            Some(Err(_)) | None => break,
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match dispatch(subject, scans, line) {
            Ok(Some(report)) => {
                writeln!(output, "{report}").ok();
            }
            Ok(None) => break, // quit
            Err(err) => {
                writeln!(output, "error: {err}").ok();
            }
        }
    }

    Ok(())
}

/// Parse and execute one command line. Returns `Ok(None)` on `quit`.
fn dispatch(subject: &mut Subject, scans: &[ScanId], line: &str) -> Result<Option<String>> {
    let pid = subject.pid();
    let mut tokens = line.split_whitespace();
    let command = tokens.next().unwrap_or("");

    match command {
        "quit" | "q" => return Ok(None),

        "exact" | "e" | "=" => {
            let value: f64 = parse_arg(tokens.next())?;
            for &id in scans {
                update_with_f64(subject, id, pid, SearchOp::Equal, value)?;
            }
        }

        "about" | "a" | "~" => {
            let value: f64 = parse_arg(tokens.next())?;
            about(subject, scans, pid, value)?;
        }

        "bounded" | "bound" | "b" => {
            let min: f64 = parse_arg(tokens.next())?;
            let max: f64 = parse_arg(tokens.next())?;
            for &id in scans {
                update_with_f64(subject, id, pid, SearchOp::GreaterEq, min)?;
                update_with_f64(subject, id, pid, SearchOp::LessEq, max)?;
            }
        }

        "set" | "s" => {
            let value: f64 = parse_arg(tokens.next())?;
            for &id in scans {
                let scan = subject
                    .scan_mut(id)
                    .ok_or_else(|| ScanError::Input("unknown scan".to_string()))?;
                let typed = Value::from_f64(scan.scan_type(), value);
                scan.set_value(pid, typed)?;
            }
        }

        "refresh" | "r" => {
            for &id in scans {
                let scan = subject
                    .scan_mut(id)
                    .ok_or_else(|| ScanError::Input("unknown scan".to_string()))?;
                scan.refresh(pid)?;
            }
        }

        "eliminate" | "x" => {
            // 1-based index into the combined listing across every active
            // scan in order, matching the original's cross-scan
            // `float32_scan->hit_count` offset arithmetic.
            let combined: usize = parse_arg(tokens.next())?;
            eliminate_combined(subject, scans, combined)?;
        }

        // A bare number is shorthand for `about <value>`, matching the
        // original's default when no command keyword is recognised.
        other => {
            if let Ok(value) = other.parse::<f64>() {
                about(subject, scans, pid, value)?;
            } else {
                return Err(ScanError::Input(format!("unrecognised command: {other}")));
            }
        }
    }

    Ok(Some(report(subject, scans)))
}

/// Map a 1-based index into the concatenation of every active scan's hit
/// listing (in `scans` order) back to the owning scan and its local,
/// 0-based index, then eliminate there. Out-of-range combined indices
/// (including 0) are a silent no-op, matching `Scan::eliminate`'s own
/// out-of-range handling.
fn eliminate_combined(subject: &mut Subject, scans: &[ScanId], combined: usize) -> Result<()> {
    if combined == 0 {
        return Ok(());
    }
    let mut remaining = combined;
    for &id in scans {
        let Some(scan) = subject.scan(id) else { continue };
        let count = scan.hits().len();
        if remaining <= count {
            if let Some(scan) = subject.scan_mut(id) {
                scan.eliminate(remaining - 1);
            }
            return Ok(());
        }
        remaining -= count;
    }
    Ok(())
}

fn about(subject: &mut Subject, scans: &[ScanId], pid: i32, value: f64) -> Result<()> {
    for &id in scans {
        update_with_f64(subject, id, pid, SearchOp::GreaterEq, value - APPROX_EPSILON)?;
        update_with_f64(subject, id, pid, SearchOp::LessEq, value + APPROX_EPSILON)?;
    }
    Ok(())
}

fn update_with_f64(subject: &mut Subject, id: ScanId, pid: i32, op: SearchOp, value: f64) -> Result<()> {
    let scan = subject
        .scan_mut(id)
        .ok_or_else(|| ScanError::Input("unknown scan".to_string()))?;
    let typed = Value::from_f64(scan.scan_type(), value);
    scan.update(pid, op, Some(typed))
}

fn parse_arg<T: std::str::FromStr>(token: Option<&str>) -> Result<T> {
    token
        .ok_or_else(|| ScanError::Input("missing argument".to_string()))?
        .parse()
        .map_err(|_| ScanError::Input("malformed argument".to_string()))
}

fn report(subject: &Subject, scans: &[ScanId]) -> String {
    let total: usize = scans
        .iter()
        .filter_map(|&id| subject.scan(id))
        .map(|scan| scan.hits().len())
        .sum();

    let mut out = format!("{total} hit(s) total\n");
    let mut combined_index = 0usize;
    for &id in scans {
        let Some(scan) = subject.scan(id) else { continue };
        out.push_str(&format!("{id:?} ({}): {} hit(s)\n", scan.scan_type(), scan.hits().len()));
        for (addr, value) in scan.hits().iter().zip(scan.values().iter()).take(PREVIEW_LIMIT) {
            combined_index += 1;
            out.push_str(&format!("  {combined_index}. 0x{addr:x} = {value}\n"));
        }
    }
    out.trim_end().to_string()
}

/// Up to the first 32 hits per scan are shown, matching the preview cap
/// the scan/filter layer itself maintains.
const PREVIEW_LIMIT: usize = crate::filter::PREVIEW_CAP;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_arg_rejects_missing_and_malformed() {
        assert!(parse_arg::<f64>(None).is_err());
        assert!(parse_arg::<f64>(Some("not-a-number")).is_err());
        assert_eq!(parse_arg::<f64>(Some("3.5")).unwrap(), 3.5);
    }

    #[test]
    fn eliminate_combined_indexes_into_the_second_scan() {
        use crate::value::ScanType;

        let mut subject = Subject::for_test(1);
        let f32_id = subject.begin_scan(ScanType::F32);
        let f64_id = subject.begin_scan(ScanType::F64);
        subject.scan_mut(f32_id).unwrap().set_hits_for_test(vec![10, 20]);
        subject.scan_mut(f64_id).unwrap().set_hits_for_test(vec![30, 40]);

        // Combined listing is [10, 20, 30, 40]; index 3 is f64's first hit.
        eliminate_combined(&mut subject, &[f32_id, f64_id], 3).unwrap();

        assert_eq!(subject.scan(f32_id).unwrap().hits(), &[10, 20]);
        assert_eq!(subject.scan(f64_id).unwrap().hits(), &[40]);
    }

    #[test]
    fn eliminate_combined_out_of_range_is_a_no_op() {
        use crate::value::ScanType;

        let mut subject = Subject::for_test(1);
        let id = subject.begin_scan(ScanType::U32);
        subject.scan_mut(id).unwrap().set_hits_for_test(vec![10]);

        eliminate_combined(&mut subject, &[id], 99).unwrap();
        assert_eq!(subject.scan(id).unwrap().hits(), &[10]);

        eliminate_combined(&mut subject, &[id], 0).unwrap();
        assert_eq!(subject.scan(id).unwrap().hits(), &[10]);
    }
}
