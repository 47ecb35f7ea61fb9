//! Typed value model: scan types, tagged scalar values, and comparisons.
//!
//! Replaces the original's C variadic-argument dispatch with a sum type.
//! `Value` always carries its own type tag, so a caller cannot pass an
//! `f32` where the scan expects a `u64` without going through `ScanType`
//! explicitly -- the mismatch the original risks via `va_arg` cannot arise.

use std::fmt;

/// The small constant epsilon used by `SearchOp::Approx`.
///
/// The original CLI's `about`/`~` command builds a `[value - 1.0, value +
/// 1.0]` bounded query; `Approx` is specified to be exactly that predicate,
/// so this constant is shared with the CLI's bounded-query construction
/// rather than chosen independently.
pub const APPROX_EPSILON: f64 = 1.0;

/// One of the ten scalar types a scan can search for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScanType {
    U8,
    U16,
    U32,
    U64,
    I8,
    I16,
    I32,
    I64,
    F32,
    F64,
}

impl ScanType {
    /// Byte width of this type.
    pub const fn size(self) -> usize {
        match self {
            ScanType::U8 | ScanType::I8 => 1,
            ScanType::U16 | ScanType::I16 => 2,
            ScanType::U32 | ScanType::I32 | ScanType::F32 => 4,
            ScanType::U64 | ScanType::I64 | ScanType::F64 => 8,
        }
    }

    /// Parse a `--type` style CLI token (`u8`, `f32`, ...).
    pub fn parse(s: &str) -> Option<ScanType> {
        match s.to_ascii_lowercase().as_str() {
            "u8" => Some(ScanType::U8),
            "u16" => Some(ScanType::U16),
            "u32" => Some(ScanType::U32),
            "u64" => Some(ScanType::U64),
            "i8" => Some(ScanType::I8),
            "i16" => Some(ScanType::I16),
            "i32" => Some(ScanType::I32),
            "i64" => Some(ScanType::I64),
            "f32" => Some(ScanType::F32),
            "f64" => Some(ScanType::F64),
            _ => None,
        }
    }
}

impl fmt::Display for ScanType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ScanType::U8 => "u8",
            ScanType::U16 => "u16",
            ScanType::U32 => "u32",
            ScanType::U64 => "u64",
            ScanType::I8 => "i8",
            ScanType::I16 => "i16",
            ScanType::I32 => "i32",
            ScanType::I64 => "i64",
            ScanType::F32 => "f32",
            ScanType::F64 => "f64",
        };
        write!(f, "{s}")
    }
}

/// A tagged scalar value, always self-describing its `ScanType`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
}

impl Value {
    /// The scan type this value belongs to.
    pub const fn scan_type(self) -> ScanType {
        match self {
            Value::U8(_) => ScanType::U8,
            Value::U16(_) => ScanType::U16,
            Value::U32(_) => ScanType::U32,
            Value::U64(_) => ScanType::U64,
            Value::I8(_) => ScanType::I8,
            Value::I16(_) => ScanType::I16,
            Value::I32(_) => ScanType::I32,
            Value::I64(_) => ScanType::I64,
            Value::F32(_) => ScanType::F32,
            Value::F64(_) => ScanType::F64,
        }
    }

    /// Encode to little-endian bytes (the target's native byte order on
    /// every architecture this crate supports).
    pub fn encode(self) -> Vec<u8> {
        match self {
            Value::U8(v) => v.to_le_bytes().to_vec(),
            Value::U16(v) => v.to_le_bytes().to_vec(),
            Value::U32(v) => v.to_le_bytes().to_vec(),
            Value::U64(v) => v.to_le_bytes().to_vec(),
            Value::I8(v) => v.to_le_bytes().to_vec(),
            Value::I16(v) => v.to_le_bytes().to_vec(),
            Value::I32(v) => v.to_le_bytes().to_vec(),
            Value::I64(v) => v.to_le_bytes().to_vec(),
            Value::F32(v) => v.to_le_bytes().to_vec(),
            Value::F64(v) => v.to_le_bytes().to_vec(),
        }
    }

    /// Interpret raw bytes (must be exactly `ty.size()` long) as `ty`.
    pub fn interpret(ty: ScanType, bytes: &[u8]) -> Value {
        debug_assert_eq!(bytes.len(), ty.size());
        match ty {
            ScanType::U8 => Value::U8(bytes[0]),
            ScanType::U16 => Value::U16(u16::from_le_bytes(bytes.try_into().unwrap())),
            ScanType::U32 => Value::U32(u32::from_le_bytes(bytes.try_into().unwrap())),
            ScanType::U64 => Value::U64(u64::from_le_bytes(bytes.try_into().unwrap())),
            ScanType::I8 => Value::I8(bytes[0] as i8),
            ScanType::I16 => Value::I16(i16::from_le_bytes(bytes.try_into().unwrap())),
            ScanType::I32 => Value::I32(i32::from_le_bytes(bytes.try_into().unwrap())),
            ScanType::I64 => Value::I64(i64::from_le_bytes(bytes.try_into().unwrap())),
            ScanType::F32 => Value::F32(f32::from_le_bytes(bytes.try_into().unwrap())),
            ScanType::F64 => Value::F64(f64::from_le_bytes(bytes.try_into().unwrap())),
        }
    }

    /// Reinterpret a value given as `f64` (the CLI's common input type)
    /// into the target scan type, with the expected narrowing/truncating
    /// casts (matching the original's `(float)va_arg(args, double)` etc.).
    pub fn from_f64(ty: ScanType, v: f64) -> Value {
        match ty {
            ScanType::U8 => Value::U8(v as u8),
            ScanType::U16 => Value::U16(v as u16),
            ScanType::U32 => Value::U32(v as u32),
            ScanType::U64 => Value::U64(v as u64),
            ScanType::I8 => Value::I8(v as i8),
            ScanType::I16 => Value::I16(v as i16),
            ScanType::I32 => Value::I32(v as i32),
            ScanType::I64 => Value::I64(v as i64),
            ScanType::F32 => Value::F32(v as f32),
            ScanType::F64 => Value::F64(v),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::U8(v) => write!(f, "{v}"),
            Value::U16(v) => write!(f, "{v}"),
            Value::U32(v) => write!(f, "{v}"),
            Value::U64(v) => write!(f, "{v}"),
            Value::I8(v) => write!(f, "{v}"),
            Value::I16(v) => write!(f, "{v}"),
            Value::I32(v) => write!(f, "{v}"),
            Value::I64(v) => write!(f, "{v}"),
            Value::F32(v) => write!(f, "{v}"),
            Value::F64(v) => write!(f, "{v}"),
        }
    }
}

/// A refinement predicate applied when filtering or sweeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchOp {
    Equal,
    GreaterEq,
    LessEq,
    Approx,
    Unchanged,
}

/// Compare two same-typed values under `op`.
///
/// `Unchanged` is the identity predicate used by refresh and is always
/// `true` regardless of its operands.
pub fn compare(op: SearchOp, a: Value, b: Value) -> bool {
    if op == SearchOp::Unchanged {
        return true;
    }

    macro_rules! cmp_ints {
        ($a:expr, $b:expr) => {
            match op {
                SearchOp::Equal => $a == $b,
                SearchOp::GreaterEq => $a >= $b,
                SearchOp::LessEq => $a <= $b,
                SearchOp::Approx | SearchOp::Unchanged => unreachable!(),
            }
        };
    }

    match (a, b) {
        (Value::U8(x), Value::U8(y)) => cmp_ints!(x, y),
        (Value::U16(x), Value::U16(y)) => cmp_ints!(x, y),
        (Value::U32(x), Value::U32(y)) => cmp_ints!(x, y),
        (Value::U64(x), Value::U64(y)) => cmp_ints!(x, y),
        (Value::I8(x), Value::I8(y)) => cmp_ints!(x, y),
        (Value::I16(x), Value::I16(y)) => cmp_ints!(x, y),
        (Value::I32(x), Value::I32(y)) => cmp_ints!(x, y),
        (Value::I64(x), Value::I64(y)) => cmp_ints!(x, y),
        (Value::F32(x), Value::F32(y)) => match op {
            SearchOp::Equal => x == y,
            SearchOp::GreaterEq => x >= y,
            SearchOp::LessEq => x <= y,
            SearchOp::Approx => (x as f64 - y as f64).abs() <= APPROX_EPSILON,
            SearchOp::Unchanged => unreachable!(),
        },
        (Value::F64(x), Value::F64(y)) => match op {
            SearchOp::Equal => x == y,
            SearchOp::GreaterEq => x >= y,
            SearchOp::LessEq => x <= y,
            SearchOp::Approx => (x - y).abs() <= APPROX_EPSILON,
            SearchOp::Unchanged => unreachable!(),
        },
        _ => panic!("compare: mismatched scan types {:?} vs {:?}", a, b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes_match_spec() {
        assert_eq!(ScanType::U8.size(), 1);
        assert_eq!(ScanType::I8.size(), 1);
        assert_eq!(ScanType::U16.size(), 2);
        assert_eq!(ScanType::I16.size(), 2);
        assert_eq!(ScanType::U32.size(), 4);
        assert_eq!(ScanType::I32.size(), 4);
        assert_eq!(ScanType::F32.size(), 4);
        assert_eq!(ScanType::U64.size(), 8);
        assert_eq!(ScanType::I64.size(), 8);
        assert_eq!(ScanType::F64.size(), 8);
    }

    #[test]
    fn encode_interpret_roundtrip() {
        let v = Value::I32(-12345);
        let bytes = v.encode();
        assert_eq!(Value::interpret(ScanType::I32, &bytes), v);
    }

    #[test]
    fn equal_is_byte_identity_for_ints() {
        assert!(compare(SearchOp::Equal, Value::U32(7), Value::U32(7)));
        assert!(!compare(SearchOp::Equal, Value::U32(7), Value::U32(8)));
    }

    #[test]
    fn nan_never_equals_itself() {
        let nan = Value::F32(f32::NAN);
        assert!(!compare(SearchOp::Equal, nan, nan));
    }

    #[test]
    fn ordered_ops_respect_signedness() {
        // -1i32 as bits is a huge u32; comparisons must not bit-reinterpret.
        assert!(compare(SearchOp::LessEq, Value::I32(-1), Value::I32(0)));
        assert!(!compare(
            SearchOp::LessEq,
            Value::U32(u32::MAX),
            Value::U32(0)
        ));
    }

    #[test]
    fn approx_uses_shared_epsilon() {
        assert!(compare(SearchOp::Approx, Value::F64(3.14), Value::F64(3.5)));
        assert!(!compare(SearchOp::Approx, Value::F64(3.14), Value::F64(5.0)));
    }

    #[test]
    fn unchanged_is_always_true() {
        assert!(compare(SearchOp::Unchanged, Value::U8(1), Value::U8(2)));
    }

    #[test]
    fn parse_roundtrips_display() {
        for ty in [
            ScanType::U8,
            ScanType::U16,
            ScanType::U32,
            ScanType::U64,
            ScanType::I8,
            ScanType::I16,
            ScanType::I32,
            ScanType::I64,
            ScanType::F32,
            ScanType::F64,
        ] {
            assert_eq!(ScanType::parse(&ty.to_string()), Some(ty));
        }
    }
}
