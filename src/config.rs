//! Command-line invocation: `<binary> <pid> [mode]`.

use clap::{Parser, ValueEnum};

use crate::value::ScanType;

/// Which scan type(s) to open against the target on startup.
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Mode {
    /// Track both f32 and f64 simultaneously (the original's default loop).
    #[default]
    #[value(alias = "float")]
    All,
    F32,
    F64,
    U8,
    U16,
    U32,
    U64,
    I8,
    I16,
    I32,
    I64,
}

impl Mode {
    /// The set of scan types this mode opens.
    pub fn scan_types(self) -> Vec<ScanType> {
        match self {
            Mode::All => vec![ScanType::F32, ScanType::F64],
            Mode::F32 => vec![ScanType::F32],
            Mode::F64 => vec![ScanType::F64],
            Mode::U8 => vec![ScanType::U8],
            Mode::U16 => vec![ScanType::U16],
            Mode::U32 => vec![ScanType::U32],
            Mode::U64 => vec![ScanType::U64],
            Mode::I8 => vec![ScanType::I8],
            Mode::I16 => vec![ScanType::I16],
            Mode::I32 => vec![ScanType::I32],
            Mode::I64 => vec![ScanType::I64],
        }
    }
}

/// In-process memory scanner -- attach to a running process and narrow
/// down addresses holding a value of interest.
#[derive(Parser)]
#[command(name = "subject-scan", version, about = "Live memory value scanner")]
pub struct Cli {
    /// PID of the process to attach to.
    pub pid: i32,

    /// Which scan type(s) to open.
    #[arg(value_enum, default_value_t = Mode::All)]
    pub mode: Mode,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_mode_opens_both_float_types() {
        assert_eq!(Mode::All.scan_types(), vec![ScanType::F32, ScanType::F64]);
    }

    #[test]
    fn scalar_mode_opens_exactly_one_type() {
        assert_eq!(Mode::U32.scan_types(), vec![ScanType::U32]);
    }

    #[test]
    fn float_is_an_alias_for_all() {
        assert_eq!(Mode::from_str("float", true).unwrap(), Mode::All);
        assert_eq!(Mode::from_str("all", true).unwrap(), Mode::All);
    }
}
