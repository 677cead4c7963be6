use std::{error::Error, fmt, path::Path};

use miette::{miette, LabeledSpan, Report, Severity};

use crate::symbol::Span;

/// Error decoding the text of a single instruction.
#[derive(Debug, PartialEq)]
pub enum DecodeError {
    UnknownOpcode {
        mnemonic: String,
    },
    UnknownRegister {
        name: String,
    },
    MalformedImmediate {
        string: String,
    },
    MalformedMemoryOperand {
        string: String,
    },
    /// Operand is neither a known label nor an integer offset.
    UnresolvedTarget {
        operand: String,
    },
    /// Offset points before the start of the program.
    NegativeTarget {
        operand: String,
    },
    WrongOperandCount {
        mnemonic: &'static str,
        expected: &'static str,
        actual: usize,
    },
}

/// Error executing an instruction.
#[derive(Debug, PartialEq)]
pub enum ExecError {
    /// `address` is negative for instructions which computed one.
    MemoryOutOfBounds { address: i128, len: usize },
    PcOutOfRange { target: i64 },
}

/// An [`ExecError`] with the instruction which raised it.
#[derive(Debug, PartialEq)]
pub struct Fault {
    pub pc: u64,
    pub text: String,
    pub error: ExecError,
}

impl Error for DecodeError {}
impl Error for ExecError {}
impl Error for Fault {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&self.error)
    }
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownOpcode { mnemonic } => write!(f, "Unknown opcode `{}`", mnemonic),
            Self::UnknownRegister { name } => write!(f, "Unknown register `{}`", name),
            Self::MalformedImmediate { string } => write!(f, "Malformed immediate `{}`", string),
            Self::MalformedMemoryOperand { string } => {
                write!(f, "Malformed memory operand `{}` (expected `offset(base)`)", string)
            }
            Self::UnresolvedTarget { operand } => write!(
                f,
                "Branch target `{}` is neither a label nor an integer offset",
                operand
            ),
            Self::NegativeTarget { operand } => write!(
                f,
                "Branch target `{}` lies before the start of the program",
                operand
            ),
            Self::WrongOperandCount {
                mnemonic,
                expected,
                actual,
            } => write!(
                f,
                "`{}` expects {} operands, found {}",
                mnemonic, expected, actual
            ),
        }
    }
}

impl fmt::Display for ExecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MemoryOutOfBounds { address, len } => write!(
                f,
                "Memory access of {} byte{} at {} is out of bounds",
                len,
                if *len == 1 { "" } else { "s" },
                format_address(*address),
            ),
            Self::PcOutOfRange { target } => {
                write!(f, "Jump target {} is out of range", format_address((*target).into()))
            }
        }
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (at PC = 0x{:08x}, executing `{}`)",
            self.error, self.pc, self.text
        )
    }
}

fn format_address(address: i128) -> String {
    if address < 0 {
        format!("-0x{:x}", address.unsigned_abs())
    } else {
        format!("0x{:08x}", address)
    }
}

// Load errors

pub fn load_unreadable(path: &Path, error: std::io::Error) -> Report {
    miette!(
        severity = Severity::Error,
        code = "load::io",
        help = "check that the path exists and is a readable text file",
        "Could not read `{}`: {error}",
        path.display(),
    )
}

pub fn load_duplicate_label(span: Span, first: Span, src: &str) -> Report {
    miette!(
        severity = Severity::Error,
        code = "load::duplicate_label",
        help = "labels may only be defined once per program",
        labels = vec![
            LabeledSpan::at(first, "first defined here"),
            LabeledSpan::at(span, "duplicate label"),
        ],
        "Duplicate label definition",
    )
    .with_source_code(src.to_string())
}

/// Duplicate in pre-tokenized label pairs, which have no source text to point into.
pub fn load_duplicate_label_entry(name: &str, first: usize, index: usize) -> Report {
    miette!(
        severity = Severity::Error,
        code = "load::duplicate_label",
        help = "labels may only be defined once per program",
        "Duplicate label `{name}`, bound to instruction {first} and again to instruction {index}",
    )
}

pub fn load_bad_label(span: Span, src: &str) -> Report {
    miette!(
        severity = Severity::Error,
        code = "load::bad_label",
        help = "labels are made of letters, digits, `_`, `.` and `$`",
        labels = vec![LabeledSpan::at(span, "invalid label")],
        "Invalid label name",
    )
    .with_source_code(src.to_string())
}

pub fn load_unknown_directive(span: Span, src: &str) -> Report {
    miette!(
        severity = Severity::Error,
        code = "load::directive",
        help = "supported data directives are .byte, .half, .word and .dword",
        labels = vec![LabeledSpan::at(span, "unknown directive")],
        "Encountered an unknown directive",
    )
    .with_source_code(src.to_string())
}

pub fn load_bad_literal(span: Span, src: &str) -> Report {
    miette!(
        severity = Severity::Error,
        code = "load::bad_literal",
        help = "data literals are decimal, or hex with `0x`, or binary with `0b`",
        labels = vec![LabeledSpan::at(span, "not an integer literal")],
        "Expected an integer literal",
    )
    .with_source_code(src.to_string())
}

pub fn load_missing_literal(span: Span, src: &str) -> Report {
    miette!(
        severity = Severity::Error,
        code = "load::bad_literal",
        help = "data directives take one or more literals, separated by commas or spaces",
        labels = vec![LabeledSpan::at(span, "no literals given")],
        "Expected an integer literal",
    )
    .with_source_code(src.to_string())
}

pub fn load_data_overflow(span: Span, src: &str) -> Report {
    miette!(
        severity = Severity::Error,
        code = "load::data_overflow",
        help = "the data section runs from 0x10000 to the end of memory",
        labels = vec![LabeledSpan::at(span, "does not fit in memory")],
        "Data section is too large",
    )
    .with_source_code(src.to_string())
}

pub fn load_decode(span: Span, src: &str, pc: u64, error: DecodeError) -> Report {
    let help = match error {
        DecodeError::UnknownOpcode { .. } => {
            "run with `--permissive` to treat unknown opcodes as no-ops"
        }
        DecodeError::UnknownRegister { .. } => "registers are `x0`..`x31` or their ABI names",
        DecodeError::UnresolvedTarget { .. } => "check the spelling of the label",
        _ => "check the operands for this instruction",
    };
    miette!(
        severity = Severity::Error,
        code = "decode::instruction",
        help = help,
        labels = vec![LabeledSpan::at(span, format!("at PC = 0x{:08x}", pc))],
        "{error}",
    )
    .with_source_code(src.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fault_names_instruction_and_pc() {
        let fault = Fault {
            pc: 8,
            text: "ld a0, 0(a1)".to_string(),
            error: ExecError::MemoryOutOfBounds {
                address: 400_000,
                len: 8,
            },
        };
        let message = fault.to_string();
        assert!(message.contains("0x00000008"), "{message}");
        assert!(message.contains("`ld a0, 0(a1)`"), "{message}");
        assert!(message.contains("8 bytes at 0x00061a80"), "{message}");
    }

    #[test]
    fn negative_addresses_are_readable() {
        let error = ExecError::MemoryOutOfBounds { address: -4, len: 1 };
        assert_eq!(
            error.to_string(),
            "Memory access of 1 byte at -0x4 is out of bounds"
        );

        let error = ExecError::MemoryOutOfBounds {
            address: u64::MAX.into(),
            len: 2,
        };
        assert_eq!(
            error.to_string(),
            "Memory access of 2 bytes at 0xffffffffffffffff is out of bounds"
        );
    }
}
