use lazy_static::lazy_static;
use regex::Regex;

use crate::air::{Instruction, Mnemonic, INSTRUCTION_WIDTH};
use crate::env::OpcodePolicy;
use crate::error::DecodeError;
use crate::symbol::{LabelTable, Register};

lazy_static! {
    /// `offset(base)`, where offset may be empty.
    static ref MEMORY_OPERAND: Regex = Regex::new(r"^([^()\s]*)\(([^()\s]+)\)$").unwrap();
}

/// Decode the text of one instruction, located at `pc`.
///
/// Branch and jump targets are resolved here: an operand naming a label jumps to that label,
/// anything else must be an instruction offset relative to `pc`.
pub fn decode(
    text: &str,
    pc: u64,
    labels: &LabelTable,
    policy: OpcodePolicy,
) -> Result<Instruction, DecodeError> {
    let mut tokens = split_operands(text);
    let Some(name) = tokens.next() else {
        return Err(DecodeError::UnknownOpcode {
            mnemonic: String::new(),
        });
    };
    let operands: Vec<&str> = tokens.collect();

    let Some(mnemonic) = Mnemonic::lookup(&name.to_ascii_lowercase()) else {
        return match policy {
            OpcodePolicy::Strict => Err(DecodeError::UnknownOpcode {
                mnemonic: name.to_string(),
            }),
            OpcodePolicy::Permissive => Ok(Instruction::Unknown {
                mnemonic: name.to_string(),
            }),
        };
    };

    let instruction = match mnemonic {
        Mnemonic::Alu(op) => {
            let [rd, rs1, rs2] = expect_operands(mnemonic, &operands)?;
            Instruction::Alu {
                op,
                rd: register(rd)?,
                rs1: register(rs1)?,
                rs2: register(rs2)?,
            }
        }
        Mnemonic::AluImm(op) => {
            let [rd, rs1, imm] = expect_operands(mnemonic, &operands)?;
            Instruction::AluImm {
                op,
                rd: register(rd)?,
                rs1: register(rs1)?,
                imm: immediate(imm)?,
            }
        }
        Mnemonic::Load(width) => {
            let [rd, address] = expect_operands(mnemonic, &operands)?;
            let (offset, base) = memory_operand(address)?;
            Instruction::Load {
                width,
                rd: register(rd)?,
                base,
                offset,
            }
        }
        Mnemonic::Store(width) => {
            let [src, address] = expect_operands(mnemonic, &operands)?;
            let (offset, base) = memory_operand(address)?;
            Instruction::Store {
                width,
                src: register(src)?,
                base,
                offset,
            }
        }
        Mnemonic::Branch(cond) => {
            let [rs1, rs2, target] = expect_operands(mnemonic, &operands)?;
            Instruction::Branch {
                cond,
                rs1: register(rs1)?,
                rs2: register(rs2)?,
                target: resolve_target(target, pc, labels)?,
            }
        }
        Mnemonic::Jal => match operands.as_slice() {
            // `jal target` links through `ra`
            [target] => Instruction::Jal {
                rd: Register::RA,
                target: resolve_target(target, pc, labels)?,
            },
            [rd, target] => Instruction::Jal {
                rd: register(rd)?,
                target: resolve_target(target, pc, labels)?,
            },
            _ => return Err(wrong_count(mnemonic, "1 or 2", operands.len())),
        },
        Mnemonic::Jalr => match operands.as_slice() {
            [base] => Instruction::Jalr {
                rd: Register::RA,
                base: register(base)?,
                offset: 0,
            },
            [rd, address] => {
                let (offset, base) = memory_operand(address)?;
                Instruction::Jalr {
                    rd: register(rd)?,
                    base,
                    offset,
                }
            }
            [rd, base, offset] => Instruction::Jalr {
                rd: register(rd)?,
                base: register(base)?,
                offset: immediate(offset)?,
            },
            _ => return Err(wrong_count(mnemonic, "1 to 3", operands.len())),
        },
        Mnemonic::Lui => {
            let [rd, imm] = expect_operands(mnemonic, &operands)?;
            Instruction::Lui {
                rd: register(rd)?,
                imm: immediate(imm)?,
            }
        }
    };
    Ok(instruction)
}

/// Split instruction text on commas and whitespace.
pub fn split_operands(text: &str) -> impl Iterator<Item = &str> {
    text.split(|ch: char| ch == ',' || ch.is_whitespace())
        .filter(|token| !token.is_empty())
}

/// Parse an integer literal: decimal, or `0x`/`0b`/`0o` prefixed, with an optional sign.
///
/// Unsigned literals up to `u64::MAX` are accepted and reinterpreted as two's complement, so
/// that full 64-bit patterns such as `0xffffffffffffffff` can be written.
pub fn parse_integer(string: &str) -> Option<i64> {
    let (negative, rest) = match string.as_bytes().first()? {
        b'-' => (true, &string[1..]),
        b'+' => (false, &string[1..]),
        _ => (false, string),
    };
    let (radix, digits) = match rest.get(..2) {
        Some("0x" | "0X") => (16, &rest[2..]),
        Some("0b" | "0B") => (2, &rest[2..]),
        Some("0o" | "0O") => (8, &rest[2..]),
        _ => (10, rest),
    };
    // `from_str_radix` would accept a second sign
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_alphanumeric()) {
        return None;
    }
    let magnitude = u64::from_str_radix(digits, radix).ok()?;
    if negative {
        if magnitude > 1 << 63 {
            return None;
        }
        Some((magnitude as i64).wrapping_neg())
    } else {
        Some(magnitude as i64)
    }
}

fn expect_operands<'a, const N: usize>(
    mnemonic: Mnemonic,
    operands: &[&'a str],
) -> Result<[&'a str; N], DecodeError> {
    operands.try_into().map_err(|_| {
        let expected = match N {
            2 => "2",
            3 => "3",
            _ => unreachable!("no mnemonic takes {} operands", N),
        };
        wrong_count(mnemonic, expected, operands.len())
    })
}

fn wrong_count(mnemonic: Mnemonic, expected: &'static str, actual: usize) -> DecodeError {
    DecodeError::WrongOperandCount {
        mnemonic: mnemonic.name(),
        expected,
        actual,
    }
}

fn register(name: &str) -> Result<Register, DecodeError> {
    name.parse().map_err(|()| DecodeError::UnknownRegister {
        name: name.to_string(),
    })
}

fn immediate(string: &str) -> Result<i64, DecodeError> {
    parse_integer(string).ok_or_else(|| DecodeError::MalformedImmediate {
        string: string.to_string(),
    })
}

/// Split `offset(base)` into its offset and base register.
fn memory_operand(string: &str) -> Result<(i64, Register), DecodeError> {
    let Some(captures) = MEMORY_OPERAND.captures(string) else {
        return Err(DecodeError::MalformedMemoryOperand {
            string: string.to_string(),
        });
    };
    let offset = match &captures[1] {
        "" => 0,
        offset => immediate(offset)?,
    };
    let base = register(&captures[2])?;
    Ok((offset, base))
}

/// Labels take priority over integer offsets.
fn resolve_target(operand: &str, pc: u64, labels: &LabelTable) -> Result<u64, DecodeError> {
    if let Some(index) = labels.get(operand) {
        return Ok(index as u64 * INSTRUCTION_WIDTH);
    }
    let Some(offset) = parse_integer(operand) else {
        return Err(DecodeError::UnresolvedTarget {
            operand: operand.to_string(),
        });
    };
    let target = offset
        .checked_mul(INSTRUCTION_WIDTH as i64)
        .and_then(|bytes| (pc as i64).checked_add(bytes))
        .filter(|target| *target >= 0);
    target.map(|target| target as u64).ok_or_else(|| DecodeError::NegativeTarget {
        operand: operand.to_string(),
    })
}
