use std::ops::Range;

use crate::air::{AluImmOp, AluOp, BranchCond, Instruction, LoadWidth, INSTRUCTION_WIDTH};
use crate::env::Options;
use crate::error::ExecError;
use crate::symbol::{Register, REGISTER_COUNT};

/// Size of the flat, byte-addressable memory.
pub const MEMORY_SIZE: usize = 400_000;
/// Start of the region filled by `.byte`/`.half`/`.word`/`.dword` directives.
pub const DATA_SECTION_START: usize = 0x10000;

/// Shift amounts only use the low 5 bits of their operand.
const SHIFT_MASK: i64 = 0x1F;

/// Architectural state: registers, memory and program counter.
#[derive(Clone)]
pub struct RunState {
    /// 32x 64-bit registers
    reg: [i64; REGISTER_COUNT],
    mem: Box<[u8]>,
    /// Byte offset of the next instruction
    pc: u64,
    options: Options,
}

/// Program counter to continue from, as decided by the last instruction.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Next {
    /// The following instruction, `PC + 4`. Includes branches which were not taken.
    Fallthrough(u64),
    /// Taken branch or jump.
    Jump(u64),
}

impl Next {
    pub fn pc(self) -> u64 {
        match self {
            Self::Fallthrough(pc) | Self::Jump(pc) => pc,
        }
    }
}

impl RunState {
    pub fn new(options: Options) -> Self {
        Self {
            reg: [0; REGISTER_COUNT],
            mem: vec![0; MEMORY_SIZE].into_boxed_slice(),
            pc: 0,
            options,
        }
    }

    pub fn pc(&self) -> u64 {
        self.pc
    }

    pub fn set_pc(&mut self, pc: u64) {
        self.pc = pc;
    }

    pub fn reg(&self, reg: Register) -> i64 {
        self.reg[reg.index()]
    }

    pub fn registers(&self) -> &[i64; REGISTER_COUNT] {
        &self.reg
    }

    pub fn set_reg(&mut self, reg: Register, value: i64) {
        if self.options.hardwire_zero && reg == Register::ZERO {
            return;
        }
        self.reg[reg.index()] = value;
    }

    pub fn options(&self) -> Options {
        self.options
    }

    /// `count` bytes starting at `address`. Fails if any of them lies outside memory.
    pub fn memory(&self, address: u64, count: usize) -> Result<&[u8], ExecError> {
        let range = Self::memory_range(address.into(), count)?;
        Ok(&self.mem[range])
    }

    /// Copy `bytes` into memory at `address`.
    pub fn write_memory(&mut self, address: u64, bytes: &[u8]) -> Result<(), ExecError> {
        let range = Self::memory_range(address.into(), bytes.len())?;
        self.mem[range].copy_from_slice(bytes);
        Ok(())
    }

    /// Wide enough for negative effective addresses and any `u64` requested directly.
    fn memory_range(address: i128, len: usize) -> Result<Range<usize>, ExecError> {
        usize::try_from(address)
            .ok()
            .filter(|start| *start < MEMORY_SIZE)
            .and_then(|start| {
                let end = start.checked_add(len)?;
                (end <= MEMORY_SIZE).then_some(start..end)
            })
            .ok_or(ExecError::MemoryOutOfBounds { address, len })
    }

    /// Apply one instruction, as if located at the current program counter.
    ///
    /// The program counter itself is left alone; the caller adopts the returned [`Next`].
    /// On error, registers and memory are unchanged.
    pub fn execute(&mut self, instr: &Instruction) -> Result<Next, ExecError> {
        let fallthrough = Next::Fallthrough(self.pc.wrapping_add(INSTRUCTION_WIDTH));
        let next = match *instr {
            Instruction::Alu { op, rd, rs1, rs2 } => {
                let value = alu(op, self.reg(rs1), self.reg(rs2));
                self.set_reg(rd, value);
                fallthrough
            }
            Instruction::AluImm { op, rd, rs1, imm } => {
                let value = alu_imm(op, self.reg(rs1), imm);
                self.set_reg(rd, value);
                fallthrough
            }
            Instruction::Load {
                width,
                rd,
                base,
                offset,
            } => {
                let address = self.reg(base).wrapping_add(offset);
                let value = self.load(address, width)?;
                self.set_reg(rd, value);
                fallthrough
            }
            Instruction::Store {
                width,
                src,
                base,
                offset,
            } => {
                let address = self.reg(base).wrapping_add(offset);
                let range = Self::memory_range(address.into(), width.bytes())?;
                let bytes = self.reg(src).to_le_bytes();
                self.mem[range].copy_from_slice(&bytes[..width.bytes()]);
                fallthrough
            }
            Instruction::Branch {
                cond,
                rs1,
                rs2,
                target,
            } => {
                if branch_taken(cond, self.reg(rs1), self.reg(rs2)) {
                    Next::Jump(target)
                } else {
                    fallthrough
                }
            }
            Instruction::Jal { rd, target } => {
                self.set_reg(rd, self.return_address());
                Next::Jump(target)
            }
            Instruction::Jalr { rd, base, offset } => {
                // Target is computed before `rd` is written, in case they are the same register
                let target = self.reg(base).wrapping_add(offset) & !1;
                if target < 0 {
                    return Err(ExecError::PcOutOfRange { target });
                }
                if rd != Register::ZERO {
                    self.set_reg(rd, self.return_address());
                }
                Next::Jump(target as u64)
            }
            Instruction::Lui { rd, imm } => {
                // Upper immediate is shifted as a 32-bit value, then sign-extended
                self.set_reg(rd, (imm as i32).wrapping_shl(12) as i64);
                fallthrough
            }
            Instruction::Unknown { .. } => fallthrough,
        };
        Ok(next)
    }

    fn return_address(&self) -> i64 {
        self.pc.wrapping_add(INSTRUCTION_WIDTH) as i64
    }

    fn load(&self, address: i64, width: LoadWidth) -> Result<i64, ExecError> {
        let range = Self::memory_range(address.into(), width.bytes())?;
        let mut bytes = [0; 8];
        bytes[..width.bytes()].copy_from_slice(&self.mem[range]);
        let value = i64::from_le_bytes(bytes);

        if width.is_signed() && self.options.sign_extend_loads {
            let unused_bits = (64 - 8 * width.bytes()) as u32;
            return Ok(value.wrapping_shl(unused_bits) >> unused_bits);
        }
        Ok(value)
    }
}

fn alu(op: AluOp, a: i64, b: i64) -> i64 {
    match op {
        AluOp::Add => a.wrapping_add(b),
        AluOp::Sub => a.wrapping_sub(b),
        AluOp::And => a & b,
        AluOp::Or => a | b,
        AluOp::Xor => a ^ b,
        AluOp::Sll => a << (b & SHIFT_MASK),
        // Logical right shift operates on the low 32 bits
        AluOp::Srl => ((a as u32) >> (b & SHIFT_MASK)) as i64,
        AluOp::Sra => a >> (b & SHIFT_MASK),
        AluOp::Slt => (a < b) as i64,
        AluOp::Sltu => ((a as u32) < (b as u32)) as i64,
    }
}

fn alu_imm(op: AluImmOp, a: i64, imm: i64) -> i64 {
    match op {
        AluImmOp::Addi => alu(AluOp::Add, a, imm),
        AluImmOp::Andi => alu(AluOp::And, a, imm),
        AluImmOp::Ori => alu(AluOp::Or, a, imm),
        AluImmOp::Xori => alu(AluOp::Xor, a, imm),
        AluImmOp::Slli => alu(AluOp::Sll, a, imm),
        AluImmOp::Srli => alu(AluOp::Srl, a, imm),
        AluImmOp::Srai => alu(AluOp::Sra, a, imm),
    }
}

fn branch_taken(cond: BranchCond, a: i64, b: i64) -> bool {
    match cond {
        BranchCond::Beq => a == b,
        BranchCond::Bne => a != b,
        BranchCond::Blt => a < b,
        BranchCond::Bge => a >= b,
        // Unsigned comparisons use the low 32 bits, like `sltu`
        BranchCond::Bltu => (a as u32) < (b as u32),
        BranchCond::Bgeu => (a as u32) >= (b as u32),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::decode;
    use crate::env::OpcodePolicy;
    use crate::symbol::LabelTable;

    const BOUNDARIES: [i64; 6] = [0, 1, -1, i64::MIN, i64::MAX, 0x1234_5678_9abc_def0];

    fn reg(name: &str) -> Register {
        name.parse().unwrap()
    }

    /// Decode and execute one instruction, adopting the next program counter.
    fn exec(state: &mut RunState, text: &str) -> Result<Next, ExecError> {
        let instr = decode(text, state.pc(), &LabelTable::new(), OpcodePolicy::Strict)
            .unwrap_or_else(|error| panic!("`{text}` failed to decode: {error}"));
        let next = state.execute(&instr)?;
        state.set_pc(next.pc());
        Ok(next)
    }

    fn binary(mnemonic: &str, a: i64, b: i64) -> i64 {
        let mut state = RunState::new(Options::default());
        state.set_reg(reg("a0"), a);
        state.set_reg(reg("a1"), b);
        exec(&mut state, &format!("{mnemonic} a2, a0, a1")).unwrap();
        state.reg(reg("a2"))
    }

    #[test]
    fn twos_complement_arithmetic() {
        for a in BOUNDARIES {
            for b in BOUNDARIES {
                assert_eq!(binary("add", a, b), a.wrapping_add(b), "add {a} {b}");
                assert_eq!(binary("sub", a, b), a.wrapping_sub(b), "sub {a} {b}");
                assert_eq!(binary("and", a, b), a & b, "and {a} {b}");
                assert_eq!(binary("or", a, b), a | b, "or {a} {b}");
                assert_eq!(binary("xor", a, b), a ^ b, "xor {a} {b}");
                assert_eq!(binary("slt", a, b), (a < b) as i64, "slt {a} {b}");
            }
        }
        assert_eq!(binary("add", i64::MAX, 1), i64::MIN);
        assert_eq!(binary("sub", i64::MIN, 1), i64::MAX);
    }

    #[test]
    fn shifts_mask_to_five_bits() {
        assert_eq!(binary("sll", 1, 4), 16);
        assert_eq!(binary("sll", 1, 33), 2);
        assert_eq!(binary("sll", 1, 31), 1 << 31);
        assert_eq!(binary("sra", -64, 3), -8);
        assert_eq!(binary("sra", i64::MIN, 32), i64::MIN);
        assert_eq!(binary("sra", -1, 63), -1);
    }

    #[test]
    fn logical_right_shift_truncates_to_32_bits() {
        assert_eq!(binary("srl", -1, 0), 0xFFFF_FFFF);
        assert_eq!(binary("srl", -1, 4), 0x0FFF_FFFF);
        assert_eq!(binary("srl", 0x1_0000_0010, 4), 1);
    }

    #[test]
    fn unsigned_compare_truncates_to_32_bits() {
        assert_eq!(binary("sltu", 1, -1), 1);
        assert_eq!(binary("sltu", -1, 1), 0);
        // Upper halves are ignored
        assert_eq!(binary("sltu", 0x1_0000_0000, 1), 1);
        assert_eq!(binary("sltu", 5, 5), 0);
    }

    #[test]
    fn immediates() {
        let mut state = RunState::new(Options::default());
        exec(&mut state, "addi a0, x0, -5").unwrap();
        assert_eq!(state.reg(reg("a0")), -5);
        exec(&mut state, "andi a1, a0, 0xff").unwrap();
        assert_eq!(state.reg(reg("a1")), 0xFB);
        exec(&mut state, "ori a1, a1, 0x100").unwrap();
        assert_eq!(state.reg(reg("a1")), 0x1FB);
        exec(&mut state, "xori a1, a1, -1").unwrap();
        assert_eq!(state.reg(reg("a1")), !0x1FB);
        exec(&mut state, "slli a2, a0, 36").unwrap();
        assert_eq!(state.reg(reg("a2")), -5 << 4);
        exec(&mut state, "srli a2, a0, 28").unwrap();
        assert_eq!(state.reg(reg("a2")), 0xF);
        exec(&mut state, "srai a2, a0, 1").unwrap();
        assert_eq!(state.reg(reg("a2")), -3);
        assert_eq!(state.pc(), 28);
    }

    #[test]
    fn load_upper_immediate() {
        let mut state = RunState::new(Options::default());
        exec(&mut state, "lui t0, 0x12345").unwrap();
        assert_eq!(state.reg(reg("t0")), 0x1234_5000);
        exec(&mut state, "lui t0, 0xfffff").unwrap();
        assert_eq!(state.reg(reg("t0")), -4096);
        exec(&mut state, "lui t0, 10").unwrap();
        assert_eq!(state.reg(reg("t0")), 10 << 12);
    }

    #[test]
    fn store_load_round_trips() {
        let mut state = RunState::new(Options::default());
        state.set_reg(reg("sp"), 0x2000);

        state.set_reg(reg("a0"), 0x0123_4567_89AB_CDEF);
        exec(&mut state, "sd a0, 8(sp)").unwrap();
        exec(&mut state, "ld a1, 8(sp)").unwrap();
        assert_eq!(state.reg(reg("a1")), 0x0123_4567_89AB_CDEF);
        assert_eq!(
            state.memory(0x2008, 8).unwrap(),
            &[0xEF, 0xCD, 0xAB, 0x89, 0x67, 0x45, 0x23, 0x01]
        );

        state.set_reg(reg("a0"), -1);
        exec(&mut state, "sd a0, 0(sp)").unwrap();
        exec(&mut state, "ld a1, 0(sp)").unwrap();
        assert_eq!(state.reg(reg("a1")), -1);

        state.set_reg(reg("a0"), 0x7654_3210);
        exec(&mut state, "sw a0, -4(sp)").unwrap();
        exec(&mut state, "lw a1, -4(sp)").unwrap();
        assert_eq!(state.reg(reg("a1")), 0x7654_3210);

        state.set_reg(reg("a0"), 0x1234);
        exec(&mut state, "sh a0, 2(sp)").unwrap();
        exec(&mut state, "lh a1, 2(sp)").unwrap();
        assert_eq!(state.reg(reg("a1")), 0x1234);

        state.set_reg(reg("a0"), 0x5A);
        exec(&mut state, "sb a0, 1(sp)").unwrap();
        exec(&mut state, "lb a1, 1(sp)").unwrap();
        assert_eq!(state.reg(reg("a1")), 0x5A);
    }

    #[test]
    fn stores_only_write_low_bytes() {
        let mut state = RunState::new(Options::default());
        state.set_reg(reg("a0"), -1);
        exec(&mut state, "sd a0, 0x100(x0)").unwrap();
        state.set_reg(reg("a0"), 0x1122_3344_5566_7788);
        exec(&mut state, "sh a0, 0x100(x0)").unwrap();
        assert_eq!(
            state.memory(0x100, 8).unwrap(),
            &[0x88, 0x77, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF]
        );
    }

    #[test]
    fn narrow_loads_zero_extend_by_default() {
        let mut state = RunState::new(Options::default());
        state.write_memory(0x100, &[0xFF; 8]).unwrap();
        for (text, expected) in [
            ("lw a0, 0x100(x0)", 0xFFFF_FFFF),
            ("lh a0, 0x100(x0)", 0xFFFF),
            ("lb a0, 0x100(x0)", 0xFF),
            ("lwu a0, 0x100(x0)", 0xFFFF_FFFF),
            ("lhu a0, 0x100(x0)", 0xFFFF),
            ("lbu a0, 0x100(x0)", 0xFF),
            ("ld a0, 0x100(x0)", -1),
        ] {
            exec(&mut state, text).unwrap();
            assert_eq!(state.reg(reg("a0")), expected, "{text}");
        }
    }

    #[test]
    fn narrow_loads_can_sign_extend() {
        let mut state = RunState::new(Options {
            sign_extend_loads: true,
            ..Options::default()
        });
        state.write_memory(0x100, &[0x80, 0x80, 0x80, 0x80]).unwrap();
        for (text, expected) in [
            ("lw a0, 0x100(x0)", 0xFFFF_FFFF_8080_8080_u64 as i64),
            ("lh a0, 0x100(x0)", 0xFFFF_FFFF_FFFF_8080_u64 as i64),
            ("lb a0, 0x100(x0)", -128),
            ("lwu a0, 0x100(x0)", 0x8080_8080),
            ("lhu a0, 0x100(x0)", 0x8080),
            ("lbu a0, 0x100(x0)", 0x80),
        ] {
            exec(&mut state, text).unwrap();
            assert_eq!(state.reg(reg("a0")), expected, "{text}");
        }
    }

    #[test]
    fn memory_bounds() {
        let mut state = RunState::new(Options::default());
        state.set_reg(reg("a0"), MEMORY_SIZE as i64 - 4);
        exec(&mut state, "sw a0, 0(a0)").unwrap();
        assert_eq!(
            exec(&mut state, "sd a0, 0(a0)"),
            Err(ExecError::MemoryOutOfBounds {
                address: MEMORY_SIZE as i128 - 4,
                len: 8,
            })
        );
        assert_eq!(
            exec(&mut state, "lb a1, -1(x0)"),
            Err(ExecError::MemoryOutOfBounds { address: -1, len: 1 })
        );
        // Failed instructions change nothing
        assert_eq!(state.pc(), 4);
        assert_eq!(state.reg(reg("a1")), 0);

        assert!(state.memory(MEMORY_SIZE as u64 - 1, 1).is_ok());
        assert!(state.memory(MEMORY_SIZE as u64 - 1, 2).is_err());
        assert!(state.memory(0x90000, 1).is_err());
        assert_eq!(
            state.memory(u64::MAX, 1),
            Err(ExecError::MemoryOutOfBounds {
                address: u64::MAX.into(),
                len: 1,
            })
        );
    }

    #[test]
    fn branches() {
        let cases = [
            ("beq", 3, 3, true),
            ("beq", 3, 4, false),
            ("bne", 3, 4, true),
            ("blt", -1, 0, true),
            ("blt", 0, -1, false),
            ("bge", 0, 0, true),
            ("bge", -1, 0, false),
            ("bltu", 0, -1, true),
            ("bltu", -1, 0, false),
            ("bgeu", -1, 0, true),
            ("bgeu", 0x1_0000_0000, 1, false),
        ];
        for (mnemonic, a, b, taken) in cases {
            let mut state = RunState::new(Options::default());
            state.set_pc(8);
            state.set_reg(reg("a0"), a);
            state.set_reg(reg("a1"), b);
            let next = exec(&mut state, &format!("{mnemonic} a0, a1, 3")).unwrap();
            let expected = if taken {
                Next::Jump(20)
            } else {
                Next::Fallthrough(12)
            };
            assert_eq!(next, expected, "{mnemonic} {a} {b}");
        }
    }

    #[test]
    fn jump_and_link() {
        let mut state = RunState::new(Options::default());
        state.set_pc(12);
        assert_eq!(exec(&mut state, "jal ra, -2"), Ok(Next::Jump(4)));
        assert_eq!(state.reg(reg("ra")), 16);

        state.set_reg(reg("t0"), 0x41);
        assert_eq!(exec(&mut state, "jalr t1, 2(t0)"), Ok(Next::Jump(0x42)));
        assert_eq!(state.reg(reg("t1")), 8);

        // Register zero is never linked by `jalr`
        state.set_pc(0);
        assert_eq!(exec(&mut state, "jalr x0, 0(ra)"), Ok(Next::Jump(16)));
        assert_eq!(state.reg(reg("x0")), 0);

        // Same source and destination
        state.set_pc(0);
        state.set_reg(reg("a0"), 100);
        assert_eq!(exec(&mut state, "jalr a0, 0(a0)"), Ok(Next::Jump(100)));
        assert_eq!(state.reg(reg("a0")), 4);

        state.set_reg(reg("a0"), -8);
        assert_eq!(
            exec(&mut state, "jalr ra, 0(a0)"),
            Err(ExecError::PcOutOfRange { target: -8 })
        );
    }

    #[test]
    fn zero_register_is_writable_by_default() {
        let mut state = RunState::new(Options::default());
        exec(&mut state, "addi x0, x0, 7").unwrap();
        assert_eq!(state.reg(Register::ZERO), 7);
        exec(&mut state, "jal zero, 1").unwrap();
        assert_eq!(state.reg(Register::ZERO), 8);
    }

    #[test]
    fn zero_register_can_be_hardwired() {
        let mut state = RunState::new(Options {
            hardwire_zero: true,
            ..Options::default()
        });
        exec(&mut state, "addi x0, x0, 7").unwrap();
        exec(&mut state, "lui zero, 1").unwrap();
        exec(&mut state, "jal x0, 1").unwrap();
        assert_eq!(state.reg(Register::ZERO), 0);
    }

    #[test]
    fn unknown_instructions_fall_through() {
        let mut state = RunState::new(Options::default());
        let instr = Instruction::Unknown {
            mnemonic: "fence".to_string(),
        };
        assert_eq!(state.execute(&instr), Ok(Next::Fallthrough(4)));
        assert_eq!(state.registers(), &[0; REGISTER_COUNT]);
    }
}
