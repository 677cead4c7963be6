use crate::symbol::{Register, Span};

/// Width in bytes of every instruction; instruction `i` lives at PC `i * 4`.
pub const INSTRUCTION_WIDTH: u64 = 4;

/// A decoded instruction. Operands are typed and branch targets are already resolved to an
/// absolute program counter, so execution never touches the source text.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Instruction {
    /// Register-register arithmetic and logic.
    Alu {
        op: AluOp,
        rd: Register,
        rs1: Register,
        rs2: Register,
    },
    /// Register-immediate arithmetic and logic.
    AluImm {
        op: AluImmOp,
        rd: Register,
        rs1: Register,
        imm: i64,
    },
    /// Read `width` bytes at `base + offset` into `rd`.
    Load {
        width: LoadWidth,
        rd: Register,
        base: Register,
        offset: i64,
    },
    /// Write the low `width` bytes of `src` to `base + offset`.
    Store {
        width: StoreWidth,
        src: Register,
        base: Register,
        offset: i64,
    },
    Branch {
        cond: BranchCond,
        rs1: Register,
        rs2: Register,
        target: u64,
    },
    /// Jump and link to an absolute target.
    Jal { rd: Register, target: u64 },
    /// Jump and link to `(base + offset) & !1`.
    Jalr {
        rd: Register,
        base: Register,
        offset: i64,
    },
    /// Load upper immediate.
    Lui { rd: Register, imm: i64 },
    /// Mnemonic nobody recognised, only produced when unknown opcodes are permitted.
    /// Executes as a no-op.
    Unknown { mnemonic: String },
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum AluOp {
    Add,
    Sub,
    And,
    Or,
    Xor,
    Sll,
    Srl,
    Sra,
    Slt,
    Sltu,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum AluImmOp {
    Addi,
    Andi,
    Ori,
    Xori,
    Slli,
    Srli,
    Srai,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum LoadWidth {
    Ld,
    Lw,
    Lh,
    Lb,
    Lwu,
    Lhu,
    Lbu,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum StoreWidth {
    Sd,
    Sw,
    Sh,
    Sb,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum BranchCond {
    Beq,
    Bne,
    Blt,
    Bge,
    Bltu,
    Bgeu,
}

impl LoadWidth {
    pub fn bytes(self) -> usize {
        match self {
            Self::Ld => 8,
            Self::Lw | Self::Lwu => 4,
            Self::Lh | Self::Lhu => 2,
            Self::Lb | Self::Lbu => 1,
        }
    }

    /// Whether the mnemonic names a signed load. Narrow signed loads are only sign-extended
    /// when that option is enabled.
    pub fn is_signed(self) -> bool {
        matches!(self, Self::Lw | Self::Lh | Self::Lb)
    }
}

impl StoreWidth {
    pub fn bytes(self) -> usize {
        match self {
            Self::Sd => 8,
            Self::Sw => 4,
            Self::Sh => 2,
            Self::Sb => 1,
        }
    }
}

/// Category of an instruction mnemonic, which determines its operand syntax.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Mnemonic {
    Alu(AluOp),
    AluImm(AluImmOp),
    Load(LoadWidth),
    Store(StoreWidth),
    Branch(BranchCond),
    Jal,
    Jalr,
    Lui,
}

/// Every supported mnemonic.
pub const MNEMONICS: &[(&str, Mnemonic)] = {
    use self::{AluImmOp::*, AluOp::*, BranchCond::*, LoadWidth::*, Mnemonic as M, StoreWidth::*};
    &[
        ("add", M::Alu(Add)),
        ("sub", M::Alu(Sub)),
        ("and", M::Alu(And)),
        ("or", M::Alu(Or)),
        ("xor", M::Alu(Xor)),
        ("sll", M::Alu(Sll)),
        ("srl", M::Alu(Srl)),
        ("sra", M::Alu(Sra)),
        ("slt", M::Alu(Slt)),
        ("sltu", M::Alu(Sltu)),
        ("addi", M::AluImm(Addi)),
        ("andi", M::AluImm(Andi)),
        ("ori", M::AluImm(Ori)),
        ("xori", M::AluImm(Xori)),
        ("slli", M::AluImm(Slli)),
        ("srli", M::AluImm(Srli)),
        ("srai", M::AluImm(Srai)),
        ("ld", M::Load(Ld)),
        ("lw", M::Load(Lw)),
        ("lh", M::Load(Lh)),
        ("lb", M::Load(Lb)),
        ("lwu", M::Load(Lwu)),
        ("lhu", M::Load(Lhu)),
        ("lbu", M::Load(Lbu)),
        ("sd", M::Store(Sd)),
        ("sw", M::Store(Sw)),
        ("sh", M::Store(Sh)),
        ("sb", M::Store(Sb)),
        ("beq", M::Branch(Beq)),
        ("bne", M::Branch(Bne)),
        ("blt", M::Branch(Blt)),
        ("bge", M::Branch(Bge)),
        ("bltu", M::Branch(Bltu)),
        ("bgeu", M::Branch(Bgeu)),
        ("jal", M::Jal),
        ("jalr", M::Jalr),
        ("lui", M::Lui),
    ]
};

impl Mnemonic {
    pub fn lookup(name: &str) -> Option<Self> {
        MNEMONICS
            .iter()
            .find(|(mnemonic, _)| *mnemonic == name)
            .map(|(_, kind)| *kind)
    }

    pub fn name(self) -> &'static str {
        MNEMONICS
            .iter()
            .find(|(_, kind)| *kind == self)
            .map(|(mnemonic, _)| *mnemonic)
            .expect("every mnemonic kind is listed")
    }
}

/// One instruction of a loaded program, with the text it was decoded from.
#[derive(Clone, Debug)]
pub struct AsmLine {
    pub instruction: Instruction,
    /// Instruction text, with any label and comment removed.
    pub text: String,
    /// Location of `text` in the loaded source, or a dummy span for pre-tokenized input.
    pub span: Span,
}
