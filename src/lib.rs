#[macro_use]
pub mod output;

// Parsing
mod air;
pub use air::{AsmLine, Instruction, INSTRUCTION_WIDTH};
mod decode;
pub use decode::decode;
mod parser;
pub use parser::{parse, Program};
mod symbol;
pub use symbol::{LabelTable, Register, Span};

// Running
mod runtime;
pub use runtime::{Next, RunState, DATA_SECTION_START, MEMORY_SIZE};
pub mod debugger;
pub use debugger::{Debugger, ShellOptions, StepOutcome, Stop};

pub mod env;
pub use env::{OpcodePolicy, Options};
mod error;
pub use error::{DecodeError, ExecError, Fault};

/// Amount of lines to show as context, each side of focus line (line containing span).
pub const DIAGNOSTIC_CONTEXT_LINES: usize = 4;
