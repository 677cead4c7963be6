mod breakpoint;
mod command;
mod shell;

pub use self::breakpoint::{Breakpoint, BreakpointError, Breakpoints};
pub use self::shell::{print_trace, Shell, ShellOptions};
use crate::env::Options;
use crate::error::{ExecError, Fault};
use crate::parser::Program;
use crate::runtime::{RunState, DATA_SECTION_START};

/// A simulator session: the loaded program, its architectural state, and breakpoints.
///
/// Every operation reports the instruction it is about to execute through a `trace` callback,
/// with the program counter and the instruction text.
pub struct Debugger {
    program: Program,
    /// State right after loading, restored by `reset`. Must not be mutated.
    initial_state: RunState,
    state: RunState,
    breakpoints: Breakpoints,
    options: Options,
}

/// Why `run` returned.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stop {
    /// Paused before executing the instruction at `pc`.
    Breakpoint { pc: u64 },
    /// Program counter moved past the last instruction.
    EndOfProgram,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StepOutcome {
    /// Executed the instruction at `pc`.
    Executed { pc: u64 },
    /// Program counter is already past the last instruction. Nothing was changed.
    NothingToStep,
}

impl Debugger {
    /// A session with no program loaded.
    pub fn new(options: Options) -> Self {
        let state = RunState::new(options);
        Self {
            program: Program::default(),
            initial_state: state.clone(),
            state,
            breakpoints: Breakpoints::default(),
            options,
        }
    }

    /// Replace the program, resetting registers, memory, program counter and breakpoints.
    pub fn load(&mut self, program: Program) {
        let mut state = RunState::new(self.options);
        state
            .write_memory(DATA_SECTION_START as u64, program.data())
            .expect("data section was checked to fit in memory when parsed");

        self.initial_state = state.clone();
        self.state = state;
        self.program = program;
        self.breakpoints.clear();
    }

    /// Execute until a breakpoint or the end of the program.
    ///
    /// A breakpoint at the current program counter stops execution immediately, before anything
    /// is executed. Use [`Debugger::step`] to move past it.
    pub fn run(&mut self, mut trace: impl FnMut(u64, &str)) -> Result<Stop, Fault> {
        loop {
            let pc = self.state.pc();
            if self.breakpoints.contains(pc) {
                return Ok(Stop::Breakpoint { pc });
            }
            if self.cycle(&mut trace)?.is_none() {
                return Ok(Stop::EndOfProgram);
            }
        }
    }

    /// Execute exactly one instruction, ignoring breakpoints.
    pub fn step(&mut self, mut trace: impl FnMut(u64, &str)) -> Result<StepOutcome, Fault> {
        Ok(match self.cycle(&mut trace)? {
            Some(pc) => StepOutcome::Executed { pc },
            None => StepOutcome::NothingToStep,
        })
    }

    /// Execute the instruction at the program counter and adopt the next program counter.
    ///
    /// Returns the program counter of the executed instruction, or `None` if it is past the end
    /// of the program. A faulting instruction leaves all state as it was.
    fn cycle(&mut self, trace: &mut impl FnMut(u64, &str)) -> Result<Option<u64>, Fault> {
        let pc = self.state.pc();
        let Some(line) = self.program.at_pc(pc) else {
            return Ok(None);
        };
        trace(pc, &line.text);

        let next = self
            .state
            .execute(&line.instruction)
            .map_err(|error| Fault {
                pc,
                text: line.text.clone(),
                error,
            })?;
        self.state.set_pc(next.pc());
        Ok(Some(pc))
    }

    /// Add a breakpoint before the instruction on a 1-based line.
    pub fn set_breakpoint(&mut self, line: usize) -> Result<Breakpoint, BreakpointError> {
        let breakpoint = Breakpoint::from_line(line, self.program.len())?;
        if !self.breakpoints.insert(breakpoint) {
            return Err(BreakpointError::AlreadyExists { line });
        }
        Ok(breakpoint)
    }

    /// Remove the breakpoint on a 1-based line.
    pub fn clear_breakpoint(&mut self, line: usize) -> Result<Breakpoint, BreakpointError> {
        let breakpoint = Breakpoint::from_line(line, self.program.len())
            .map_err(|_| BreakpointError::NotSet { line })?;
        if !self.breakpoints.remove(breakpoint.address) {
            return Err(BreakpointError::NotSet { line });
        }
        Ok(breakpoint)
    }

    pub fn breakpoints(&self) -> &Breakpoints {
        &self.breakpoints
    }

    /// Restore registers, memory and program counter to their state right after loading.
    ///
    /// The program and breakpoints are kept.
    pub fn reset(&mut self) {
        self.state = self.initial_state.clone();
    }

    pub fn state(&self) -> &RunState {
        &self.state
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    pub fn options(&self) -> Options {
        self.options
    }

    /// `count` bytes of memory starting at `address`.
    pub fn memory(&self, address: u64, count: usize) -> Result<&[u8], ExecError> {
        self.state.memory(address, count)
    }
}
