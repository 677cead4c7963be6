use std::path::Path;

use super::command::{error, Command, CommandReader};
use super::{Debugger, StepOutcome, Stop};
use crate::air::INSTRUCTION_WIDTH;
use crate::error::Fault;
use crate::output::{Condition, Kind, Output};
use crate::parser::Program;

/// Leave this as a struct, in case more options are added in the future. Plus it is more explicit.
#[derive(Debug, Default)]
pub struct ShellOptions {
    /// Commands to execute before reading from stdin.
    pub command: Option<String>,
}

/// Read-eval loop over debugger commands.
pub struct Shell {
    debugger: Debugger,
    reader: CommandReader,
}

impl Shell {
    pub fn new(opts: ShellOptions, debugger: Debugger) -> Self {
        Self {
            debugger,
            reader: CommandReader::from(opts.command),
        }
    }

    /// Execute commands until `exit` or the end of input.
    pub fn run(&mut self) {
        loop {
            Output::Debugger(Condition::Always, Kind::Normal).start_new_line();

            // Convert EOF to `exit` command
            let command = Command::read_from(&mut self.reader, report_command_error)
                .unwrap_or(Command::Exit);
            if !self.execute(command) {
                break;
            }
        }
    }

    /// Returns `false` if the session should end.
    fn execute(&mut self, command: Command) -> bool {
        match command {
            Command::Exit => {
                dprintln!(Always, Info, "Exited the simulator.");
                return false;
            }

            Command::Help => {
                dprintln!(Always, Special, "\n{}", include_str!("./help.txt"));
            }

            Command::Load { path } => {
                load_file(&mut self.debugger, Path::new(&path));
            }

            Command::Run => {
                dprintln!(Sometimes, Info, "Running...");
                let result = self.debugger.run(print_trace);
                report_stop(result);
            }

            Command::Step { count } => {
                for _ in 0..count {
                    match self.debugger.step(print_trace) {
                        Ok(StepOutcome::Executed { .. }) => (),
                        Ok(StepOutcome::NothingToStep) => {
                            dprintln!(Always, Warning, "Nothing to step.");
                            break;
                        }
                        Err(fault) => {
                            report_fault(&fault);
                            break;
                        }
                    }
                }
                dprintln!(
                    Sometimes,
                    Info,
                    "Program counter at: 0x{:08x}.",
                    self.debugger.state().pc()
                );
            }

            Command::Registers => {
                dprintln!(Sometimes, Info, "Registers:");
                Output::Normal.print_registers(self.debugger.state());
            }

            Command::Memory { address, count } => match self.debugger.memory(address, count) {
                Ok(bytes) => {
                    dprintln!(Sometimes, Info, "Memory at address 0x{:08x}:", address);
                    Output::Normal.print_memory(address, bytes);
                }
                Err(error) => {
                    dprintln!(Always, Error, "Error: {}.", error);
                }
            },

            Command::BreakAdd { line } => match self.debugger.set_breakpoint(line) {
                Ok(breakpoint) => {
                    dprintln!(
                        Always,
                        Warning,
                        "Breakpoint set at line {} (PC = 0x{:08x}).",
                        line,
                        breakpoint.address
                    );
                }
                Err(error) => dprintln!(Always, Error, "Error: {}", error),
            },
            Command::BreakRemove { line } => match self.debugger.clear_breakpoint(line) {
                Ok(_) => dprintln!(Always, Warning, "Breakpoint removed at line {}.", line),
                Err(error) => dprintln!(Always, Error, "Error: {}", error),
            },
            Command::BreakList => self.list_breakpoints(),

            Command::Reset => {
                self.debugger.reset();
                dprintln!(Always, Warning, "Reset program to initial state.");
            }
        }
        true
    }

    fn list_breakpoints(&self) {
        let breakpoints = self.debugger.breakpoints();
        if breakpoints.is_empty() {
            dprintln!(Always, Info, "No breakpoints set.");
            return;
        }
        dprintln!(Always, Info, "Breakpoints:");
        for (i, breakpoint) in breakpoints.iter().enumerate() {
            let program = self.debugger.program();
            let text = program
                .at_pc(breakpoint.address)
                .map_or("", |line| line.text.as_str());
            let text = match program.labels().name_of(breakpoint.line() - 1) {
                Some(label) => format!("{}: {}", label, text),
                None => text.to_string(),
            };
            if Output::is_minimal() {
                dprintln!(
                    Always,
                    Info,
                    "line {} (0x{:08x}): {}",
                    breakpoint.line(),
                    breakpoint.address,
                    text
                );
                continue;
            }
            dprintln!(
                Always,
                Info,
                "{} line {:<4} 0x{:08x}  ──  \x1b[0m{}",
                if i + 1 == breakpoints.len() {
                    "╰─"
                } else {
                    "├─"
                },
                breakpoint.line(),
                breakpoint.address,
                text
            );
        }
    }
}

/// Parse the file at `path` and load it into `debugger`.
///
/// On failure the diagnostic is printed and the previous program is kept.
fn load_file(debugger: &mut Debugger, path: &Path) -> bool {
    let program = match Program::from_file(path, debugger.options().unknown_opcodes) {
        Ok(program) => program,
        Err(report) => {
            eprintln!("{:?}", report);
            dprintln!(
                Always,
                Error,
                "Failed to load `{}`. Previous program is unchanged.",
                path.display()
            );
            return false;
        }
    };

    let (instructions, labels) = (program.len(), program.labels().len());
    debugger.load(program);
    dprintln!(
        Always,
        Info,
        "Loaded `{}` ({} instruction{}, {} label{}).",
        path.display(),
        instructions,
        if instructions == 1 { "" } else { "s" },
        labels,
        if labels == 1 { "" } else { "s" },
    );
    true
}

pub fn print_trace(pc: u64, text: &str) {
    Output::Normal.print_trace(pc, text);
}

/// Report why `run` returned.
fn report_stop(result: Result<Stop, Fault>) {
    match result {
        Ok(Stop::Breakpoint { pc }) => {
            dprintln!(
                Always,
                Warning,
                "Execution stopped at breakpoint on line {} (PC = 0x{:08x}).",
                pc / INSTRUCTION_WIDTH + 1,
                pc
            );
        }
        Ok(Stop::EndOfProgram) => {
            dprintln!(Always, Info, "Reached end of program.");
        }
        Err(fault) => report_fault(&fault),
    }
}

fn report_fault(fault: &Fault) {
    dprintln!(Always, Error, "Execution fault: {}.", fault);
}

fn report_command_error(error: error::Command) {
    dprintln!(Always, Error, "{}", error);
    dprintln!(Sometimes, Error, "Type `help` for a list of commands.");
}
