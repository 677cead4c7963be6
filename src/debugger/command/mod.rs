pub mod error;
mod parse;
mod reader;

use std::fmt;

use self::parse::Arguments;

pub use self::reader::{CommandReader, Read};

#[derive(Debug, PartialEq)]
pub enum Command {
    Help,
    Exit,
    Load { path: String },
    Run,
    Step { count: u32 },
    Registers,
    Memory { address: u64, count: usize },
    BreakAdd { line: usize },
    BreakRemove { line: usize },
    BreakList,
    Reset,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum CommandName {
    Help,
    Exit,
    Load,
    Run,
    Step,
    Registers,
    Memory,
    BreakAdd,
    BreakRemove,
    BreakList,
    Reset,
}

impl fmt::Display for CommandName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Help => write!(f, "help"),
            Self::Exit => write!(f, "exit"),
            Self::Load => write!(f, "load"),
            Self::Run => write!(f, "run"),
            Self::Step => write!(f, "step"),
            Self::Registers => write!(f, "regs"),
            Self::Memory => write!(f, "mem"),
            Self::BreakAdd => write!(f, "break"),
            Self::BreakRemove => write!(f, "del break"),
            Self::BreakList => write!(f, "break list"),
            Self::Reset => write!(f, "reset"),
        }
    }
}

impl TryFrom<&str> for Command {
    type Error = error::Command;

    /// Assumes line is non-empty.
    fn try_from(line: &str) -> Result<Self, Self::Error> {
        let mut iter = Arguments::from(line);

        let command_name = iter.get_command_name()?;
        Command::parse_arguments(command_name, &mut iter).map_err(|error| {
            error::Command::InvalidArgument {
                command_name,
                error,
            }
        })
    }
}

impl Command {
    /// Read the next valid command, reporting invalid ones through `handle_error`.
    ///
    /// Returns `None` on EOF.
    pub fn read_from<F>(source: &mut CommandReader, handle_error: F) -> Option<Self>
    where
        F: Fn(error::Command),
    {
        loop {
            let line = source.read()?.trim();

            // Necessary, since `Command::try_from` assumes non-empty line
            if line.is_empty() {
                continue;
            }

            match Command::try_from(line) {
                Ok(command) => return Some(command),
                Err(error) => {
                    handle_error(error);
                    continue;
                }
            }
        }
    }

    fn parse_arguments(name: CommandName, iter: &mut Arguments) -> Result<Self, error::Argument> {
        let mut expected_args = 0;

        let command = match name {
            // Allow trailing arguments
            CommandName::Help => return Ok(Self::Help),

            CommandName::Exit => Self::Exit,
            CommandName::Run => Self::Run,
            CommandName::Registers => Self::Registers,
            CommandName::Reset => Self::Reset,
            CommandName::BreakList => Self::BreakList,

            CommandName::Load => {
                expected_args = 1;
                let path = iter.next_str("path", expected_args)?;
                Self::Load {
                    path: path.to_string(),
                }
            }
            CommandName::Step => {
                expected_args = 1;
                let count = iter.next_positive_integer_or_default("count")?;
                Self::Step { count }
            }
            CommandName::Memory => {
                expected_args = 2;
                let address = iter.next_address("address", expected_args)?;
                let count = iter.next_count("count", expected_args)?;
                Self::Memory { address, count }
            }
            CommandName::BreakAdd => {
                expected_args = 1;
                let line = iter.next_positive_integer("line", expected_args)?;
                Self::BreakAdd { line }
            }
            CommandName::BreakRemove => {
                expected_args = 1;
                let line = iter.next_positive_integer("line", expected_args)?;
                Self::BreakRemove { line }
            }
        };

        iter.expect_end(expected_args)?;

        Ok(command)
    }
}
