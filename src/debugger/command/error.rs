use std::error::Error;
use std::fmt;

use super::CommandName;

/// Error parsing a command.
#[derive(Debug, PartialEq)]
pub enum Command {
    Invalid {
        command_name: String,
        suggested: Option<CommandName>,
    },
    MissingSubcommand {
        command_name: &'static str,
    },
    InvalidSubcommand {
        command_name: &'static str,
        subcommand_name: String,
        suggested: Option<CommandName>,
    },
    InvalidArgument {
        command_name: CommandName,
        error: Argument,
    },
}

/// Error parsing command arguments.
#[derive(Debug, PartialEq)]
pub enum Argument {
    Missing {
        argument_name: &'static str,
        expected_count: u8,
        actual_count: u8,
    },
    TooManyArguments {
        expected_count: u8,
        actual_count: u8,
    },
    InvalidValue {
        argument_name: &'static str,
        string: String,
        error: Value,
    },
}

/// Error parsing an argument value.
#[derive(Debug, PartialEq)]
pub enum Value {
    MalformedInteger {},
    MalformedAddress {},
    IntegerTooLarge { max: u64 },
    NotPositive {},
}

impl Error for Command {}
impl Error for Argument {}
impl Error for Value {}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Invalid {
                command_name,
                suggested,
            } => {
                write!(f, "Not a command: `{}`.", command_name)?;
                if let Some(suggested) = suggested {
                    write!(f, "\n    Did you mean `{}`?", suggested)?;
                }
                if crate::air::Mnemonic::lookup(&command_name.to_ascii_lowercase()).is_some() {
                    write!(
                        f,
                        "\n    Instructions cannot be entered directly. Load a program with `load`."
                    )?;
                }
            }
            Self::InvalidSubcommand {
                command_name,
                subcommand_name,
                suggested,
            } => {
                write!(
                    f,
                    "Invalid subcommand: `{} {}`.",
                    command_name, subcommand_name
                )?;
                if let Some(suggested) = suggested {
                    write!(f, "\n    Did you mean `{}`?", suggested)?;
                }
            }
            Self::MissingSubcommand { command_name } => {
                write!(f, "Missing subcommand: `{} (...)`.", command_name)?;
            }
            Self::InvalidArgument {
                command_name,
                error,
            } => {
                write!(f, "In command `{}`:", command_name)?;
                write!(f, "\n    ")?;
                write!(f, "{}", error)?;
            }
        }
        Ok(())
    }
}

impl fmt::Display for Argument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Argument::Missing {
                argument_name,
                expected_count,
                actual_count,
            } => {
                write!(f, "Missing argument `{}`.", argument_name)?;
                write!(f, "\n        ")?;
                write!(
                    f,
                    "Expected {} argument{}, found {}.",
                    expected_count,
                    if *expected_count == 1 { "" } else { "s" },
                    actual_count,
                )?;
            }
            Argument::TooManyArguments {
                expected_count,
                actual_count,
            } => {
                write!(f, "Too many arguments.")?;
                write!(f, "\n        ")?;
                write!(
                    f,
                    "Expected {} argument{}, found {}.",
                    expected_count,
                    if *expected_count == 1 { "" } else { "s" },
                    actual_count,
                )?;
            }
            Argument::InvalidValue {
                argument_name,
                string: value,
                error,
            } => {
                write!(f, "For argument `{}`: `{}`.", argument_name, value)?;
                write!(f, "\n        ")?;
                write!(f, "{}", error)?;
            }
        }
        Ok(())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::MalformedInteger {} => {
                write!(f, "Malformed integer.")?;
            }
            Value::MalformedAddress {} => {
                write!(f, "Malformed address.")?;
                write!(f, "\n        ")?;
                write!(f, "Addresses are hexadecimal, with or without `0x`.")?;
            }
            Value::IntegerTooLarge { max } => {
                write!(f, "Integer too large.")?;
                write!(f, "\n        ")?;
                write!(f, "Maximum value: {}.", max)?;
            }
            Value::NotPositive {} => {
                write!(f, "Value must be greater than zero.")?;
            }
        }
        Ok(())
    }
}
