use std::iter::Peekable;
use std::str::SplitWhitespace;

use super::{error, CommandName};
use crate::decode::parse_integer;

#[rustfmt::skip]
const COMMANDS: CommandNameList = &[
    (CommandName::Help,      &["help", "--help", "h", "-h", "?"]),
    (CommandName::Exit,      &["exit", "quit", "q"]),
    (CommandName::Load,      &["load"]),
    (CommandName::Run,       &["run"]),
    (CommandName::Step,      &["step", "s"]),
    (CommandName::Registers, &["regs", "registers", "reg", "r"]),
    (CommandName::Memory,    &["mem", "memory", "m"]),
    (CommandName::Reset,     &["reset"]),
    // "break" and "del" are treated specially
];
const BREAK_COMMAND: CandidateList = &["break", "b"];
#[rustfmt::skip]
const BREAK_SUBCOMMANDS: CommandNameList = &[
    (CommandName::BreakList,   &["list", "l"]),
    (CommandName::BreakAdd,    &["add", "a"]),
    (CommandName::BreakRemove, &["remove", "rm", "del", "delete"]),
];
const DELETE_COMMAND: CandidateList = &["del", "delete", "d"];
const DELETE_SUBCOMMANDS: CommandNameList = &[(CommandName::BreakRemove, &["break", "b"])];

/// A [`CommandName`] with a list of name candidates.
type CommandNameList<'a> = &'a [(CommandName, CandidateList<'a>)];
/// List of single-word aliases for a command or subcommand.
type CandidateList<'a> = &'a [&'a str];

/// Iterator over a command string which yields command-name or argument values.
pub struct Arguments<'a> {
    tokens: Peekable<SplitWhitespace<'a>>,
    /// Amount of arguments requested (successfully or not).
    ///
    /// Must only be incremented by [`Self::next_argument_str`].
    arg_count: u8,
}

impl<'a> From<&'a str> for Arguments<'a> {
    fn from(buffer: &'a str) -> Self {
        Self {
            tokens: buffer.split_whitespace().peekable(),
            arg_count: 0,
        }
    }
}

impl<'a> Arguments<'a> {
    fn next_argument_str(&mut self) -> Option<&'a str> {
        let argument = self.tokens.next()?;
        self.arg_count += 1;
        Some(argument)
    }

    /// Parse next [`CommandName`].
    ///
    /// Considers multi-word command names (i.e. subcommands) as one name. Eg. "break list".
    ///
    /// Assumes line is non-empty.
    pub fn get_command_name(&mut self) -> Result<CommandName, error::Command> {
        let command_name = self.tokens.next().unwrap_or("");

        if let Some(command) = find_name_match(command_name, COMMANDS) {
            return Ok(command);
        }

        if name_matches(command_name, BREAK_COMMAND) {
            // `break <line>` is shorthand for `break add <line>`
            if self
                .tokens
                .peek()
                .is_some_and(|argument| parse_integer(argument).is_some())
            {
                return Ok(CommandName::BreakAdd);
            }
            return self.get_subcommand_name(BREAK_COMMAND[0], BREAK_SUBCOMMANDS);
        }
        if name_matches(command_name, DELETE_COMMAND) {
            return self.get_subcommand_name(DELETE_COMMAND[0], DELETE_SUBCOMMANDS);
        }

        Err(error::Command::Invalid {
            command_name: command_name.to_string(),
            suggested: suggest(command_name, COMMANDS)
                .or_else(|| suggest(command_name, &[(CommandName::BreakAdd, BREAK_COMMAND)])),
        })
    }

    fn get_subcommand_name(
        &mut self,
        command_name: &'static str,
        subcommands: CommandNameList,
    ) -> Result<CommandName, error::Command> {
        let Some(subcommand_name) = self.tokens.next() else {
            return Err(error::Command::MissingSubcommand { command_name });
        };
        find_name_match(subcommand_name, subcommands).ok_or_else(|| {
            error::Command::InvalidSubcommand {
                command_name,
                subcommand_name: subcommand_name.to_string(),
                suggested: suggest(subcommand_name, subcommands),
            }
        })
    }

    /// Returns an error if the command string has any arguments left.
    pub fn expect_end(&mut self, expected_count: u8) -> Result<(), error::Argument> {
        if self.next_argument_str().is_none() {
            return Ok(());
        }
        // Count every extra argument, for the error message
        while self.next_argument_str().is_some() {}
        Err(error::Argument::TooManyArguments {
            expected_count,
            actual_count: self.arg_count,
        })
    }

    fn next_or_missing(
        &mut self,
        argument_name: &'static str,
        expected_count: u8,
    ) -> Result<&'a str, error::Argument> {
        let actual_count = self.arg_count;
        self.next_argument_str()
            .ok_or(error::Argument::Missing {
                argument_name,
                expected_count,
                actual_count,
            })
    }

    /// Parse next argument as text, such as a path.
    pub fn next_str(
        &mut self,
        argument_name: &'static str,
        expected_count: u8,
    ) -> Result<&'a str, error::Argument> {
        self.next_or_missing(argument_name, expected_count)
    }

    /// Parse next argument as a positive integer.
    pub fn next_positive_integer<T>(
        &mut self,
        argument_name: &'static str,
        expected_count: u8,
    ) -> Result<T, error::Argument>
    where
        T: TryFrom<u64> + Bounded,
    {
        let string = self.next_or_missing(argument_name, expected_count)?;
        parse_positive_integer(string).map_err(|error| error::Argument::InvalidValue {
            argument_name,
            string: string.to_string(),
            error,
        })
    }

    /// Parse next argument as a positive integer, or `1` if there are no arguments left.
    pub fn next_positive_integer_or_default<T>(
        &mut self,
        argument_name: &'static str,
    ) -> Result<T, error::Argument>
    where
        T: TryFrom<u64> + Bounded,
    {
        if self.tokens.peek().is_none() {
            return Ok(T::ONE);
        }
        self.next_positive_integer(argument_name, 1)
    }

    /// Parse next argument as an integer, which may be zero.
    pub fn next_count(
        &mut self,
        argument_name: &'static str,
        expected_count: u8,
    ) -> Result<usize, error::Argument> {
        let string = self.next_or_missing(argument_name, expected_count)?;
        let invalid = |error| error::Argument::InvalidValue {
            argument_name,
            string: string.to_string(),
            error,
        };
        let value = parse_integer(string)
            .filter(|value| *value >= 0)
            .ok_or_else(|| invalid(error::Value::MalformedInteger {}))?;
        usize::try_from(value).map_err(|_| {
            invalid(error::Value::IntegerTooLarge {
                max: usize::MAX as u64,
            })
        })
    }

    /// Parse next argument as a hexadecimal address, with optional `0x` prefix.
    pub fn next_address(
        &mut self,
        argument_name: &'static str,
        expected_count: u8,
    ) -> Result<u64, error::Argument> {
        let string = self.next_or_missing(argument_name, expected_count)?;
        parse_address(string).map_err(|error| error::Argument::InvalidValue {
            argument_name,
            string: string.to_string(),
            error,
        })
    }
}

/// Integer types which arguments can be parsed as.
pub trait Bounded {
    const ONE: Self;
    const MAX_VALUE: u64;
}

impl Bounded for u32 {
    const ONE: Self = 1;
    const MAX_VALUE: u64 = u32::MAX as u64;
}

impl Bounded for usize {
    const ONE: Self = 1;
    const MAX_VALUE: u64 = usize::MAX as u64;
}

fn parse_positive_integer<T>(string: &str) -> Result<T, error::Value>
where
    T: TryFrom<u64> + Bounded,
{
    let Some(value) = parse_integer(string) else {
        return Err(error::Value::MalformedInteger {});
    };
    if value <= 0 {
        return Err(error::Value::NotPositive {});
    }
    T::try_from(value as u64).map_err(|_| error::Value::IntegerTooLarge { max: T::MAX_VALUE })
}

fn parse_address(string: &str) -> Result<u64, error::Value> {
    let digits = string
        .strip_prefix("0x")
        .or_else(|| string.strip_prefix("0X"))
        .unwrap_or(string);
    if digits.is_empty() || digits.starts_with(['+', '-']) {
        return Err(error::Value::MalformedAddress {});
    }
    u64::from_str_radix(digits, 16).map_err(|_| error::Value::MalformedAddress {})
}

/// Returns the first [`CommandName`], which has a corresponding candidate which matches `name`
/// (case insensitive).
fn find_name_match(name: &str, commands: CommandNameList) -> Option<CommandName> {
    commands
        .iter()
        .find(|(_, candidates)| name_matches(name, candidates))
        .map(|(command, _)| *command)
}

/// Returns `true` if `name` matchs any item of `candidates` (case insensitive).
fn name_matches(name: &str, candidates: CandidateList) -> bool {
    candidates
        .iter()
        .any(|candidate| name.eq_ignore_ascii_case(candidate))
}

/// Closest command to a misspelled name: one edit away from a candidate of at least 3
/// characters, or a prefix of one.
fn suggest(name: &str, commands: CommandNameList) -> Option<CommandName> {
    let name = name.to_ascii_lowercase();
    if name.len() < 2 {
        return None;
    }
    commands
        .iter()
        .find(|(_, candidates)| {
            candidates.iter().any(|candidate| {
                candidate.len() >= 3
                    && (candidate.starts_with(name.as_str()) || is_one_edit_apart(&name, candidate))
            })
        })
        .map(|(command, _)| *command)
}

/// Whether `a` can be turned into `b` by one insertion, deletion, substitution, or swap of
/// adjacent characters.
fn is_one_edit_apart(a: &str, b: &str) -> bool {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let prefix = a.iter().zip(&b).take_while(|(x, y)| x == y).count();
    let (a_rest, b_rest) = (&a[prefix..], &b[prefix..]);
    match (a_rest.len(), b_rest.len()) {
        (0, 0) => false,
        (x, y) if x == y => {
            a_rest[1..] == b_rest[1..]
                || (x >= 2 && a_rest[0] == b_rest[1] && a_rest[1] == b_rest[0] && a_rest[2..] == b_rest[2..])
        }
        (x, y) if x == y + 1 => a_rest[1..] == *b_rest,
        (x, y) if x + 1 == y => *a_rest == b_rest[1..],
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_names() {
        fn name(line: &str) -> Result<CommandName, error::Command> {
            Arguments::from(line).get_command_name()
        }
        assert_eq!(name("run"), Ok(CommandName::Run));
        assert_eq!(name("RUN"), Ok(CommandName::Run));
        assert_eq!(name("regs"), Ok(CommandName::Registers));
        assert_eq!(name("quit"), Ok(CommandName::Exit));
        assert_eq!(name("break 3"), Ok(CommandName::BreakAdd));
        assert_eq!(name("break add 3"), Ok(CommandName::BreakAdd));
        assert_eq!(name("break list"), Ok(CommandName::BreakList));
        assert_eq!(name("break remove 3"), Ok(CommandName::BreakRemove));
        assert_eq!(name("del break 3"), Ok(CommandName::BreakRemove));
        assert_eq!(
            name("break"),
            Err(error::Command::MissingSubcommand {
                command_name: "break"
            })
        );
        assert_eq!(
            name("del list"),
            Err(error::Command::InvalidSubcommand {
                command_name: "del",
                subcommand_name: "list".to_string(),
                suggested: None,
            })
        );
    }

    #[test]
    fn suggestions() {
        fn suggested(line: &str) -> Option<CommandName> {
            match Arguments::from(line).get_command_name() {
                Err(error::Command::Invalid { suggested, .. }) => suggested,
                other => panic!("expected invalid command, found {other:?}"),
            }
        }
        assert_eq!(suggested("rnu"), Some(CommandName::Run));
        assert_eq!(suggested("stpe"), Some(CommandName::Step));
        assert_eq!(suggested("memo"), Some(CommandName::Memory));
        assert_eq!(suggested("braek"), Some(CommandName::BreakAdd));
        assert_eq!(suggested("xyzzy"), None);
        assert_eq!(suggested("z"), None);
    }

    #[test]
    fn edit_distance() {
        assert!(is_one_edit_apart("stp", "step"));
        assert!(is_one_edit_apart("steep", "step"));
        assert!(is_one_edit_apart("stap", "step"));
        assert!(is_one_edit_apart("setp", "step"));
        assert!(!is_one_edit_apart("step", "step"));
        assert!(!is_one_edit_apart("sp", "step"));
        assert!(!is_one_edit_apart("pets", "step"));
    }

    #[test]
    fn addresses() {
        assert_eq!(parse_address("0x10000"), Ok(0x10000));
        assert_eq!(parse_address("10000"), Ok(0x10000));
        assert_eq!(parse_address("ff"), Ok(0xFF));
        assert_eq!(parse_address("0x"), Err(error::Value::MalformedAddress {}));
        assert_eq!(parse_address("-4"), Err(error::Value::MalformedAddress {}));
        assert_eq!(parse_address("0xgg"), Err(error::Value::MalformedAddress {}));
    }

    #[test]
    fn positive_integers() {
        assert_eq!(parse_positive_integer::<u32>("12"), Ok(12));
        assert_eq!(parse_positive_integer::<u32>("0x10"), Ok(16));
        assert_eq!(
            parse_positive_integer::<u32>("0"),
            Err(error::Value::NotPositive {})
        );
        assert_eq!(
            parse_positive_integer::<u32>("-3"),
            Err(error::Value::NotPositive {})
        );
        assert_eq!(
            parse_positive_integer::<u32>("0x1_0000_0000"),
            Err(error::Value::MalformedInteger {})
        );
        assert_eq!(
            parse_positive_integer::<u32>("0x100000000"),
            Err(error::Value::IntegerTooLarge {
                max: u32::MAX as u64
            })
        );
    }
}
