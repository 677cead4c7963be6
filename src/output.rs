use std::cell::RefCell;
use std::str::Chars;

use colored::{ColoredString, Colorize};

use crate::runtime::RunState;
use crate::symbol::{Register, REGISTER_COUNT};

#[macro_export]
macro_rules! dprint {
    ( $cond:expr, $kind:expr, $fmt:literal $($tt:tt)* ) => {{
        #[allow(unused_imports)]
        use $crate::output::{Condition::*, Kind::*};
        let s = format!(
            $fmt
            $($tt)*
        );
        $crate::output::Output::Debugger($cond, $kind).print_str(&s);
    }};
}

#[macro_export]
macro_rules! dprintln {
    ( $cond:expr ) => {{
        #[allow(unused_imports)]
        use $crate::output::Condition::*;
        $crate::output::Output::Debugger($cond, Default::default()).print_str("\n");
    }};
    ( $cond:expr, $kind:expr, $fmt:literal $($tt:tt)* ) => {{
        #[allow(unused_imports)]
        use $crate::output::{Condition::*, Kind::*};
        let s = format!(
            concat!($fmt, "\n")
            $($tt)*
        );
        $crate::output::Output::Debugger($cond, $kind).print_str(&s);
    }};
}

/// Where a message is written.
///
/// Results of commands (trace lines, register and memory dumps) are [`Output::Normal`] and go
/// to stdout. Everything else is a status message for the operator, on stderr.
#[derive(Clone, Copy, Debug)]
pub enum Output {
    Normal,
    Debugger(Condition, Kind),
}

/// Whether a debugger message survives `--minimal`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Condition {
    Always,
    Sometimes,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Kind {
    #[default]
    Normal,
    Info,
    Warning,
    Error,
    Special,
}

struct Decolored<'a> {
    chars: Chars<'a>,
}

impl Output {
    thread_local! {
        static IS_LINE_START: RefCell<bool> = const { RefCell::new(true) };
        static IS_MINIMAL: RefCell<bool> = const { RefCell::new(false) };
    }

    pub fn set_line_start(new_value: bool) -> bool {
        Self::IS_LINE_START.with(|value| value.replace(new_value))
    }
    /// Private. Use [`Output::start_new_line`].
    fn is_line_start() -> bool {
        Self::IS_LINE_START.with(|value| *value.borrow())
    }
    pub fn set_minimal(new_value: bool) -> bool {
        Self::IS_MINIMAL.with(|value| value.replace(new_value))
    }
    pub fn is_minimal() -> bool {
        Self::IS_MINIMAL.with(|value| *value.borrow())
    }

    fn set_line_start_from_str(string: &str) {
        let last = Decolored::new(string).last();
        if let Some(ch) = last {
            Output::set_line_start(ch == '\n');
        }
    }

    pub fn print_str(&self, string: &str) {
        match self {
            Self::Normal => {
                if Self::is_minimal() {
                    print_colorless(string);
                } else {
                    print!("{}", string);
                }
                Self::set_line_start_from_str(string);
            }

            Self::Debugger(condition, kind) => match (Self::is_minimal(), *condition) {
                (false, _) => {
                    eprint!("{}", kind.colorize(string));
                    Self::set_line_start_from_str(string);
                }
                // Always remove color if `--minimal`
                (true, Condition::Always) => {
                    eprint_colorless(string);
                    Self::set_line_start_from_str(string);
                }
                (true, Condition::Sometimes) => (),
            },
        }
    }

    pub fn start_new_line(&self) {
        if !Self::is_line_start() {
            self.print_str("\n");
        }
    }

    /// Report an instruction which is about to execute.
    pub fn print_trace(&self, pc: u64, text: &str) {
        self.print_str(&format!("Executed {} ; PC = 0x{:08x}\n", text, pc));
    }

    pub fn print_registers(&self, state: &RunState) {
        if Self::is_minimal() {
            for (i, value) in state.registers().iter().enumerate() {
                self.print_str(&format!("x{} = 0x{:016x}\n", i, value));
            }
            return;
        }

        self.print_str("\x1b[2m┌───────────────────────────────────────────────────┐\x1b[0m\n");
        self.print_str(
            "\x1b[2m│            \x1b[3mhex                            int\x1b[0m\x1b[2m │\x1b[0m\n",
        );
        for i in 0..REGISTER_COUNT {
            let Some(register) = u8::try_from(i).ok().and_then(Register::new) else {
                continue;
            };
            self.print_str("\x1b[2m│\x1b[0m");
            self.print_str(&format!(
                " \x1b[1m{:<4}\x1b[0m\x1b[2m{:<5}\x1b[0m",
                register.to_string(),
                register.abi_name()
            ));
            self.print_integer(state.reg(register));
            self.print_str(" \x1b[2m│\x1b[0m\n");
        }
        self.print_str(&format!(
            "\x1b[2m│\x1b[0m \x1b[1mPC\x1b[0m       0x{:016x}                       \x1b[2m│\x1b[0m\n",
            state.pc()
        ));
        self.print_str("\x1b[2m└───────────────────────────────────────────────────┘\x1b[0m\n");
    }

    pub fn print_integer(&self, value: i64) {
        self.print_str(&format!("0x{:016x}  {:>20}", value, value));
    }

    /// One line per byte, starting at `address`.
    pub fn print_memory(&self, address: u64, bytes: &[u8]) {
        for (offset, byte) in (0..).zip(bytes) {
            let line = format!("Memory[0x{:08x}] : 0x{:02x}", address + offset, byte);
            if Self::is_minimal() || !byte.is_ascii_graphic() {
                self.print_str(&format!("{}\n", line));
            } else {
                self.print_str(&format!("{}  \x1b[2m'{}'\x1b[0m\n", line, *byte as char));
            }
        }
    }
}

impl Kind {
    fn colorize(self, string: &str) -> ColoredString {
        let string = ColoredString::from(string);
        match self {
            Self::Normal => string,
            Self::Info => string.blue(),
            Self::Warning => string.yellow(),
            Self::Error => string.red(),
            Self::Special => string.cyan(),
        }
    }
}

impl<'a> Decolored<'a> {
    pub fn new(string: &'a str) -> Self {
        Self {
            chars: string.chars(),
        }
    }
}

impl<'a> Iterator for Decolored<'a> {
    type Item = char;
    fn next(&mut self) -> Option<Self::Item> {
        while let Some(ch) = self.chars.next() {
            // Skip everything between '\x1b' and 'm' (inclusive)
            if ch == '\x1b' {
                while self.chars.next().is_some_and(|ch| ch != 'm') {}
                continue;
            }
            return Some(ch);
        }
        None
    }
}

fn print_colorless(string: &str) {
    print!("{}", Decolored::new(string).collect::<String>());
}

fn eprint_colorless(string: &str) {
    eprint!("{}", Decolored::new(string).collect::<String>());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decolored() {
        assert_eq!(Decolored::new("abcdef").collect::<String>(), "abcdef");
        assert_eq!(
            Decolored::new("abc\x1b[0;2mdef\x1b[0m").collect::<String>(),
            "abcdef"
        );
        assert_eq!(Decolored::new("abc\x1b[0xyz").collect::<String>(), "abc");
        assert_eq!(
            Decolored::new("abc\x1bw[0bxyzmdef").collect::<String>(),
            "abcdef"
        );
    }

    #[test]
    fn line_start_tracks_last_visible_char() {
        Output::set_line_start(true);
        Output::set_line_start_from_str("abc");
        assert!(!Output::is_line_start());
        Output::set_line_start_from_str("abc\n\x1b[0m");
        assert!(Output::is_line_start());
        // Only escape codes: unchanged
        Output::set_line_start(false);
        Output::set_line_start_from_str("\x1b[1m");
        assert!(!Output::is_line_start());
    }
}
