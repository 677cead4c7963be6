use std::error::Error;
use std::fmt;

use crate::air::INSTRUCTION_WIDTH;

/// Program counters at which `run` pauses, before executing the instruction there.
///
/// Kept sorted by address.
#[derive(Clone, Debug, Default)]
pub struct Breakpoints(Vec<Breakpoint>);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Breakpoint {
    pub address: u64,
}

#[derive(Debug, PartialEq)]
pub enum BreakpointError {
    /// Line does not name an instruction of the loaded program.
    InvalidLine { line: usize, len: usize },
    AlreadyExists { line: usize },
    NotSet { line: usize },
}

impl Breakpoint {
    /// Breakpoint before the instruction on the given 1-based line, if that line is part of a
    /// program with `len` instructions.
    pub fn from_line(line: usize, len: usize) -> Result<Self, BreakpointError> {
        if line == 0 || line > len {
            return Err(BreakpointError::InvalidLine { line, len });
        }
        Ok(Self {
            address: (line as u64 - 1) * INSTRUCTION_WIDTH,
        })
    }

    /// 1-based instruction line.
    pub fn line(&self) -> usize {
        (self.address / INSTRUCTION_WIDTH) as usize + 1
    }
}

impl Breakpoints {
    pub fn contains(&self, address: u64) -> bool {
        self.position(address).is_ok()
    }

    /// Returns `false`, leaving the set unchanged, if a breakpoint already exists there.
    pub fn insert(&mut self, breakpoint: Breakpoint) -> bool {
        match self.position(breakpoint.address) {
            Ok(_) => false,
            Err(index) => {
                self.0.insert(index, breakpoint);
                true
            }
        }
    }

    /// Returns whether a breakpoint was found with given address.
    pub fn remove(&mut self, address: u64) -> bool {
        match self.position(address) {
            Ok(index) => {
                self.0.remove(index);
                true
            }
            Err(_) => false,
        }
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = &Breakpoint> {
        self.0.iter()
    }

    fn position(&self, address: u64) -> Result<usize, usize> {
        self.0
            .binary_search_by_key(&address, |breakpoint| breakpoint.address)
    }
}

impl<'a> IntoIterator for &'a Breakpoints {
    type Item = &'a Breakpoint;
    type IntoIter = std::slice::Iter<'a, Breakpoint>;
    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl Error for BreakpointError {}

impl fmt::Display for BreakpointError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidLine { line, len } => {
                write!(f, "Invalid line number {}.", line)?;
                if *len == 0 {
                    write!(f, " No program is loaded.")
                } else {
                    write!(f, " Program has lines 1 to {}.", len)
                }
            }
            Self::AlreadyExists { line } => write!(f, "Breakpoint already set at line {}.", line),
            Self::NotSet { line } => write!(f, "No breakpoint set at line {}.", line),
        }
    }
}
