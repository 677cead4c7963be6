use std::{fmt, str::FromStr};

use fxhash::FxBuildHasher;
use indexmap::IndexMap;
use miette::SourceSpan;

// Label name -> instruction index, in definition order
pub type FxMap<K, V> = IndexMap<K, V, FxBuildHasher>;

/// Number of general purpose registers.
pub const REGISTER_COUNT: usize = 32;

/// ABI names, indexed by register number.
pub const ABI_NAMES: [&str; REGISTER_COUNT] = [
    "zero", "ra", "sp", "gp", "tp", "t0", "t1", "t2", "s0", "s1", "a0", "a1", "a2", "a3", "a4",
    "a5", "a6", "a7", "s2", "s3", "s4", "s5", "s6", "s7", "s8", "s9", "s10", "s11", "t3", "t4",
    "t5", "t6",
];

/// Mapping from label name to the index of the instruction it precedes.
///
/// Built once by the loader and never mutated afterwards.
#[derive(Clone, Debug, Default)]
pub struct LabelTable(FxMap<String, usize>);

impl LabelTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the index the label was previously bound to, leaving the table untouched,
    /// if the name is already taken.
    pub fn insert(&mut self, name: impl Into<String>, index: usize) -> Result<(), usize> {
        let name = name.into();
        if let Some(existing) = self.0.get(&name) {
            return Err(*existing);
        }
        self.0.insert(name, index);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<usize> {
        self.0.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
        self.0.iter().map(|(name, index)| (name.as_str(), *index))
    }

    /// First label bound to the given instruction index.
    pub fn name_of(&self, index: usize) -> Option<&str> {
        self.iter()
            .find(|(_, label_index)| *label_index == index)
            .map(|(name, _)| name)
    }
}

/// One of the 32 integer registers.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct Register(u8);

impl Register {
    pub const ZERO: Register = Register(0);
    /// Return address, implicit destination of `jal label`.
    pub const RA: Register = Register(1);

    pub fn new(index: u8) -> Option<Self> {
        ((index as usize) < REGISTER_COUNT).then_some(Register(index))
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }

    pub fn abi_name(self) -> &'static str {
        ABI_NAMES[self.index()]
    }
}

impl FromStr for Register {
    type Err = ();

    /// Accepts `x0`..`x31` and ABI aliases. `fp` is an alias of `s0`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(digits) = s.strip_prefix('x') {
            // Reject `x01`, `x+1` and friends
            if digits.is_empty()
                || (digits.len() > 1 && digits.starts_with('0'))
                || !digits.bytes().all(|b| b.is_ascii_digit())
            {
                return Err(());
            }
            return digits
                .parse::<u8>()
                .ok()
                .and_then(Register::new)
                .ok_or(());
        }
        if s == "fp" {
            return Ok(Register(8));
        }
        ABI_NAMES
            .iter()
            .position(|name| *name == s)
            .map(|index| Register(index as u8))
            .ok_or(())
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "x{}", self.0)
    }
}

/// Location within source text.
#[derive(Clone, Copy, PartialEq, Eq, Default, Debug)]
pub struct Span {
    offs: usize,
    len: usize,
}

impl Span {
    pub fn new(offs: usize, len: usize) -> Self {
        Span { offs, len }
    }

    pub fn dummy() -> Self {
        Span::default()
    }

    pub fn offs(&self) -> usize {
        self.offs
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl From<Span> for SourceSpan {
    fn from(value: Span) -> Self {
        SourceSpan::new(value.offs().into(), value.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aliases_match_numeric_names() {
        for (index, name) in ABI_NAMES.iter().enumerate() {
            let alias: Register = name.parse().unwrap();
            let numeric: Register = format!("x{index}").parse().unwrap();
            assert_eq!(alias, numeric, "{name} should be x{index}");
            assert_eq!(alias.index(), index);
        }
        assert_eq!("fp".parse::<Register>(), "s0".parse::<Register>());
    }

    #[test]
    fn rejects_unknown_registers() {
        for name in ["x32", "x", "x01", "x-1", "a8", "t7", "X1", "", "r1", "s12"] {
            assert!(name.parse::<Register>().is_err(), "`{name}` should be rejected");
        }
    }

    #[test]
    fn label_table_rejects_duplicates() {
        let mut labels = LabelTable::new();
        assert_eq!(labels.insert("loop", 0), Ok(()));
        assert_eq!(labels.insert("end", 3), Ok(()));
        assert_eq!(labels.insert("loop", 5), Err(0));
        assert_eq!(labels.get("loop"), Some(0));
        assert_eq!(labels.len(), 2);
        assert_eq!(labels.name_of(3), Some("end"));
        assert_eq!(labels.name_of(1), None);
    }
}
