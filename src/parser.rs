use std::{fs, path::Path};

use lazy_static::lazy_static;
use miette::Result;
use regex::Regex;

use crate::{
    air::{AsmLine, INSTRUCTION_WIDTH},
    decode::{decode, parse_integer, split_operands},
    env::OpcodePolicy,
    error,
    runtime::{DATA_SECTION_START, MEMORY_SIZE},
    symbol::{FxMap, LabelTable, Span},
};

lazy_static! {
    static ref LABEL_NAME: Regex = Regex::new(r"^[A-Za-z0-9_.$]+$").unwrap();
}

/// A fully decoded program, ready to be executed.
///
/// Instruction `i` lives at program counter `i * 4`. Nothing here changes once loaded.
#[derive(Clone, Debug, Default)]
pub struct Program {
    lines: Vec<AsmLine>,
    labels: LabelTable,
    /// Image of the data section, starting at [`DATA_SECTION_START`].
    data: Vec<u8>,
}

impl Program {
    /// Read and parse the assembly file at `path`.
    pub fn from_file(path: &Path, policy: OpcodePolicy) -> Result<Self> {
        let src = fs::read_to_string(path).map_err(|err| error::load_unreadable(path, err))?;
        parse(&src, policy)
    }

    /// Build a program from instruction text which has already had labels, comments and
    /// directives stripped, with `(name, instruction index)` label pairs.
    ///
    /// A name given twice is rejected, like a label defined twice in source.
    pub fn from_parts<I, S, L, N>(instructions: I, labels: L, policy: OpcodePolicy) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        L: IntoIterator<Item = (N, usize)>,
        N: Into<String>,
    {
        let mut label_table = LabelTable::new();
        for (name, index) in labels {
            let name = name.into();
            if let Err(first) = label_table.insert(name.as_str(), index) {
                return Err(error::load_duplicate_label_entry(&name, first, index));
            }
        }

        let mut lines = Vec::new();
        for (index, text) in instructions.into_iter().enumerate() {
            let text = text.into();
            let pc = index as u64 * INSTRUCTION_WIDTH;
            let instruction = decode(&text, pc, &label_table, policy)
                .map_err(|err| error::load_decode(Span::new(0, text.len()), &text, pc, err))?;
            lines.push(AsmLine {
                instruction,
                text,
                span: Span::dummy(),
            });
        }
        Ok(Self {
            lines,
            labels: label_table,
            data: Vec::new(),
        })
    }

    pub fn lines(&self) -> &[AsmLine] {
        &self.lines
    }

    /// Line at the given program counter, if it is within the program.
    pub fn at_pc(&self, pc: u64) -> Option<&AsmLine> {
        let index = usize::try_from(pc / INSTRUCTION_WIDTH).ok()?;
        self.lines.get(index)
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn labels(&self) -> &LabelTable {
        &self.labels
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

/// Parse assembly source into a [`Program`].
///
/// Labels and data are collected in a first pass, so instructions may refer to labels defined
/// further down. Nothing is returned unless every line is valid.
pub fn parse(src: &str, policy: OpcodePolicy) -> Result<Program> {
    let mut pending: Vec<(String, Span)> = Vec::new();
    let mut labels = LabelTable::new();
    // First definition of each label, for duplicate reports
    let mut definitions: FxMap<&str, Span> = FxMap::default();
    let mut data = Vec::new();

    for line in src.lines() {
        let line = match line.find('#') {
            Some(comment) => &line[..comment],
            None => line,
        };
        let mut rest = line.trim();

        while let Some((name, after)) = rest.split_once(':') {
            let name = name.trim();
            let span = span_of(src, name);
            if !LABEL_NAME.is_match(name) {
                // Empty names get a span covering the colon
                let span = if name.is_empty() {
                    Span::new(span_of(src, rest).offs(), rest.len() - after.len())
                } else {
                    span
                };
                return Err(error::load_bad_label(span, src));
            }
            if let Some(first) = definitions.get(name) {
                return Err(error::load_duplicate_label(span, *first, src));
            }
            definitions.insert(name, span);
            // Cannot fail, names are checked against `definitions` first
            let _ = labels.insert(name, pending.len());
            rest = after.trim();
        }

        if rest.is_empty() {
            continue;
        }
        if rest.starts_with('.') {
            directive(src, rest, &mut data)?;
            continue;
        }
        pending.push((rest.to_string(), span_of(src, rest)));
    }

    let mut lines = Vec::with_capacity(pending.len());
    for (index, (text, span)) in pending.into_iter().enumerate() {
        let pc = index as u64 * INSTRUCTION_WIDTH;
        let instruction =
            decode(&text, pc, &labels, policy).map_err(|err| error::load_decode(span, src, pc, err))?;
        lines.push(AsmLine {
            instruction,
            text,
            span,
        });
    }

    Ok(Program {
        lines,
        labels,
        data,
    })
}

/// Apply a directive line, appending to the data image for data directives.
fn directive(src: &str, line: &str, data: &mut Vec<u8>) -> Result<()> {
    let mut tokens = split_operands(line);
    let Some(name) = tokens.next() else {
        return Ok(());
    };
    let width = match name.to_ascii_lowercase().as_str() {
        // Only matter to real assemblers and linkers
        ".data" | ".text" | ".section" | ".globl" | ".global" | ".align" | ".p2align"
        | ".type" | ".size" | ".option" | ".file" => return Ok(()),
        ".byte" => 1,
        ".half" => 2,
        ".word" => 4,
        ".dword" => 8,
        _ => return Err(error::load_unknown_directive(span_of(src, name), src)),
    };

    let mut tokens = tokens.peekable();
    if tokens.peek().is_none() {
        return Err(error::load_missing_literal(span_of(src, name), src));
    }
    for literal in tokens {
        let Some(value) = parse_integer(literal) else {
            return Err(error::load_bad_literal(span_of(src, literal), src));
        };
        // Wider values are truncated, like a store of the same width
        data.extend_from_slice(&value.to_le_bytes()[..width]);
    }
    if DATA_SECTION_START + data.len() > MEMORY_SIZE {
        return Err(error::load_data_overflow(span_of(src, line), src));
    }
    Ok(())
}

/// Location of `part` within `src`. `part` must be a subslice of `src`.
fn span_of(src: &str, part: &str) -> Span {
    let offs = (part.as_ptr() as usize).saturating_sub(src.as_ptr() as usize);
    Span::new(offs, part.len())
}
