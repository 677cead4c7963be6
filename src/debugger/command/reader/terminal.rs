use std::io::{self, Write as _};

use console::Key;

use super::{next_command, Read, INITIAL_BUFFER_CAPACITY, PROMPT};

/// Interactive unbuffered terminal.
#[derive(Debug)]
pub struct Terminal {
    term: console::Term,

    buffer: String,
    /// Byte index of next command in `buffer`, or 0 if a new line must be read.
    cursor: usize,

    history: Vec<String>,
    /// Focused item in history, or new entry if index==length.
    history_index: usize,
    /// Visible line cursor in terminal, in characters.
    visible_cursor: usize,
}

impl Terminal {
    pub fn new() -> Self {
        Self {
            term: console::Term::stdout(),
            buffer: String::with_capacity(INITIAL_BUFFER_CAPACITY),
            cursor: 0,
            history: Vec::new(),
            history_index: 0,
            visible_cursor: 0,
        }
    }

    fn is_next(&self) -> bool {
        debug_assert!(
            self.history_index <= self.history.len(),
            "index went past history"
        );
        self.history_index >= self.history.len()
    }

    /// Run before modifying `buffer`.
    /// If focused on a historic item, clone it to `buffer` and update index.
    fn update_next(&mut self) {
        if let Some(historic) = self.history.get(self.history_index) {
            self.buffer = historic.clone();
            self.history_index = self.history.len();
        }
    }

    /// Get next or historic command, from index.
    fn get_current(&self) -> &str {
        self.history
            .get(self.history_index)
            .map_or(self.buffer.as_str(), String::as_str)
    }

    /// Byte index of `visible_cursor` within `buffer`.
    fn byte_cursor(&self) -> usize {
        self.buffer
            .char_indices()
            .nth(self.visible_cursor)
            .map_or(self.buffer.len(), |(index, _)| index)
    }

    fn print_prompt(&mut self) -> io::Result<()> {
        self.term.clear_line()?;

        // Equivalent code found in non-terminal source
        let current = self.get_current().to_string();
        write!(self.term, "\x1b[1m{}\x1b[0m{}", PROMPT, current)?;

        let len = current.chars().count();
        self.term
            .move_cursor_left(len.saturating_sub(self.visible_cursor))?;
        self.term.flush()
    }

    /// Return of `true` indicates to break loop.
    fn read_key(&mut self) -> io::Result<bool> {
        let key = self.term.read_key()?;
        match key {
            Key::Enter | Key::Char('\n') => {
                if self.is_next() && self.buffer.trim().is_empty() {
                    self.buffer.clear();
                    self.visible_cursor = 0;
                    writeln!(self.term)?;
                } else {
                    self.update_next();
                    return Ok(true);
                }
            }

            // Ignore ASCII control characters
            Key::Char('\x00'..='\x1f' | '\x7f') => (),
            // Pasting should be automatically supported, since terminals simulate typing each
            // character
            Key::Char(ch) => {
                self.update_next();
                let index = self.byte_cursor();
                self.buffer.insert(index, ch);
                self.visible_cursor += 1;
            }

            Key::Backspace => {
                self.update_next();
                if self.visible_cursor > 0 {
                    self.visible_cursor -= 1;
                    let index = self.byte_cursor();
                    if index < self.buffer.len() {
                        self.buffer.remove(index);
                    }
                }
            }
            Key::Del => {
                self.update_next();
                let index = self.byte_cursor();
                if index < self.buffer.len() {
                    self.buffer.remove(index);
                }
            }

            // Left/right in current input
            Key::ArrowLeft => {
                self.visible_cursor = self.visible_cursor.saturating_sub(1);
            }
            Key::ArrowRight => {
                if self.visible_cursor < self.get_current().chars().count() {
                    self.visible_cursor += 1;
                }
            }

            // Back/forth through history
            Key::ArrowUp => {
                if self.history_index > 0 {
                    self.history_index -= 1;
                    self.visible_cursor = self.get_current().chars().count();
                }
            }
            Key::ArrowDown => {
                if self.history_index < self.history.len() {
                    self.history_index += 1;
                    self.visible_cursor = self.get_current().chars().count();
                }
            }

            _ => (),
        }
        Ok(false)
    }

    /// Read entire (multi-command) line from terminal.
    fn read_line(&mut self) -> io::Result<()> {
        self.buffer.clear();
        self.visible_cursor = 0;

        // Read keys until newline
        loop {
            self.print_prompt()?;
            if self.read_key()? {
                break;
            }
        }
        writeln!(self.term)?;

        // Push to history if different to last command
        if !self
            .history
            .last()
            .is_some_and(|previous| previous == &self.buffer)
        {
            self.history.push(self.buffer.clone());
        }
        // Always reset index to next command
        self.history_index = self.history.len();
        Ok(())
    }
}

impl Read for Terminal {
    fn read(&mut self) -> Option<&str> {
        // Reached end of line buffer: read new line
        // A terminal which cannot be read from (such as on Ctrl+D or a closed tty) ends input
        if self.cursor == 0 && self.read_line().is_err() {
            return None;
        }
        Some(next_command(&self.buffer, &mut self.cursor))
    }
}
