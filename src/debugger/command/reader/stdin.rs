use std::io::{self, BufRead as _};

use super::{next_command, Read, INITIAL_BUFFER_CAPACITY};

/// Stdin which is not attached to a terminal, i.e. piped.
#[derive(Debug)]
pub struct Stdin {
    stdin: io::Stdin,
    /// Command must be stored somewhere to be referenced.
    buffer: String,
    /// Byte index of next command in `buffer`, or 0 if a new line must be read.
    cursor: usize,
}

impl Stdin {
    pub fn from(stdin: io::Stdin) -> Self {
        Self {
            stdin,
            buffer: String::with_capacity(INITIAL_BUFFER_CAPACITY),
            cursor: 0,
        }
    }

    /// Returns `false` on EOF.
    fn read_line(&mut self) -> bool {
        self.buffer.clear();
        match self.stdin.lock().read_line(&mut self.buffer) {
            Ok(0) => false,
            Ok(_) => {
                let len = self.buffer.trim_end_matches(['\n', '\r']).len();
                self.buffer.truncate(len);
                true
            }
            // Unreadable input (such as invalid UTF-8) ends the session
            Err(_) => false,
        }
    }
}

impl Read for Stdin {
    fn read(&mut self) -> Option<&str> {
        // Reached end of line buffer: read new line
        if self.cursor == 0 && !self.read_line() {
            return None;
        }
        Some(next_command(&self.buffer, &mut self.cursor))
    }
}
