use super::Read;

/// Command-line argument.
#[derive(Debug)]
pub struct Argument {
    buffer: String,
    /// Byte index.
    cursor: usize,
}

impl Argument {
    pub fn from(source: String) -> Self {
        Self {
            buffer: source,
            cursor: 0,
        }
    }
}

impl Read for Argument {
    fn read(&mut self) -> Option<&str> {
        // EOF
        if self.cursor >= self.buffer.len() {
            return None;
        }

        // Take characters until delimiter
        let rest = &self.buffer[self.cursor..];
        let end = rest.find(['\n', ';']).unwrap_or(rest.len());
        let command = &rest[..end];
        // Skip the delimiter, which is always 1 byte
        self.cursor += end + 1;
        Some(command)
    }
}
