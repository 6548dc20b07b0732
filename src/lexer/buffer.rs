//! Accumulation of statement text across lines.

/// A complete statement ready for execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmittedStatement {
    /// Statement text. Terminated statements keep their `;`.
    pub text: String,
    /// Line of the terminating `;`, or the last line read for a trailing
    /// statement without one.
    pub line_number: usize,
    /// Line where the statement's first non-blank text appeared.
    pub start_line: usize,
}

/// Text of the statement currently being assembled.
#[derive(Debug, Default)]
pub struct StatementBuffer {
    text: String,
    start_line: usize,
}

impl StatementBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn start_line(&self) -> usize {
        self.start_line
    }

    /// Append one line fragment, joined to earlier fragments by a newline.
    /// Leading whitespace before the statement's first text is dropped.
    pub fn push_fragment(&mut self, fragment: &str, line_number: usize) {
        if self.text.is_empty() {
            let fragment = fragment.trim_start();
            if fragment.is_empty() {
                return;
            }
            self.start_line = line_number;
            self.text.push_str(fragment);
        } else {
            self.text.push('\n');
            self.text.push_str(fragment);
        }
    }

    /// Close the statement at a terminator found on `line_number`.
    ///
    /// Returns `None` for an empty statement (a bare `;`).
    pub fn flush(&mut self, last_fragment: &str, line_number: usize) -> Option<EmittedStatement> {
        if !last_fragment.trim().is_empty() {
            self.push_fragment(last_fragment, line_number);
        }
        if self.is_blank() {
            self.reset();
            return None;
        }
        self.text.push(';');
        Some(self.take(line_number))
    }

    /// Flush whatever is left at end of input, without adding a terminator.
    pub fn finish(&mut self, line_number: usize) -> Option<EmittedStatement> {
        if self.is_blank() {
            self.reset();
            return None;
        }
        Some(self.take(line_number))
    }

    fn take(&mut self, line_number: usize) -> EmittedStatement {
        let statement = EmittedStatement {
            text: std::mem::take(&mut self.text),
            line_number,
            start_line: self.start_line,
        };
        self.start_line = line_number;
        statement
    }

    fn reset(&mut self) {
        self.text.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fragments_joined_with_newline() {
        let mut buf = StatementBuffer::new();
        buf.push_fragment("  SELECT a,", 3);
        buf.push_fragment("       b", 4);
        let stmt = buf.flush(" FROM t", 5).unwrap();
        assert_eq!(stmt.text, "SELECT a,\n       b\n FROM t;");
        assert_eq!(stmt.start_line, 3);
        assert_eq!(stmt.line_number, 5);
        assert!(buf.is_blank());
    }

    #[test]
    fn test_blank_leading_fragments_ignored() {
        let mut buf = StatementBuffer::new();
        buf.push_fragment("   ", 1);
        buf.push_fragment("", 2);
        buf.push_fragment("SELECT 1", 3);
        let stmt = buf.flush("", 3).unwrap();
        assert_eq!(stmt.text, "SELECT 1;");
        assert_eq!(stmt.start_line, 3);
    }

    #[test]
    fn test_empty_statement_is_skipped() {
        let mut buf = StatementBuffer::new();
        assert!(buf.flush("  ", 7).is_none());
        assert!(buf.text().is_empty());
    }

    #[test]
    fn test_finish_without_terminator() {
        let mut buf = StatementBuffer::new();
        buf.push_fragment("SELECT 1", 9);
        let stmt = buf.finish(9).unwrap();
        assert_eq!(stmt.text, "SELECT 1");
        assert!(buf.finish(9).is_none());
    }
}
