//! Line-oriented SQL script lexer.
//!
//! Splits a script into individually executable statements without parsing
//! SQL grammar. Statements end at a `;` that is outside every string, quoted
//! identifier, dollar-quoted body and comment, and outside parentheses.
//!
//! The input is read one physical line at a time, so memory use is bounded by
//! the statement being assembled plus the current line. The lexer also exposes
//! the raw lines of the same stream for `COPY ... FROM stdin` data sections,
//! which must bypass lexing entirely.
//!
//! ```ignore
//! use sql_script_runner::lexer::Lexer;
//!
//! let mut lexer = Lexer::new("SELECT 1; SELECT 'a;b';".as_bytes());
//! while let Some(stmt) = lexer.next_statement()? {
//!     println!("{}: {}", stmt.line_number, stmt.text);
//! }
//! ```

mod buffer;
mod scan;


pub use buffer::{EmittedStatement, StatementBuffer};
pub use scan::{LineStop, ScanState, Span};

use std::io::{self, BufRead};

const UTF8_BOM: char = '\u{feff}';

pub struct Lexer<R> {
    reader: R,
    state: ScanState,
    buffer: StatementBuffer,
    /// Current physical line, line ending stripped.
    line: String,
    /// Scan position in `line`.
    cursor: usize,
    /// Start of the text in `line` not yet moved into `buffer`.
    flush_point: usize,
    line_active: bool,
    /// Line number of `line`.
    line_number: usize,
    /// Physical lines consumed so far, including raw lines.
    lines_read: usize,
    eof: bool,
}

impl<R: BufRead> Lexer<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            state: ScanState::new(),
            buffer: StatementBuffer::new(),
            line: String::new(),
            cursor: 0,
            flush_point: 0,
            line_active: false,
            line_number: 0,
            lines_read: 0,
            eof: false,
        }
    }

    pub fn state(&self) -> &ScanState {
        &self.state
    }

    /// Line number of the line currently being scanned (1-based, 0 before
    /// the first read).
    pub fn line_number(&self) -> usize {
        self.line_number
    }

    /// Total physical lines consumed, including raw data lines.
    pub fn lines_read(&self) -> usize {
        self.lines_read
    }

    /// Return the next complete statement, or `None` at end of input.
    pub fn next_statement(&mut self) -> io::Result<Option<EmittedStatement>> {
        loop {
            if !self.line_active && !self.advance_line()? {
                return Ok(self.buffer.finish(self.lines_read));
            }

            match self.state.scan(&self.line, self.cursor) {
                LineStop::Terminator(at) => {
                    let fragment = &self.line[self.flush_point..at];
                    let statement = self.buffer.flush(fragment, self.line_number);
                    self.cursor = at + 1;
                    self.flush_point = at + 1;
                    if statement.is_some() {
                        return Ok(statement);
                    }
                }
                LineStop::EndOfLine(end) => {
                    let rest = &self.line[self.flush_point..end];
                    if self.state.in_literal() || !rest.trim().is_empty() {
                        self.buffer.push_fragment(rest, self.line_number);
                    }
                    self.line_active = false;
                }
            }
        }
    }

    /// Read the next physical line verbatim, line ending included.
    ///
    /// The unscanned remainder of the current line is left pending and is
    /// lexed by the next call to `next_statement`.
    pub fn read_raw_line(&mut self) -> io::Result<Option<String>> {
        if self.eof {
            return Ok(None);
        }
        let mut raw = String::new();
        if self.reader.read_line(&mut raw)? == 0 {
            self.eof = true;
            return Ok(None);
        }
        self.lines_read += 1;
        Ok(Some(raw))
    }

    /// Load the next line to scan. Returns false at end of input.
    fn advance_line(&mut self) -> io::Result<bool> {
        let Some(mut raw) = self.read_raw_line()? else {
            return Ok(false);
        };
        if self.lines_read == 1 && raw.starts_with(UTF8_BOM) {
            raw.replace_range(..UTF8_BOM.len_utf8(), "");
        }
        strip_line_ending(&mut raw);

        self.line = raw;
        self.line_number = self.lines_read;
        self.cursor = 0;
        self.flush_point = 0;
        self.line_active = true;
        self.state.begin_line();
        Ok(true)
    }
}

impl<R: BufRead> Iterator for Lexer<R> {
    type Item = io::Result<EmittedStatement>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_statement().transpose()
    }
}

/// Split `reader` into statements, calling `on_statement(text, line_number)`
/// for each one. Returning `false` from the callback stops the scan; this is
/// not an error.
pub fn split<R, F>(reader: R, mut on_statement: F) -> io::Result<()>
where
    R: BufRead,
    F: FnMut(&str, usize) -> bool,
{
    let mut lexer = Lexer::new(reader);
    while let Some(statement) = lexer.next_statement()? {
        if !on_statement(&statement.text, statement.line_number) {
            break;
        }
    }
    Ok(())
}

/// Remove a trailing `\n` or `\r\n`.
pub(crate) fn strip_line_ending(line: &mut String) {
    if line.ends_with('\n') {
        line.pop();
        if line.ends_with('\r') {
            line.pop();
        }
    }
}
