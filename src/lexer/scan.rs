//! Per-line scanning automaton.
//!
//! `ScanState` is the lexer state that survives line boundaries: the open
//! literal or comment span, the parenthesis depth and the backslash run used
//! to detect escaped single quotes. `scan` advances a single forward cursor
//! over one line and stops at the first statement terminator or at the end of
//! the line, whichever comes first.

/// The literal or comment span the cursor is currently inside.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Span {
    #[default]
    None,
    /// `'string'` or `"identifier"`
    Quote(char),
    /// `$tag$ ... $tag$`, holding the full delimiter
    Dollar(String),
    /// `/* ... */`, holding the nesting depth (always >= 1)
    BlockComment(usize),
}

/// Where scanning of a line stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineStop {
    /// A top-level `;` at this byte offset.
    Terminator(usize),
    /// End of the significant part of the line. Less than the line length
    /// when a `--` comment truncated it.
    EndOfLine(usize),
}

#[derive(Debug, Clone, Default)]
pub struct ScanState {
    span: Span,
    paren_depth: usize,
    backslashes: usize,
}

impl ScanState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn span(&self) -> &Span {
        &self.span
    }

    pub fn quote_char(&self) -> Option<char> {
        match self.span {
            Span::Quote(q) => Some(q),
            _ => None,
        }
    }

    pub fn dollar_tag(&self) -> Option<&str> {
        match &self.span {
            Span::Dollar(tag) => Some(tag),
            _ => None,
        }
    }

    pub fn block_comment_depth(&self) -> usize {
        match self.span {
            Span::BlockComment(depth) => depth,
            _ => 0,
        }
    }

    pub fn paren_depth(&self) -> usize {
        self.paren_depth
    }

    /// True while inside a string, quoted identifier or dollar-quoted body,
    /// where whitespace is content and must be preserved.
    pub fn in_literal(&self) -> bool {
        matches!(self.span, Span::Quote(_) | Span::Dollar(_))
    }

    /// Called before scanning a new physical line. The line break itself is
    /// not a backslash, so any run of backslashes ends here.
    pub fn begin_line(&mut self) {
        self.backslashes = 0;
    }

    /// Scan `line` starting at byte offset `from`.
    ///
    /// `from` must lie on a char boundary. Offsets in the returned `LineStop`
    /// are byte offsets into `line` and always lie on char boundaries.
    pub fn scan(&mut self, line: &str, from: usize) -> LineStop {
        let mut pos = from;

        while pos < line.len() {
            let rest = &line[pos..];
            let Some(c) = rest.chars().next() else {
                break;
            };

            match &mut self.span {
                Span::Quote(q) => {
                    let q = *q;
                    if c == q {
                        if q == '\'' && self.backslashes % 2 == 1 {
                            self.backslashes = 0;
                        } else {
                            self.span = Span::None;
                            self.backslashes = 0;
                        }
                    } else if c == '\\' && q == '\'' {
                        self.backslashes += 1;
                    } else {
                        self.backslashes = 0;
                    }
                    pos += c.len_utf8();
                }
                Span::Dollar(tag) => {
                    if rest.starts_with(tag.as_str()) {
                        pos += tag.len();
                        self.span = Span::None;
                    } else {
                        pos += c.len_utf8();
                    }
                }
                Span::BlockComment(depth) => {
                    if rest.starts_with("/*") {
                        *depth += 1;
                        pos += 2;
                    } else if rest.starts_with("*/") {
                        *depth -= 1;
                        if *depth == 0 {
                            self.span = Span::None;
                        }
                        pos += 2;
                    } else {
                        pos += c.len_utf8();
                    }
                }
                Span::None => match c {
                    '/' if rest.starts_with("/*") => {
                        self.span = Span::BlockComment(1);
                        pos += 2;
                    }
                    '\'' | '"' => {
                        self.span = Span::Quote(c);
                        self.backslashes = 0;
                        pos += 1;
                    }
                    '$' => match dollar_delimiter_len(rest) {
                        Some(len) => {
                            self.span = Span::Dollar(rest[..len].to_string());
                            pos += len;
                        }
                        None => pos += 1,
                    },
                    '-' if rest.starts_with("--") => return LineStop::EndOfLine(pos),
                    '(' => {
                        self.paren_depth += 1;
                        pos += 1;
                    }
                    ')' => {
                        self.paren_depth = self.paren_depth.saturating_sub(1);
                        pos += 1;
                    }
                    ';' if self.paren_depth == 0 => return LineStop::Terminator(pos),
                    c if c.is_alphanumeric() || c == '_' => {
                        pos += identifier_run_len(rest);
                    }
                    _ => pos += c.len_utf8(),
                },
            }
        }

        LineStop::EndOfLine(line.len())
    }
}

/// Length in bytes of a `$tag$` / `$$` delimiter at the start of `rest`.
fn dollar_delimiter_len(rest: &str) -> Option<usize> {
    for (i, c) in rest.char_indices().skip(1) {
        if c == '$' {
            return Some(i + 1);
        }
        let allowed = if i == 1 {
            c.is_alphabetic() || c == '_'
        } else {
            c.is_alphanumeric() || c == '_'
        };
        if !allowed {
            return None;
        }
    }
    None
}

/// Length in bytes of the identifier/keyword run at the start of `rest`.
/// `$` continues a run but never starts one.
fn identifier_run_len(rest: &str) -> usize {
    rest.char_indices()
        .find(|&(_, c)| !(c.is_alphanumeric() || c == '_' || c == '$'))
        .map(|(i, _)| i)
        .unwrap_or(rest.len())
}
