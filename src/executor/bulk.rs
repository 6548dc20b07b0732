//! `COPY ... FROM stdin` data passthrough.
//!
//! After a statement starts a bulk load, the following lines of the script
//! are raw data, not SQL. They are read from the lexer's stream without
//! lexing and forwarded verbatim until a line consisting of `\.` ends the
//! section.

use super::BulkChannel;
use crate::error::{ConnectionError, RunError};
use crate::lexer::Lexer;
use log::debug;
use std::io::BufRead;

/// End-of-data marker line
pub const TERMINATOR: &str = "\\.";

/// Result of forwarding one data section
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BulkOutcome {
    /// The terminator was seen and the channel accepted all data.
    Completed { rows: u64, end_line: usize },
    /// The channel rejected a line or the end of data. The rest of the
    /// section was consumed and discarded.
    Failed { message: String, line: usize },
}

/// Transient state while a data section is being forwarded.
#[derive(Debug)]
pub struct BulkLoadSession {
    /// Last line read before the section began
    pub start_line: usize,
    pub lines_forwarded: u64,
    failure: Option<(String, usize)>,
}

impl BulkLoadSession {
    pub fn new(start_line: usize) -> Self {
        Self {
            start_line,
            lines_forwarded: 0,
            failure: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.failure.is_none()
    }

    /// Script line of a channel failure. Every data line up to a failure is
    /// forwarded, so data line `n` is script line `start_line + n`.
    fn failure_line(&self, error: &ConnectionError, current_line: usize) -> usize {
        error
            .data_line
            .map(|n| self.start_line + n as usize)
            .unwrap_or(current_line)
    }
}

/// True if `raw` (with or without its `\n` / `\r\n`) is the end-of-data marker.
pub fn is_terminator(raw: &str) -> bool {
    let content = raw.strip_suffix('\n').unwrap_or(raw);
    let content = content.strip_suffix('\r').unwrap_or(content);
    content == TERMINATOR
}

/// Forward data lines from `lexer` to `channel` until the terminator.
///
/// A channel failure does not stop reading: the remaining lines of the
/// section are drained so they are never lexed as SQL. Reaching the end of
/// input before the terminator is always an error.
pub fn forward<R: BufRead>(
    lexer: &mut Lexer<R>,
    channel: &mut dyn BulkChannel,
) -> Result<BulkOutcome, RunError> {
    let mut session = BulkLoadSession::new(lexer.lines_read());

    loop {
        let raw = match lexer.read_raw_line() {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                if session.is_active() {
                    channel.abort_data("unexpected end of input");
                }
                return Err(RunError::TruncatedBulkLoad {
                    start_line: session.start_line,
                });
            }
            Err(source) => {
                if session.is_active() {
                    channel.abort_data("failed to read input");
                }
                return Err(RunError::Io {
                    line: lexer.lines_read(),
                    source,
                });
            }
        };
        let line = lexer.lines_read();

        if is_terminator(&raw) {
            if let Some((message, line)) = session.failure {
                return Ok(BulkOutcome::Failed { message, line });
            }
            return match channel.end_data() {
                Ok(rows) => {
                    debug!(
                        "forwarded {} data lines, {} rows loaded",
                        session.lines_forwarded, rows
                    );
                    Ok(BulkOutcome::Completed {
                        rows,
                        end_line: line,
                    })
                }
                Err(e) => Ok(BulkOutcome::Failed {
                    line: session.failure_line(&e, line),
                    message: e.message,
                }),
            };
        }

        if !session.is_active() {
            continue;
        }

        match channel.write_line(&raw) {
            Ok(()) => session.lines_forwarded += 1,
            Err(e) => {
                channel.abort_data(&e.message);
                let line = session.failure_line(&e, line);
                session.failure = Some((e.message, line));
            }
        }
    }
}
