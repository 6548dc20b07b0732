//! Error types for script runs.

use std::io;
use thiserror::Error;

/// Errors that end a script run.
///
/// A failed statement is only a `RunError` under
/// [`ErrorPolicy::StopOnError`](crate::executor::ErrorPolicy); otherwise it is
/// reported to the observer and the run continues.
#[derive(Debug, Error)]
pub enum RunError {
    /// Reading the script failed.
    #[error("failed to read script after line {line}: {source}")]
    Io {
        line: usize,
        #[source]
        source: io::Error,
    },

    /// The input ended inside a `COPY ... FROM stdin` data section.
    #[error("COPY data starting after line {start_line} ended without a \\. terminator")]
    TruncatedBulkLoad { start_line: usize },

    /// A statement failed and the run was configured to stop on errors.
    #[error("statement at line {line} failed: {message}")]
    StatementFailed { line: usize, message: String },
}

impl RunError {
    pub fn line(&self) -> usize {
        match self {
            RunError::Io { line, .. } => *line,
            RunError::TruncatedBulkLoad { start_line } => *start_line,
            RunError::StatementFailed { line, .. } => *line,
        }
    }
}

/// Failure reported by a database connection.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct ConnectionError {
    pub message: String,
    /// 1-based position, within the current data section, of the data line
    /// that caused a bulk load failure
    pub data_line: Option<u64>,
}

impl ConnectionError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            data_line: None,
        }
    }

    /// Attribute the failure to a data line of the current section
    pub fn at_data_line(mut self, data_line: u64) -> Self {
        self.data_line = Some(data_line);
        self
    }
}

impl From<duckdb::Error> for ConnectionError {
    fn from(e: duckdb::Error) -> Self {
        Self::new(e.to_string())
    }
}
