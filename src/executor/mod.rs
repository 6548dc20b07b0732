//! Statement execution and dispatch.
//!
//! `ScriptRunner` pulls statements from the [`Lexer`], submits each one to a
//! [`Connection`] and reports every outcome to an [`Observer`]. When the
//! connection answers a statement with "now expecting bulk data", the runner
//! hands the same input stream to the [`bulk`] passthrough before lexing
//! resumes.

pub mod bulk;

use crate::error::{ConnectionError, RunError};
use crate::lexer::Lexer;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::io::BufRead;

/// Columns and rows returned by a query, rendered as strings.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QueryRows {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl QueryRows {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

/// What a successful statement produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResultHandle {
    /// DDL/DML and other statements without a result set
    Command { rows_affected: u64 },
    /// A result set
    Rows(QueryRows),
    /// The server now expects raw data lines (`COPY ... FROM stdin`)
    BulkLoadStarted,
    /// A bulk data section was fully transferred
    BulkLoadFinished { rows: u64 },
}

impl ResultHandle {
    pub fn is_bulk_load_start(&self) -> bool {
        matches!(self, ResultHandle::BulkLoadStarted)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionOutcome {
    Success(ResultHandle),
    Failure(String),
}

impl ExecutionOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, ExecutionOutcome::Failure(_))
    }
}

/// Receiving side of a bulk data section.
///
/// A channel that buffers rows can fail after the offending line was
/// accepted; it sets [`ConnectionError::data_line`] so the failure is still
/// reported at that line.
pub trait BulkChannel {
    /// Forward one raw data line, line ending included.
    fn write_line(&mut self, line: &str) -> Result<(), ConnectionError>;

    /// Signal the end of the data section. Returns the number of rows loaded.
    fn end_data(&mut self) -> Result<u64, ConnectionError>;

    /// Abandon the current data section after a failure.
    fn abort_data(&mut self, _reason: &str) {}
}

/// A database session that executes one statement at a time.
pub trait Connection {
    fn execute(&mut self, sql: &str) -> ExecutionOutcome;

    /// Channel for the data lines following a statement whose outcome was
    /// [`ResultHandle::BulkLoadStarted`].
    fn bulk_channel(&mut self) -> &mut dyn BulkChannel;
}

/// Receives every statement outcome. Returning `false` stops the run.
pub trait Observer {
    fn on_result(&mut self, statement: &str, outcome: &ExecutionOutcome, line: usize) -> bool;
}

impl<F> Observer for F
where
    F: FnMut(&str, &ExecutionOutcome, usize) -> bool,
{
    fn on_result(&mut self, statement: &str, outcome: &ExecutionOutcome, line: usize) -> bool {
        self(statement, outcome, line)
    }
}

/// What to do when a statement fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorPolicy {
    /// Report the failure and continue with the next statement
    #[default]
    Continue,
    /// Report the failure and end the run with an error
    StopOnError,
}

impl std::str::FromStr for ErrorPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "continue" => Ok(ErrorPolicy::Continue),
            "stop" | "stop_on_error" => Ok(ErrorPolicy::StopOnError),
            _ => Err(format!(
                "Unknown error policy: {}. Valid options: continue, stop",
                s
            )),
        }
    }
}

impl std::fmt::Display for ErrorPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorPolicy::Continue => write!(f, "continue"),
            ErrorPolicy::StopOnError => write!(f, "stop"),
        }
    }
}

/// Counters for one script run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub statements_executed: u64,
    pub statements_failed: u64,
    pub bulk_loads: u64,
    pub bulk_rows: u64,
    pub lines_read: usize,
    /// The observer asked to stop before the end of the script
    pub stopped_early: bool,
}

impl RunSummary {
    pub fn merge(&mut self, other: &RunSummary) {
        self.statements_executed += other.statements_executed;
        self.statements_failed += other.statements_failed;
        self.bulk_loads += other.bulk_loads;
        self.bulk_rows += other.bulk_rows;
        self.lines_read += other.lines_read;
        self.stopped_early |= other.stopped_early;
    }
}

impl std::fmt::Display for RunSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} statements executed, {} failed, {} COPY sections ({} rows), {} lines read",
            self.statements_executed,
            self.statements_failed,
            self.bulk_loads,
            self.bulk_rows,
            self.lines_read
        )
    }
}

/// Runs scripts against a connection, one statement at a time, in order.
pub struct ScriptRunner<'a, C: Connection + ?Sized> {
    conn: &'a mut C,
    policy: ErrorPolicy,
}

impl<'a, C: Connection + ?Sized> ScriptRunner<'a, C> {
    pub fn new(conn: &'a mut C) -> Self {
        Self {
            conn,
            policy: ErrorPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: ErrorPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Execute every statement of `input`.
    pub fn run<R, O>(&mut self, input: R, observer: &mut O) -> Result<RunSummary, RunError>
    where
        R: BufRead,
        O: Observer + ?Sized,
    {
        let mut lexer = Lexer::new(input);
        let mut summary = RunSummary::default();

        loop {
            let statement = match lexer.next_statement() {
                Ok(Some(statement)) => statement,
                Ok(None) => break,
                Err(source) => {
                    return Err(RunError::Io {
                        line: lexer.lines_read(),
                        source,
                    })
                }
            };

            debug!(
                "executing statement ending at line {}: {}",
                statement.line_number,
                preview(&statement.text)
            );

            let outcome = self.conn.execute(&statement.text);
            summary.statements_executed += 1;

            let mut keep_going = observer.on_result(&statement.text, &outcome, statement.line_number);

            match &outcome {
                ExecutionOutcome::Failure(message) => {
                    summary.statements_failed += 1;
                    warn!("statement at line {} failed: {}", statement.line_number, message);
                    if self.policy == ErrorPolicy::StopOnError {
                        return Err(RunError::StatementFailed {
                            line: statement.line_number,
                            message: message.clone(),
                        });
                    }
                }
                ExecutionOutcome::Success(handle) if handle.is_bulk_load_start() => {
                    info!("COPY data section starts after line {}", lexer.lines_read());
                    let bulk = bulk::forward(&mut lexer, self.conn.bulk_channel())?;
                    summary.bulk_loads += 1;

                    let (bulk_outcome, line) = match bulk {
                        bulk::BulkOutcome::Completed { rows, end_line } => {
                            summary.bulk_rows += rows;
                            info!("COPY data section ended at line {} ({} rows)", end_line, rows);
                            (
                                ExecutionOutcome::Success(ResultHandle::BulkLoadFinished { rows }),
                                end_line,
                            )
                        }
                        bulk::BulkOutcome::Failed { message, line } => {
                            summary.statements_failed += 1;
                            warn!("COPY data failed at line {}: {}", line, message);
                            (ExecutionOutcome::Failure(message), line)
                        }
                    };

                    keep_going &= observer.on_result(&statement.text, &bulk_outcome, line);

                    if let ExecutionOutcome::Failure(message) = bulk_outcome {
                        if self.policy == ErrorPolicy::StopOnError {
                            return Err(RunError::StatementFailed { line, message });
                        }
                    }
                }
                ExecutionOutcome::Success(_) => {}
            }

            if !keep_going {
                info!("run stopped by observer after line {}", statement.line_number);
                summary.stopped_early = true;
                break;
            }
        }

        summary.lines_read = lexer.lines_read();
        Ok(summary)
    }
}

/// First line of a statement, shortened for log output.
fn preview(text: &str) -> String {
    const MAX_CHARS: usize = 80;
    let first = text.lines().next().unwrap_or_default();
    if first.chars().count() > MAX_CHARS || text.contains('\n') {
        let short: String = first.chars().take(MAX_CHARS).collect();
        format!("{}…", short)
    } else {
        first.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_policy_from_str() {
        assert_eq!("continue".parse::<ErrorPolicy>().unwrap(), ErrorPolicy::Continue);
        assert_eq!("stop".parse::<ErrorPolicy>().unwrap(), ErrorPolicy::StopOnError);
        assert_eq!(
            "Stop-On-Error".parse::<ErrorPolicy>().unwrap(),
            ErrorPolicy::StopOnError
        );
        assert!("abort".parse::<ErrorPolicy>().is_err());
    }

    #[test]
    fn test_preview() {
        assert_eq!(preview("SELECT 1;"), "SELECT 1;");
        assert_eq!(preview("SELECT\n1;"), "SELECT…");
        assert_eq!(preview(&"x".repeat(100)).chars().count(), 81);
    }

    #[test]
    fn test_summary_merge() {
        let mut total = RunSummary::default();
        total.merge(&RunSummary {
            statements_executed: 3,
            statements_failed: 1,
            bulk_loads: 1,
            bulk_rows: 10,
            lines_read: 20,
            stopped_early: false,
        });
        total.merge(&RunSummary {
            statements_executed: 2,
            stopped_early: true,
            ..Default::default()
        });
        assert_eq!(total.statements_executed, 5);
        assert_eq!(total.bulk_rows, 10);
        assert!(total.stopped_early);
    }

    #[test]
    fn test_bulk_load_flag() {
        assert!(ResultHandle::BulkLoadStarted.is_bulk_load_start());
        assert!(!ResultHandle::Command { rows_affected: 1 }.is_bulk_load_start());
    }
}
