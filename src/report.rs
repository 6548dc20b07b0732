//! Console and JSON reporting of statement outcomes.
//!
//! `--json` output is JSON lines, written as outcomes arrive:
//! - `{"type": "statement", ...}` for every outcome
//! - `{"type": "script", ...}` after each script
//! - `{"type": "run", ...}` once at the end

use crate::executor::{ExecutionOutcome, Observer, QueryRows, ResultHandle, RunSummary};
use serde::Serialize;
use std::io::{self, Write};

/// Widest rendered column in a result table
const MAX_COLUMN_WIDTH: usize = 50;

/// One statement outcome
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename = "statement")]
pub struct StatementRecord<'a> {
    pub file: &'a str,
    pub line: usize,
    pub statement: &'a str,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<&'a ResultHandle>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<&'a str>,
}

impl<'a> StatementRecord<'a> {
    pub fn new(
        file: &'a str,
        statement: &'a str,
        outcome: &'a ExecutionOutcome,
        line: usize,
    ) -> Self {
        let (status, result, error) = match outcome {
            ExecutionOutcome::Success(handle) => ("ok", Some(handle), None),
            ExecutionOutcome::Failure(message) => ("error", None, Some(message.as_str())),
        };
        Self {
            file,
            line,
            statement,
            status,
            result,
            error,
        }
    }
}

/// Totals for one script file
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename = "script")]
pub struct ScriptRecord<'a> {
    pub file: &'a str,
    pub summary: &'a RunSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<&'a str>,
}

/// Totals for the whole run
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename = "run")]
pub struct RunRecord<'a> {
    pub summary: &'a RunSummary,
    pub scripts: usize,
    pub failed_scripts: usize,
    pub elapsed_secs: f64,
}

/// Write `record` as one JSON line
pub fn write_json_line<W: Write, T: Serialize>(out: &mut W, record: &T) -> io::Result<()> {
    serde_json::to_writer(&mut *out, record)?;
    out.write_all(b"\n")
}

/// Observer that prints outcomes as they arrive, as text or JSON lines.
pub struct ConsoleReporter<W: Write, E: Write> {
    out: W,
    err: E,
    echo: bool,
    json: bool,
    /// Script named in JSON records
    file: String,
}

impl ConsoleReporter<io::Stdout, io::Stderr> {
    pub fn stdio(echo: bool, json: bool) -> Self {
        Self::new(io::stdout(), io::stderr(), echo, json)
    }
}

impl<W: Write, E: Write> ConsoleReporter<W, E> {
    pub fn new(out: W, err: E, echo: bool, json: bool) -> Self {
        Self {
            out,
            err,
            echo,
            json,
            file: String::new(),
        }
    }

    /// Name the script the following outcomes belong to
    pub fn set_file(&mut self, file: impl Into<String>) {
        self.file = file.into();
    }

    pub fn into_writers(self) -> (W, E) {
        (self.out, self.err)
    }

    fn print_json(&mut self, statement: &str, outcome: &ExecutionOutcome, line: usize) -> io::Result<()> {
        let record = StatementRecord::new(&self.file, statement, outcome, line);
        write_json_line(&mut self.out, &record)
    }

    fn print(&mut self, statement: &str, outcome: &ExecutionOutcome, line: usize) -> io::Result<()> {
        match outcome {
            ExecutionOutcome::Failure(message) => {
                writeln!(self.err, "ERROR at line {}: {}", line, message)?;
                writeln!(self.err, "STATEMENT:  {}", statement)?;
            }
            ExecutionOutcome::Success(handle) => {
                // The COPY statement itself was echoed when it started
                let finished_copy = matches!(handle, ResultHandle::BulkLoadFinished { .. });
                if self.echo && !finished_copy {
                    writeln!(self.out, "{}", statement)?;
                }
                match handle {
                    ResultHandle::Rows(rows) => write!(self.out, "{}", format_table(rows))?,
                    ResultHandle::Command { rows_affected } if self.echo => {
                        writeln!(self.out, "OK, {} rows affected", rows_affected)?
                    }
                    ResultHandle::BulkLoadFinished { rows } if self.echo => {
                        writeln!(self.out, "COPY {}", rows)?
                    }
                    _ => {}
                }
            }
        }
        Ok(())
    }
}

impl<W: Write, E: Write> Observer for ConsoleReporter<W, E> {
    fn on_result(&mut self, statement: &str, outcome: &ExecutionOutcome, line: usize) -> bool {
        let written = if self.json {
            self.print_json(statement, outcome, line)
        } else {
            self.print(statement, outcome, line)
        };
        // A closed stdout (e.g. piped into `head`) ends the run
        written.is_ok()
    }
}

/// Format a result set as a box table followed by its row count.
pub fn format_table(result: &QueryRows) -> String {
    if result.columns.is_empty() {
        return String::new();
    }

    let mut widths: Vec<usize> = result.columns.iter().map(|c| c.chars().count()).collect();
    for row in &result.rows {
        for (i, val) in row.iter().enumerate() {
            if i < widths.len() {
                widths[i] = widths[i].max(val.chars().count());
            }
        }
    }
    widths
        .iter_mut()
        .for_each(|w| *w = (*w).min(MAX_COLUMN_WIDTH));

    let mut output = String::new();

    border(&mut output, &widths, '┌', '┬', '┐');
    cells(&mut output, &widths, &result.columns);
    border(&mut output, &widths, '├', '┼', '┤');
    for row in &result.rows {
        cells(&mut output, &widths, row);
    }
    border(&mut output, &widths, '└', '┴', '┘');

    output.push_str(&format!(
        "{} row{}\n",
        result.rows.len(),
        if result.rows.len() == 1 { "" } else { "s" }
    ));

    output
}

fn border(output: &mut String, widths: &[usize], left: char, mid: char, right: char) {
    output.push(left);
    for (i, width) in widths.iter().enumerate() {
        output.push_str(&"─".repeat(width + 2));
        if i < widths.len() - 1 {
            output.push(mid);
        }
    }
    output.push(right);
    output.push('\n');
}

fn cells(output: &mut String, widths: &[usize], values: &[String]) {
    output.push('│');
    for (value, width) in values.iter().zip(widths) {
        output.push_str(&format!(" {:width$} │", truncate(value, *width), width = width));
    }
    output.push('\n');
}

/// Truncate to `max_len` characters, marking the cut with `…`
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(1)).collect();
        format!("{}…", kept)
    }
}
