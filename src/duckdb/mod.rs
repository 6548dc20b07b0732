//! Embedded DuckDB backend for script runs.
//!
//! [`DuckDbConnection`] implements [`Connection`] on top of an in-memory or
//! file-backed DuckDB database:
//!
//! - Queries (`SELECT`, `WITH`, `SHOW`, ...) return their rows as strings
//! - Other statements return the number of affected rows
//! - `COPY table FROM stdin` starts a bulk load whose data lines are turned
//!   into batched INSERT statements
//!
//! # Example
//!
//! ```ignore
//! use sql_script_runner::duckdb::{DuckDbConfig, DuckDbConnection};
//! use sql_script_runner::executor::ScriptRunner;
//!
//! let mut conn = DuckDbConnection::open(&DuckDbConfig::default())?;
//! let mut runner = ScriptRunner::new(&mut conn);
//! let summary = runner.run(script.as_bytes(), &mut |_: &str, _: &_, _: usize| true)?;
//! ```

mod copy;
mod values;

pub use copy::{parse_copy_target, CopyTarget, CopyValue, TargetColumn, MAX_ROWS_PER_INSERT};
pub use values::value_to_string;

use crate::error::ConnectionError;
use crate::executor::{BulkChannel, Connection, ExecutionOutcome, QueryRows, ResultHandle};
use anyhow::{Context, Result};
use log::{debug, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::PathBuf;

/// Rows buffered from a COPY section before they are inserted
pub const DEFAULT_COPY_BATCH_ROWS: usize = 10_000;

/// Leading keywords of statements that produce a result set
const QUERY_KEYWORDS: &[&str] = &[
    "SELECT", "WITH", "VALUES", "SHOW", "DESCRIBE", "DESC", "PRAGMA", "EXPLAIN", "FROM", "TABLE",
    "SUMMARIZE", "CALL",
];

/// Configuration for opening a DuckDB database
#[derive(Debug, Clone)]
pub struct DuckDbConfig {
    /// Database file; in-memory when `None`
    pub database: Option<PathBuf>,
    /// Memory limit for DuckDB (e.g., "4GB")
    pub memory_limit: Option<String>,
    /// Rows buffered per COPY batch
    pub copy_batch_rows: usize,
}

impl Default for DuckDbConfig {
    fn default() -> Self {
        Self {
            database: None,
            memory_limit: None,
            copy_batch_rows: DEFAULT_COPY_BATCH_ROWS,
        }
    }
}

/// An in-progress `COPY ... FROM stdin`
struct CopySession {
    target: CopyTarget,
    /// Columns receiving data, in data-line order
    columns: Vec<TargetColumn>,
    /// Parsed rows not inserted yet. Each data line is one row, so the
    /// buffered row `i` came from data line `rows_loaded + i + 1`.
    rows: Vec<Vec<CopyValue>>,
    rows_loaded: u64,
    /// The session opened its own transaction
    owns_transaction: bool,
}

/// A DuckDB session that executes script statements
pub struct DuckDbConnection {
    conn: duckdb::Connection,
    copy_batch_rows: usize,
    copy: Option<CopySession>,
    /// The script opened a transaction that is still open
    in_transaction: bool,
}

impl DuckDbConnection {
    /// Open the database described by `config`
    pub fn open(config: &DuckDbConfig) -> Result<Self> {
        let conn = match &config.database {
            Some(path) => duckdb::Connection::open(path)
                .with_context(|| format!("Failed to open DuckDB database {}", path.display()))?,
            None => duckdb::Connection::open_in_memory()
                .context("Failed to create in-memory DuckDB database")?,
        };

        if let Some(ref limit) = config.memory_limit {
            conn.execute(&format!("SET memory_limit = '{}'", limit), [])
                .context("Failed to set memory limit")?;
        }

        Ok(Self {
            conn,
            copy_batch_rows: config.copy_batch_rows.max(1),
            copy: None,
            in_transaction: false,
        })
    }

    /// Open an empty in-memory database with default settings
    pub fn open_in_memory() -> Result<Self> {
        Self::open(&DuckDbConfig::default())
    }

    /// Get the underlying DuckDB connection
    pub fn connection(&self) -> &duckdb::Connection {
        &self.conn
    }

    /// True while a COPY data section is expected
    pub fn in_bulk_load(&self) -> bool {
        self.copy.is_some()
    }

    /// Execute a query and collect its rows as strings
    pub fn query(&self, sql: &str) -> Result<QueryRows, duckdb::Error> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows_result = stmt.query([])?;

        let mut rows: Vec<Vec<String>> = Vec::new();
        while let Some(row) = rows_result.next()? {
            let column_count = row.as_ref().column_count();
            let mut values = Vec::with_capacity(column_count);
            for i in 0..column_count {
                values.push(match row.get_ref(i) {
                    Ok(value) => value_to_string(value),
                    Err(_) => "ERROR".to_string(),
                });
            }
            rows.push(values);
        }

        // Release the statement borrow before reading column names
        drop(rows_result);

        let columns = (0..stmt.column_count())
            .map(|i| {
                stmt.column_name(i)
                    .map(|s| s.to_string())
                    .unwrap_or_else(|_| format!("col{}", i))
            })
            .collect();

        Ok(QueryRows { columns, rows })
    }

    /// Columns of the COPY target, resolved the way DuckDB resolves the
    /// INSERTs that load it. Fails when the table does not exist.
    fn describe_table(&self, target: &CopyTarget) -> Result<Vec<TargetColumn>, duckdb::Error> {
        // column_name, column_type, null, key, default, extra
        let described = self.query(&format!("DESCRIBE {}", target.qualified_name()))?;
        Ok(described
            .rows
            .into_iter()
            .filter_map(|row| {
                let mut fields = row.into_iter();
                Some(TargetColumn {
                    name: fields.next()?,
                    data_type: fields.next()?,
                    not_null: fields.next()? == "NO",
                })
            })
            .collect())
    }

    fn begin_copy(&mut self, target: CopyTarget) -> ExecutionOutcome {
        if !target.text_format {
            return ExecutionOutcome::Failure(format!(
                "COPY {} FROM stdin: only the text format is supported",
                target.qualified_name()
            ));
        }
        let table_columns = match self.describe_table(&target) {
            Ok(columns) => columns,
            Err(e) => {
                debug!("DESCRIBE {} failed: {}", target.qualified_name(), e);
                return ExecutionOutcome::Failure(format!(
                    "COPY {} FROM stdin: table does not exist",
                    target.qualified_name()
                ));
            }
        };
        let columns = match copy::resolve_columns(&target, table_columns) {
            Ok(columns) => columns,
            Err(message) => return ExecutionOutcome::Failure(message),
        };

        // Inside a script transaction the rows belong to that transaction
        let owns_transaction = !self.in_transaction;
        if owns_transaction {
            if let Err(e) = self.conn.execute_batch("BEGIN TRANSACTION") {
                return ExecutionOutcome::Failure(e.to_string());
            }
        }

        debug!(
            "COPY into {} started (own transaction: {})",
            target.qualified_name(),
            owns_transaction
        );
        self.copy = Some(CopySession {
            target,
            columns,
            rows: Vec::new(),
            rows_loaded: 0,
            owns_transaction,
        });
        ExecutionOutcome::Success(ResultHandle::BulkLoadStarted)
    }

    /// Insert the buffered COPY rows
    fn flush_copy_rows(&mut self) -> Result<(), ConnectionError> {
        let Some(session) = self.copy.as_mut() else {
            return Ok(());
        };
        if session.rows.is_empty() {
            return Ok(());
        }

        let rows = std::mem::take(&mut session.rows);
        for chunk in rows.chunks(MAX_ROWS_PER_INSERT) {
            let sql = copy::build_insert(&session.target, chunk);
            if let Err(e) = self.conn.execute(&sql, []) {
                let offset = locate_failing_row(&self.conn, &session.columns, chunk).unwrap_or(0);
                let data_line = session.rows_loaded + offset as u64 + 1;
                return Err(ConnectionError::from(e).at_data_line(data_line));
            }
            session.rows_loaded += chunk.len() as u64;
        }
        debug!(
            "COPY into {}: {} rows loaded",
            session.target.qualified_name(),
            session.rows_loaded
        );
        Ok(())
    }

    fn rollback_copy(&mut self) {
        if let Some(session) = self.copy.take() {
            if session.owns_transaction {
                if let Err(e) = self.conn.execute_batch("ROLLBACK") {
                    warn!("rollback after failed COPY failed: {}", e);
                }
            }
        }
    }
}

impl Connection for DuckDbConnection {
    fn execute(&mut self, sql: &str) -> ExecutionOutcome {
        if self.copy.is_some() {
            warn!("previous COPY section was never finished; discarding it");
            self.rollback_copy();
        }

        let body = strip_leading_sql_comments(sql);
        if let Some(target) = parse_copy_target(body) {
            return self.begin_copy(target);
        }

        let result = if returns_rows(body) {
            self.query(sql).map(ResultHandle::Rows)
        } else {
            self.conn
                .execute(sql, [])
                .map(|n| ResultHandle::Command {
                    rows_affected: n as u64,
                })
        };

        match result {
            Ok(handle) => {
                if let Some(open) = transaction_change(body) {
                    self.in_transaction = open;
                }
                ExecutionOutcome::Success(handle)
            }
            Err(e) => ExecutionOutcome::Failure(e.to_string()),
        }
    }

    fn bulk_channel(&mut self) -> &mut dyn BulkChannel {
        self
    }
}

impl BulkChannel for DuckDbConnection {
    fn write_line(&mut self, line: &str) -> Result<(), ConnectionError> {
        let batch_rows = self.copy_batch_rows;
        let session = self
            .copy
            .as_mut()
            .ok_or_else(|| ConnectionError::new("no COPY in progress"))?;

        let content = line.strip_suffix('\n').unwrap_or(line);
        let content = content.strip_suffix('\r').unwrap_or(content);
        let row = copy::parse_data_line(content);
        let data_line = session.rows_loaded + session.rows.len() as u64 + 1;
        copy::check_row(&session.columns, &row)
            .map_err(|message| ConnectionError::new(message).at_data_line(data_line))?;
        session.rows.push(row);

        if session.rows.len() >= batch_rows {
            self.flush_copy_rows()?;
        }
        Ok(())
    }

    fn end_data(&mut self) -> Result<u64, ConnectionError> {
        if let Err(e) = self.flush_copy_rows() {
            self.rollback_copy();
            return Err(e);
        }

        let session = self
            .copy
            .take()
            .ok_or_else(|| ConnectionError::new("no COPY in progress"))?;
        if session.owns_transaction {
            self.conn.execute_batch("COMMIT")?;
        }
        Ok(session.rows_loaded)
    }

    fn abort_data(&mut self, reason: &str) {
        debug!("COPY aborted: {}", reason);
        self.rollback_copy();
    }
}

/// Find the row of a failed INSERT batch whose values do not convert to the
/// column types. `None` when every row converts, e.g. for a constraint
/// violation.
fn locate_failing_row(
    conn: &duckdb::Connection,
    columns: &[TargetColumn],
    rows: &[Vec<CopyValue>],
) -> Option<usize> {
    // The failed INSERT aborted this connection's transaction
    let checker = conn.try_clone().ok()?;
    rows.iter()
        .position(|row| checker.execute_batch(&copy::build_row_check(columns, row)).is_err())
}

/// True if the statement produces a result set: a query keyword leads it,
/// or it is DML with a RETURNING clause
fn returns_rows(body: &str) -> bool {
    static RE_RETURNING: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bRETURNING\b").unwrap());

    if body.starts_with('(') {
        return true;
    }
    let keyword: String = body
        .chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .collect::<String>()
        .to_ascii_uppercase();
    if QUERY_KEYWORDS.contains(&keyword.as_str()) {
        return true;
    }
    matches!(keyword.as_str(), "INSERT" | "UPDATE" | "DELETE") && RE_RETURNING.is_match(body)
}

/// `Some(true)` for statements that open a transaction, `Some(false)` for
/// statements that close one
fn transaction_change(body: &str) -> Option<bool> {
    let keyword = body
        .chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .collect::<String>()
        .to_ascii_uppercase();
    match keyword.as_str() {
        "BEGIN" | "START" => Some(true),
        "COMMIT" | "END" | "ROLLBACK" | "ABORT" => Some(false),
        _ => None,
    }
}

/// Skip whitespace and leading `--` / `/* */` comments
fn strip_leading_sql_comments(s: &str) -> &str {
    let mut result = s.trim();
    loop {
        if result.starts_with("--") {
            match result.find('\n') {
                Some(pos) => result = result[pos + 1..].trim(),
                None => return "",
            }
        } else if result.starts_with("/*") {
            match result.find("*/") {
                Some(pos) => result = result[pos + 2..].trim(),
                None => return "",
            }
        } else {
            return result;
        }
    }
}
