//! Split SQL scripts into statements and execute them one at a time.
//!
//! - [`lexer`]: incremental statement splitter that understands quotes,
//!   dollar quoting, comments and parentheses
//! - [`executor`]: runs statements against a [`executor::Connection`],
//!   including `COPY ... FROM stdin` data passthrough
//! - [`duckdb`]: embedded DuckDB connection

pub mod config;
pub mod duckdb;
pub mod error;
pub mod executor;
pub mod input;
pub mod lexer;
pub mod report;

pub use error::{ConnectionError, RunError};
pub use executor::{ErrorPolicy, RunSummary, ScriptRunner};
pub use lexer::{split, EmittedStatement, Lexer};
