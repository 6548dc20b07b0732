//! YAML configuration for the `run` command.
//!
//! ```yaml
//! database: app.duckdb
//! memory_limit: 2GB
//! stop_on_error: true
//! echo: false
//! copy_batch_rows: 5000
//! ```
//!
//! Every key is optional; command-line flags take precedence.

use crate::duckdb::{DuckDbConfig, DEFAULT_COPY_BATCH_ROWS};
use crate::executor::ErrorPolicy;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunnerConfig {
    /// DuckDB database file (in-memory when absent)
    pub database: Option<PathBuf>,
    /// DuckDB memory limit (e.g., "4GB")
    pub memory_limit: Option<String>,
    pub stop_on_error: bool,
    pub echo: bool,
    /// Rows buffered per COPY batch
    pub copy_batch_rows: Option<usize>,
}

impl RunnerConfig {
    /// Load configuration from a YAML file
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::parse(&content)
            .with_context(|| format!("Invalid config file {}", path.display()))
    }

    pub fn parse(content: &str) -> anyhow::Result<Self> {
        // An empty file is an empty mapping
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml_ng::from_str(content)?)
    }

    pub fn error_policy(&self) -> ErrorPolicy {
        if self.stop_on_error {
            ErrorPolicy::StopOnError
        } else {
            ErrorPolicy::Continue
        }
    }

    pub fn duckdb_config(&self) -> DuckDbConfig {
        DuckDbConfig {
            database: self.database.clone(),
            memory_limit: self.memory_limit.clone(),
            copy_batch_rows: self.copy_batch_rows.unwrap_or(DEFAULT_COPY_BATCH_ROWS),
        }
    }
}
