mod glob_util;
mod run;
mod split;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use std::io;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "sql-script-runner")]
#[command(version)]
#[command(about = "Split SQL scripts into statements and execute them against DuckDB", long_about = None)]
pub struct Cli {
    /// Verbose logging (debug level; RUST_LOG overrides)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Execute SQL scripts statement by statement
    Run {
        /// Script file, glob pattern (e.g., migrations/*.sql) or - for stdin
        /// Supports .gz, .bz2, .xz, .zst compression
        file: PathBuf,

        /// YAML config file with defaults for the options below
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// DuckDB database file (default: in-memory)
        #[arg(short, long)]
        database: Option<PathBuf>,

        /// DuckDB memory limit (e.g., 4GB)
        #[arg(long)]
        memory_limit: Option<String>,

        /// Stop at the first failed statement
        #[arg(short = 's', long)]
        stop_on_error: bool,

        /// Print each statement before its result
        #[arg(short, long)]
        echo: bool,

        /// Output results as JSON lines, one record per statement
        #[arg(long)]
        json: bool,

        /// Show progress while reading each script
        #[arg(short, long)]
        progress: bool,

        /// Stop on first script that fails (for glob patterns)
        #[arg(long)]
        fail_fast: bool,

        /// Rows buffered per COPY ... FROM stdin batch
        #[arg(long)]
        copy_batch_rows: Option<usize>,
    },

    /// Print the statements of a script without executing them
    Split {
        /// Script file or - for stdin
        file: PathBuf,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// One JSON object per statement
        #[arg(long)]
        json: bool,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

pub fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Run {
            file,
            config,
            database,
            memory_limit,
            stop_on_error,
            echo,
            json,
            progress,
            fail_fast,
            copy_batch_rows,
        } => run::run(run::RunOptions {
            file,
            config,
            database,
            memory_limit,
            stop_on_error,
            echo,
            json,
            progress,
            fail_fast,
            copy_batch_rows,
        }),
        Commands::Split { file, output, json } => split::run(file, output, json),
        Commands::Completions { shell } => {
            generate(
                shell,
                &mut Cli::command(),
                "sql-script-runner",
                &mut io::stdout(),
            );
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_run_flags() {
        let cli = Cli::parse_from([
            "sql-script-runner",
            "-v",
            "run",
            "dump.sql",
            "--stop-on-error",
            "--database",
            "app.duckdb",
        ]);
        assert!(cli.verbose);
        match cli.command {
            Commands::Run {
                file,
                stop_on_error,
                database,
                echo,
                ..
            } => {
                assert_eq!(file, PathBuf::from("dump.sql"));
                assert!(stop_on_error);
                assert!(!echo);
                assert_eq!(database, Some(PathBuf::from("app.duckdb")));
            }
            _ => panic!("expected run command"),
        }
    }
}
