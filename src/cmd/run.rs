use anyhow::Context;
use indicatif::{ProgressBar, ProgressStyle};
use log::info;
use sql_script_runner::config::RunnerConfig;
use sql_script_runner::duckdb::DuckDbConnection;
use sql_script_runner::executor::{ErrorPolicy, RunSummary, ScriptRunner};
use sql_script_runner::input::{file_size, open_script};
use sql_script_runner::report::{write_json_line, ConsoleReporter, RunRecord, ScriptRecord};
use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant;

use super::glob_util::{expand_scripts, MultiFileResult};

pub struct RunOptions {
    pub file: PathBuf,
    pub config: Option<PathBuf>,
    pub database: Option<PathBuf>,
    pub memory_limit: Option<String>,
    pub stop_on_error: bool,
    pub echo: bool,
    pub json: bool,
    pub progress: bool,
    pub fail_fast: bool,
    pub copy_batch_rows: Option<usize>,
}

impl RunOptions {
    /// Config file values overridden by command-line flags
    fn resolve_config(&self) -> anyhow::Result<RunnerConfig> {
        let mut config = match &self.config {
            Some(path) => RunnerConfig::load(path)?,
            None => RunnerConfig::default(),
        };
        if self.database.is_some() {
            config.database = self.database.clone();
        }
        if self.memory_limit.is_some() {
            config.memory_limit = self.memory_limit.clone();
        }
        if self.copy_batch_rows.is_some() {
            config.copy_batch_rows = self.copy_batch_rows;
        }
        config.stop_on_error |= self.stop_on_error;
        config.echo |= self.echo;
        Ok(config)
    }
}

pub fn run(opts: RunOptions) -> anyhow::Result<()> {
    let config = opts.resolve_config()?;
    let files = expand_scripts(&opts.file)?;
    let policy = config.error_policy();

    let mut conn = DuckDbConnection::open(&config.duckdb_config())?;
    if let Some(ref db) = config.database {
        info!("using database {}", db.display());
    }

    let multi = files.len() > 1;
    if multi && !opts.json {
        eprintln!("Running {} scripts...\n", files.len());
    }

    let start_time = Instant::now();
    let mut result = MultiFileResult::new(files.len());
    let mut total = RunSummary::default();

    for (idx, file) in files.iter().enumerate() {
        if multi && !opts.json {
            eprintln!("[{}/{}] {}", idx + 1, files.len(), file.display());
        }

        let mut reporter = ConsoleReporter::stdio(config.echo, opts.json);
        reporter.set_file(file.display().to_string());
        let outcome = run_script(
            &mut conn,
            file,
            policy,
            &mut reporter,
            opts.progress && !opts.json,
        );

        let (summary, error) = match outcome {
            Ok(summary) => {
                result.record_success();
                (summary, None)
            }
            Err(e) => {
                let message = format!("{:#}", e);
                if multi && !opts.json {
                    eprintln!("✗ {}: {}", file.display(), message);
                }
                result.record_failure(file.clone(), message.clone());
                (RunSummary::default(), Some(message))
            }
        };
        total.merge(&summary);

        if opts.json {
            let file = file.display().to_string();
            let record = ScriptRecord {
                file: &file,
                summary: &summary,
                error: error.as_deref(),
            };
            write_json_line(&mut io::stdout().lock(), &record)?;
        }

        if summary.stopped_early {
            break;
        }
        if result.has_failures() && opts.fail_fast {
            if !opts.json {
                eprintln!("\nStopping due to --fail-fast");
            }
            break;
        }
    }

    let elapsed = start_time.elapsed();

    if opts.json {
        let record = RunRecord {
            summary: &total,
            scripts: result.total_files,
            failed_scripts: result.failed,
            elapsed_secs: elapsed.as_secs_f64(),
        };
        write_json_line(&mut io::stdout().lock(), &record)?;
    } else {
        eprintln!();
        eprintln!("{}", total);
        if multi {
            eprintln!(
                "Scripts: {} succeeded, {} failed of {}",
                result.succeeded, result.failed, result.total_files
            );
        }
        eprintln!("Elapsed time: {:.3?}", elapsed);
    }

    if result.has_failures() {
        if result.total_files == 1 {
            let (_, message) = &result.errors[0];
            anyhow::bail!("{}", message);
        }
        anyhow::bail!(
            "{} of {} scripts failed",
            result.failed,
            result.total_files
        );
    }

    Ok(())
}

fn run_script(
    conn: &mut DuckDbConnection,
    file: &Path,
    policy: ErrorPolicy,
    reporter: &mut ConsoleReporter<io::Stdout, io::Stderr>,
    progress: bool,
) -> anyhow::Result<RunSummary> {
    let pb = match file_size(file) {
        Some(size) if progress => {
            let pb = ProgressBar::new(size);
            pb.set_style(
                ProgressStyle::with_template(
                    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({percent}%) {msg}",
                )?
                .progress_chars("█▓▒░  ")
                .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"),
            );
            pb.enable_steady_tick(std::time::Duration::from_millis(100));
            Some(pb)
        }
        _ => None,
    };

    let callback = pb.clone().map(|pb| {
        Box::new(move |bytes: u64| pb.set_position(bytes)) as Box<dyn Fn(u64)>
    });
    let reader =
        open_script(file, callback).with_context(|| format!("Failed to open {}", file.display()))?;

    let summary = ScriptRunner::new(conn)
        .with_policy(policy)
        .run(reader, reporter)
        .with_context(|| format!("Script {} aborted", file.display()))?;

    if let Some(pb) = pb {
        pb.finish_with_message("done");
    }
    info!("{}: {}", file.display(), summary);
    Ok(summary)
}
