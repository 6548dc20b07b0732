use anyhow::Context;
use serde::Serialize;
use sql_script_runner::input::open_script;
use sql_script_runner::lexer::Lexer;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::time::Instant;

/// One line of `split --json` output
#[derive(Serialize)]
struct StatementRecord<'a> {
    line: usize,
    start_line: usize,
    text: &'a str,
}

pub fn run(file: PathBuf, output: Option<PathBuf>, json: bool) -> anyhow::Result<()> {
    let reader = open_script(&file, None)
        .with_context(|| format!("Failed to open {}", file.display()))?;

    let mut writer: Box<dyn Write> = match &output {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("Failed to create {}", path.display()))?,
        )),
        None => Box::new(BufWriter::new(io::stdout().lock())),
    };

    let start_time = Instant::now();
    let mut lexer = Lexer::new(reader);
    let mut count = 0u64;

    while let Some(statement) = lexer
        .next_statement()
        .with_context(|| format!("Failed to read {} after line {}", file.display(), lexer.lines_read()))?
    {
        if json {
            let record = StatementRecord {
                line: statement.line_number,
                start_line: statement.start_line,
                text: &statement.text,
            };
            writeln!(writer, "{}", serde_json::to_string(&record)?)?;
        } else {
            if count > 0 {
                writeln!(writer)?;
            }
            writeln!(writer, "{}", statement.text)?;
        }
        count += 1;
    }
    writer.flush()?;

    if let Some(path) = output {
        eprintln!(
            "✓ Wrote {} statements ({} lines) to {} in {:.3?}",
            count,
            lexer.lines_read(),
            path.display(),
            start_time.elapsed()
        );
    }

    Ok(())
}
