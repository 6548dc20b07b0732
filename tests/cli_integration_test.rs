//! Tests driving the `sql-script-runner` binary.

use std::fs;
use std::io::Write;
use std::path::Path;
use std::process::{Command, Output, Stdio};
use tempfile::TempDir;

fn cmd() -> Command {
    Command::new(env!("CARGO_BIN_EXE_sql-script-runner"))
}

fn write_script(dir: &Path, name: &str, content: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    fs::write(&path, content).unwrap();
    path
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

// =============================================================================
// run
// =============================================================================

#[test]
fn test_run_prints_result_table() {
    let dir = TempDir::new().unwrap();
    let script = write_script(
        dir.path(),
        "init.sql",
        "CREATE TABLE t (id INTEGER, name VARCHAR);\n\
         INSERT INTO t VALUES (1, 'one;two');\n\
         SELECT id, name FROM t;\n",
    );

    let output = cmd().args(["run"]).arg(&script).output().unwrap();
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let out = stdout(&output);
    assert!(out.contains("│ id │ name    │"));
    assert!(out.contains("│ 1  │ one;two │"));
    assert!(out.contains("1 row"));
    assert!(stderr(&output).contains("3 statements executed, 0 failed"));
}

#[test]
fn test_run_reports_error_with_line() {
    let dir = TempDir::new().unwrap();
    let script = write_script(
        dir.path(),
        "bad.sql",
        "SELECT 1;\n\nSELECT * FROM missing_table;\nSELECT 2;\n",
    );

    let output = cmd().arg("run").arg(&script).output().unwrap();
    // Failed statements do not fail the run unless --stop-on-error is set
    assert!(output.status.success());

    let err = stderr(&output);
    assert!(err.contains("ERROR at line 3:"), "stderr: {}", err);
    assert!(err.contains("SELECT * FROM missing_table;"));
    assert!(err.contains("3 statements executed, 1 failed"));
}

#[test]
fn test_run_stop_on_error_exits_nonzero() {
    let dir = TempDir::new().unwrap();
    let script = write_script(
        dir.path(),
        "bad.sql",
        "SELECT * FROM missing_table;\nSELECT 'after' AS marker;\n",
    );

    let output = cmd()
        .arg("run")
        .arg(&script)
        .arg("--stop-on-error")
        .output()
        .unwrap();
    assert!(!output.status.success());
    assert!(!stdout(&output).contains("after"));
    assert!(stderr(&output).contains("statement at line 1 failed"));
}

#[test]
fn test_run_copy_from_stdin_json() {
    let dir = TempDir::new().unwrap();
    let script = write_script(
        dir.path(),
        "dump.sql",
        "CREATE TABLE users (id INTEGER, name VARCHAR);\n\
         COPY users (id, name) FROM stdin;\n\
         1\tAlice\n\
         2\tBob\n\
         \\.\n\
         SELECT count(*) AS n FROM users;\n",
    );

    let output = cmd()
        .arg("run")
        .arg(&script)
        .arg("--json")
        .output()
        .unwrap();
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let records: Vec<serde_json::Value> = stdout(&output)
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    let kinds: Vec<&str> = records.iter().map(|r| r["type"].as_str().unwrap()).collect();
    assert_eq!(
        kinds,
        vec!["statement", "statement", "statement", "statement", "script", "run"]
    );

    assert_eq!(records[1]["result"]["kind"], "bulk_load_started");
    assert_eq!(records[2]["result"]["kind"], "bulk_load_finished");
    assert_eq!(records[2]["line"], 5);
    assert_eq!(records[3]["result"]["rows"][0][0], "2");
    assert!(records[3]["file"].as_str().unwrap().ends_with("dump.sql"));

    assert_eq!(records[4]["summary"]["bulk_rows"], 2);
    let run = &records[5];
    assert_eq!(run["summary"]["bulk_loads"], 1);
    assert_eq!(run["summary"]["bulk_rows"], 2);
    assert_eq!(run["scripts"], 1);
    assert_eq!(run["failed_scripts"], 0);
}

#[test]
fn test_run_truncated_copy_fails() {
    let dir = TempDir::new().unwrap();
    let script = write_script(
        dir.path(),
        "truncated.sql",
        "CREATE TABLE t (id INTEGER);\nCOPY t FROM stdin;\n1\n",
    );

    let output = cmd().arg("run").arg(&script).output().unwrap();
    assert!(!output.status.success());
    assert!(stderr(&output).contains("without a \\. terminator"));
}

#[test]
fn test_run_glob_uses_one_database_in_order() {
    let dir = TempDir::new().unwrap();
    write_script(dir.path(), "001_schema.sql", "CREATE TABLE t (id INTEGER);\n");
    write_script(dir.path(), "002_data.sql", "INSERT INTO t VALUES (1), (2);\n");
    write_script(dir.path(), "003_check.sql", "SELECT sum(id) AS total FROM t;\n");

    let output = cmd()
        .arg("run")
        .arg(dir.path().join("*.sql"))
        .output()
        .unwrap();
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(stdout(&output).contains("│ 3     │"));
    assert!(stderr(&output).contains("Scripts: 3 succeeded, 0 failed of 3"));
}

#[test]
fn test_run_from_stdin_with_echo() {
    let mut child = cmd()
        .args(["run", "-", "--echo"])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();
    child
        .stdin
        .take()
        .unwrap()
        .write_all(b"CREATE TABLE t (id INTEGER);\nINSERT INTO t VALUES (7);\n")
        .unwrap();
    let output = child.wait_with_output().unwrap();

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let out = stdout(&output);
    assert!(out.contains("CREATE TABLE t (id INTEGER);"));
    assert!(out.contains("OK, 1 rows affected"));
}

#[test]
fn test_run_with_config_file_and_database() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("app.duckdb");
    let config = write_script(
        dir.path(),
        "runner.yaml",
        &format!("database: {}\nstop_on_error: true\n", db.display()),
    );
    let script = write_script(dir.path(), "init.sql", "CREATE TABLE kept (id INTEGER);\n");

    let output = cmd()
        .arg("run")
        .arg(&script)
        .arg("--config")
        .arg(&config)
        .output()
        .unwrap();
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(db.exists());

    let check = write_script(dir.path(), "check.sql", "SELECT count(*) AS n FROM kept;\n");
    let output = cmd()
        .arg("run")
        .arg(&check)
        .arg("--database")
        .arg(&db)
        .output()
        .unwrap();
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(stdout(&output).contains("│ 0 │"));
}

#[test]
fn test_run_missing_file() {
    let output = cmd()
        .args(["run", "/nonexistent/script.sql"])
        .output()
        .unwrap();
    assert!(!output.status.success());
    assert!(stderr(&output).contains("does not exist"));
}

// =============================================================================
// split
// =============================================================================

#[test]
fn test_split_text_output() {
    let dir = TempDir::new().unwrap();
    let script = write_script(
        dir.path(),
        "s.sql",
        "SELECT 'a;b'; -- note\nCREATE FUNCTION f() AS $$ x; $$;\n",
    );

    let output = cmd().arg("split").arg(&script).output().unwrap();
    assert!(output.status.success());
    assert_eq!(
        stdout(&output),
        "SELECT 'a;b';\n\nCREATE FUNCTION f() AS $$ x; $$;\n"
    );
}

#[test]
fn test_split_json_lines_to_file() {
    let dir = TempDir::new().unwrap();
    let script = write_script(dir.path(), "s.sql", "SELECT 1;\n\nSELECT\n  2;\n");
    let out_file = dir.path().join("statements.jsonl");

    let output = cmd()
        .arg("split")
        .arg(&script)
        .arg("--json")
        .arg("--output")
        .arg(&out_file)
        .output()
        .unwrap();
    assert!(output.status.success());
    assert!(stderr(&output).contains("Wrote 2 statements"));

    let content = fs::read_to_string(&out_file).unwrap();
    let records: Vec<serde_json::Value> = content
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(records.len(), 2);
    assert_eq!(records[1]["text"], "SELECT\n  2;");
    assert_eq!(records[1]["start_line"], 3);
    assert_eq!(records[1]["line"], 4);
}

// =============================================================================
// completions
// =============================================================================

#[test]
fn test_completions_bash() {
    let output = cmd().args(["completions", "bash"]).output().unwrap();
    assert!(output.status.success());
    assert!(stdout(&output).contains("sql-script-runner"));
}
