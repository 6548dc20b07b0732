//! Expansion of script arguments (literal path, glob pattern or stdin).

use sql_script_runner::input::is_stdin;
use std::path::{Path, PathBuf};

/// Check if a path string contains glob pattern characters.
pub fn is_glob_pattern(path: &str) -> bool {
    path.contains('*') || path.contains('?') || path.contains('[')
}

/// Expand a script argument into the scripts to run, in sorted order.
///
/// `-` (stdin) and literal paths expand to themselves. A literal path must
/// exist and a glob pattern must match at least one file.
pub fn expand_scripts(pattern: &Path) -> anyhow::Result<Vec<PathBuf>> {
    if is_stdin(pattern) {
        return Ok(vec![pattern.to_path_buf()]);
    }

    let pattern_str = pattern.to_string_lossy();

    if !is_glob_pattern(&pattern_str) {
        if !pattern.exists() {
            anyhow::bail!("file does not exist: {}", pattern.display());
        }
        return Ok(vec![pattern.to_path_buf()]);
    }

    let mut files = Vec::new();
    for entry in glob::glob(&pattern_str)
        .map_err(|e| anyhow::anyhow!("invalid glob pattern '{}': {}", pattern_str, e))?
    {
        match entry {
            Ok(path) if path.is_file() => files.push(path),
            Ok(_) => {}
            Err(e) => anyhow::bail!("error reading path for pattern '{}': {}", pattern_str, e),
        }
    }

    if files.is_empty() {
        anyhow::bail!("no files match pattern: {}", pattern_str);
    }

    files.sort();
    Ok(files)
}

/// Per-script success/failure tally for multi-script runs.
#[derive(Debug, Default)]
pub struct MultiFileResult {
    pub total_files: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub errors: Vec<(PathBuf, String)>,
}

impl MultiFileResult {
    pub fn new(total_files: usize) -> Self {
        Self {
            total_files,
            ..Default::default()
        }
    }

    pub fn record_success(&mut self) {
        self.succeeded += 1;
    }

    pub fn record_failure(&mut self, path: PathBuf, error: String) {
        self.failed += 1;
        self.errors.push((path, error));
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_is_glob_pattern() {
        assert!(!is_glob_pattern("001_init.sql"));
        assert!(is_glob_pattern("migrations/*.sql"));
        assert!(is_glob_pattern("**/*.sql"));
        assert!(is_glob_pattern("00?_init.sql"));
        assert!(is_glob_pattern("[0-9]*.sql"));
    }

    #[test]
    fn test_expand_stdin() {
        assert_eq!(expand_scripts(Path::new("-")).unwrap(), vec![PathBuf::from("-")]);
    }

    #[test]
    fn test_expand_literal_path() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("init.sql");
        fs::write(&file, "SELECT 1;").unwrap();

        assert_eq!(expand_scripts(&file).unwrap(), vec![file]);

        let missing = expand_scripts(&dir.path().join("missing.sql"));
        assert!(missing.unwrap_err().to_string().contains("does not exist"));
    }

    #[test]
    fn test_expand_glob_sorted() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("002_data.sql"), "SELECT 2;").unwrap();
        fs::write(dir.path().join("001_schema.sql"), "SELECT 1;").unwrap();
        fs::write(dir.path().join("notes.txt"), "not sql").unwrap();

        let files = expand_scripts(&dir.path().join("*.sql")).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|f| f.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["001_schema.sql", "002_data.sql"]);
    }

    #[test]
    fn test_expand_glob_no_matches() {
        let dir = TempDir::new().unwrap();
        let result = expand_scripts(&dir.path().join("*.sql"));
        assert!(result.unwrap_err().to_string().contains("no files match"));
    }

    #[test]
    fn test_multi_file_result() {
        let mut result = MultiFileResult::new(3);
        result.record_success();
        result.record_failure(PathBuf::from("bad.sql"), "COPY data truncated".to_string());

        assert_eq!(result.total_files, 3);
        assert_eq!(result.succeeded, 1);
        assert!(result.has_failures());
        assert_eq!(result.errors.len(), 1);
    }
}
