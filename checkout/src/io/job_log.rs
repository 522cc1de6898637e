//! Job log adapter for the hosting runtime.
//!
//! Product output (what operators read in the job log) goes through
//! [`JobLog`]. Developer diagnostics use `tracing` instead; see `logging`.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use tracing::debug;

/// Logging and annotation surface exposed by the hosting runtime.
pub trait JobLog {
    fn info(&self, message: &str);
    fn warning(&self, message: &str);
    /// Mark the step failed with `message`. The caller chooses the exit code.
    fn set_failed(&self, message: &str);
    fn set_output(&self, name: &str, value: &str) -> Result<()>;
    /// Register a problem matcher file for the rest of the step.
    fn add_matcher(&self, path: &Path);
    fn remove_matcher(&self, owner: &str);
}

/// Writes workflow commands to stdout.
#[derive(Debug, Clone, Default)]
pub struct WorkflowCommandLog {
    output_file: Option<PathBuf>,
}

impl WorkflowCommandLog {
    pub fn new(output_file: Option<PathBuf>) -> Self {
        Self { output_file }
    }

    /// Build from `GITHUB_OUTPUT`, falling back to inline `set-output` commands.
    pub fn from_env() -> Self {
        Self::new(std::env::var_os("GITHUB_OUTPUT").map(PathBuf::from))
    }

    fn emit(&self, line: &str) {
        println!("{line}");
    }
}

impl JobLog for WorkflowCommandLog {
    fn info(&self, message: &str) {
        self.emit(message);
    }

    fn warning(&self, message: &str) {
        self.emit(&format!("::warning::{}", escape_data(message)));
    }

    fn set_failed(&self, message: &str) {
        self.emit(&format!("::error::{}", escape_data(message)));
    }

    fn set_output(&self, name: &str, value: &str) -> Result<()> {
        let Some(path) = &self.output_file else {
            self.emit(&format!(
                "::set-output name={}::{}",
                escape_property(name),
                escape_data(value)
            ));
            return Ok(());
        };
        if value.contains('\n') || name.contains('=') {
            bail!("output {name} cannot be written as a single line");
        }
        debug!(path = %path.display(), name, "appending step output");
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("open output file {}", path.display()))?;
        writeln!(file, "{name}={value}")
            .with_context(|| format!("write output file {}", path.display()))?;
        Ok(())
    }

    fn add_matcher(&self, path: &Path) {
        self.emit(&format!("::add-matcher::{}", escape_data(&path.to_string_lossy())));
    }

    fn remove_matcher(&self, owner: &str) {
        self.emit(&format!("::remove-matcher owner={}::", escape_property(owner)));
    }
}

/// Escape a workflow command message.
pub fn escape_data(value: &str) -> String {
    value
        .replace('%', "%25")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}

/// Escape a workflow command property value.
pub fn escape_property(value: &str) -> String {
    escape_data(value).replace(':', "%3A").replace(',', "%2C")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_multiline_messages() {
        assert_eq!(escape_data("50% done\nnext"), "50%25 done%0Anext");
        assert_eq!(escape_property("a:b,c"), "a%3Ab%2Cc");
    }

    #[test]
    fn set_output_appends_to_output_file() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("output");
        let log = WorkflowCommandLog::new(Some(path.clone()));
        log.set_output("ref", "refs/heads/main").expect("set ref");
        log.set_output("commit", "abc123").expect("set commit");

        let contents = std::fs::read_to_string(&path).expect("read");
        assert_eq!(contents, "ref=refs/heads/main\ncommit=abc123\n");
    }

    #[test]
    fn set_output_rejects_multiline_values_in_file_mode() {
        let temp = tempfile::tempdir().expect("tempdir");
        let log = WorkflowCommandLog::new(Some(temp.path().join("output")));
        assert!(log.set_output("ref", "a\nb").is_err());
    }
}
