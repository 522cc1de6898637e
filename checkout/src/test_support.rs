//! Test-only collaborators and filesystem fixtures.

use std::cell::{Cell, RefCell};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use tempfile::TempDir;

use crate::core::types::{RemovalOutcome, ResetReport};
use crate::io::inputs::RunSettings;
use crate::io::job_log::JobLog;
use crate::io::source::SourceProvider;
use crate::io::workspace::{FsRemover, Remover, WorkspaceCleaner};

/// One call made against a [`RecordingLog`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogEvent {
    Info(String),
    Warning(String),
    Failed(String),
    Output { name: String, value: String },
    AddMatcher(PathBuf),
    RemoveMatcher(String),
}

/// [`JobLog`] that records every call in order.
#[derive(Debug, Default)]
pub struct RecordingLog {
    events: RefCell<Vec<LogEvent>>,
}

impl RecordingLog {
    pub fn events(&self) -> Vec<LogEvent> {
        self.events.borrow().clone()
    }

    pub fn infos(&self) -> Vec<String> {
        self.events
            .borrow()
            .iter()
            .filter_map(|event| match event {
                LogEvent::Info(msg) => Some(msg.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn warnings(&self) -> Vec<String> {
        self.events
            .borrow()
            .iter()
            .filter_map(|event| match event {
                LogEvent::Warning(msg) => Some(msg.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn outputs(&self) -> Vec<(String, String)> {
        self.events
            .borrow()
            .iter()
            .filter_map(|event| match event {
                LogEvent::Output { name, value } => Some((name.clone(), value.clone())),
                _ => None,
            })
            .collect()
    }

    fn push(&self, event: LogEvent) {
        self.events.borrow_mut().push(event);
    }
}

impl JobLog for RecordingLog {
    fn info(&self, message: &str) {
        self.push(LogEvent::Info(message.to_string()));
    }

    fn warning(&self, message: &str) {
        self.push(LogEvent::Warning(message.to_string()));
    }

    fn set_failed(&self, message: &str) {
        self.push(LogEvent::Failed(message.to_string()));
    }

    fn set_output(&self, name: &str, value: &str) -> Result<()> {
        self.push(LogEvent::Output {
            name: name.to_string(),
            value: value.to_string(),
        });
        Ok(())
    }

    fn add_matcher(&self, path: &Path) {
        self.push(LogEvent::AddMatcher(path.to_path_buf()));
    }

    fn remove_matcher(&self, owner: &str) {
        self.push(LogEvent::RemoveMatcher(owner.to_string()));
    }
}

/// [`SourceProvider`] with scripted results that records its calls.
#[derive(Debug)]
pub struct ScriptedSource {
    get_source_error: Option<String>,
    cleanup_error: Option<String>,
    files: Vec<(String, String)>,
    get_source_calls: Cell<usize>,
    cleanup_calls: RefCell<Vec<PathBuf>>,
}

impl ScriptedSource {
    /// Checkout succeeds and reports `settings.git_ref`.
    pub fn succeeding() -> Self {
        Self {
            get_source_error: None,
            cleanup_error: None,
            files: Vec::new(),
            get_source_calls: Cell::new(0),
            cleanup_calls: RefCell::new(Vec::new()),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            get_source_error: Some(message.to_string()),
            ..Self::succeeding()
        }
    }

    /// Write `name` into the repository path on checkout.
    pub fn with_file(mut self, name: &str, contents: &str) -> Self {
        self.files.push((name.to_string(), contents.to_string()));
        self
    }

    pub fn with_cleanup_error(mut self, message: &str) -> Self {
        self.cleanup_error = Some(message.to_string());
        self
    }

    pub fn get_source_calls(&self) -> usize {
        self.get_source_calls.get()
    }

    pub fn cleanup_calls(&self) -> Vec<PathBuf> {
        self.cleanup_calls.borrow().clone()
    }
}

impl SourceProvider for ScriptedSource {
    fn get_source(&self, settings: &RunSettings) -> Result<String> {
        self.get_source_calls.set(self.get_source_calls.get() + 1);
        if let Some(message) = &self.get_source_error {
            return Err(anyhow!("{message}"));
        }
        for (name, contents) in &self.files {
            let path = settings.repository_path.join(name);
            fs::write(&path, contents).with_context(|| format!("write {}", path.display()))?;
        }
        Ok(settings.git_ref.clone())
    }

    fn cleanup(&self, repository_path: &Path) -> Result<()> {
        self.cleanup_calls
            .borrow_mut()
            .push(repository_path.to_path_buf());
        match &self.cleanup_error {
            Some(message) => Err(anyhow!("{message}")),
            None => Ok(()),
        }
    }
}

/// [`WorkspaceCleaner`] whose reset always errors.
#[derive(Debug)]
pub struct FailingCleaner {
    message: String,
    calls: Cell<usize>,
}

impl FailingCleaner {
    pub fn new(message: &str) -> Self {
        Self {
            message: message.to_string(),
            calls: Cell::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.get()
    }
}

impl WorkspaceCleaner for FailingCleaner {
    fn reset<L: JobLog>(&self, _root: &Path, _log: &L) -> Result<ResetReport> {
        self.calls.set(self.calls.get() + 1);
        Err(anyhow!("{}", self.message))
    }
}

/// [`Remover`] that simulates a permission error for the named entries and
/// removes everything else from disk.
#[derive(Debug, Clone)]
pub struct DenyListRemover {
    denied: BTreeSet<String>,
}

impl DenyListRemover {
    pub fn new<I, N>(names: I) -> Self
    where
        I: IntoIterator<Item = N>,
        N: Into<String>,
    {
        Self {
            denied: names.into_iter().map(Into::into).collect(),
        }
    }
}

impl Remover for DenyListRemover {
    fn remove(&self, path: &Path) -> RemovalOutcome {
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        if self.denied.contains(&name) {
            return RemovalOutcome::Failed("Permission denied (os error 13)".to_string());
        }
        FsRemover.remove(path)
    }
}

/// Temporary workspace root plus a scratch area outside it (state files,
/// matcher files).
#[derive(Debug)]
pub struct Sandbox {
    _temp: TempDir,
    workspace: PathBuf,
    scratch: PathBuf,
}

impl Sandbox {
    pub fn new() -> Result<Self> {
        let temp = tempfile::tempdir().context("create tempdir")?;
        let workspace = temp.path().join("workspace");
        let scratch = temp.path().join("scratch");
        fs::create_dir_all(&workspace).context("create workspace")?;
        fs::create_dir_all(&scratch).context("create scratch")?;
        Ok(Self {
            _temp: temp,
            workspace,
            scratch,
        })
    }

    pub fn workspace(&self) -> &Path {
        &self.workspace
    }

    pub fn scratch(&self) -> &Path {
        &self.scratch
    }

    /// Per-job state file in the scratch area.
    pub fn state_file(&self) -> PathBuf {
        self.scratch.join("state").join("job.json")
    }

    /// Create an empty file (and parents) relative to the workspace.
    pub fn touch(&self, rel: &str) -> Result<()> {
        let path = self.workspace.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
        }
        fs::write(&path, "").with_context(|| format!("write {}", path.display()))
    }

    pub fn mkdir(&self, rel: &str) -> Result<()> {
        let path = self.workspace.join(rel);
        fs::create_dir_all(&path).with_context(|| format!("create {}", path.display()))
    }

    /// Sorted top-level entry names of the workspace.
    pub fn entries(&self) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(&self.workspace)
            .map(|read_dir| {
                read_dir
                    .filter_map(|entry| entry.ok())
                    .map(|entry| entry.file_name().to_string_lossy().into_owned())
                    .collect()
            })
            .unwrap_or_default();
        names.sort();
        names
    }
}
