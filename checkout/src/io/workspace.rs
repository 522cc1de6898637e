//! Workspace inventory, removal, and reset.
//!
//! Reset is best-effort and observable: every top-level entry is removed on
//! its own, a failure is reported and skipped, and the root is listed before
//! and after so a partial cleanup can be diagnosed from the job log alone.

use std::collections::BTreeSet;
use std::ffi::OsStr;
use std::fs::{self, ReadDir};
use std::io::ErrorKind;
use std::path::Path;
use std::process::Command;

use anyhow::{Context, Result, bail};
use tracing::{debug, instrument, warn};

use crate::core::types::{EntryKind, RemovalOutcome, ResetReport, ResetStrategy, WorkspaceEntry};
use crate::io::job_log::JobLog;

const LEGACY_RESET_SCRIPT: &str = "rm -rf ./* || true; rm -rf ./.??* || true";

/// Lazy, single-pass listing of a directory's top-level entries.
///
/// Never yields the `.`/`..` pseudo-entries.
#[derive(Debug)]
pub struct Inventory {
    inner: Option<ReadDir>,
}

impl Inventory {
    fn empty() -> Self {
        Self { inner: None }
    }
}

impl Iterator for Inventory {
    type Item = WorkspaceEntry;

    fn next(&mut self) -> Option<WorkspaceEntry> {
        let read_dir = self.inner.as_mut()?;
        loop {
            match read_dir.next()? {
                Ok(entry) => {
                    let file_name = entry.file_name();
                    if file_name == "." || file_name == ".." {
                        continue;
                    }
                    let kind = match entry.file_type() {
                        Ok(ft) if ft.is_dir() => EntryKind::Directory,
                        Ok(ft) if ft.is_file() => EntryKind::File,
                        Ok(_) => EntryKind::Other,
                        Err(err) => {
                            warn!(name = ?file_name, err = %err, "could not stat workspace entry");
                            EntryKind::Other
                        }
                    };
                    return Some(WorkspaceEntry::new(file_name, kind));
                }
                Err(err) => {
                    warn!(err = %err, "skipping unreadable workspace entry");
                }
            }
        }
    }
}

/// List the top-level entries of `path`.
///
/// Listing is diagnostic only: if the directory cannot be read a warning is
/// logged and an empty inventory is returned.
pub fn list_entries<L: JobLog>(path: &Path, log: &L) -> Inventory {
    match fs::read_dir(path) {
        Ok(read_dir) => Inventory {
            inner: Some(read_dir),
        },
        Err(err) => {
            log.warning(&format!("Unable to list {}: {err}", path.display()));
            Inventory::empty()
        }
    }
}

/// Deletes a single filesystem entry.
pub trait Remover {
    /// Remove `path` (file, symlink, or directory tree). An absent path counts
    /// as removed.
    fn remove(&self, path: &Path) -> RemovalOutcome;
}

/// Removes entries from the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsRemover;

impl Remover for FsRemover {
    fn remove(&self, path: &Path) -> RemovalOutcome {
        let meta = match fs::symlink_metadata(path) {
            Ok(meta) => meta,
            Err(err) if err.kind() == ErrorKind::NotFound => return RemovalOutcome::Removed,
            Err(err) => return RemovalOutcome::Failed(err.to_string()),
        };
        let result = if meta.is_dir() {
            fs::remove_dir_all(path)
        } else {
            fs::remove_file(path)
        };
        match result {
            Ok(()) => RemovalOutcome::Removed,
            Err(err) if err.kind() == ErrorKind::NotFound => RemovalOutcome::Removed,
            Err(err) => RemovalOutcome::Failed(err.to_string()),
        }
    }
}

/// Empties a workspace root.
pub trait WorkspaceCleaner {
    /// Reset `root`. Per-entry failures are logged as warnings and reported in
    /// the returned [`ResetReport`]; `Err` means the reset could not run at all.
    fn reset<L: JobLog>(&self, root: &Path, log: &L) -> Result<ResetReport>;
}

/// Default [`WorkspaceCleaner`].
#[derive(Debug, Clone, Default)]
pub struct WorkspaceReset<R = FsRemover> {
    strategy: ResetStrategy,
    remover: R,
}

impl WorkspaceReset<FsRemover> {
    pub fn new(strategy: ResetStrategy) -> Self {
        Self {
            strategy,
            remover: FsRemover,
        }
    }
}

impl<R: Remover> WorkspaceReset<R> {
    pub fn with_remover(strategy: ResetStrategy, remover: R) -> Self {
        Self { strategy, remover }
    }

    fn reset_enumerate<L: JobLog>(&self, root: &Path, log: &L) -> Result<ResetReport> {
        let before = log_inventory(root, log, "Files before cleanup:");

        let mut report = ResetReport::default();
        let mut failed: BTreeSet<&OsStr> = BTreeSet::new();
        for entry in &before {
            match self.remover.remove(&root.join(&entry.file_name)) {
                RemovalOutcome::Removed => {
                    log.info(&format!("Removed {}", entry.name));
                    report.removed.push(entry.name.clone());
                }
                RemovalOutcome::Failed(reason) => {
                    log.warning(&format!("Failed to remove {}: {reason}", entry.name));
                    failed.insert(entry.file_name.as_os_str());
                    report.failed.push((entry.name.clone(), reason));
                }
            }
        }

        let after = log_inventory(root, log, "Files after cleanup:");
        for entry in &after {
            if !failed.contains(entry.file_name.as_os_str()) {
                log.warning(&format!("Entry still present after cleanup: {}", entry.name));
            }
        }
        report.remaining = after.into_iter().map(|entry| entry.name).collect();
        Ok(report)
    }

    fn reset_shell<L: JobLog>(&self, root: &Path, log: &L) -> Result<ResetReport> {
        if !cfg!(unix) {
            bail!("shell reset strategy requires a Unix shell");
        }
        let before = log_inventory(root, log, "Files before cleanup:");

        let output = Command::new("sh")
            .args(["-c", LEGACY_RESET_SCRIPT])
            .current_dir(root)
            .output()
            .context("spawn sh for workspace reset")?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            log.warning(&format!(
                "Workspace reset command exited with {}: {}",
                output.status,
                stderr.trim()
            ));
        }

        let after = log_inventory(root, log, "Files after cleanup:");
        for entry in &after {
            log.warning(&format!("Entry still present after cleanup: {}", entry.name));
        }
        let remaining: BTreeSet<&OsStr> =
            after.iter().map(|entry| entry.file_name.as_os_str()).collect();
        Ok(ResetReport {
            removed: before
                .iter()
                .filter(|entry| !remaining.contains(entry.file_name.as_os_str()))
                .map(|entry| entry.name.clone())
                .collect(),
            failed: Vec::new(),
            remaining: after.into_iter().map(|entry| entry.name).collect(),
        })
    }
}

impl<R: Remover> WorkspaceCleaner for WorkspaceReset<R> {
    #[instrument(skip_all, fields(root = %root.display(), strategy = ?self.strategy))]
    fn reset<L: JobLog>(&self, root: &Path, log: &L) -> Result<ResetReport> {
        let meta = fs::metadata(root)
            .with_context(|| format!("workspace root {}", root.display()))?;
        if !meta.is_dir() {
            bail!("workspace root {} is not a directory", root.display());
        }
        let report = match self.strategy {
            ResetStrategy::Enumerate => self.reset_enumerate(root, log)?,
            ResetStrategy::Shell => self.reset_shell(root, log)?,
        };
        debug!(
            removed = report.removed.len(),
            failed = report.failed.len(),
            remaining = report.remaining.len(),
            "workspace reset finished"
        );
        Ok(report)
    }
}

/// Log `heading` followed by the sorted inventory of `root` (or `(empty)`).
fn log_inventory<L: JobLog>(root: &Path, log: &L, heading: &str) -> Vec<WorkspaceEntry> {
    let mut entries: Vec<WorkspaceEntry> = list_entries(root, log).collect();
    entries.sort_by(|a, b| a.file_name.cmp(&b.file_name));
    log.info(heading);
    if entries.is_empty() {
        log.info("(empty)");
    }
    for entry in &entries {
        log.info(&entry.to_string());
    }
    entries
}
