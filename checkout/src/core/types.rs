//! Shared types for workspace inventory and removal.
//!
//! Values here are ephemeral: produced per listing or per removal and never
//! persisted across phases.

use std::ffi::OsString;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Kind of a top-level workspace entry.
///
/// Symlinks are reported as `Other` and never followed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
    Other,
}

impl EntryKind {
    /// Short label used when logging an inventory line (`[dir] name`).
    pub fn label(self) -> &'static str {
        match self {
            EntryKind::File => "file",
            EntryKind::Directory => "dir",
            EntryKind::Other => "other",
        }
    }
}

/// A single top-level entry of the workspace root.
///
/// `file_name` is the name as stored on disk and is what removal uses;
/// `name` is its lossy rendering for logs and reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceEntry {
    pub file_name: OsString,
    pub name: String,
    pub kind: EntryKind,
}

impl WorkspaceEntry {
    pub fn new(file_name: impl Into<OsString>, kind: EntryKind) -> Self {
        let file_name = file_name.into();
        let name = file_name.to_string_lossy().into_owned();
        Self {
            file_name,
            name,
            kind,
        }
    }
}

impl fmt::Display for WorkspaceEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind.label(), self.name)
    }
}

/// Result of removing one entry. Never fatal; only logged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemovalOutcome {
    Removed,
    Failed(String),
}

/// Which invocation of the step is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Checkout invocation.
    Main,
    /// End-of-job cleanup invocation.
    Post,
}

/// How the workspace root is emptied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResetStrategy {
    /// List the root and remove each entry on its own, isolating failures.
    #[default]
    Enumerate,
    /// Legacy single `sh -c 'rm -rf ...'` invocation (Unix only).
    Shell,
}

/// Summary of one workspace reset.
///
/// Lists are recorded in name order to keep logs and assertions stable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResetReport {
    /// Entries that were removed.
    pub removed: Vec<String>,
    /// Entries whose removal failed, with the reason.
    pub failed: Vec<(String, String)>,
    /// Entries still present after the reset.
    pub remaining: Vec<String>,
}

impl ResetReport {
    /// True if the root was left empty.
    pub fn is_clean(&self) -> bool {
        self.remaining.is_empty()
    }
}

/// What happened to one hygiene operation of a phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanupStatus {
    /// Not requested for this run.
    Skipped,
    Succeeded,
    /// Failed and was downgraded to a warning.
    Failed,
}

impl CleanupStatus {
    pub fn from_attempt(succeeded: bool) -> Self {
        if succeeded {
            CleanupStatus::Succeeded
        } else {
            CleanupStatus::Failed
        }
    }
}
