//! Shared plumbing for the main and post phase orchestrators.

use std::path::Path;

use anyhow::Result;
use tracing::warn;

use crate::io::job_log::JobLog;

/// Collaborators both phases run against.
pub struct PhaseContext<'a, P, C, L> {
    /// Workspace root subject to reset.
    pub workspace: &'a Path,
    pub source: &'a P,
    pub cleaner: &'a C,
    pub log: &'a L,
}

/// Run a hygiene operation, downgrading any error to a job-log warning.
///
/// Returns `true` if `op` succeeded. Only hygiene work goes through here;
/// checkout errors propagate.
pub fn best_effort<L, F>(log: &L, label: &str, op: F) -> bool
where
    L: JobLog,
    F: FnOnce() -> Result<()>,
{
    match op() {
        Ok(()) => true,
        Err(err) => {
            warn!(label, err = %format!("{err:#}"), "hygiene step failed");
            log.warning(&format!("{label} failed: {err:#}"));
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::RecordingLog;

    #[test]
    fn errors_become_warnings() {
        let log = RecordingLog::default();
        let ok = best_effort(&log, "Pre-cleanup", || anyhow::bail!("device busy"));
        assert!(!ok);
        assert_eq!(log.warnings(), vec!["Pre-cleanup failed: device busy"]);
    }

    #[test]
    fn success_is_silent() {
        let log = RecordingLog::default();
        assert!(best_effort(&log, "Pre-cleanup", || Ok(())));
        assert!(log.events().is_empty());
    }
}
