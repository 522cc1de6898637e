//! Main phase: persist intent, optionally reset the workspace, check out.
//!
//! ```text
//! Init ──► [PreCleanup] ──► Checkout ──► Done
//!   └────────────────────────────┴─────► Failed
//! ```
//!
//! A pre-cleanup failure is a warning and never reaches `Failed`.

use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::core::types::CleanupStatus;
use crate::io::inputs::RunSettings;
use crate::io::job_log::JobLog;
use crate::io::matcher::MatcherScope;
use crate::io::source::SourceProvider;
use crate::io::state_store::{JobState, StateStore};
use crate::io::workspace::WorkspaceCleaner;
use crate::phase::{PhaseContext, best_effort};

/// Problem matcher registered for the duration of checkout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatcherSpec {
    pub file: PathBuf,
    pub owner: String,
}

/// Result of a successful main phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    /// Ref reported by the source provider and published as output `ref`.
    pub git_ref: String,
    pub pre_cleanup: CleanupStatus,
}

/// Execute the main phase.
///
/// The post-cleanup flag and repository path are persisted before anything
/// else, whether or not pre-cleanup runs.
pub fn run_main<S, P, C, L>(
    ctx: &PhaseContext<'_, P, C, L>,
    state: &mut JobState<S>,
    settings: &RunSettings,
    matcher: &MatcherSpec,
) -> Result<RunOutcome>
where
    S: StateStore,
    P: SourceProvider,
    C: WorkspaceCleaner,
    L: JobLog,
{
    state
        .set_post_cleanup(settings.post_cleanup)
        .context("persist post-cleanup flag")?;
    state
        .set_repository_path(&settings.repository_path)
        .context("persist repository path")?;
    debug!(
        pre_cleanup = settings.pre_cleanup,
        post_cleanup = settings.post_cleanup,
        "main phase state persisted"
    );

    let pre_cleanup = if settings.pre_cleanup {
        ctx.log.info("Performing pre-checkout cleanup...");
        CleanupStatus::from_attempt(best_effort(ctx.log, "Pre-cleanup", || {
            ctx.cleaner.reset(ctx.workspace, ctx.log).map(drop)
        }))
    } else {
        CleanupStatus::Skipped
    };

    let git_ref = checkout(ctx, settings, matcher)?;
    info!(git_ref = %git_ref, ?pre_cleanup, "main phase complete");
    Ok(RunOutcome {
        git_ref,
        pre_cleanup,
    })
}

fn checkout<P, C, L>(
    ctx: &PhaseContext<'_, P, C, L>,
    settings: &RunSettings,
    matcher: &MatcherSpec,
) -> Result<String>
where
    P: SourceProvider,
    L: JobLog,
{
    let _matcher = MatcherScope::register(ctx.log, &matcher.file, matcher.owner.as_str());
    let git_ref = ctx.source.get_source(settings)?;
    ctx.log.set_output("ref", &git_ref)?;
    Ok(git_ref)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::path::Path;

    use super::*;
    use crate::core::types::ResetStrategy;
    use crate::io::state_store::ActionsStateStore;
    use crate::io::workspace::WorkspaceReset;
    use crate::test_support::{FailingCleaner, LogEvent, RecordingLog, Sandbox, ScriptedSource};

    fn settings(sandbox: &Sandbox, pre_cleanup: bool, post_cleanup: bool) -> RunSettings {
        RunSettings {
            pre_cleanup,
            post_cleanup,
            git_ref: "refs/heads/main".to_string(),
            repository: "https://github.com/octo/widgets".to_string(),
            repository_path: sandbox.workspace().to_path_buf(),
        }
    }

    fn matcher() -> MatcherSpec {
        MatcherSpec {
            file: PathBuf::from("/tmp/checkout-problem-matcher.json"),
            owner: "checkout-git".to_string(),
        }
    }

    fn actions_state(sandbox: &Sandbox) -> JobState<ActionsStateStore> {
        JobState::new(ActionsStateStore::new(
            sandbox.scratch().join("state.env"),
            HashMap::new(),
        ))
    }

    #[test]
    fn pre_cleanup_failure_still_checks_out_once() {
        let sandbox = Sandbox::new().expect("sandbox");
        let source = ScriptedSource::succeeding();
        let cleaner = FailingCleaner::new("workspace busy");
        let log = RecordingLog::default();
        let ctx = PhaseContext {
            workspace: sandbox.workspace(),
            source: &source,
            cleaner: &cleaner,
            log: &log,
        };
        let mut state = actions_state(&sandbox);

        let outcome =
            run_main(&ctx, &mut state, &settings(&sandbox, true, false), &matcher()).expect("run");

        assert_eq!(outcome.pre_cleanup, CleanupStatus::Failed);
        assert_eq!(cleaner.calls(), 1);
        assert_eq!(source.get_source_calls(), 1);
        assert_eq!(log.warnings(), vec!["Pre-cleanup failed: workspace busy"]);
        assert_eq!(log.outputs(), vec![("ref".to_string(), "refs/heads/main".to_string())]);
    }

    #[test]
    fn post_cleanup_flag_is_persisted_without_pre_cleanup() {
        let sandbox = Sandbox::new().expect("sandbox");
        let source = ScriptedSource::succeeding();
        let cleaner = FailingCleaner::new("must not run");
        let log = RecordingLog::default();
        let ctx = PhaseContext {
            workspace: sandbox.workspace(),
            source: &source,
            cleaner: &cleaner,
            log: &log,
        };
        let mut state = actions_state(&sandbox);

        let outcome =
            run_main(&ctx, &mut state, &settings(&sandbox, false, true), &matcher()).expect("run");

        assert_eq!(outcome.pre_cleanup, CleanupStatus::Skipped);
        assert_eq!(cleaner.calls(), 0);
        assert!(state.post_cleanup());
        assert_eq!(
            state.repository_path(),
            sandbox.workspace().to_string_lossy()
        );
    }

    #[test]
    fn checkout_failure_unregisters_matcher_then_propagates() {
        let sandbox = Sandbox::new().expect("sandbox");
        let source = ScriptedSource::failing("fatal: repository not found");
        let cleaner = WorkspaceReset::new(ResetStrategy::Enumerate);
        let log = RecordingLog::default();
        let ctx = PhaseContext {
            workspace: sandbox.workspace(),
            source: &source,
            cleaner: &cleaner,
            log: &log,
        };
        let mut state = actions_state(&sandbox);

        let err = run_main(&ctx, &mut state, &settings(&sandbox, false, false), &matcher())
            .unwrap_err();

        assert!(format!("{err:#}").contains("repository not found"));
        assert_eq!(
            log.events(),
            vec![
                LogEvent::AddMatcher(PathBuf::from("/tmp/checkout-problem-matcher.json")),
                LogEvent::RemoveMatcher("checkout-git".to_string()),
            ]
        );
        // Intent is persisted even when checkout fails.
        assert!(!state.post_cleanup());
        assert!(Path::new(&state.repository_path()).is_absolute());
    }

    #[test]
    fn pre_cleanup_empties_workspace_before_checkout() {
        let sandbox = Sandbox::new().expect("sandbox");
        sandbox.mkdir("old-build/obj").expect("mkdir");
        sandbox.touch(".cache").expect("touch");
        let source = ScriptedSource::succeeding().with_file("README.md", "hello\n");
        let cleaner = WorkspaceReset::new(ResetStrategy::Enumerate);
        let log = RecordingLog::default();
        let ctx = PhaseContext {
            workspace: sandbox.workspace(),
            source: &source,
            cleaner: &cleaner,
            log: &log,
        };
        let mut state = actions_state(&sandbox);

        let outcome =
            run_main(&ctx, &mut state, &settings(&sandbox, true, true), &matcher()).expect("run");

        assert_eq!(outcome.pre_cleanup, CleanupStatus::Succeeded);
        assert_eq!(sandbox.entries(), vec!["README.md"]);
        assert!(log.warnings().is_empty());
    }
}
