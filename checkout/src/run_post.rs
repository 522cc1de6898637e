//! Post phase: remove transient checkout artifacts, then optionally reset.
//!
//! Nothing here can fail the job; its status was settled by the main phase.

use std::path::Path;

use tracing::info;

use crate::core::types::CleanupStatus;
use crate::io::job_log::JobLog;
use crate::io::source::SourceProvider;
use crate::io::state_store::{JobState, StateStore};
use crate::io::workspace::WorkspaceCleaner;
use crate::phase::{PhaseContext, best_effort};

/// What the post phase did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PostOutcome {
    /// Removal of injected credentials/config from the checkout.
    pub credentials: CleanupStatus,
    /// Workspace reset, gated by the persisted post-cleanup flag.
    pub workspace: CleanupStatus,
}

/// Execute the post phase.
///
/// Credential cleanup always runs first and is never gated by the
/// post-cleanup flag. Either failure becomes a warning.
pub fn run_post<S, P, C, L>(ctx: &PhaseContext<'_, P, C, L>, state: &JobState<S>) -> PostOutcome
where
    S: StateStore,
    P: SourceProvider,
    C: WorkspaceCleaner,
    L: JobLog,
{
    let repository_path = state.repository_path();
    let credentials = CleanupStatus::from_attempt(best_effort(
        ctx.log,
        "Post-job credential cleanup",
        || ctx.source.cleanup(Path::new(&repository_path)),
    ));

    let workspace = if state.post_cleanup() {
        ctx.log.info("Performing post-job cleanup...");
        CleanupStatus::from_attempt(best_effort(ctx.log, "Post-cleanup", || {
            ctx.cleaner.reset(ctx.workspace, ctx.log).map(drop)
        }))
    } else {
        ctx.log.info("Post-cleanup is disabled, skipping...");
        CleanupStatus::Skipped
    };

    info!(?credentials, ?workspace, "post phase complete");
    PostOutcome {
        credentials,
        workspace,
    }
}
