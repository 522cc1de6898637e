//! Checkout step entry point.
//!
//! Invoked twice per job. The first invocation (main phase) records itself in
//! the job state; the second sees that record and runs the post phase.

use std::fs;
use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::Parser;
use tracing::debug;

use checkout::core::types::Phase;
use checkout::exit_codes;
use checkout::io::config::{CheckoutConfig, load_config};
use checkout::io::inputs::RunSettings;
use checkout::io::job_log::{JobLog, WorkflowCommandLog};
use checkout::io::matcher::{matcher_dir, write_matcher_file};
use checkout::io::source::GitSourceProvider;
use checkout::io::state_store::{ActionsStateStore, FileStateStore, JobState, StateStore};
use checkout::io::workspace::WorkspaceReset;
use checkout::logging;
use checkout::phase::PhaseContext;
use checkout::run_main::{MatcherSpec, run_main};
use checkout::run_post::run_post;

#[derive(Parser)]
#[command(
    name = "checkout",
    version,
    about = "Check out sources with workspace cleanup before and after the job"
)]
struct Cli {
    /// Workspace root subject to cleanup (defaults to the current directory).
    #[arg(long, env = "GITHUB_WORKSPACE")]
    workspace: Option<PathBuf>,

    /// Per-job JSON state file. Without it, the runtime's GITHUB_STATE is used.
    #[arg(long, env = "CHECKOUT_STATE_FILE")]
    state_file: Option<PathBuf>,

    /// TOML config file. Missing means defaults.
    #[arg(long, env = "CHECKOUT_CONFIG")]
    config: Option<PathBuf>,

    /// Force a phase instead of deriving it from the job state.
    #[arg(long, value_enum)]
    phase: Option<Phase>,
}

fn main() {
    logging::init();
    let cli = Cli::parse();
    let log = WorkflowCommandLog::from_env();

    let code = match run(&cli, &log) {
        Ok(()) => exit_codes::OK,
        // The post phase never fails the job.
        Err(err) if cli.phase == Some(Phase::Post) => {
            log.warning(&format!("{err:#}"));
            exit_codes::OK
        }
        Err(err) => {
            log.set_failed(&format!("{err:#}"));
            exit_codes::FAILED
        }
    };
    std::process::exit(code);
}

fn run(cli: &Cli, log: &WorkflowCommandLog) -> Result<()> {
    let workspace = resolve_workspace(cli.workspace.as_deref())?;
    match &cli.state_file {
        Some(path) => {
            let path = absolute(path)?;
            if state_file_inside_workspace(&path, &workspace)? {
                bail!(
                    "state file {} must live outside the workspace {}",
                    path.display(),
                    workspace.display()
                );
            }
            let store = match FileStateStore::open(&path) {
                Ok(store) => store,
                // An existing state file means a main phase already ran.
                Err(err) if cli.phase != Some(Phase::Main) && path.exists() => {
                    log.warning(&format!("Skipping post-job cleanup: {err:#}"));
                    return Ok(());
                }
                Err(err) => return Err(err),
            };
            execute(cli, &workspace, JobState::new(store), log)
        }
        None => execute(cli, &workspace, JobState::new(ActionsStateStore::from_env()?), log),
    }
}

fn execute<S: StateStore>(
    cli: &Cli,
    workspace: &Path,
    mut state: JobState<S>,
    log: &WorkflowCommandLog,
) -> Result<()> {
    let phase = cli.phase.unwrap_or(if state.is_post_phase() {
        Phase::Post
    } else {
        Phase::Main
    });
    debug!(?phase, workspace = %workspace.display(), "dispatching");

    match phase {
        Phase::Main => {
            state.mark_main_phase().context("persist phase marker")?;
            let config = load_optional_config(cli.config.as_deref())?;
            let settings = RunSettings::from_env(workspace)?;
            let matcher = MatcherSpec {
                file: write_matcher_file(&matcher_dir(), &config.matcher_owner)?,
                owner: config.matcher_owner.clone(),
            };
            let source = GitSourceProvider::new(config.fetch_depth);
            let cleaner = WorkspaceReset::new(config.reset_strategy);
            let ctx = PhaseContext {
                workspace,
                source: &source,
                cleaner: &cleaner,
                log,
            };
            run_main(&ctx, &mut state, &settings, &matcher)?;
        }
        Phase::Post => {
            let config = load_optional_config(cli.config.as_deref()).unwrap_or_else(|err| {
                log.warning(&format!("Using default config: {err:#}"));
                CheckoutConfig::default()
            });
            let source = GitSourceProvider::new(config.fetch_depth);
            let cleaner = WorkspaceReset::new(config.reset_strategy);
            let ctx = PhaseContext {
                workspace,
                source: &source,
                cleaner: &cleaner,
                log,
            };
            run_post(&ctx, &state);
        }
    }
    Ok(())
}

fn load_optional_config(path: Option<&Path>) -> Result<CheckoutConfig> {
    match path {
        Some(path) => load_config(path),
        None => Ok(CheckoutConfig::default()),
    }
}

fn resolve_workspace(flag: Option<&Path>) -> Result<PathBuf> {
    match flag {
        Some(path) => absolute(path),
        None => std::env::current_dir().context("resolve current directory"),
    }
}

/// Compare with symlinks and `..` resolved; either path may not exist yet.
fn state_file_inside_workspace(state_file: &Path, workspace: &Path) -> Result<bool> {
    Ok(resolve(state_file)?.starts_with(resolve(workspace)?))
}

/// Canonicalize the longest existing prefix of `path` and re-attach the rest.
fn resolve(path: &Path) -> Result<PathBuf> {
    let mut cleaned = PathBuf::new();
    for component in absolute(path)?.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                cleaned.pop();
            }
            other => cleaned.push(other),
        }
    }

    let mut existing = cleaned.as_path();
    let mut tail = Vec::new();
    loop {
        if let Ok(resolved) = fs::canonicalize(existing) {
            return Ok(tail.iter().rev().fold(resolved, |acc, name| acc.join(name)));
        }
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                tail.push(name.to_os_string());
                existing = parent;
            }
            _ => return Ok(cleaned),
        }
    }
}

fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    Ok(std::env::current_dir()
        .context("resolve current directory")?
        .join(path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_defaults() {
        let cli = Cli::parse_from(["checkout", "--workspace", "/work"]);
        assert_eq!(cli.workspace, Some(PathBuf::from("/work")));
        assert!(cli.phase.is_none());
    }

    #[test]
    fn parse_forced_post_phase() {
        let cli = Cli::parse_from(["checkout", "--phase", "post"]);
        assert_eq!(cli.phase, Some(Phase::Post));
    }

    #[test]
    fn state_file_behind_parent_dir_is_inside_workspace() {
        let temp = tempfile::tempdir().expect("tempdir");
        let ws = temp.path().join("ws");
        fs::create_dir(&ws).expect("mkdir");

        let sneaky = ws.join("..").join("ws").join("s.json");
        assert!(state_file_inside_workspace(&sneaky, &ws).expect("check"));
        let nested = ws.join("not-yet").join("..").join("s.json");
        assert!(state_file_inside_workspace(&nested, &ws).expect("check"));
        let outside = temp.path().join("state").join("s.json");
        assert!(!state_file_inside_workspace(&outside, &ws).expect("check"));
    }

    #[cfg(unix)]
    #[test]
    fn symlinked_workspace_is_resolved_before_comparing() {
        let temp = tempfile::tempdir().expect("tempdir");
        let ws = temp.path().join("ws");
        fs::create_dir(&ws).expect("mkdir");
        let link = temp.path().join("link");
        std::os::unix::fs::symlink(&ws, &link).expect("symlink");

        assert!(state_file_inside_workspace(&link.join("s.json"), &ws).expect("check"));
        assert!(state_file_inside_workspace(&ws.join("s.json"), &link).expect("check"));
        assert!(
            !state_file_inside_workspace(&temp.path().join("s.json"), &link).expect("check")
        );
    }

    #[test]
    fn relative_paths_resolve_against_current_dir() {
        let resolved = absolute(Path::new("state.json")).expect("absolute");
        assert!(resolved.is_absolute());
        assert!(resolved.ends_with("state.json"));
    }
}
