//! Source retrieval collaborator.
//!
//! The phase orchestrators only await these calls; how the tree is
//! materialized is up to the provider.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::{debug, info, instrument};

use crate::io::git::Git;
use crate::io::inputs::RunSettings;

/// Local config keys that may carry injected credentials.
const EXTRAHEADER_PATTERN: &str = r"^http\..*extraheader$";

pub trait SourceProvider {
    /// Materialize the repository at `settings.repository_path` and return the
    /// ref that was checked out.
    fn get_source(&self, settings: &RunSettings) -> Result<String>;

    /// Remove transient artifacts (injected auth headers) from a checkout.
    fn cleanup(&self, repository_path: &Path) -> Result<()>;
}

/// Retrieves sources with the `git` CLI.
#[derive(Debug, Clone)]
pub struct GitSourceProvider {
    fetch_depth: u32,
}

impl GitSourceProvider {
    pub fn new(fetch_depth: u32) -> Self {
        Self { fetch_depth }
    }
}

impl SourceProvider for GitSourceProvider {
    #[instrument(skip_all, fields(repository = %settings.repository, git_ref = %settings.git_ref))]
    fn get_source(&self, settings: &RunSettings) -> Result<String> {
        let path = &settings.repository_path;
        fs::create_dir_all(path).with_context(|| format!("create {}", path.display()))?;

        let git = Git::new(path);
        if !git.is_repository() {
            debug!(path = %path.display(), "initializing repository");
            git.init()?;
        }
        git.set_origin(&settings.repository)?;
        git.fetch(&settings.git_ref, self.fetch_depth)
            .with_context(|| format!("fetch {} from {}", settings.git_ref, settings.repository))?;
        git.checkout_fetch_head()
            .with_context(|| format!("checkout {}", settings.git_ref))?;

        let sha = git.head_sha()?;
        info!(commit = %sha, "checked out");
        Ok(settings.git_ref.clone())
    }

    #[instrument(skip_all, fields(path = %repository_path.display()))]
    fn cleanup(&self, repository_path: &Path) -> Result<()> {
        let git = Git::new(repository_path);
        if repository_path.as_os_str().is_empty() || !git.is_repository() {
            debug!("no repository to clean");
            return Ok(());
        }
        for key in git.local_config_keys(EXTRAHEADER_PATTERN)? {
            debug!(key = %key, "removing auth header");
            git.unset_local_config(&key)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::process::Command;

    use super::*;

    fn git(dir: &Path, args: &[&str]) {
        let status = Command::new("git")
            .args(args)
            .current_dir(dir)
            .status()
            .expect("run git");
        assert!(status.success(), "git {args:?} failed");
    }

    fn upstream_with_commit(dir: &Path) {
        git(dir, &["init", "--quiet", "--initial-branch=main"]);
        git(dir, &["config", "user.name", "Checkout Test"]);
        git(dir, &["config", "user.email", "checkout-test@local.invalid"]);
        fs::write(dir.join("README.md"), "hello\n").expect("write");
        git(dir, &["add", "."]);
        git(dir, &["commit", "--quiet", "-m", "initial"]);
    }

    #[test]
    fn fetches_and_checks_out_a_branch() {
        let upstream = tempfile::tempdir().expect("upstream");
        upstream_with_commit(upstream.path());
        let workspace = tempfile::tempdir().expect("workspace");

        let settings = RunSettings {
            pre_cleanup: false,
            post_cleanup: false,
            git_ref: "refs/heads/main".to_string(),
            repository: upstream.path().to_string_lossy().into_owned(),
            repository_path: workspace.path().join("repo"),
        };
        let checked_out = GitSourceProvider::new(0)
            .get_source(&settings)
            .expect("get source");

        assert_eq!(checked_out, "refs/heads/main");
        assert!(workspace.path().join("repo").join("README.md").exists());
    }

    #[test]
    fn cleanup_removes_extraheader_config() {
        let repo = tempfile::tempdir().expect("repo");
        git(repo.path(), &["init", "--quiet"]);
        git(
            repo.path(),
            &[
                "config",
                "--local",
                "http.https://github.com/.extraheader",
                "AUTHORIZATION: basic abc",
            ],
        );

        GitSourceProvider::new(1)
            .cleanup(repo.path())
            .expect("cleanup");

        let keys = Git::new(repo.path())
            .local_config_keys(EXTRAHEADER_PATTERN)
            .expect("keys");
        assert!(keys.is_empty());
    }

    #[test]
    fn cleanup_without_repository_is_a_no_op() {
        let temp = tempfile::tempdir().expect("tempdir");
        GitSourceProvider::new(1)
            .cleanup(temp.path())
            .expect("cleanup");
        GitSourceProvider::new(1)
            .cleanup(&PathBuf::new())
            .expect("cleanup empty path");
    }
}
