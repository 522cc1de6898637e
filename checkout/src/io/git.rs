//! Git adapter for source retrieval.
//!
//! A small, explicit wrapper around `git` subprocess calls in one working
//! directory.

use std::path::PathBuf;
use std::process::{Command, Output};

use anyhow::{Context, Result, anyhow};
use tracing::{debug, instrument};

/// Wrapper for executing git commands in a working directory.
#[derive(Debug, Clone)]
pub struct Git {
    workdir: PathBuf,
}

impl Git {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
        }
    }

    /// True if the working directory already holds a repository.
    pub fn is_repository(&self) -> bool {
        self.workdir.join(".git").exists()
    }

    pub fn init(&self) -> Result<()> {
        self.run_checked(&["init", "--quiet"])?;
        Ok(())
    }

    /// Point `origin` at `url`, replacing any previous remote.
    #[instrument(skip_all, fields(url))]
    pub fn set_origin(&self, url: &str) -> Result<()> {
        if self.run(&["remote", "get-url", "origin"])?.status.success() {
            debug!("replacing existing origin");
            self.run_checked(&["remote", "set-url", "origin", url])?;
        } else {
            self.run_checked(&["remote", "add", "origin", url])?;
        }
        Ok(())
    }

    /// Fetch `git_ref` from `origin`. A depth of `0` fetches full history.
    #[instrument(skip_all, fields(git_ref, depth))]
    pub fn fetch(&self, git_ref: &str, depth: u32) -> Result<()> {
        let depth_arg = format!("--depth={depth}");
        let mut args = vec!["-c", "protocol.version=2", "fetch", "--no-tags", "--prune"];
        if depth > 0 {
            args.push(&depth_arg);
        }
        args.extend(["origin", git_ref]);
        self.run_checked(&args)?;
        Ok(())
    }

    /// Check out `FETCH_HEAD` as a detached HEAD, discarding local changes.
    pub fn checkout_fetch_head(&self) -> Result<()> {
        self.run_checked(&["checkout", "--force", "--detach", "FETCH_HEAD"])?;
        Ok(())
    }

    pub fn head_sha(&self) -> Result<String> {
        let out = self.run_capture(&["rev-parse", "HEAD"])?;
        Ok(out.trim().to_string())
    }

    /// Names of local config keys matching `pattern`. No match is an empty list.
    pub fn local_config_keys(&self, pattern: &str) -> Result<Vec<String>> {
        let output = self.run(&["config", "--local", "--name-only", "--get-regexp", pattern])?;
        // `git config --get-regexp` exits 1 when nothing matches.
        if output.status.code() == Some(1) {
            return Ok(Vec::new());
        }
        let stdout = check_output(&["config", "--get-regexp", pattern], output)?;
        Ok(String::from_utf8_lossy(&stdout.stdout)
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }

    pub fn unset_local_config(&self, key: &str) -> Result<()> {
        self.run_checked(&["config", "--local", "--unset-all", key])?;
        Ok(())
    }

    fn run_capture(&self, args: &[&str]) -> Result<String> {
        let output = self.run_checked(args)?;
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    fn run_checked(&self, args: &[&str]) -> Result<Output> {
        let output = self.run(args)?;
        check_output(args, output)
    }

    fn run(&self, args: &[&str]) -> Result<Output> {
        Command::new("git")
            .args(args)
            .current_dir(&self.workdir)
            .output()
            .with_context(|| format!("spawn git {}", args.join(" ")))
    }
}

fn check_output(args: &[&str], output: Output) -> Result<Output> {
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(anyhow!("git {} failed: {}", args.join(" "), stderr.trim()));
    }
    Ok(output)
}
