//! Problem matcher registration around checkout.
//!
//! [`MatcherScope`] registers the matcher on creation and removes it when
//! dropped, so every exit path out of checkout unregisters it. The matcher
//! file is rendered from the bundled template with the configured owner, and
//! removal uses that same owner.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde_json::Value;
use tracing::debug;

use crate::io::job_log::JobLog;

const PROBLEM_MATCHER: &str = include_str!("../../problem-matcher.json");
const MATCHER_FILE_NAME: &str = "checkout-problem-matcher.json";

/// Render the bundled matcher definition with every matcher owned by `owner`.
pub fn render_matcher(owner: &str) -> Result<String> {
    let mut value: Value =
        serde_json::from_str(PROBLEM_MATCHER).context("parse bundled problem matcher")?;
    let matchers = value
        .get_mut("problemMatcher")
        .and_then(Value::as_array_mut)
        .ok_or_else(|| anyhow!("bundled problem matcher has no problemMatcher list"))?;
    for matcher in matchers.iter_mut().filter_map(Value::as_object_mut) {
        matcher.insert("owner".to_string(), Value::String(owner.to_string()));
    }
    let mut rendered = serde_json::to_string_pretty(&value).context("serialize problem matcher")?;
    rendered.push('\n');
    Ok(rendered)
}

/// Write the matcher definition for `owner` into `dir`, returning its path.
pub fn write_matcher_file(dir: &Path, owner: &str) -> Result<PathBuf> {
    let rendered = render_matcher(owner)?;
    fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
    let path = dir.join(MATCHER_FILE_NAME);
    fs::write(&path, rendered)
        .with_context(|| format!("write problem matcher {}", path.display()))?;
    Ok(path)
}

/// Scratch directory for the matcher file: `RUNNER_TEMP`, else the system temp dir.
pub fn matcher_dir() -> PathBuf {
    std::env::var_os("RUNNER_TEMP")
        .map(PathBuf::from)
        .unwrap_or_else(std::env::temp_dir)
}

/// Registered problem matcher; unregistered on drop.
pub struct MatcherScope<'a, L: JobLog> {
    log: &'a L,
    owner: String,
}

impl<'a, L: JobLog> MatcherScope<'a, L> {
    pub fn register(log: &'a L, matcher_file: &Path, owner: impl Into<String>) -> Self {
        let owner = owner.into();
        debug!(owner = %owner, path = %matcher_file.display(), "registering problem matcher");
        log.add_matcher(matcher_file);
        Self { log, owner }
    }
}

impl<L: JobLog> Drop for MatcherScope<'_, L> {
    fn drop(&mut self) {
        debug!(owner = %self.owner, "removing problem matcher");
        self.log.remove_matcher(&self.owner);
    }
}
