//! Action inputs for the main phase.
//!
//! The hosting runtime exposes each input as `INPUT_<NAME>` (upper-cased,
//! spaces replaced by `_`). Parsing goes through a lookup function so tests
//! can supply inputs without touching the process environment.

use std::path::{Path, PathBuf};

use anyhow::{Result, bail};

const DEFAULT_SERVER_URL: &str = "https://github.com";
const DEFAULT_REF: &str = "refs/heads/main";

/// Settings consumed read-only by the phase orchestrators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSettings {
    /// Reset the workspace root before checkout.
    pub pre_cleanup: bool,
    /// Reset the workspace root again in the post phase.
    pub post_cleanup: bool,
    /// Ref to check out (`refs/heads/main`, a tag, or a commit sha).
    pub git_ref: String,
    /// Fetch URL (or local path) of the repository.
    pub repository: String,
    /// Absolute directory the repository is materialized into.
    pub repository_path: PathBuf,
}

impl RunSettings {
    /// Read settings from the process environment.
    pub fn from_env(workspace: &Path) -> Result<Self> {
        Self::from_lookup(workspace, |name| std::env::var(name).ok())
    }

    /// Read settings through `lookup`, which resolves raw environment names.
    pub fn from_lookup<F>(workspace: &Path, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let input = |name: &str| {
            lookup(&input_env_name(name))
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let repository = match input("repository").or_else(|| lookup("GITHUB_REPOSITORY")) {
            Some(value) => {
                let server = lookup("GITHUB_SERVER_URL")
                    .unwrap_or_else(|| DEFAULT_SERVER_URL.to_string());
                expand_repository(&value, &server)
            }
            None => bail!("input 'repository' is required when GITHUB_REPOSITORY is not set"),
        };

        let git_ref = input("ref")
            .or_else(|| lookup("GITHUB_REF").filter(|value| !value.is_empty()))
            .unwrap_or_else(|| DEFAULT_REF.to_string());

        let repository_path = match input("path") {
            Some(rel) => {
                let rel = Path::new(&rel);
                if rel.is_absolute() {
                    bail!("input 'path' must be relative to the workspace, got {}", rel.display());
                }
                workspace.join(rel)
            }
            None => workspace.to_path_buf(),
        };

        Ok(Self {
            pre_cleanup: parse_bool_input("pre-cleanup", input("pre-cleanup"), false)?,
            post_cleanup: parse_bool_input("post-cleanup", input("post-cleanup"), false)?,
            git_ref,
            repository,
            repository_path,
        })
    }
}

/// Environment variable name the runtime uses for input `name`.
pub fn input_env_name(name: &str) -> String {
    format!("INPUT_{}", name.replace(' ', "_").to_uppercase())
}

fn parse_bool_input(name: &str, raw: Option<String>, default: bool) -> Result<bool> {
    match raw.as_deref() {
        None => Ok(default),
        Some("true" | "True" | "TRUE") => Ok(true),
        Some("false" | "False" | "FALSE") => Ok(false),
        Some(other) => bail!(
            "input '{name}' must be one of true|True|TRUE|false|False|FALSE, got '{other}'"
        ),
    }
}

/// Expand `owner/name` shorthand into a URL on `server`; anything else is
/// used as given (full URL or local path).
fn expand_repository(value: &str, server: &str) -> String {
    let is_shorthand = !value.contains(':')
        && !value.starts_with('/')
        && !value.starts_with('.')
        && value.matches('/').count() == 1;
    if is_shorthand {
        format!("{}/{}", server.trim_end_matches('/'), value)
    } else {
        value.to_string()
    }
}
