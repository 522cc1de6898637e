//! State shared between the main and post invocations of one job.
//!
//! The two phases run in separate processes, so nothing here is kept in
//! memory between them: every write goes to a backend the hosting runtime
//! (or a per-job file) carries forward.

use std::collections::{BTreeMap, HashMap};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use tracing::debug;

use crate::core::state::{IS_POST, POST_CLEANUP, REPOSITORY_PATH, decode_bool, encode_bool};

/// Flat string key/value store that survives the process boundary.
pub trait StateStore {
    /// Read a value. Keys never written in this job read as `None`.
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: &str) -> Result<()>;
}

/// Runtime-provided state: writes append to `GITHUB_STATE`, reads come from
/// the `STATE_<key>` variables injected into the post process.
#[derive(Debug, Clone)]
pub struct ActionsStateStore {
    state_file: PathBuf,
    inherited: HashMap<String, String>,
    written: HashMap<String, String>,
}

impl ActionsStateStore {
    pub fn new(state_file: impl Into<PathBuf>, inherited: HashMap<String, String>) -> Self {
        Self {
            state_file: state_file.into(),
            inherited,
            written: HashMap::new(),
        }
    }

    /// Snapshot `STATE_*` variables and locate the `GITHUB_STATE` file.
    pub fn from_env() -> Result<Self> {
        let state_file = std::env::var_os("GITHUB_STATE")
            .context("GITHUB_STATE is not set (pass --state-file outside the hosted runtime)")?;
        let inherited = std::env::vars()
            .filter_map(|(name, value)| {
                name.strip_prefix("STATE_")
                    .map(|key| (key.to_string(), value))
            })
            .collect();
        Ok(Self::new(state_file, inherited))
    }
}

impl StateStore for ActionsStateStore {
    fn get(&self, key: &str) -> Option<String> {
        self.written
            .get(key)
            .or_else(|| self.inherited.get(key))
            .cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        if value.contains('\n') || value.contains('\r') {
            bail!("state value for {key} must be a single line");
        }
        debug!(path = %self.state_file.display(), key, "appending state");
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.state_file)
            .with_context(|| format!("open state file {}", self.state_file.display()))?;
        writeln!(file, "{key}={value}")
            .with_context(|| format!("write state file {}", self.state_file.display()))?;
        self.written.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// JSON object file holding one job's state (`{"isPost": "true", ...}`).
///
/// The path must be unique per job run; it is the isolation boundary
/// between jobs.
#[derive(Debug, Clone)]
pub struct FileStateStore {
    path: PathBuf,
    values: BTreeMap<String, String>,
}

impl FileStateStore {
    /// Load the store at `path`. A missing file is an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let values = if path.exists() {
            debug!(path = %path.display(), "loading state file");
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("read state file {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("parse state file {}", path.display()))?
        } else {
            BTreeMap::new()
        };
        Ok(Self { path, values })
    }
}

impl StateStore for FileStateStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.values.insert(key.to_string(), value.to_string());
        let mut buf = serde_json::to_string_pretty(&self.values).context("serialize state")?;
        buf.push('\n');
        write_atomic(&self.path, &buf)
    }
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("state path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp state {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace state {}", path.display()))?;
    Ok(())
}

/// Typed view over a [`StateStore`] with the keys both phases agree on.
#[derive(Debug)]
pub struct JobState<S> {
    store: S,
}

impl<S: StateStore> JobState<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Record that the main phase ran, so the next invocation is the post phase.
    pub fn mark_main_phase(&mut self) -> Result<()> {
        self.store.set(IS_POST, encode_bool(true))
    }

    pub fn is_post_phase(&self) -> bool {
        decode_bool(IS_POST, self.store.get(IS_POST).as_deref())
    }

    pub fn set_post_cleanup(&mut self, enabled: bool) -> Result<()> {
        self.store.set(POST_CLEANUP, encode_bool(enabled))
    }

    pub fn post_cleanup(&self) -> bool {
        decode_bool(POST_CLEANUP, self.store.get(POST_CLEANUP).as_deref())
    }

    pub fn set_repository_path(&mut self, path: &Path) -> Result<()> {
        self.store.set(REPOSITORY_PATH, &path.to_string_lossy())
    }

    /// Persisted repository path, or an empty string if never written.
    pub fn repository_path(&self) -> String {
        self.store.get(REPOSITORY_PATH).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_store_round_trips_across_reopen() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("state").join("job.json");

        let mut main = JobState::new(FileStateStore::open(&path).expect("open"));
        main.mark_main_phase().expect("mark");
        main.set_post_cleanup(true).expect("post cleanup");
        main.set_repository_path(Path::new("/work/repo"))
            .expect("repo path");
        drop(main);

        let post = JobState::new(FileStateStore::open(&path).expect("reopen"));
        assert!(post.is_post_phase());
        assert!(post.post_cleanup());
        assert_eq!(post.repository_path(), "/work/repo");
    }

    #[test]
    fn unset_values_default_to_falsy() {
        let temp = tempfile::tempdir().expect("tempdir");
        let state = JobState::new(FileStateStore::open(temp.path().join("s.json")).expect("open"));
        assert!(!state.is_post_phase());
        assert!(!state.post_cleanup());
        assert_eq!(state.repository_path(), "");
    }

    /// Ensures the on-disk format stays a flat object of string literals.
    #[test]
    fn file_store_format_is_stable() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("s.json");
        let mut state = JobState::new(FileStateStore::open(&path).expect("open"));
        state.set_post_cleanup(false).expect("set");
        state.mark_main_phase().expect("mark");

        let contents = fs::read_to_string(&path).expect("read");
        assert_eq!(
            contents,
            "{\n  \"isPost\": \"true\",\n  \"postCleanup\": \"false\"\n}\n"
        );
    }

    #[test]
    fn actions_store_appends_and_reads_inherited_values() {
        let temp = tempfile::tempdir().expect("tempdir");
        let state_file = temp.path().join("state.env");

        let mut main = JobState::new(ActionsStateStore::new(&state_file, HashMap::new()));
        assert!(!main.is_post_phase());
        main.mark_main_phase().expect("mark");
        main.set_post_cleanup(true).expect("set");
        assert!(main.post_cleanup());

        let contents = fs::read_to_string(&state_file).expect("read");
        assert_eq!(contents, "isPost=true\npostCleanup=true\n");

        // The runtime turns each line into a STATE_<key> variable for the post process.
        let inherited = contents
            .lines()
            .filter_map(|line| line.split_once('='))
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let post = JobState::new(ActionsStateStore::new(&state_file, inherited));
        assert!(post.is_post_phase());
        assert!(post.post_cleanup());
    }

    #[test]
    fn actions_store_rejects_multiline_values() {
        let temp = tempfile::tempdir().expect("tempdir");
        let mut store = ActionsStateStore::new(temp.path().join("state.env"), HashMap::new());
        assert!(store.set(REPOSITORY_PATH, "a\nb").is_err());
    }
}
