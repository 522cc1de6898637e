//! Step configuration, read from the file named by `--config` /
//! `CHECKOUT_CONFIG`.
//!
//! The file must live outside the workspace: pre-cleanup empties the
//! workspace root before the post phase reads the config again.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::core::types::ResetStrategy;

/// Checkout step configuration (TOML).
///
/// Intended for operators of self-hosted runners. Missing fields default to
/// the values below.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CheckoutConfig {
    /// How pre/post cleanup empties the workspace root.
    pub reset_strategy: ResetStrategy,

    /// History depth to fetch. `0` fetches full history.
    pub fetch_depth: u32,

    /// Owner of the problem matcher registered around checkout.
    pub matcher_owner: String,
}

impl Default for CheckoutConfig {
    fn default() -> Self {
        Self {
            reset_strategy: ResetStrategy::Enumerate,
            fetch_depth: 1,
            matcher_owner: "checkout-git".to_string(),
        }
    }
}

impl CheckoutConfig {
    pub fn validate(&self) -> Result<()> {
        if self.matcher_owner.trim().is_empty() {
            return Err(anyhow!("matcher_owner must be non-empty"));
        }
        if self.matcher_owner.contains([':', ',', '\n']) {
            return Err(anyhow!("matcher_owner must not contain ':', ',' or newlines"));
        }
        Ok(())
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `CheckoutConfig::default()`.
pub fn load_config(path: &Path) -> Result<CheckoutConfig> {
    if !path.exists() {
        let cfg = CheckoutConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: CheckoutConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}
