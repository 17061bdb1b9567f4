use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use barsync_core::{SyncConfig, ThrottleConfig};
use barsync_finnhub::FinnhubConfig;

/// Contents of the optional `--config` JSON file.
///
/// Every section may be omitted and falls back to its defaults.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub sync: SyncConfig,
    pub throttle: ThrottleConfig,
    pub finnhub: FinnhubConfig,
    pub db: Option<PathBuf>,
    pub skip_list: Option<PathBuf>,
}

impl FileConfig {
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let cfg: Self = serde_json::from_str(&text)
            .with_context(|| format!("parsing config {}", path.display()))?;
        cfg.sync
            .validate()
            .with_context(|| format!("validating config {}", path.display()))?;
        Ok(cfg)
    }
}
