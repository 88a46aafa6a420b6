// ============================================================
// Layer 5 — Config Store
// ============================================================
// Saves and loads a PipelineConfig as pretty-printed JSON.
//
// Two uses:
//   1. `sweep --config run.json` replays a saved run
//   2. every sweep writes its resolved config beside metrics.csv,
//      so the numbers can always be traced back to their settings
//
// Fields missing from the file take their defaults, so a
// hand-written config only needs the settings it changes.
//
// Reference: Rust Book §9 (Error Handling with anyhow)

use anyhow::{Context, Result};
use std::{fs, path::PathBuf};

use crate::application::sweep_use_case::PipelineConfig;

pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Write `cfg`, creating the parent directory if needed.
    pub fn save(&self, cfg: &PipelineConfig) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Cannot create '{}'", parent.display()))?;
        }

        let json = serde_json::to_string_pretty(cfg)?;
        fs::write(&self.path, json)
            .with_context(|| format!("Cannot write config to '{}'", self.path.display()))?;

        tracing::debug!("Saved pipeline config to '{}'", self.path.display());
        Ok(())
    }

    pub fn load(&self) -> Result<PipelineConfig> {
        let json = fs::read_to_string(&self.path)
            .with_context(|| format!("Cannot read config from '{}'", self.path.display()))?;

        serde_json::from_str(&json)
            .with_context(|| format!("Invalid pipeline config in '{}'", self.path.display()))
    }
}
