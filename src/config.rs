use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use crate::{olog_debug, Error, Result};

/// Default recursion cap for the meta-orchestrator.
pub const DEFAULT_MAX_DEPTH: usize = 32;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Directory where `workflow_call` nodes resolve relative workflow files.
    pub workflows_dir: Option<String>,
    /// Override for the orchestrator recursion cap.
    pub max_depth: Option<usize>,
}

impl Config {
    pub fn orchid_dir() -> Result<PathBuf> {
        Ok(dirs::home_dir().ok_or(Error::NoHomeDir)?.join(".orchid"))
    }

    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::orchid_dir()?.join("orchid.toml"))
    }

    pub fn effective_workflows_dir(&self) -> PathBuf {
        match &self.workflows_dir {
            Some(dir) => expand_tilde(dir),
            None => PathBuf::from("workflows"),
        }
    }

    pub fn effective_max_depth(&self) -> usize {
        self.max_depth.unwrap_or(DEFAULT_MAX_DEPTH)
    }

    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        olog_debug!("Config::load path={}", path.display());
        if !path.exists() {
            olog_debug!("Config file not found, using defaults");
            return Ok(Self::default());
        }
        let config: Self = toml::from_str(&fs::read_to_string(&path)?)?;
        olog_debug!(
            "Config loaded: workflows_dir={:?}, max_depth={:?}",
            config.workflows_dir,
            config.max_depth
        );
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let orchid_dir = Self::orchid_dir()?;
        if !orchid_dir.exists() {
            fs::create_dir_all(&orchid_dir)?;
        }
        let path = Self::config_path()?;
        fs::write(&path, toml::to_string_pretty(self)?)?;
        olog_debug!("Config saved to {}", path.display());
        Ok(())
    }
}

fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}
