//! Plugin configuration.
//!
//! Loaded from `<config_dir>/autotowers/config.toml` when present. Every field
//! has a default so a partial file (or none at all) is valid.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoTowersConfig {
    /// CAD compiler executable used to build tower meshes.
    pub openscad_path: PathBuf,
    /// Upper bound on a single mesh compilation.
    pub generation_timeout_secs: u64,
    /// Blocks the slicer emits ahead of the first printed layer.
    pub leading_blocks: usize,
    /// Directory holding prebuilt tower meshes.
    pub preset_dir: Option<PathBuf>,
    /// Default for requests that leave the LCD option unset.
    pub display_on_lcd: bool,
}

impl Default for AutoTowersConfig {
    fn default() -> Self {
        Self {
            openscad_path: PathBuf::from("openscad"),
            generation_timeout_secs: 300,
            leading_blocks: 2,
            preset_dir: None,
            display_on_lcd: true,
        }
    }
}

impl AutoTowersConfig {
    pub fn generation_timeout(&self) -> Duration {
        Duration::from_secs(self.generation_timeout_secs)
    }
}

/// Default location of the configuration file, if the platform has a config dir.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("autotowers").join("config.toml"))
}

/// Load configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<AutoTowersConfig> {
    let content = std::fs::read_to_string(path)?;
    let config: AutoTowersConfig = toml::from_str(&content)?;
    info!("Loaded configuration from {:?}", path);
    Ok(config)
}

/// Load the configuration from the default location, or defaults when absent.
pub fn load_default_config() -> Result<AutoTowersConfig> {
    match default_config_path() {
        Some(path) if path.exists() => load_config(&path),
        Some(path) => {
            debug!("No configuration at {:?}, using defaults", path);
            Ok(AutoTowersConfig::default())
        }
        None => Ok(AutoTowersConfig::default()),
    }
}
