use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::WalkDir;

use crate::error::{AutoTowersError, Result};

/// Directory of prebuilt tower meshes, addressed by file stem.
#[derive(Debug, Clone)]
pub struct PresetMeshLibrary {
    dir: PathBuf,
}

fn is_stl(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("stl"))
        .unwrap_or(false)
}

impl PresetMeshLibrary {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Preset names (file stems of `.stl` files), sorted.
    pub fn list(&self) -> Result<Vec<String>> {
        if !self.dir.is_dir() {
            return Err(AutoTowersError::config(format!(
                "Preset directory does not exist: {:?}",
                self.dir
            )));
        }
        let mut names: Vec<String> = WalkDir::new(&self.dir)
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file() && is_stl(e.path()))
            .filter_map(|e| e.path().file_stem().and_then(|s| s.to_str()).map(String::from))
            .collect();
        names.sort();
        debug!("Found {} preset meshes in {:?}", names.len(), self.dir);
        Ok(names)
    }

    /// Path of the preset named `name`.
    pub fn resolve(&self, name: &str) -> Result<PathBuf> {
        if name.is_empty() || name.contains(['/', '\\']) {
            return Err(AutoTowersError::config(format!("Invalid preset name '{}'", name)));
        }
        let path = self.dir.join(format!("{}.stl", name));
        if path.is_file() {
            Ok(path)
        } else {
            Err(AutoTowersError::config(format!(
                "Preset '{}' not found in {:?}",
                name, self.dir
            )))
        }
    }
}
