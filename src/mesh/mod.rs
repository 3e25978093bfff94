//! Tower mesh acquisition.
//!
//! A tower model either comes from compiling a CAD template with the tower's
//! parameters or from a library of prebuilt meshes. Compilation is slow, so it
//! is async, bounded by a timeout and cancellable.

pub mod cancel;
mod openscad;
mod presets;

use std::future::Future;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

pub use cancel::{cancel_pair, CancelHandle, CancelSignal};
pub use openscad::{definition, OpenScadGenerator};
pub use presets::PresetMeshLibrary;

use crate::config::AutoTowersConfig;
use crate::error::{AutoTowersError, Result};
use crate::tower::MeshSource;

/// A mesh file ready for import. Compiled meshes own their temp directory,
/// which is deleted when this value is dropped.
#[derive(Debug)]
pub struct GeneratedMesh {
    path: PathBuf,
    _workdir: Option<TempDir>,
}

impl GeneratedMesh {
    pub fn temporary(path: PathBuf, workdir: TempDir) -> Self {
        Self {
            path,
            _workdir: Some(workdir),
        }
    }

    pub fn persistent(path: PathBuf) -> Self {
        Self {
            path,
            _workdir: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Maps a mesh source to a mesh file, fallibly.
pub trait MeshGenerator {
    fn generate(
        &self,
        source: &MeshSource,
        cancel: &CancelSignal,
    ) -> impl Future<Output = Result<GeneratedMesh>>;
}

/// Default generator: templates go to the CAD compiler, presets to the library.
#[derive(Debug, Clone)]
pub struct TowerMeshGenerator {
    compiler: OpenScadGenerator,
    presets: Option<PresetMeshLibrary>,
}

impl TowerMeshGenerator {
    pub fn new(compiler: OpenScadGenerator, presets: Option<PresetMeshLibrary>) -> Self {
        Self { compiler, presets }
    }

    pub fn from_config(config: &AutoTowersConfig) -> Self {
        Self::new(
            OpenScadGenerator::from_config(config),
            config.preset_dir.as_ref().map(PresetMeshLibrary::new),
        )
    }
}

impl MeshGenerator for TowerMeshGenerator {
    async fn generate(&self, source: &MeshSource, cancel: &CancelSignal) -> Result<GeneratedMesh> {
        match source {
            MeshSource::Template { path, parameters } => {
                self.compiler.compile(path, parameters, cancel).await
            }
            MeshSource::Preset { name } => {
                let library = self.presets.as_ref().ok_or_else(|| {
                    AutoTowersError::config("no preset directory configured")
                })?;
                Ok(GeneratedMesh::persistent(library.resolve(name)?))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_preset_source() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("flow_tower.stl"), "solid").unwrap();
        let generator = TowerMeshGenerator::new(
            OpenScadGenerator::new("openscad", Duration::from_secs(1)),
            Some(PresetMeshLibrary::new(dir.path())),
        );
        let mesh = generator
            .generate(
                &MeshSource::Preset {
                    name: "flow_tower".to_string(),
                },
                &CancelSignal::never(),
            )
            .await
            .unwrap();
        assert_eq!(mesh.path(), dir.path().join("flow_tower.stl"));
        let path = mesh.path().to_path_buf();
        drop(mesh);
        assert!(path.exists(), "presets are never deleted");
    }

    #[tokio::test]
    async fn test_preset_without_library() {
        let generator = TowerMeshGenerator::from_config(&AutoTowersConfig::default());
        let err = generator
            .generate(
                &MeshSource::Preset {
                    name: "flow_tower".to_string(),
                },
                &CancelSignal::never(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AutoTowersError::Configuration(_)));
    }
}
