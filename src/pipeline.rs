//! Tower setup as typed stages.
//!
//! `AcquireProfile -> GenerateMesh -> ImportMesh -> RegisterPostProcessor`.
//! Each stage returns a `Result`, so a failure stops everything after it. The
//! final stage yields a [`TowerPostProcessor`] that holds the session state the
//! host needs when the tower is later sliced.

use std::path::{Path, PathBuf};

use tracing::info;

use crate::config::AutoTowersConfig;
use crate::error::{AutoTowersError, Result};
use crate::gcode::GcodeDocument;
use crate::mesh::{CancelSignal, GeneratedMesh, MeshGenerator};
use crate::postprocess::{post_process_with_stats, PostProcessStats};
use crate::report::{with_tower_overrides, SettingsReport};
use crate::tower::{MachineSettings, TowerProfile, TowerRequest};

/// Supplies the values entered in the tower settings dialog.
pub trait ProfileSource {
    fn acquire(&self) -> Result<TowerRequest>;
}

/// Reads a tower request from a TOML file.
#[derive(Debug, Clone)]
pub struct FileProfileSource {
    path: PathBuf,
}

impl FileProfileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ProfileSource for FileProfileSource {
    fn acquire(&self) -> Result<TowerRequest> {
        let content = std::fs::read_to_string(&self.path)?;
        TowerRequest::from_toml(&content)
    }
}

/// Places a generated mesh into the host scene.
pub trait ModelImporter {
    fn import(&mut self, mesh: &Path, request: &TowerRequest) -> Result<()>;
}

/// Per-session context handed to the host's export hook.
#[derive(Debug)]
pub struct TowerPostProcessor {
    profile: TowerProfile,
    settings: MachineSettings,
    report: SettingsReport,
    _mesh: Option<GeneratedMesh>,
}

impl TowerPostProcessor {
    /// A post-processor without a generated mesh (the model is already on the plate).
    pub fn from_profile(profile: TowerProfile) -> Self {
        Self {
            profile,
            settings: MachineSettings::default(),
            report: SettingsReport::default(),
            _mesh: None,
        }
    }

    pub fn profile(&self) -> &TowerProfile {
        &self.profile
    }

    /// Host settings to apply while the tower is on the plate.
    pub fn settings(&self) -> &MachineSettings {
        &self.settings
    }

    pub fn settings_report(&self) -> &SettingsReport {
        &self.report
    }

    pub fn process(&self, document: GcodeDocument) -> Result<GcodeDocument> {
        self.process_with_stats(document).map(|(doc, _)| doc)
    }

    pub fn process_with_stats(
        &self,
        document: GcodeDocument,
    ) -> Result<(GcodeDocument, PostProcessStats)> {
        post_process_with_stats(document, &self.profile)
    }
}

pub struct TowerPipeline<'a, G> {
    config: &'a AutoTowersConfig,
    generator: G,
}

impl<'a, G: MeshGenerator> TowerPipeline<'a, G> {
    pub fn new(config: &'a AutoTowersConfig, generator: G) -> Self {
        Self { config, generator }
    }

    pub async fn run<S: ProfileSource, I: ModelImporter>(
        &self,
        source: &S,
        importer: &mut I,
        cancel: &CancelSignal,
    ) -> Result<TowerPostProcessor> {
        let request = source.acquire()?;
        let profile = TowerProfile::from_request(&request, self.config)?;

        let mesh_source = request.mesh.as_ref().ok_or_else(|| {
            AutoTowersError::config(format!("{} tower request has no mesh source", request.kind))
        })?;
        let mesh = self.generator.generate(mesh_source, cancel).await?;

        importer.import(mesh.path(), &request)?;

        let settings = with_tower_overrides(&request.machine, request.kind);
        let report = SettingsReport::between(&request.machine, &settings);
        info!(
            "{} tower ready ({} setting changes)",
            request.kind,
            report.changes.len()
        );

        Ok(TowerPostProcessor {
            profile,
            settings,
            report,
            _mesh: Some(mesh),
        })
    }
}
