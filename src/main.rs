use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use structopt::StructOpt;
use tracing::info;

use autotowers::mesh::{CancelSignal, PresetMeshLibrary, TowerMeshGenerator};
use autotowers::pipeline::{FileProfileSource, ModelImporter, ProfileSource};
use autotowers::report::{with_tower_overrides, SettingsReport};
use autotowers::{
    load_config, load_default_config, AutoTowersConfig, GcodeDocument, TowerPipeline,
    TowerPostProcessor, TowerProfile, TowerRequest,
};

#[derive(Debug, StructOpt)]
#[structopt(name = "autotowers", about = "Calibration tower gcode post-processor")]
struct Opt {
    /// Configuration file (defaults to the user config directory)
    #[structopt(short, long, parse(from_os_str))]
    config: Option<PathBuf>,

    #[structopt(subcommand)]
    command: Command,
}

#[derive(Debug, StructOpt)]
enum Command {
    /// Apply a tower request to sliced gcode
    Process {
        /// Tower request (TOML)
        #[structopt(short, long, parse(from_os_str))]
        request: PathBuf,

        /// Sliced gcode to read
        #[structopt(short, long, parse(from_os_str))]
        input: PathBuf,

        /// Where to write the post-processed gcode
        #[structopt(short, long, parse(from_os_str))]
        output: PathBuf,
    },
    /// Build the tower mesh for a request and copy it to a file
    Mesh {
        /// Tower request (TOML)
        #[structopt(short, long, parse(from_os_str))]
        request: PathBuf,

        /// Destination STL file
        #[structopt(short, long, parse(from_os_str))]
        output: PathBuf,
    },
    /// List the prebuilt tower meshes
    Presets,
}

/// Stand-in for the host scene: copies the mesh to a file.
struct CopyImporter {
    destination: PathBuf,
}

impl ModelImporter for CopyImporter {
    fn import(&mut self, mesh: &Path, request: &TowerRequest) -> autotowers::Result<()> {
        std::fs::copy(mesh, &self.destination)?;
        info!("Wrote {} tower mesh to {:?}", request.kind, self.destination);
        Ok(())
    }
}

fn process(config: &AutoTowersConfig, request: &Path, input: &Path, output: &Path) -> Result<()> {
    let request = FileProfileSource::new(request)
        .acquire()
        .with_context(|| format!("reading tower request {:?}", request))?;
    let profile = TowerProfile::from_request(&request, config)?;
    let processor = TowerPostProcessor::from_profile(profile);

    let text = std::fs::read_to_string(input).with_context(|| format!("reading {:?}", input))?;
    let (document, stats) = processor.process_with_stats(GcodeDocument::from_gcode_text(&text))?;
    std::fs::write(output, document.to_gcode_text())
        .with_context(|| format!("writing {:?}", output))?;

    let report = SettingsReport::between(
        &request.machine,
        &with_tower_overrides(&request.machine, request.kind),
    );
    if !report.is_empty() {
        println!("Settings to change for this tower:\n{}", report.to_message());
    }
    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}

async fn mesh(config: &AutoTowersConfig, request: &Path, output: &Path) -> Result<()> {
    let pipeline = TowerPipeline::new(config, TowerMeshGenerator::from_config(config));
    let mut importer = CopyImporter {
        destination: output.to_path_buf(),
    };
    let processor = pipeline
        .run(
            &FileProfileSource::new(request),
            &mut importer,
            &CancelSignal::never(),
        )
        .await?;
    println!("{}", processor.profile().summary_line());
    let report = processor.settings_report();
    if !report.is_empty() {
        println!("{}", report.to_message());
    }
    Ok(())
}

fn presets(config: &AutoTowersConfig) -> Result<()> {
    let dir = config
        .preset_dir
        .as_ref()
        .context("no preset_dir set in the configuration")?;
    for name in PresetMeshLibrary::new(dir).list()? {
        println!("{}", name);
    }
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    autotowers::init_logging();
    let opt = Opt::from_args();

    let config = match &opt.config {
        Some(path) => load_config(path)?,
        None => load_default_config()?,
    };

    match opt.command {
        Command::Process {
            request,
            input,
            output,
        } => process(&config, &request, &input, &output),
        Command::Mesh { request, output } => mesh(&config, &request, &output).await,
        Command::Presets => presets(&config),
    }
}
