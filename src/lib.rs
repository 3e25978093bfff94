pub mod config;
mod error;
pub mod gcode;
pub mod height;
pub mod mesh;
pub mod pipeline;
pub mod postprocess;
pub mod report;
pub mod tower;

pub use config::{load_config, load_default_config, AutoTowersConfig};
pub use error::{AutoTowersError, Result};
pub use gcode::GcodeDocument;
pub use height::Height;
pub use pipeline::{TowerPipeline, TowerPostProcessor};
pub use postprocess::{post_process, post_process_with_stats, PostProcessStats};
pub use tower::{ToweredParameterKind, TowerProfile, TowerRequest};

/// Install the global log subscriber. `RUST_LOG` overrides the `info` default.
pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
}
