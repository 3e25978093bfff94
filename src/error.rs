use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AutoTowersError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("No gcode to post-process (document is empty or missing its layer blocks)")]
    EmptyDocument,

    #[error("External tool error: {0}")]
    ExternalTool(String),

    #[error("Mesh generation was cancelled")]
    Cancelled,

    #[error("Mesh generation timed out after {0:?}")]
    TimedOut(Duration),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML: {0}")]
    ConfigParse(#[from] toml::de::Error),
}

impl AutoTowersError {
    pub fn config(msg: impl Into<String>) -> Self {
        AutoTowersError::Configuration(msg.into())
    }
}

impl From<AutoTowersError> for String {
    fn from(err: AutoTowersError) -> Self {
        err.to_string()
    }
}

pub type Result<T> = std::result::Result<T, AutoTowersError>;
