use std::path::PathBuf;

use pillbox_hardware::HardwareError;
use pillbox_storage::StorageError;
use thiserror::Error;

/// Errors surfaced by the controller.
///
/// Device and storage failures inside a polling cycle are reported as
/// [`ControllerEvent`](crate::ControllerEvent)s and never abort the loop;
/// this type covers setup problems and broken internal invariants.
#[derive(Debug, Error)]
pub enum ControllerError {
    #[error(transparent)]
    Core(#[from] pillbox_core::Error),

    #[error(transparent)]
    Hardware(#[from] HardwareError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Configuration file could not be read
    #[error("Cannot read configuration {}: {source}", path.display())]
    ConfigRead {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Configuration file is not valid TOML for [`ControllerConfig`](crate::ControllerConfig)
    #[error("Cannot parse configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// Configuration parsed but failed validation
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Peripherals do not match the configured compartments
    #[error("Wiring error: {0}")]
    Wiring(String),
}

impl ControllerError {
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }

    pub fn wiring(message: impl Into<String>) -> Self {
        Self::Wiring(message.into())
    }
}

pub type Result<T> = std::result::Result<T, ControllerError>;
