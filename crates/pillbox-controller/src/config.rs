//! Controller configuration.
//!
//! Loaded from a TOML file:
//!
//! ```toml
//! log_dir = "/var/lib/pillbox/logs"
//! capture_dir = "/var/lib/pillbox/captured_images"
//! settle_delay_ms = 5000
//!
//! [access]
//! authorized_tags = ["1047839255856"]
//!
//! [[compartments]]
//! index = 1
//! medicine = "Ibuprofen"
//! initial_count = 10
//! ```
//!
//! Every timing field has a default, so the smallest valid file names a log
//! directory and one compartment.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use pillbox_core::constants::{
    DEFAULT_MESSAGE_DURATION_MS, DEFAULT_POLL_INTERVAL_MS, DEFAULT_QR_MAX_PAYLOAD,
    DEFAULT_SETTLE_DELAY_MS, MAX_COMPARTMENT,
};
use pillbox_core::{Compartment, CompartmentId, TagId};
use serde::{Deserialize, Serialize};

use crate::access::AccessController;
use crate::error::{ControllerError, Result};

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControllerConfig {
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Wait after the drawer closes before capturing.
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,

    /// How long a scan result stays on the display.
    #[serde(default = "default_message_duration_ms")]
    pub message_duration_ms: u64,

    /// Upper bound of the QR payload in bytes.
    #[serde(default = "default_qr_max_payload")]
    pub qr_max_payload: usize,

    /// Directory of the `YYYY-MM-DD.json` daily logs.
    pub log_dir: PathBuf,

    /// Directory for captured frames; frames are not kept when unset.
    #[serde(default)]
    pub capture_dir: Option<PathBuf>,

    #[serde(default)]
    pub access: AccessConfig,

    pub compartments: Vec<CompartmentConfig>,
}

/// Tag allow-list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessConfig {
    #[serde(default)]
    pub authorized_tags: Vec<String>,
}

/// One drawer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompartmentConfig {
    pub index: u8,
    pub medicine: String,

    /// Strips in the drawer at start-up, if known.
    #[serde(default)]
    pub initial_count: Option<u32>,
}

fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

fn default_settle_delay_ms() -> u64 {
    DEFAULT_SETTLE_DELAY_MS
}

fn default_message_duration_ms() -> u64 {
    DEFAULT_MESSAGE_DURATION_MS
}

fn default_qr_max_payload() -> usize {
    DEFAULT_QR_MAX_PAYLOAD
}

impl ControllerConfig {
    /// Parse and validate a TOML document.
    ///
    /// # Errors
    ///
    /// Returns `ControllerError::ConfigParse` for malformed TOML and
    /// `ControllerError::InvalidConfig` if validation fails.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a configuration file.
    ///
    /// # Errors
    ///
    /// Returns `ControllerError::ConfigRead` if the file cannot be read,
    /// otherwise as [`from_toml_str`](Self::from_toml_str).
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents =
            std::fs::read_to_string(path).map_err(|source| ControllerError::ConfigRead {
                path: path.to_path_buf(),
                source,
            })?;

        Self::from_toml_str(&contents)
    }

    /// Check the invariants serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns `ControllerError::InvalidConfig` naming the first problem.
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval_ms == 0 {
            return Err(ControllerError::invalid_config("poll_interval_ms must be positive"));
        }
        if self.settle_delay_ms == 0 {
            return Err(ControllerError::invalid_config("settle_delay_ms must be positive"));
        }
        if self.message_duration_ms == 0 {
            return Err(ControllerError::invalid_config("message_duration_ms must be positive"));
        }
        if self.qr_max_payload == 0 {
            return Err(ControllerError::invalid_config("qr_max_payload must be positive"));
        }

        if self.compartments.is_empty() || self.compartments.len() > usize::from(MAX_COMPARTMENT) {
            return Err(ControllerError::invalid_config(format!(
                "expected 1-{MAX_COMPARTMENT} compartments, got {}",
                self.compartments.len()
            )));
        }

        let mut seen = HashSet::new();
        for compartment in &self.compartments {
            let id = CompartmentId::new(compartment.index)
                .map_err(|e| ControllerError::invalid_config(e.to_string()))?;
            if !seen.insert(id) {
                return Err(ControllerError::invalid_config(format!(
                    "compartment {id} configured twice"
                )));
            }
            if compartment.medicine.trim().is_empty() {
                return Err(ControllerError::invalid_config(format!(
                    "compartment {id} has no medicine name"
                )));
            }
        }

        for tag in &self.access.authorized_tags {
            TagId::new(tag).map_err(|e| {
                ControllerError::invalid_config(format!("authorized tag {tag:?}: {e}"))
            })?;
        }

        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn message_duration(&self) -> Duration {
        Duration::from_millis(self.message_duration_ms)
    }

    /// Allow-list built from `[access]`.
    ///
    /// # Errors
    ///
    /// Returns `ControllerError::Core` for a malformed tag.
    pub fn access_controller(&self) -> Result<AccessController> {
        let tags = self
            .access
            .authorized_tags
            .iter()
            .map(|tag| TagId::new(tag))
            .collect::<pillbox_core::Result<Vec<_>>>()?;
        Ok(AccessController::new(tags))
    }

    /// Compartments in ascending index order.
    ///
    /// # Errors
    ///
    /// Returns `ControllerError::Core` for an out-of-range index.
    pub fn compartments(&self) -> Result<Vec<Compartment>> {
        let mut compartments = self
            .compartments
            .iter()
            .map(|c| -> Result<Compartment> {
                Ok(Compartment::new(
                    CompartmentId::new(c.index)?,
                    c.medicine.trim(),
                    c.initial_count,
                ))
            })
            .collect::<Result<Vec<_>>>()?;
        compartments.sort_by_key(|c| c.id);
        Ok(compartments)
    }
}
