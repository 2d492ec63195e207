use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    // Identifier errors
    #[error("Invalid tag format: {0}")]
    InvalidTagFormat(String),

    #[error("Invalid compartment: {index} (expected {min}-{max})")]
    InvalidCompartment { index: u8, min: u8, max: u8 },

    // State machine errors
    #[error("Invalid state transition from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },

    // Display errors
    #[error("Duration must be greater than zero")]
    InvalidDuration,
}

pub type Result<T> = std::result::Result<T, Error>;
