//! Error types for hardware operations.
//!
//! This module defines error types specific to peripheral operations on the
//! medicine box: reader polling, frame capture, strip counting, display
//! output and switch sampling.

/// Result type alias for hardware operations.
pub type Result<T> = std::result::Result<T, HardwareError>;

/// Errors that can occur during hardware device operations.
///
/// The controller treats every variant the same way: the failed step is
/// skipped and retried on a later poll.
#[derive(Debug, thiserror::Error)]
pub enum HardwareError {
    /// Device communication error.
    #[error("Communication error: {message}")]
    CommunicationError { message: String },

    /// Tag reading error.
    #[error("Tag read error: {message}")]
    TagReadError { message: String },

    /// Camera capture error.
    #[error("Capture error: {message}")]
    CaptureError { message: String },

    /// Strip counting error.
    #[error("Count estimation error: {message}")]
    EstimationError { message: String },

    /// Display output error.
    #[error("Display error: {message}")]
    DisplayError { message: String },
}

impl HardwareError {
    /// Create a new communication error.
    pub fn communication(message: impl Into<String>) -> Self {
        Self::CommunicationError {
            message: message.into(),
        }
    }

    /// Create a new tag read error.
    pub fn tag_read(message: impl Into<String>) -> Self {
        Self::TagReadError {
            message: message.into(),
        }
    }

    /// Create a new capture error.
    pub fn capture(message: impl Into<String>) -> Self {
        Self::CaptureError {
            message: message.into(),
        }
    }

    /// Create a new count estimation error.
    pub fn estimation(message: impl Into<String>) -> Self {
        Self::EstimationError {
            message: message.into(),
        }
    }

    /// Create a new display error.
    pub fn display(message: impl Into<String>) -> Self {
        Self::DisplayError {
            message: message.into(),
        }
    }
}
