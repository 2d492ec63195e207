//! Common types shared across hardware device implementations.
//!
//! Captured frames travel from the camera to the strip counter and the
//! image archive.

use chrono::{DateTime, Local};

/// One still image taken by the camera.
///
/// The pixel data is opaque to the controller; it is handed to the count
/// estimator and, optionally, archived as-is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Monotonic per-camera sequence number, starting at 1.
    pub sequence: u64,

    pub width: u32,

    pub height: u32,

    /// Encoded image bytes (JPEG on the real device).
    pub data: Vec<u8>,

    /// Wall-clock time of the capture.
    pub captured_at: DateTime<Local>,
}

impl Frame {
    /// Create a new frame.
    pub fn new(
        sequence: u64,
        width: u32,
        height: u32,
        data: Vec<u8>,
        captured_at: DateTime<Local>,
    ) -> Self {
        Self {
            sequence,
            width,
            height,
            data,
            captured_at,
        }
    }

    /// Size of the encoded image in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if the frame carries no image data.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
