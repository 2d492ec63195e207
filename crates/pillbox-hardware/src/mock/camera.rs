//! Mock camera implementation for testing and development.

use std::sync::{Arc, Mutex};

use chrono::Local;

use super::{lock, take_failure};
use crate::{
    HardwareError, Result,
    traits::CameraDevice,
    types::Frame,
};

/// Still resolution of the real camera configuration.
const DEFAULT_WIDTH: u32 = 1024;
const DEFAULT_HEIGHT: u32 = 768;

/// JPEG start-of-image marker, used as synthetic frame content.
const JPEG_SOI: [u8; 2] = [0xFF, 0xD8];

/// Mock camera producing synthetic frames.
///
/// # Examples
///
/// ```
/// use pillbox_hardware::mock::MockCamera;
/// use pillbox_hardware::traits::CameraDevice;
///
/// #[tokio::main]
/// async fn main() -> pillbox_hardware::Result<()> {
///     let (mut camera, handle) = MockCamera::new();
///
///     let frame = camera.capture_frame().await?;
///     assert_eq!(frame.sequence, 1);
///     assert_eq!(handle.capture_count(), 1);
///
///     handle.fail_next(1);
///     assert!(camera.capture_frame().await.is_err());
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct MockCamera {
    name: String,
    state: Arc<Mutex<CameraState>>,
}

#[derive(Debug, Default)]
struct CameraState {
    /// Sequence number of the last successful capture.
    sequence: u64,
    pending_failures: u32,
    attempts: u64,
}

impl MockCamera {
    pub fn new() -> (Self, MockCameraHandle) {
        Self::with_name("Mock Camera".to_string())
    }

    pub fn with_name(name: String) -> (Self, MockCameraHandle) {
        let state = Arc::new(Mutex::new(CameraState::default()));
        let camera = Self {
            name,
            state: Arc::clone(&state),
        };
        (camera, MockCameraHandle { state })
    }
}

impl CameraDevice for MockCamera {
    async fn capture_frame(&mut self) -> Result<Frame> {
        let mut state = lock(&self.state);
        state.attempts += 1;

        if take_failure(&mut state.pending_failures) {
            return Err(HardwareError::capture(format!(
                "{}: injected capture failure",
                self.name
            )));
        }

        state.sequence += 1;
        let mut data = JPEG_SOI.to_vec();
        data.extend_from_slice(&state.sequence.to_be_bytes());

        Ok(Frame::new(
            state.sequence,
            DEFAULT_WIDTH,
            DEFAULT_HEIGHT,
            data,
            Local::now(),
        ))
    }
}

/// Handle for controlling a mock camera.
#[derive(Debug, Clone)]
pub struct MockCameraHandle {
    state: Arc<Mutex<CameraState>>,
}

impl MockCameraHandle {
    /// Make the next `count` captures fail.
    pub fn fail_next(&self, count: u32) {
        lock(&self.state).pending_failures += count;
    }

    /// Number of successful captures.
    pub fn capture_count(&self) -> u64 {
        lock(&self.state).sequence
    }

    /// Number of capture requests, failed ones included.
    pub fn attempt_count(&self) -> u64 {
        lock(&self.state).attempts
    }
}
