//! Mock strip counter for testing and development.
//!
//! Counts are scripted per compartment through the handle; a compartment
//! without a scripted count fails estimation.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use pillbox_core::CompartmentId;

use super::{lock, take_failure};
use crate::{HardwareError, Result, traits::CountEstimator, types::Frame};

/// Mock count estimator returning scripted counts.
///
/// # Examples
///
/// ```
/// use chrono::Local;
/// use pillbox_core::CompartmentId;
/// use pillbox_hardware::Frame;
/// use pillbox_hardware::mock::MockEstimator;
/// use pillbox_hardware::traits::CountEstimator;
///
/// #[tokio::main]
/// async fn main() -> pillbox_hardware::Result<()> {
///     let (mut estimator, handle) = MockEstimator::new();
///     let compartment = CompartmentId::new(2).unwrap();
///     handle.set_count(compartment, 8);
///
///     let frame = Frame::new(1, 1024, 768, vec![0xFF, 0xD8], Local::now());
///     assert_eq!(estimator.estimate(&frame, compartment).await?, 8);
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct MockEstimator {
    state: Arc<Mutex<EstimatorState>>,
}

#[derive(Debug, Default)]
struct EstimatorState {
    counts: HashMap<CompartmentId, u32>,
    pending_failures: u32,
    /// (frame sequence, compartment) of every request.
    requests: Vec<(u64, CompartmentId)>,
}

impl MockEstimator {
    pub fn new() -> (Self, MockEstimatorHandle) {
        let state = Arc::new(Mutex::new(EstimatorState::default()));
        (
            Self {
                state: Arc::clone(&state),
            },
            MockEstimatorHandle { state },
        )
    }
}

impl CountEstimator for MockEstimator {
    async fn estimate(&mut self, frame: &Frame, compartment: CompartmentId) -> Result<u32> {
        let mut state = lock(&self.state);
        state.requests.push((frame.sequence, compartment));

        if take_failure(&mut state.pending_failures) {
            return Err(HardwareError::estimation(format!(
                "injected failure for compartment {compartment}"
            )));
        }

        state.counts.get(&compartment).copied().ok_or_else(|| {
            HardwareError::estimation(format!("no strips detected in compartment {compartment}"))
        })
    }
}

/// Handle for scripting a mock count estimator.
#[derive(Debug, Clone)]
pub struct MockEstimatorHandle {
    state: Arc<Mutex<EstimatorState>>,
}

impl MockEstimatorHandle {
    /// Count returned for `compartment` from now on.
    pub fn set_count(&self, compartment: CompartmentId, count: u32) {
        lock(&self.state).counts.insert(compartment, count);
    }

    /// Forget the scripted count of `compartment`.
    pub fn clear_count(&self, compartment: CompartmentId) {
        lock(&self.state).counts.remove(&compartment);
    }

    /// Make the next `count` estimations fail.
    pub fn fail_next(&self, count: u32) {
        lock(&self.state).pending_failures += count;
    }

    /// Every estimation request so far, as (frame sequence, compartment).
    pub fn requests(&self) -> Vec<(u64, CompartmentId)> {
        lock(&self.state).requests.clone()
    }
}
