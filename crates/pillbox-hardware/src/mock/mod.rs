//! Mock device implementations for testing and development.
//!
//! This module provides simulated device implementations that can be controlled
//! programmatically without requiring physical hardware. Every constructor
//! returns a `(device, handle)` pair: the device goes to the controller, the
//! handle stays with the test or simulation driving it.

pub mod camera;
pub mod display;
pub mod estimator;
pub mod rfid;
pub mod switch;

use std::sync::{Mutex, MutexGuard, PoisonError};

// Re-export commonly used types
pub use camera::{MockCamera, MockCameraHandle};
pub use display::{DisplayOp, MockDisplay, MockDisplayHandle};
pub use estimator::{MockEstimator, MockEstimatorHandle};
pub use rfid::{MockRfid, MockRfidHandle};
pub use switch::{MockSwitch, MockSwitchHandle};

/// Lock shared mock state, recovering it if a test thread panicked while
/// holding the lock.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Consume one pending injected failure, if any.
fn take_failure(pending: &mut u32) -> bool {
    if *pending > 0 {
        *pending -= 1;
        true
    } else {
        false
    }
}
