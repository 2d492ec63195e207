//! Mock QR switch for testing and development.

use std::sync::{Arc, Mutex};

use tokio::sync::watch;

use super::{lock, take_failure};
use crate::{HardwareError, Result, traits::SwitchDevice};

/// Mock two-position switch, off by default.
#[derive(Debug)]
pub struct MockSwitch {
    position_rx: watch::Receiver<bool>,
    pending_failures: Arc<Mutex<u32>>,
}

impl MockSwitch {
    /// Create a new mock switch in the off position.
    ///
    /// # Examples
    ///
    /// ```
    /// use pillbox_hardware::mock::MockSwitch;
    /// use pillbox_hardware::traits::SwitchDevice;
    ///
    /// #[tokio::main]
    /// async fn main() -> pillbox_hardware::Result<()> {
    ///     let (mut switch, handle) = MockSwitch::new();
    ///     assert!(!switch.is_on().await?);
    ///
    ///     handle.set(true);
    ///     assert!(switch.is_on().await?);
    ///     Ok(())
    /// }
    /// ```
    pub fn new() -> (Self, MockSwitchHandle) {
        let (position_tx, position_rx) = watch::channel(false);
        let pending_failures = Arc::new(Mutex::new(0));

        (
            Self {
                position_rx,
                pending_failures: Arc::clone(&pending_failures),
            },
            MockSwitchHandle {
                position_tx: Arc::new(position_tx),
                pending_failures,
            },
        )
    }
}

impl SwitchDevice for MockSwitch {
    async fn is_on(&mut self) -> Result<bool> {
        if take_failure(&mut lock(&self.pending_failures)) {
            return Err(HardwareError::communication("injected GPIO read failure"));
        }
        Ok(*self.position_rx.borrow_and_update())
    }
}

/// Handle for flipping a mock switch.
#[derive(Debug, Clone)]
pub struct MockSwitchHandle {
    position_tx: Arc<watch::Sender<bool>>,
    pending_failures: Arc<Mutex<u32>>,
}

impl MockSwitchHandle {
    pub fn set(&self, on: bool) {
        self.position_tx.send_replace(on);
    }

    pub fn is_on(&self) -> bool {
        *self.position_tx.borrow()
    }

    /// Make the next `count` reads fail.
    pub fn fail_next(&self, count: u32) {
        *lock(&self.pending_failures) += count;
    }
}
