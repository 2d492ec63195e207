//! Mock RFID reader implementation for testing and development.
//!
//! This module provides a simulated drawer reader whose tag-in-range state
//! is set through a handle. Placing a tag models an open drawer, removing
//! it models a closed one.

use std::sync::{Arc, Mutex};

use pillbox_core::TagId;
use tokio::sync::watch;

use super::{lock, take_failure};
use crate::{HardwareError, Result, traits::RfidDevice};

/// Mock RFID reader for testing and development.
///
/// # Examples
///
/// ```
/// use pillbox_core::TagId;
/// use pillbox_hardware::mock::MockRfid;
/// use pillbox_hardware::traits::RfidDevice;
///
/// #[tokio::main]
/// async fn main() -> pillbox_hardware::Result<()> {
///     let (mut reader, handle) = MockRfid::new();
///     assert_eq!(reader.poll_tag().await?, None);
///
///     handle.place_tag(TagId::new("1047839255856").unwrap());
///     assert!(reader.poll_tag().await?.is_some());
///
///     handle.remove_tag();
///     assert_eq!(reader.poll_tag().await?, None);
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct MockRfid {
    /// Tag currently in range, published by the handle.
    tag_rx: watch::Receiver<Option<TagId>>,

    /// Device name
    name: String,

    /// Injected failures and poll counter shared with the handle.
    state: Arc<Mutex<RfidState>>,
}

#[derive(Debug, Default)]
struct RfidState {
    pending_failures: u32,
    polls: u64,
}

impl MockRfid {
    /// Create a new mock RFID reader with the default name.
    pub fn new() -> (Self, MockRfidHandle) {
        Self::with_name("Mock RFID Reader".to_string())
    }

    /// Create a new mock RFID reader with a custom name.
    ///
    /// # Examples
    ///
    /// ```
    /// use pillbox_hardware::mock::MockRfid;
    ///
    /// let (reader, handle) = MockRfid::with_name("Drawer 2".to_string());
    /// assert_eq!(handle.name(), "Drawer 2");
    /// ```
    pub fn with_name(name: String) -> (Self, MockRfidHandle) {
        let (tag_tx, tag_rx) = watch::channel(None);
        let state = Arc::new(Mutex::new(RfidState::default()));

        let reader = Self {
            tag_rx,
            name: name.clone(),
            state: Arc::clone(&state),
        };

        let handle = MockRfidHandle {
            tag_tx: Arc::new(tag_tx),
            name,
            state,
        };

        (reader, handle)
    }
}

impl RfidDevice for MockRfid {
    async fn poll_tag(&mut self) -> Result<Option<TagId>> {
        {
            let mut state = lock(&self.state);
            state.polls += 1;
            if take_failure(&mut state.pending_failures) {
                return Err(HardwareError::tag_read(format!(
                    "{}: injected read failure",
                    self.name
                )));
            }
        }

        Ok(self.tag_rx.borrow_and_update().clone())
    }
}

/// Handle for controlling a mock RFID reader.
///
/// Clones share the same reader.
#[derive(Debug, Clone)]
pub struct MockRfidHandle {
    tag_tx: Arc<watch::Sender<Option<TagId>>>,

    /// Device name
    name: String,

    state: Arc<Mutex<RfidState>>,
}

impl MockRfidHandle {
    /// Bring a tag into range (drawer opened).
    pub fn place_tag(&self, tag: TagId) {
        self.tag_tx.send_replace(Some(tag));
    }

    /// Take the tag out of range (drawer closed).
    pub fn remove_tag(&self) {
        self.tag_tx.send_replace(None);
    }

    /// Tag currently in range, if any.
    pub fn current_tag(&self) -> Option<TagId> {
        self.tag_tx.borrow().clone()
    }

    /// Make the next `count` polls fail with a read error.
    pub fn fail_next(&self, count: u32) {
        lock(&self.state).pending_failures += count;
    }

    /// Number of polls performed so far, failed ones included.
    pub fn poll_count(&self) -> u64 {
        lock(&self.state).polls
    }

    /// Get the device name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tag(id: &str) -> TagId {
        TagId::new(id).unwrap()
    }

    #[tokio::test]
    async fn test_mock_rfid_empty_by_default() {
        let (mut reader, handle) = MockRfid::new();

        assert_eq!(reader.poll_tag().await.unwrap(), None);
        assert_eq!(handle.current_tag(), None);
    }

    #[tokio::test]
    async fn test_mock_rfid_place_and_remove() {
        let (mut reader, handle) = MockRfid::new();

        handle.place_tag(tag("04ABCDEF"));
        assert_eq!(reader.poll_tag().await.unwrap(), Some(tag("04ABCDEF")));
        // Tag stays in range across polls.
        assert_eq!(reader.poll_tag().await.unwrap(), Some(tag("04ABCDEF")));

        handle.remove_tag();
        assert_eq!(reader.poll_tag().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_mock_rfid_injected_failures() {
        let (mut reader, handle) = MockRfid::new();
        handle.place_tag(tag("1047839255856"));
        handle.fail_next(2);

        assert!(matches!(
            reader.poll_tag().await,
            Err(HardwareError::TagReadError { .. })
        ));
        assert!(reader.poll_tag().await.is_err());
        assert!(reader.poll_tag().await.unwrap().is_some());
        assert_eq!(handle.poll_count(), 3);
    }

    #[tokio::test]
    async fn test_mock_rfid_handle_clone_shares_reader() {
        let (mut reader, handle) = MockRfid::new();
        let clone = handle.clone();

        clone.place_tag(tag("A1"));
        assert_eq!(handle.current_tag(), Some(tag("A1")));
        assert_eq!(reader.poll_tag().await.unwrap(), Some(tag("A1")));
    }

    #[tokio::test]
    async fn test_mock_rfid_failure_names_reader() {
        let (mut reader, handle) = MockRfid::with_name("Drawer 3".to_string());
        handle.fail_next(1);

        let err = reader.poll_tag().await.unwrap_err();
        assert_eq!(err.to_string(), "Tag read error: Drawer 3: injected read failure");
    }
}
