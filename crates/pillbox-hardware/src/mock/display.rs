//! Mock OLED display backed by a [`VirtualDisplay`].
//!
//! Every accepted write is recorded as a [`DisplayOp`] so tests can assert
//! on what was shown and in which order. Scan messages expire against the
//! Tokio clock, so paused-time tests can step past them.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use super::{lock, take_failure};
use crate::{HardwareError, Result, traits::DisplayDevice, virtual_display::VirtualDisplay};

/// One accepted display write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplayOp {
    Message { text: String, duration: Duration },
    Qr(String),
    Clear,
}

/// Mock display device.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use pillbox_hardware::mock::{DisplayOp, MockDisplay};
/// use pillbox_hardware::traits::DisplayDevice;
///
/// #[tokio::main]
/// async fn main() -> pillbox_hardware::Result<()> {
///     let (mut display, handle) = MockDisplay::new();
///     display.show_message("AUTHORIZED", Duration::from_secs(2)).await?;
///
///     assert_eq!(handle.last_message().as_deref(), Some("AUTHORIZED"));
///     assert_eq!(handle.ops().len(), 1);
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct MockDisplay {
    state: Arc<Mutex<DisplayState>>,
}

#[derive(Debug, Default)]
struct DisplayState {
    screen: VirtualDisplay,
    ops: Vec<DisplayOp>,
    pending_failures: u32,
}

impl DisplayState {
    /// Screen with any expired message already dropped.
    fn screen(&mut self) -> &VirtualDisplay {
        self.screen.update_at(now());
        &self.screen
    }
}

fn now() -> Instant {
    tokio::time::Instant::now().into_std()
}

impl MockDisplay {
    pub fn new() -> (Self, MockDisplayHandle) {
        let state = Arc::new(Mutex::new(DisplayState::default()));
        (
            Self {
                state: Arc::clone(&state),
            },
            MockDisplayHandle { state },
        )
    }

    fn write(&self, op: DisplayOp) -> Result<()> {
        let mut state = lock(&self.state);
        state.screen.update_at(now());

        if take_failure(&mut state.pending_failures) {
            return Err(HardwareError::display("injected write failure"));
        }

        match &op {
            DisplayOp::Message { text, duration } => state
                .screen
                .show_temporary_at(text, *duration, now())
                .map_err(|e| HardwareError::display(e.to_string()))?,
            DisplayOp::Qr(payload) => state.screen.show_qr(payload),
            DisplayOp::Clear => state.screen.clear(),
        }

        state.ops.push(op);
        Ok(())
    }
}

impl DisplayDevice for MockDisplay {
    async fn show_message(&mut self, text: &str, duration: Duration) -> Result<()> {
        self.write(DisplayOp::Message {
            text: text.to_string(),
            duration,
        })
    }

    async fn show_qr(&mut self, payload: &str) -> Result<()> {
        self.write(DisplayOp::Qr(payload.to_string()))
    }

    async fn clear(&mut self) -> Result<()> {
        self.write(DisplayOp::Clear)
    }
}

/// Handle for inspecting a mock display.
#[derive(Debug, Clone)]
pub struct MockDisplayHandle {
    state: Arc<Mutex<DisplayState>>,
}

impl MockDisplayHandle {
    /// All accepted writes, oldest first.
    pub fn ops(&self) -> Vec<DisplayOp> {
        lock(&self.state).ops.clone()
    }

    /// Text of the most recent message write, if any.
    pub fn last_message(&self) -> Option<String> {
        lock(&self.state).ops.iter().rev().find_map(|op| match op {
            DisplayOp::Message { text, .. } => Some(text.clone()),
            _ => None,
        })
    }

    /// Payload of the QR code currently on screen.
    pub fn current_qr(&self) -> Option<String> {
        lock(&self.state).screen().qr_payload().map(str::to_string)
    }

    /// Scan message currently on screen, if it has not expired yet.
    pub fn current_message(&self) -> Option<String> {
        lock(&self.state).screen().message().map(str::to_string)
    }

    /// Number of QR renders so far.
    pub fn qr_render_count(&self) -> usize {
        lock(&self.state)
            .ops
            .iter()
            .filter(|op| matches!(op, DisplayOp::Qr(_)))
            .count()
    }

    /// Snapshot of the text buffer.
    pub fn lines(&self) -> Vec<String> {
        lock(&self.state)
            .screen()
            .get_all_lines()
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    /// Make the next `count` writes fail.
    pub fn fail_next(&self, count: u32) {
        lock(&self.state).pending_failures += count;
    }

    /// Forget recorded writes. The screen content is kept.
    pub fn clear_ops(&self) {
        lock(&self.state).ops.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_display_records_ops_in_order() {
        let (mut display, handle) = MockDisplay::new();

        display
            .show_message("UNAUTHORIZED", Duration::from_secs(2))
            .await
            .unwrap();
        display.show_qr("2025-03-14").await.unwrap();
        display.clear().await.unwrap();

        assert_eq!(
            handle.ops(),
            vec![
                DisplayOp::Message {
                    text: "UNAUTHORIZED".to_string(),
                    duration: Duration::from_secs(2),
                },
                DisplayOp::Qr("2025-03-14".to_string()),
                DisplayOp::Clear,
            ]
        );
        assert_eq!(handle.current_qr(), None);
        assert_eq!(handle.qr_render_count(), 1);
    }

    #[tokio::test]
    async fn test_mock_display_message_lands_in_buffer() {
        let (mut display, handle) = MockDisplay::new();
        display
            .show_message("AUTHORIZED", Duration::from_secs(2))
            .await
            .unwrap();

        assert!(handle.lines().iter().any(|line| line.trim() == "AUTHORIZED"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_mock_display_message_expires() {
        let (mut display, handle) = MockDisplay::new();
        display
            .show_message("UNAUTHORIZED", Duration::from_secs(2))
            .await
            .unwrap();

        tokio::time::advance(Duration::from_millis(1_999)).await;
        assert_eq!(handle.current_message().as_deref(), Some("UNAUTHORIZED"));

        tokio::time::advance(Duration::from_millis(1)).await;
        assert_eq!(handle.current_message(), None);
        assert!(handle.lines().iter().all(|line| line.trim().is_empty()));
        // The write history is kept.
        assert_eq!(handle.last_message().as_deref(), Some("UNAUTHORIZED"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_mock_display_qr_survives_message_deadline() {
        let (mut display, handle) = MockDisplay::new();
        display
            .show_message("AUTHORIZED", Duration::from_secs(2))
            .await
            .unwrap();
        display.show_qr("2025-03-14").await.unwrap();

        tokio::time::advance(Duration::from_secs(3)).await;
        assert_eq!(handle.current_qr().as_deref(), Some("2025-03-14"));
    }

    #[tokio::test]
    async fn test_mock_display_failure_not_recorded() {
        let (mut display, handle) = MockDisplay::new();
        handle.fail_next(1);

        assert!(matches!(
            display.show_qr("payload").await,
            Err(HardwareError::DisplayError { .. })
        ));
        assert!(handle.ops().is_empty());
        assert_eq!(handle.current_qr(), None);

        display.show_qr("payload").await.unwrap();
        assert_eq!(handle.current_qr().as_deref(), Some("payload"));
    }

    #[tokio::test]
    async fn test_mock_display_zero_duration_rejected() {
        let (mut display, handle) = MockDisplay::new();

        assert!(display.show_message("X", Duration::ZERO).await.is_err());
        assert!(handle.ops().is_empty());
    }
}
