//! Virtual OLED display for the medicine box.
//!
//! This module provides a virtual 8-line × 21-column text buffer standing in
//! for the 128×64 SH1106 panel (6×8 pixel font). It handles centered scan
//! messages that expire after their duration and a QR mode holding the
//! payload currently shown.
//!
//! # Character Encoding - ASCII Only
//!
//! The panel font only covers printable ASCII (0x20-0x7E). Control and
//! non-ASCII characters are stripped before rendering.
//!
//! # Examples
//!
//! ```
//! use std::time::{Duration, Instant};
//! use pillbox_hardware::VirtualDisplay;
//!
//! let start = Instant::now();
//! let mut display = VirtualDisplay::new();
//! display
//!     .show_temporary_at("AUTHORIZED", Duration::from_secs(2), start)
//!     .unwrap();
//! assert_eq!(display.message(), Some("AUTHORIZED"));
//!
//! assert!(display.update_at(start + Duration::from_secs(2)));
//! assert!(display.is_blank());
//! ```

use std::time::{Duration, Instant};

use pillbox_core::{
    Error, Result,
    constants::{OLED_HEIGHT, OLED_WIDTH},
};

/// Glyph width of the panel font, in pixels.
const GLYPH_WIDTH: u32 = 6;

/// Glyph height of the panel font, in pixels.
const GLYPH_HEIGHT: u32 = 8;

const LINES: usize = (OLED_HEIGHT / GLYPH_HEIGHT) as usize;

const COLUMNS: usize = (OLED_WIDTH / GLYPH_WIDTH) as usize;

/// Line used for scan messages (pixel row 20 on the real panel).
const MESSAGE_LINE: usize = 2;

/// Virtual OLED display.
///
/// # Thread Safety
///
/// This struct is not thread-safe. In async contexts, protect access using a
/// mutex, as [`MockDisplay`](crate::mock::MockDisplay) does.
#[derive(Debug, Clone)]
pub struct VirtualDisplay {
    /// Current text buffer (ASCII characters only).
    buffer: Vec<String>,

    /// Temporary message with expiration timestamp.
    temporary_message: Option<(String, Instant)>,

    /// Payload of the QR code currently drawn, if any.
    qr_payload: Option<String>,
}

impl VirtualDisplay {
    /// Create a blank panel.
    pub fn new() -> Self {
        Self {
            buffer: vec![" ".repeat(COLUMNS); LINES],
            temporary_message: None,
            qr_payload: None,
        }
    }

    /// Show `text` centered on the message line until `now + duration`.
    ///
    /// Every other line is blanked and any QR code is dropped. Once
    /// [`update_at`](Self::update_at) sees the deadline pass, the panel goes
    /// blank again.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidDuration` if the duration is zero.
    pub fn show_temporary_at(&mut self, text: &str, duration: Duration, now: Instant) -> Result<()> {
        if duration.is_zero() {
            return Err(Error::InvalidDuration);
        }

        let sanitized = sanitize_text(text);
        self.clear();
        self.buffer[MESSAGE_LINE] = center_text(&sanitized, COLUMNS);
        self.temporary_message = Some((sanitized, now + duration));
        Ok(())
    }

    /// Drop an expired temporary message.
    ///
    /// Returns `true` if the display content changed.
    pub fn update_at(&mut self, now: Instant) -> bool {
        if let Some((_, expiration)) = self.temporary_message
            && now >= expiration
        {
            self.clear();
            return true;
        }
        false
    }

    /// Draw a QR code for `payload`, replacing any text.
    pub fn show_qr(&mut self, payload: &str) {
        self.clear();
        self.qr_payload = Some(payload.to_string());
    }

    /// Blank the panel: no text, no QR code, no pending message.
    pub fn clear(&mut self) {
        for line in &mut self.buffer {
            *line = " ".repeat(COLUMNS);
        }
        self.temporary_message = None;
        self.qr_payload = None;
    }

    /// All lines, padded to the column width.
    pub fn get_all_lines(&self) -> Vec<&str> {
        self.buffer.iter().map(|s| s.as_str()).collect()
    }

    /// Text of the active temporary message, if any.
    pub fn message(&self) -> Option<&str> {
        self.temporary_message.as_ref().map(|(text, _)| text.as_str())
    }

    /// Payload of the QR code on screen, if any.
    pub fn qr_payload(&self) -> Option<&str> {
        self.qr_payload.as_deref()
    }

    pub fn is_showing_qr(&self) -> bool {
        self.qr_payload.is_some()
    }

    /// No message, no QR code and no text.
    pub fn is_blank(&self) -> bool {
        self.temporary_message.is_none()
            && self.qr_payload.is_none()
            && self.buffer.iter().all(|line| line.trim().is_empty())
    }
}

impl Default for VirtualDisplay {
    fn default() -> Self {
        Self::new()
    }
}

/// Center ASCII text within `width`, truncating what does not fit.
fn center_text(text: &str, width: usize) -> String {
    let char_count = text.chars().count();
    if char_count >= width {
        return text.chars().take(width).collect();
    }

    let padding = width - char_count;
    let left_pad = padding / 2;
    format!(
        "{}{}{}",
        " ".repeat(left_pad),
        text,
        " ".repeat(padding - left_pad)
    )
}

/// Strip control and non-ASCII characters, then trim.
fn sanitize_text(text: &str) -> String {
    text.chars()
        .filter(|c| c.is_ascii() && !c.is_control())
        .collect::<String>()
        .trim()
        .to_string()
}
