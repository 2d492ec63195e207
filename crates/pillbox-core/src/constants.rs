//! Core constants for the medicine box.
//!
//! Timing defaults mirror the behaviour of the physical device: the reader
//! loop polls every 100 ms, a closed drawer settles for 5 seconds before the
//! camera fires, and scan messages stay on the OLED for 2 seconds.
//!
//! # Usage
//!
//! ```
//! use pillbox_core::constants::*;
//! use std::time::Duration;
//!
//! let settle = Duration::from_millis(DEFAULT_SETTLE_DELAY_MS);
//! assert_eq!(settle.as_secs(), 5);
//! assert!(MIN_COMPARTMENT <= MAX_COMPARTMENT);
//! ```

// ============================================================================
// Compartments
// ============================================================================

/// Lowest compartment index.
pub const MIN_COMPARTMENT: u8 = 1;

/// Highest compartment index (one RFID reader per compartment).
pub const MAX_COMPARTMENT: u8 = 4;

// ============================================================================
// Tags
// ============================================================================

/// Minimum tag identifier length in characters.
pub const MIN_TAG_LENGTH: usize = 1;

/// Maximum tag identifier length in characters.
///
/// Decimal renderings of 8-byte UIDs need 20 digits; 32 leaves room for
/// hexadecimal renderings of 10-byte UIDs plus a prefix.
pub const MAX_TAG_LENGTH: usize = 32;

// ============================================================================
// Timing
// ============================================================================

/// Default interval between two polling cycles, in milliseconds.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 100;

/// Default lighting stabilization delay after a drawer closes, in milliseconds.
pub const DEFAULT_SETTLE_DELAY_MS: u64 = 5_000;

/// Default duration of the AUTHORIZED / UNAUTHORIZED message, in milliseconds.
pub const DEFAULT_MESSAGE_DURATION_MS: u64 = 2_000;

// ============================================================================
// Display / QR
// ============================================================================

/// OLED panel width in pixels.
pub const OLED_WIDTH: u32 = 128;

/// OLED panel height in pixels.
pub const OLED_HEIGHT: u32 = 64;

/// Default upper bound of the QR payload, in bytes.
///
/// QR version 11 is 61 modules wide; with a one-module border it takes 63
/// pixels at one pixel per module, the largest symbol that fits the panel
/// height. Its byte-mode capacity at error correction level L is 321.
pub const DEFAULT_QR_MAX_PAYLOAD: usize = 321;

// ============================================================================
// Persisted log format
// ============================================================================

/// Date format of the `date` field and of daily log file names.
pub const LOG_DATE_FORMAT: &str = "%Y-%m-%d";

/// Time format of the `time` field of a log entry (12-hour clock).
pub const LOG_TIME_FORMAT: &str = "%I:%M %p";

/// File name format of archived frames.
pub const FRAME_FILE_FORMAT: &str = "image_%Y%m%d-%H%M%S.jpg";
