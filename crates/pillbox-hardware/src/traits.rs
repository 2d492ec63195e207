//! Hardware device trait definitions.
//!
//! This module defines trait interfaces for the peripherals of the medicine
//! box: one RFID reader per drawer, the camera, the external strip counter,
//! the OLED display and the manual QR switch. These traits establish the
//! contract between the controller and the devices, enabling easy
//! substitution between mock and real hardware implementations.
//!
//! All traits use native `async fn` methods (Rust 1.90 + Edition 2024 RPITIT),
//! eliminating the need for the `async_trait` macro.

#![allow(async_fn_in_trait)]

use std::time::Duration;

use pillbox_core::{CompartmentId, TagId};

use crate::error::Result;
use crate::types::Frame;

/// RFID reader mounted beneath one drawer.
///
/// The drawer tag is in range while the drawer is open and out of range once
/// it is closed. Readers are polled, never awaited for a card.
///
/// # Object Safety
///
/// **NOTE**: This trait is NOT object-safe because `async fn` methods return
/// `impl Future`. Use generic type parameters instead of `dyn RfidDevice`.
///
/// # Examples
///
/// ```no_run
/// use pillbox_hardware::traits::RfidDevice;
/// use pillbox_hardware::error::Result;
///
/// async fn drawer_open<R: RfidDevice>(reader: &mut R) -> Result<bool> {
///     Ok(reader.poll_tag().await?.is_some())
/// }
/// ```
pub trait RfidDevice: Send + Sync {
    /// Non-blocking read of the tag currently in range.
    ///
    /// Returns `Ok(None)` when no tag is in range.
    ///
    /// # Errors
    ///
    /// Returns an error if the tag could not be read (collision, CRC error)
    /// or the reader stopped answering.
    async fn poll_tag(&mut self) -> Result<Option<TagId>>;
}

/// Still camera looking at the compartments.
pub trait CameraDevice: Send + Sync {
    /// Capture a single frame.
    ///
    /// # Errors
    ///
    /// Returns an error if the sensor could not produce a frame.
    async fn capture_frame(&mut self) -> Result<Frame>;
}

/// Strip counter: turns a frame into the number of strips left in one
/// compartment.
///
/// The counting algorithm itself lives outside this workspace.
pub trait CountEstimator: Send + Sync {
    /// Estimate the strip count of `compartment` in `frame`.
    ///
    /// # Errors
    ///
    /// Returns an error if the frame could not be analysed.
    async fn estimate(&mut self, frame: &Frame, compartment: CompartmentId) -> Result<u32>;
}

/// Monochrome OLED display.
///
/// The display shows either a short text message or one QR payload. How the
/// payload is rasterized is up to the implementation.
pub trait DisplayDevice: Send + Sync {
    /// Show `text` for `duration`, then revert to a blank screen.
    ///
    /// # Errors
    ///
    /// Returns an error if the panel did not accept the write.
    async fn show_message(&mut self, text: &str, duration: Duration) -> Result<()>;

    /// Show `payload` as a QR code until cleared or replaced.
    ///
    /// # Errors
    ///
    /// Returns an error if the panel did not accept the write.
    async fn show_qr(&mut self, payload: &str) -> Result<()>;

    /// Blank the panel.
    ///
    /// # Errors
    ///
    /// Returns an error if the panel did not accept the write.
    async fn clear(&mut self) -> Result<()>;
}

/// Two-position switch requesting the QR view.
pub trait SwitchDevice: Send + Sync {
    /// Sample the switch.
    ///
    /// # Errors
    ///
    /// Returns an error if the input line could not be read.
    async fn is_on(&mut self) -> Result<bool>;
}
