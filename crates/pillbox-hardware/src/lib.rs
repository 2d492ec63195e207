//! Hardware device abstraction layer for the pillbox medicine box.
//!
//! This crate provides trait-based abstractions for the peripherals of the
//! box: one RFID reader per drawer, a still camera, an external strip
//! counter, the OLED display and the manual QR switch. The traits enable
//! easy substitution between mock implementations (for development and
//! testing) and real hardware drivers.
//!
//! # Design Philosophy
//!
//! - **Async-first**: All I/O operations are asynchronous using native `async fn`
//!   in traits (Rust 1.90 + Edition 2024 RPITIT).
//! - **Poll-based input**: readers and the switch are sampled once per
//!   controller cycle and never block waiting for an event.
//! - **Thread-safe**: All traits require `Send + Sync` for use with Tokio.
//! - **Error-aware**: All operations return `Result<T>` with detailed error information.
//!
//! # Example
//!
//! ```no_run
//! use pillbox_core::CompartmentId;
//! use pillbox_hardware::traits::{CameraDevice, CountEstimator};
//! use pillbox_hardware::Result;
//!
//! async fn count_strips<C: CameraDevice, E: CountEstimator>(
//!     camera: &mut C,
//!     estimator: &mut E,
//!     compartment: CompartmentId,
//! ) -> Result<u32> {
//!     let frame = camera.capture_frame().await?;
//!     estimator.estimate(&frame, compartment).await
//! }
//! ```
//!
//! # Mock Implementations
//!
//! The [`mock`] module provides controllable devices; each constructor
//! returns the device together with a handle used to drive or inspect it.

pub mod error;
pub mod mock;
pub mod traits;
pub mod types;
pub mod virtual_display;

// Re-export commonly used types for convenience
pub use error::{HardwareError, Result};
pub use traits::{CameraDevice, CountEstimator, DisplayDevice, RfidDevice, SwitchDevice};
pub use types::Frame;
pub use virtual_display::VirtualDisplay;
