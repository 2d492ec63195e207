//! Pillbox controller crate.
//!
//! This crate contains the drawer state machines, the tag allow-list, the
//! QR publisher and the polling loop that drives them against the devices
//! of `pillbox-hardware` and a `pillbox-storage` log store.
//!
//! # Examples
//!
//! ```no_run
//! use pillbox_controller::{Controller, ControllerConfig, Peripherals, SystemClock};
//! use pillbox_core::CompartmentId;
//! use pillbox_hardware::mock::{MockCamera, MockDisplay, MockEstimator, MockRfid, MockSwitch};
//! use pillbox_storage::JsonLogStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ControllerConfig::load_from_file("pillbox.toml".as_ref())?;
//! let store = JsonLogStore::open(&config.log_dir).await?;
//!
//! let peripherals = Peripherals {
//!     readers: vec![(CompartmentId::new(1)?, MockRfid::new().0)],
//!     camera: MockCamera::new().0,
//!     estimator: MockEstimator::new().0,
//!     display: MockDisplay::new().0,
//!     switch: MockSwitch::new().0,
//! };
//!
//! let mut controller = Controller::new(&config, peripherals, store, SystemClock)?;
//! controller
//!     .run_until(async { tokio::signal::ctrl_c().await.unwrap_or(()) }, |event| println!("{event}"))
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod access;
pub mod clock;
pub mod config;
pub mod controller;
pub mod error;
pub mod qr;
pub mod state_machine;

pub use access::AccessController;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{AccessConfig, CompartmentConfig, ControllerConfig};
pub use controller::{Controller, ControllerEvent, Peripherals};
pub use error::{ControllerError, Result};
pub use qr::{QrAction, QrPublisher};
pub use state_machine::{DrawerEvent, DrawerMonitor, DrawerState, StateTransition};
