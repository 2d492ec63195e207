//! Storage layer for the pillbox medicine box.
//!
//! This crate persists the per-day consumption log and the frames captured
//! after each authorized drawer cycle.
//!
//! # Architecture
//!
//! - [`LogStore`] - append/read contract used by the controller
//! - [`JsonLogStore`] - one `YYYY-MM-DD.json` file per day, written durably
//! - [`MemoryLogStore`] - shared in-memory store with failure injection
//! - [`FrameArchive`] - `image_YYYYMMDD-HHMMSS.jpg` files in a capture directory
//!
//! # Persisted format
//!
//! ```json
//! {
//!   "date": "2025-03-14",
//!   "log": [
//!     {"time": "09:30 AM", "compartment": 2, "medicine": "Paracetamol", "quantity": 2}
//!   ]
//! }
//! ```
//!
//! # Examples
//!
//! ```no_run
//! use chrono::Local;
//! use pillbox_core::CompartmentId;
//! use pillbox_storage::{ConsumptionRecord, JsonLogStore, LogStore};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut store = JsonLogStore::open("/var/lib/pillbox/logs").await?;
//!
//! let record = ConsumptionRecord::new(
//!     Local::now().naive_local(),
//!     CompartmentId::new(2)?,
//!     "Paracetamol",
//!     Some(10),
//!     8,
//! );
//! let entry = store.append(&record).await?;
//! assert_eq!(entry.quantity, 2);
//! # Ok(())
//! # }
//! ```

pub mod archive;
pub mod error;
pub mod models;
pub mod stores;

pub use archive::FrameArchive;
pub use error::{StorageError, StorageResult};
pub use models::{ConsumptionRecord, DailyLog, LogEntry};
pub use stores::{JsonLogStore, LogStore, MemoryLogStore};
