#![allow(async_fn_in_trait)]

pub mod json;
pub mod memory;

pub use json::JsonLogStore;
pub use memory::MemoryLogStore;

use chrono::NaiveDate;

use crate::error::StorageResult;
use crate::models::{ConsumptionRecord, DailyLog, LogEntry};

/// Durable per-day consumption log.
///
/// A store has a single writer: the controller owns it and appends one
/// record per completed cycle.
///
/// # Implementation Note
///
/// This trait uses native async trait methods (Edition 2024 feature),
/// eliminating the need for the async-trait crate while maintaining
/// full async/await support in trait methods.
pub trait LogStore: Send + Sync {
    /// Append the entry derived from `record` to the log of the record's
    /// date, creating that log if needed.
    ///
    /// The entry is durable once this returns `Ok`. On error nothing was
    /// written and subsequent reads are unaffected.
    async fn append(&mut self, record: &ConsumptionRecord) -> StorageResult<LogEntry>;

    /// The log of `date`, empty if nothing was recorded that day.
    async fn read(&self, date: NaiveDate) -> StorageResult<DailyLog>;
}
