//! In-memory store for tests and simulation.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::NaiveDate;
use tracing::debug;

use super::LogStore;
use crate::error::{StorageError, StorageResult};
use crate::models::{ConsumptionRecord, DailyLog, LogEntry};

/// Log store kept in memory.
///
/// Clones share the same logs, so a test can keep one clone to inspect what
/// the controller wrote through another. Write failures can be injected with
/// [`fail_next`](Self::fail_next).
#[derive(Debug, Clone, Default)]
pub struct MemoryLogStore {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Debug, Default)]
struct Inner {
    logs: BTreeMap<NaiveDate, DailyLog>,
    pending_failures: u32,
    writes: u64,
}

impl MemoryLogStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` appends fail with `StorageError::WriteFailed`.
    pub fn fail_next(&self, count: u32) {
        self.lock().pending_failures += count;
    }

    /// Number of successful appends.
    pub fn write_count(&self) -> u64 {
        self.lock().writes
    }

    /// Synchronous snapshot of the log of `date`.
    pub fn snapshot(&self, date: NaiveDate) -> DailyLog {
        self.lock()
            .logs
            .get(&date)
            .cloned()
            .unwrap_or_else(|| DailyLog::new(date))
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl LogStore for MemoryLogStore {
    async fn append(&mut self, record: &ConsumptionRecord) -> StorageResult<LogEntry> {
        let mut inner = self.lock();

        if inner.pending_failures > 0 {
            inner.pending_failures -= 1;
            return Err(StorageError::WriteFailed("injected write failure".to_string()));
        }

        let date = record.date();
        let entry = record.to_entry();
        inner
            .logs
            .entry(date)
            .or_insert_with(|| DailyLog::new(date))
            .push(entry.clone());
        inner.writes += 1;

        debug!(date = %date, compartment = %entry.compartment_label(), quantity = entry.quantity, "consumption logged in memory");
        Ok(entry)
    }

    async fn read(&self, date: NaiveDate) -> StorageResult<DailyLog> {
        Ok(self.snapshot(date))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pillbox_core::CompartmentId;

    fn record(previous: u32, new: u32) -> ConsumptionRecord {
        ConsumptionRecord::new(
            NaiveDate::from_ymd_opt(2025, 3, 14)
                .unwrap()
                .and_hms_opt(9, 30, 0)
                .unwrap(),
            CompartmentId::new(1).unwrap(),
            "Ibuprofen",
            Some(previous),
            new,
        )
    }

    #[tokio::test]
    async fn test_append_and_read() {
        let mut store = MemoryLogStore::new();
        let observer = store.clone();

        store.append(&record(6, 5)).await.unwrap();

        let log = observer
            .read(NaiveDate::from_ymd_opt(2025, 3, 14).unwrap())
            .await
            .unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log.entries()[0].quantity, 1);
        assert_eq!(observer.write_count(), 1);
    }

    #[tokio::test]
    async fn test_injected_failure_writes_nothing() {
        let mut store = MemoryLogStore::new();
        store.fail_next(1);

        let result = store.append(&record(6, 5)).await;
        assert!(matches!(result, Err(StorageError::WriteFailed(_))));
        assert!(
            store
                .snapshot(NaiveDate::from_ymd_opt(2025, 3, 14).unwrap())
                .is_empty()
        );

        store.append(&record(6, 5)).await.unwrap();
        assert_eq!(store.write_count(), 1);
    }
}
