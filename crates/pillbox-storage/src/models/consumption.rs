use chrono::{NaiveDate, NaiveDateTime};
use pillbox_core::CompartmentId;
use serde::{Deserialize, Serialize};

use super::LogEntry;

/// Outcome of one authorized drawer cycle, as handed to a log store.
///
/// # Examples
///
/// ```
/// use chrono::NaiveDate;
/// use pillbox_core::CompartmentId;
/// use pillbox_storage::models::ConsumptionRecord;
///
/// let timestamp = NaiveDate::from_ymd_opt(2025, 3, 14)
///     .unwrap()
///     .and_hms_opt(9, 30, 0)
///     .unwrap();
/// let record = ConsumptionRecord::new(
///     timestamp,
///     CompartmentId::new(2).unwrap(),
///     "Paracetamol",
///     Some(10),
///     8,
/// );
///
/// assert_eq!(record.quantity(), 2);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumptionRecord {
    /// Local wall-clock time of the capture.
    pub timestamp: NaiveDateTime,

    pub compartment: CompartmentId,

    pub medicine: String,

    /// Last known count before the cycle, `None` if never observed.
    pub previous_count: Option<u32>,

    /// Count estimated from the captured frame.
    pub new_count: u32,
}

impl ConsumptionRecord {
    pub fn new(
        timestamp: NaiveDateTime,
        compartment: CompartmentId,
        medicine: impl Into<String>,
        previous_count: Option<u32>,
        new_count: u32,
    ) -> Self {
        Self {
            timestamp,
            compartment,
            medicine: medicine.into(),
            previous_count,
            new_count,
        }
    }

    /// Strips consumed during the cycle.
    ///
    /// An unknown previous count and an apparent increase both give zero.
    pub fn quantity(&self) -> u32 {
        self.previous_count
            .map_or(0, |previous| previous.saturating_sub(self.new_count))
    }

    /// Returns `true` if the new count is higher than the previous one.
    pub fn is_increase(&self) -> bool {
        self.previous_count
            .is_some_and(|previous| self.new_count > previous)
    }

    /// Calendar day the record belongs to.
    pub fn date(&self) -> NaiveDate {
        self.timestamp.date()
    }

    /// The log entry this record produces.
    pub fn to_entry(&self) -> LogEntry {
        LogEntry::new(
            self.timestamp.time(),
            self.compartment,
            self.medicine.clone(),
            self.quantity(),
        )
    }
}
