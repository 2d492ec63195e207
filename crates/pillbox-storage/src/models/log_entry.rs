use chrono::{NaiveTime, Timelike};
use pillbox_core::CompartmentId;
use serde::{Deserialize, Serialize};

use super::clock_time;

/// One consumption event in a daily log.
///
/// Entries are append-only: once written to a log file they are never
/// modified. The time of day is kept at minute precision, which is all the
/// persisted `HH:MM AM` format can carry. Files written before entries
/// carried a compartment still load; such entries have `compartment: None`.
///
/// # Examples
///
/// ```
/// use chrono::NaiveTime;
/// use pillbox_core::CompartmentId;
/// use pillbox_storage::models::LogEntry;
///
/// let entry = LogEntry::new(
///     NaiveTime::from_hms_opt(21, 5, 42).unwrap(),
///     CompartmentId::new(2).unwrap(),
///     "Paracetamol",
///     2,
/// );
///
/// assert_eq!(entry.clock_time(), "09:05 PM");
/// assert_eq!(
///     serde_json::to_string(&entry).unwrap(),
///     r#"{"time":"09:05 PM","compartment":2,"medicine":"Paracetamol","quantity":2}"#
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    #[serde(with = "clock_time")]
    pub time: NaiveTime,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compartment: Option<CompartmentId>,

    pub medicine: String,

    /// Strips taken out during the cycle. Never negative.
    pub quantity: u32,
}

impl LogEntry {
    /// Create an entry; the time is truncated to the minute.
    pub fn new(
        time: NaiveTime,
        compartment: CompartmentId,
        medicine: impl Into<String>,
        quantity: u32,
    ) -> Self {
        let time = NaiveTime::from_hms_opt(time.hour(), time.minute(), 0).unwrap_or(time);
        Self {
            time,
            compartment: Some(compartment),
            medicine: medicine.into(),
            quantity,
        }
    }

    /// Time of day in the persisted `HH:MM AM` form.
    pub fn clock_time(&self) -> String {
        self.time
            .format(pillbox_core::constants::LOG_TIME_FORMAT)
            .to_string()
    }

    /// Short drawer label, `C2`, or `C?` when the entry has no compartment.
    pub fn compartment_label(&self) -> String {
        match self.compartment {
            Some(id) => format!("C{id}"),
            None => "C?".to_string(),
        }
    }
}
