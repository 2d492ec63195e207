use chrono::NaiveDate;
use pillbox_core::CompartmentId;
use serde::{Deserialize, Serialize};

use super::LogEntry;

/// All consumption entries of one calendar day, in insertion order.
///
/// Serializes to the persisted file layout:
///
/// ```json
/// {"date": "2025-03-14", "log": [{"time": "09:30 AM", "compartment": 2, "medicine": "Paracetamol", "quantity": 2}]}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyLog {
    pub date: NaiveDate,

    #[serde(rename = "log")]
    entries: Vec<LogEntry>,
}

impl DailyLog {
    /// Create an empty log for `date`.
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            entries: Vec::new(),
        }
    }

    /// Append an entry at the end of the log.
    pub fn push(&mut self, entry: LogEntry) {
        self.entries.push(entry);
    }

    /// Entries in insertion order.
    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total strips taken during the day.
    pub fn total_quantity(&self) -> u64 {
        self.entries.iter().map(|e| u64::from(e.quantity)).sum()
    }

    /// Strips taken from one compartment during the day.
    pub fn quantity_for(&self, compartment: CompartmentId) -> u64 {
        self.entries
            .iter()
            .filter(|e| e.compartment == Some(compartment))
            .map(|e| u64::from(e.quantity))
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;

    fn entry(hour: u32, compartment: u8, medicine: &str, quantity: u32) -> LogEntry {
        LogEntry::new(
            NaiveTime::from_hms_opt(hour, 0, 0).unwrap(),
            CompartmentId::new(compartment).unwrap(),
            medicine,
            quantity,
        )
    }

    #[test]
    fn test_new_log_is_empty() {
        let log = DailyLog::new(NaiveDate::from_ymd_opt(2025, 3, 14).unwrap());

        assert!(log.is_empty());
        assert_eq!(log.total_quantity(), 0);
        assert_eq!(
            serde_json::to_string(&log).unwrap(),
            r#"{"date":"2025-03-14","log":[]}"#
        );
    }

    #[test]
    fn test_insertion_order_kept() {
        let mut log = DailyLog::new(NaiveDate::from_ymd_opt(2025, 3, 14).unwrap());
        log.push(entry(21, 1, "Ibuprofen", 1));
        log.push(entry(8, 2, "Paracetamol", 2));

        let medicines: Vec<&str> = log.entries().iter().map(|e| e.medicine.as_str()).collect();
        assert_eq!(medicines, vec!["Ibuprofen", "Paracetamol"]);
    }

    #[test]
    fn test_quantity_totals() {
        let mut log = DailyLog::new(NaiveDate::from_ymd_opt(2025, 3, 14).unwrap());
        log.push(entry(8, 2, "Paracetamol", 2));
        log.push(entry(12, 1, "Ibuprofen", 1));
        log.push(entry(20, 2, "Paracetamol", 3));

        assert_eq!(log.len(), 3);
        assert_eq!(log.total_quantity(), 6);
        assert_eq!(log.quantity_for(CompartmentId::new(2).unwrap()), 5);
        assert_eq!(log.quantity_for(CompartmentId::new(4).unwrap()), 0);
    }

    #[test]
    fn test_parse_persisted_file() {
        let json = r#"{
            "date": "2025-03-14",
            "log": [
                {"time": "09:30 AM", "compartment": 2, "medicine": "Paracetamol", "quantity": 2},
                {"time": "01:45 PM", "compartment": 1, "medicine": "Ibuprofen", "quantity": 1}
            ]
        }"#;

        let log: DailyLog = serde_json::from_str(json).unwrap();
        assert_eq!(log.date, NaiveDate::from_ymd_opt(2025, 3, 14).unwrap());
        assert_eq!(log.len(), 2);
        assert_eq!(log.entries()[1].clock_time(), "01:45 PM");
    }
}
