pub mod consumption;
pub mod daily_log;
pub mod log_entry;

pub use consumption::ConsumptionRecord;
pub use daily_log::DailyLog;
pub use log_entry::LogEntry;

/// Serde adapter for the 12-hour `HH:MM AM` time of day used in the log files.
pub(crate) mod clock_time {
    use chrono::NaiveTime;
    use pillbox_core::constants::LOG_TIME_FORMAT;
    use serde::{Deserialize, Deserializer, Serializer, de};

    pub fn serialize<S>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(&time.format(LOG_TIME_FORMAT))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        NaiveTime::parse_from_str(raw.trim(), LOG_TIME_FORMAT).map_err(de::Error::custom)
    }
}
