//! JSON file store: one `YYYY-MM-DD.json` file per day.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use pillbox_core::constants::LOG_DATE_FORMAT;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use super::LogStore;
use crate::error::{StorageError, StorageResult};
use crate::models::{ConsumptionRecord, DailyLog, LogEntry};

/// Log store writing one pretty-printed JSON file per day.
///
/// Every append rewrites the day's file through a temporary sibling that is
/// flushed to disk and renamed over the previous version, so a crash leaves
/// either the old or the new file, never a truncated one.
///
/// # Examples
///
/// ```no_run
/// use pillbox_storage::{JsonLogStore, LogStore};
///
/// # async fn example() -> pillbox_storage::StorageResult<()> {
/// let store = JsonLogStore::open("/var/lib/pillbox/logs").await?;
/// let today = chrono::Local::now().date_naive();
/// let log = store.read(today).await?;
/// println!("{} entries today", log.len());
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct JsonLogStore {
    dir: PathBuf,

    /// Last log written, normally today's.
    current: Option<DailyLog>,
}

impl JsonLogStore {
    /// Open a store rooted at `dir`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Io` if the directory cannot be created.
    pub async fn open(dir: impl Into<PathBuf>) -> StorageResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).await?;
        debug!(dir = %dir.display(), "opened JSON log store");

        Ok(Self { dir, current: None })
    }

    /// Directory holding the log files.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File holding the log of `date`.
    pub fn path_for(&self, date: NaiveDate) -> PathBuf {
        self.dir
            .join(format!("{}.json", date.format(LOG_DATE_FORMAT)))
    }

    /// Dates that have a log file, oldest first.
    ///
    /// Files whose name is not a date are ignored.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Io` if the directory cannot be listed.
    pub async fn dates(&self) -> StorageResult<Vec<NaiveDate>> {
        let mut dates = Vec::new();
        let mut entries = fs::read_dir(&self.dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str())
                && let Ok(date) = NaiveDate::parse_from_str(stem, LOG_DATE_FORMAT)
            {
                dates.push(date);
            }
        }

        dates.sort_unstable();
        Ok(dates)
    }

    async fn load(&self, date: NaiveDate) -> StorageResult<DailyLog> {
        let path = self.path_for(date);

        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(DailyLog::new(date)),
            Err(e) => return Err(e.into()),
        };

        let log: DailyLog = serde_json::from_slice(&bytes)
            .map_err(|e| StorageError::corrupt(&path, e.to_string()))?;

        if log.date != date {
            return Err(StorageError::corrupt(
                &path,
                format!("file holds the log of {}", log.date),
            ));
        }

        Ok(log)
    }

    async fn persist(&self, log: &DailyLog) -> StorageResult<()> {
        let path = self.path_for(log.date);
        let tmp = path.with_extension("json.tmp");
        let bytes = serde_json::to_vec_pretty(log)?;

        if let Err(e) = write_synced(&tmp, &bytes).await {
            if let Err(cleanup) = fs::remove_file(&tmp).await {
                debug!(path = %tmp.display(), error = %cleanup, "temporary log not removed");
            }
            return Err(e);
        }

        fs::rename(&tmp, &path).await?;
        sync_dir(&self.dir).await;
        Ok(())
    }
}

impl LogStore for JsonLogStore {
    async fn append(&mut self, record: &ConsumptionRecord) -> StorageResult<LogEntry> {
        let date = record.date();

        let mut log = match &self.current {
            Some(current) if current.date == date => current.clone(),
            _ => self.load(date).await?,
        };

        let entry = record.to_entry();
        log.push(entry.clone());
        self.persist(&log).await?;

        info!(
            date = %date,
            compartment = %entry.compartment_label(),
            medicine = %entry.medicine,
            quantity = entry.quantity,
            "consumption logged"
        );

        self.current = Some(log);
        Ok(entry)
    }

    async fn read(&self, date: NaiveDate) -> StorageResult<DailyLog> {
        match &self.current {
            Some(current) if current.date == date => Ok(current.clone()),
            _ => self.load(date).await,
        }
    }
}

async fn write_synced(path: &Path, bytes: &[u8]) -> StorageResult<()> {
    let mut file = fs::File::create(path).await?;
    file.write_all(bytes).await?;
    file.sync_all().await?;
    Ok(())
}

/// Flush the directory entry of a rename. Best effort: not every platform
/// can open a directory as a file.
async fn sync_dir(dir: &Path) {
    #[cfg(unix)]
    {
        let result = match fs::File::open(dir).await {
            Ok(handle) => handle.sync_all().await,
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            warn!(dir = %dir.display(), error = %e, "directory sync failed");
        }
    }
    #[cfg(not(unix))]
    let _ = dir;
}
