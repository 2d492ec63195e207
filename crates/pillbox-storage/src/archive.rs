//! Archive of captured frames.
//!
//! Frames are written as `image_YYYYMMDD-HHMMSS.jpg`; a second frame within
//! the same second gets a `-1`, `-2`, ... suffix instead of overwriting the
//! first.

use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use pillbox_core::constants::FRAME_FILE_FORMAT;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::error::StorageResult;

/// Directory of archived frames.
#[derive(Debug, Clone)]
pub struct FrameArchive {
    dir: PathBuf,
}

impl FrameArchive {
    /// Open an archive rooted at `dir`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Io` if the directory cannot be created.
    pub async fn open(dir: impl Into<PathBuf>) -> StorageResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File name of a frame captured at `captured_at`.
    ///
    /// # Examples
    ///
    /// ```
    /// use chrono::NaiveDate;
    /// use pillbox_storage::FrameArchive;
    ///
    /// let at = NaiveDate::from_ymd_opt(2025, 3, 14).unwrap().and_hms_opt(9, 5, 7).unwrap();
    /// assert_eq!(FrameArchive::file_name(at), "image_20250314-090507.jpg");
    /// ```
    pub fn file_name(captured_at: NaiveDateTime) -> String {
        captured_at.format(FRAME_FILE_FORMAT).to_string()
    }

    /// Write one encoded frame and return its path.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Io` if the file cannot be created or written.
    pub async fn store(&self, data: &[u8], captured_at: NaiveDateTime) -> StorageResult<PathBuf> {
        let base = Self::file_name(captured_at);
        let mut path = self.dir.join(&base);
        let mut suffix = 0u32;

        let mut file = loop {
            match fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(file) => break file,
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    suffix += 1;
                    path = self.dir.join(suffixed(&base, suffix));
                }
                Err(e) => return Err(e.into()),
            }
        };

        file.write_all(data).await?;
        file.sync_all().await?;

        debug!(path = %path.display(), bytes = data.len(), "frame archived");
        Ok(path)
    }
}

/// `image_X.jpg` -> `image_X-<n>.jpg`
fn suffixed(base: &str, n: u32) -> String {
    match base.rsplit_once('.') {
        Some((stem, ext)) => format!("{stem}-{n}.{ext}"),
        None => format!("{base}-{n}"),
    }
}
