//! QR payload rendering and publishing.
//!
//! The payload is plain text, one line per log entry under a date header:
//!
//! ```text
//! 2025-03-14
//! 09:30 AM|C2|Paracetamol|2
//! 01:15 PM|C1|Ibuprofen|1
//! ```
//!
//! When the whole log does not fit the payload bound the oldest entries are
//! dropped and replaced by a `+<k> earlier` line right after the header.

use std::time::Instant;

use chrono::NaiveDate;
use pillbox_core::constants::LOG_DATE_FORMAT;
use pillbox_hardware::DisplayDevice;
use pillbox_storage::{DailyLog, LogEntry, LogStore};
use tracing::{debug, warn};

/// Serialize `log` into at most `max_len` bytes.
///
/// # Examples
///
/// ```
/// use chrono::{NaiveDate, NaiveTime};
/// use pillbox_core::CompartmentId;
/// use pillbox_storage::{DailyLog, LogEntry};
///
/// let mut log = DailyLog::new(NaiveDate::from_ymd_opt(2025, 3, 14).unwrap());
/// log.push(LogEntry::new(
///     NaiveTime::from_hms_opt(9, 30, 0).unwrap(),
///     CompartmentId::new(2).unwrap(),
///     "Paracetamol",
///     2,
/// ));
///
/// assert_eq!(
///     pillbox_controller::qr::render(&log, 321),
///     "2025-03-14\n09:30 AM|C2|Paracetamol|2"
/// );
/// ```
pub fn render(log: &DailyLog, max_len: usize) -> String {
    let header = log.date.format(LOG_DATE_FORMAT).to_string();
    let lines: Vec<String> = log.entries().iter().map(entry_line).collect();

    // Bytes taken by lines[k..], each with its leading newline.
    let mut tail_len = vec![0usize; lines.len() + 1];
    for k in (0..lines.len()).rev() {
        tail_len[k] = tail_len[k + 1] + 1 + lines[k].len();
    }

    for (dropped, tail) in tail_len.iter().enumerate() {
        let marker = earlier_marker(dropped);
        let marker_len = marker.as_ref().map_or(0, |m| 1 + m.len());

        if header.len() + marker_len + tail <= max_len {
            let mut payload = header;
            if let Some(marker) = marker {
                payload.push('\n');
                payload.push_str(&marker);
            }
            for line in &lines[dropped..] {
                payload.push('\n');
                payload.push_str(line);
            }
            return payload;
        }
    }

    let mut payload = header;
    if let Some(marker) = earlier_marker(lines.len()) {
        payload.push('\n');
        payload.push_str(&marker);
    }
    truncate_bytes(&mut payload, max_len);
    payload
}

fn earlier_marker(dropped: usize) -> Option<String> {
    (dropped > 0).then(|| format!("+{dropped} earlier"))
}

fn entry_line(entry: &LogEntry) -> String {
    format!(
        "{}|{}|{}|{}",
        entry.clock_time(),
        entry.compartment_label(),
        sanitize_field(&entry.medicine),
        entry.quantity
    )
}

/// Keep separators and line breaks out of free-text fields.
fn sanitize_field(text: &str) -> String {
    text.chars()
        .map(|c| if c == '|' || c.is_control() { ' ' } else { c })
        .collect()
}

fn truncate_bytes(text: &mut String, max_len: usize) {
    if text.len() <= max_len {
        return;
    }
    let mut cut = max_len;
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    text.truncate(cut);
}

/// What a [`QrPublisher::update`] call did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QrAction {
    /// A new payload was sent to the display.
    Rendered { bytes: usize, entries: usize },

    /// The QR code was taken off the display.
    Cleared,

    /// Nothing to do this cycle.
    Idle,
}

/// Keeps the display in sync with the switch and the day's log.
///
/// While the switch is on, the payload is re-rendered whenever the log
/// revision or the day changes. When it goes off the display is cleared
/// once. Failed reads and display writes are retried on the next update.
#[derive(Debug)]
pub struct QrPublisher {
    max_len: usize,

    /// A QR code is on the display.
    showing: bool,

    /// (day, revision) of the payload on the display.
    rendered: Option<(NaiveDate, u64)>,

    /// A scan message holds the display until then.
    suspended_until: Option<Instant>,
}

impl QrPublisher {
    pub fn new(max_len: usize) -> Self {
        Self {
            max_len,
            showing: false,
            rendered: None,
            suspended_until: None,
        }
    }

    pub fn max_len(&self) -> usize {
        self.max_len
    }

    pub fn is_showing(&self) -> bool {
        self.showing
    }

    /// Leave the display alone until `deadline`.
    ///
    /// Called after a scan message was written over the QR code; the code
    /// is drawn again once the message has expired.
    pub fn suspend_until(&mut self, deadline: Instant) {
        self.showing = false;
        self.rendered = None;
        self.suspended_until = Some(deadline);
    }

    /// Run one publishing cycle.
    pub async fn update<L, D>(
        &mut self,
        switch_on: bool,
        revision: u64,
        today: NaiveDate,
        now: Instant,
        store: &L,
        display: &mut D,
    ) -> QrAction
    where
        L: LogStore,
        D: DisplayDevice,
    {
        if let Some(deadline) = self.suspended_until {
            if now < deadline {
                return QrAction::Idle;
            }
            self.suspended_until = None;
        }

        if !switch_on {
            return self.take_down(display).await;
        }

        if self.showing && self.rendered == Some((today, revision)) {
            return QrAction::Idle;
        }

        let log = match store.read(today).await {
            Ok(log) => log,
            Err(e) => {
                warn!(date = %today, error = %e, "cannot read log for QR code");
                return QrAction::Idle;
            }
        };

        let payload = render(&log, self.max_len);
        if let Err(e) = display.show_qr(&payload).await {
            warn!(error = %e, "failed to show QR code");
            return QrAction::Idle;
        }

        debug!(bytes = payload.len(), entries = log.len(), "QR code rendered");
        self.showing = true;
        self.rendered = Some((today, revision));

        QrAction::Rendered {
            bytes: payload.len(),
            entries: log.len(),
        }
    }

    async fn take_down<D: DisplayDevice>(&mut self, display: &mut D) -> QrAction {
        if !self.showing {
            return QrAction::Idle;
        }

        match display.clear().await {
            Ok(()) => {
                debug!("QR code cleared");
                self.showing = false;
                self.rendered = None;
                QrAction::Cleared
            }
            Err(e) => {
                warn!(error = %e, "failed to clear QR code");
                QrAction::Idle
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;
    use pillbox_core::CompartmentId;
    use pillbox_core::constants::DEFAULT_QR_MAX_PAYLOAD;
    use pillbox_hardware::mock::{DisplayOp, MockDisplay};
    use pillbox_storage::{ConsumptionRecord, MemoryLogStore, StorageError, StorageResult};
    use rstest::rstest;
    use std::time::Duration;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 14).unwrap()
    }

    fn entry(h: u32, m: u32, compartment: u8, medicine: &str, quantity: u32) -> LogEntry {
        LogEntry::new(
            NaiveTime::from_hms_opt(h, m, 0).unwrap(),
            CompartmentId::new(compartment).unwrap(),
            medicine,
            quantity,
        )
    }

    fn log_with(entries: Vec<LogEntry>) -> DailyLog {
        let mut log = DailyLog::new(day());
        for e in entries {
            log.push(e);
        }
        log
    }

    fn record(h: u32, previous: u32, new: u32) -> ConsumptionRecord {
        ConsumptionRecord::new(
            day().and_hms_opt(h, 0, 0).unwrap(),
            CompartmentId::new(2).unwrap(),
            "Paracetamol",
            Some(previous),
            new,
        )
    }

    #[test]
    fn test_render_empty_log_is_header_only() {
        assert_eq!(render(&DailyLog::new(day()), 321), "2025-03-14");
    }

    #[test]
    fn test_render_entry_without_compartment() {
        let mut legacy = entry(7, 45, 1, "Cetirizine", 1);
        legacy.compartment = None;

        assert_eq!(
            render(&log_with(vec![legacy]), 321),
            "2025-03-14\n07:45 AM|C?|Cetirizine|1"
        );
    }

    #[test]
    fn test_render_all_entries_in_order() {
        let log = log_with(vec![
            entry(9, 30, 2, "Paracetamol", 2),
            entry(13, 15, 1, "Ibuprofen", 1),
        ]);

        assert_eq!(
            render(&log, 321),
            "2025-03-14\n09:30 AM|C2|Paracetamol|2\n01:15 PM|C1|Ibuprofen|1"
        );
    }

    #[rstest]
    #[case("Vit|C", "Vit C")]
    #[case("Aspirin\n100", "Aspirin 100")]
    #[case("Ibuprofène", "Ibuprofène")]
    fn test_sanitize_field(#[case] raw: &str, #[case] expected: &str) {
        assert_eq!(sanitize_field(raw), expected);
    }

    #[test]
    fn test_render_drops_oldest_entries() {
        let entries: Vec<LogEntry> = (0..20)
            .map(|i| entry(8, i, (i % 4 + 1) as u8, "Paracetamol", 1))
            .collect();
        let log = log_with(entries);

        let payload = render(&log, DEFAULT_QR_MAX_PAYLOAD);
        assert!(payload.len() <= DEFAULT_QR_MAX_PAYLOAD);

        let lines: Vec<&str> = payload.lines().collect();
        assert_eq!(lines[0], "2025-03-14");
        let dropped: usize = lines[1]
            .strip_prefix('+')
            .and_then(|rest| rest.strip_suffix(" earlier"))
            .unwrap()
            .parse()
            .unwrap();
        assert_eq!(dropped + lines.len() - 2, 20);

        // The newest entry is always kept.
        assert_eq!(*lines.last().unwrap(), "08:19 AM|C4|Paracetamol|1");
    }

    #[test]
    fn test_render_exact_fit_keeps_everything() {
        let log = log_with(vec![entry(9, 30, 2, "Paracetamol", 2)]);
        let full = render(&log, usize::MAX);

        assert_eq!(render(&log, full.len()), full);
        assert!(render(&log, full.len() - 1).contains("+1 earlier"));
    }

    #[test]
    fn test_render_tiny_bound_truncates() {
        let log = log_with(vec![entry(9, 30, 2, "Paracetamol", 2)]);
        assert_eq!(render(&log, 4), "2025");
    }

    #[test]
    fn test_truncate_bytes_respects_char_boundary() {
        let mut text = "ab\u{e9}".to_string();
        truncate_bytes(&mut text, 3);
        assert_eq!(text, "ab");
    }

    #[tokio::test]
    async fn test_switch_off_never_renders() {
        let store = MemoryLogStore::new();
        let (mut display, handle) = MockDisplay::new();
        let mut publisher = QrPublisher::new(321);

        let action = publisher
            .update(false, 0, day(), Instant::now(), &store, &mut display)
            .await;

        assert_eq!(action, QrAction::Idle);
        assert!(handle.ops().is_empty());
    }

    #[tokio::test]
    async fn test_renders_once_then_on_revision_change() {
        let mut store = MemoryLogStore::new();
        let (mut display, handle) = MockDisplay::new();
        let mut publisher = QrPublisher::new(321);
        let now = Instant::now();

        let first = publisher.update(true, 0, day(), now, &store, &mut display).await;
        assert_eq!(first, QrAction::Rendered { bytes: 10, entries: 0 });

        let again = publisher.update(true, 0, day(), now, &store, &mut display).await;
        assert_eq!(again, QrAction::Idle);

        store.append(&record(9, 10, 8)).await.unwrap();
        let after = publisher.update(true, 1, day(), now, &store, &mut display).await;
        assert!(matches!(after, QrAction::Rendered { entries: 1, .. }));
        assert_eq!(
            handle.current_qr().as_deref(),
            Some("2025-03-14\n09:00 AM|C2|Paracetamol|2")
        );
        assert_eq!(handle.qr_render_count(), 2);
    }

    #[tokio::test]
    async fn test_switch_off_clears_once() {
        let store = MemoryLogStore::new();
        let (mut display, handle) = MockDisplay::new();
        let mut publisher = QrPublisher::new(321);
        let now = Instant::now();

        publisher.update(true, 0, day(), now, &store, &mut display).await;
        let off = publisher.update(false, 0, day(), now, &store, &mut display).await;
        let still_off = publisher.update(false, 0, day(), now, &store, &mut display).await;

        assert_eq!(off, QrAction::Cleared);
        assert_eq!(still_off, QrAction::Idle);
        assert!(!publisher.is_showing());
        assert_eq!(handle.ops().last(), Some(&DisplayOp::Clear));
        assert_eq!(
            handle.ops().iter().filter(|op| **op == DisplayOp::Clear).count(),
            1
        );
    }

    #[tokio::test]
    async fn test_display_failure_is_retried() {
        let store = MemoryLogStore::new();
        let (mut display, handle) = MockDisplay::new();
        let mut publisher = QrPublisher::new(321);
        let now = Instant::now();
        handle.fail_next(1);

        let failed = publisher.update(true, 0, day(), now, &store, &mut display).await;
        assert_eq!(failed, QrAction::Idle);
        assert!(!publisher.is_showing());

        let retried = publisher.update(true, 0, day(), now, &store, &mut display).await;
        assert!(matches!(retried, QrAction::Rendered { .. }));
    }

    #[tokio::test]
    async fn test_new_day_rerenders() {
        let store = MemoryLogStore::new();
        let (mut display, handle) = MockDisplay::new();
        let mut publisher = QrPublisher::new(321);
        let now = Instant::now();

        publisher.update(true, 0, day(), now, &store, &mut display).await;
        let tomorrow = day().succ_opt().unwrap();
        publisher.update(true, 0, tomorrow, now, &store, &mut display).await;

        assert_eq!(handle.current_qr().as_deref(), Some("2025-03-15"));
    }

    #[tokio::test]
    async fn test_suspension_defers_rerender() {
        let store = MemoryLogStore::new();
        let (mut display, handle) = MockDisplay::new();
        let mut publisher = QrPublisher::new(321);
        let now = Instant::now();

        publisher.update(true, 0, day(), now, &store, &mut display).await;
        publisher.suspend_until(now + Duration::from_secs(2));

        let held = publisher
            .update(true, 0, day(), now + Duration::from_secs(1), &store, &mut display)
            .await;
        assert_eq!(held, QrAction::Idle);

        let back = publisher
            .update(true, 0, day(), now + Duration::from_secs(2), &store, &mut display)
            .await;
        assert!(matches!(back, QrAction::Rendered { .. }));
        assert_eq!(handle.qr_render_count(), 2);
    }

    struct UnreadableStore;

    impl LogStore for UnreadableStore {
        async fn append(&mut self, _record: &ConsumptionRecord) -> StorageResult<LogEntry> {
            Err(StorageError::WriteFailed("read-only".to_string()))
        }

        async fn read(&self, _date: NaiveDate) -> StorageResult<DailyLog> {
            Err(StorageError::Internal("disk gone".to_string()))
        }
    }

    #[tokio::test]
    async fn test_read_failure_leaves_display_alone() {
        let (mut display, handle) = MockDisplay::new();
        let mut publisher = QrPublisher::new(321);

        let action = publisher
            .update(true, 0, day(), Instant::now(), &UnreadableStore, &mut display)
            .await;

        assert_eq!(action, QrAction::Idle);
        assert!(handle.ops().is_empty());
    }
}
