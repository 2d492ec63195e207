//! The polling loop tying drawers, camera, log and display together.
//!
//! Each [`Controller::tick`] polls every drawer reader once, runs the
//! capture sequence of any drawer whose settle timer expired, reads the QR
//! switch and lets the [`QrPublisher`] refresh the display. Device and
//! storage failures inside a tick are reported as [`ControllerEvent`]s and
//! never stop the loop.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use chrono::{NaiveDate, NaiveDateTime};
use pillbox_core::{Classification, Compartment, CompartmentId, TagId};
use pillbox_hardware::{CameraDevice, CountEstimator, DisplayDevice, RfidDevice, SwitchDevice};
use pillbox_storage::{ConsumptionRecord, FrameArchive, LogEntry, LogStore};
use serde::Serialize;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::access::AccessController;
use crate::clock::Clock;
use crate::config::ControllerConfig;
use crate::error::{ControllerError, Result};
use crate::qr::{QrAction, QrPublisher};
use crate::state_machine::{DrawerEvent, DrawerMonitor, DrawerState};

/// Devices driven by the controller.
///
/// `readers` pairs each RFID reader with the compartment it sits under and
/// must cover exactly the configured compartments.
#[derive(Debug)]
pub struct Peripherals<R, C, E, D, S> {
    pub readers: Vec<(CompartmentId, R)>,
    pub camera: C,
    pub estimator: E,
    pub display: D,
    pub switch: S,
}

/// Something that happened during a tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ControllerEvent {
    /// The local date changed; a new daily log starts.
    DayRolledOver { date: NaiveDate },

    /// A reader poll failed; retried next tick.
    ReaderFault {
        compartment: CompartmentId,
        error: String,
    },

    TagScanned {
        compartment: CompartmentId,
        tag: TagId,
        classification: Classification,
    },

    DrawerClosed { compartment: CompartmentId },

    /// The drawer was reopened before the capture.
    CaptureCancelled { compartment: CompartmentId },

    /// The cycle involved an unauthorized tag; nothing was captured.
    CaptureSkipped {
        compartment: CompartmentId,
        tag: TagId,
    },

    CaptureFailed {
        compartment: CompartmentId,
        error: String,
    },

    EstimateFailed {
        compartment: CompartmentId,
        error: String,
    },

    /// An entry was appended to the daily log.
    Logged {
        compartment: CompartmentId,
        entry: LogEntry,
        /// Count estimated from the frame.
        estimated: u32,
        /// Count kept for the next cycle.
        count: Option<u32>,
    },

    /// The entry could not be written; the previous count is kept.
    StorageFailed {
        compartment: CompartmentId,
        error: String,
    },

    SwitchChanged { on: bool },

    /// The switch could not be read; its last known state is kept.
    SwitchFault { error: String },

    QrRendered { bytes: usize, entries: usize },

    QrCleared,
}

impl fmt::Display for ControllerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DayRolledOver { date } => write!(f, "new day {date}"),
            Self::ReaderFault { compartment, error } => {
                write!(f, "compartment {compartment}: reader fault: {error}")
            }
            Self::TagScanned {
                compartment,
                tag,
                classification,
            } => write!(f, "compartment {compartment}: tag {tag} {classification}"),
            Self::DrawerClosed { compartment } => {
                write!(f, "compartment {compartment}: drawer closed")
            }
            Self::CaptureCancelled { compartment } => {
                write!(f, "compartment {compartment}: reopened, capture cancelled")
            }
            Self::CaptureSkipped { compartment, tag } => {
                write!(f, "compartment {compartment}: capture skipped for tag {tag}")
            }
            Self::CaptureFailed { compartment, error } => {
                write!(f, "compartment {compartment}: capture failed: {error}")
            }
            Self::EstimateFailed { compartment, error } => {
                write!(f, "compartment {compartment}: count failed: {error}")
            }
            Self::Logged {
                compartment,
                entry,
                estimated,
                ..
            } => write!(
                f,
                "compartment {compartment}: {} took {} of {} ({estimated} left)",
                entry.clock_time(),
                entry.quantity,
                entry.medicine
            ),
            Self::StorageFailed { compartment, error } => {
                write!(f, "compartment {compartment}: log write failed: {error}")
            }
            Self::SwitchChanged { on } => {
                write!(f, "QR switch {}", if *on { "on" } else { "off" })
            }
            Self::SwitchFault { error } => write!(f, "QR switch fault: {error}"),
            Self::QrRendered { bytes, entries } => {
                write!(f, "QR code shown ({entries} entries, {bytes} bytes)")
            }
            Self::QrCleared => f.write_str("QR code cleared"),
        }
    }
}

#[derive(Debug)]
struct Drawer<R> {
    compartment: Compartment,
    reader: R,
    monitor: DrawerMonitor,
}

/// Medicine box controller.
///
/// Generic over its devices (`R`eader, `C`amera, `E`stimator, `D`isplay,
/// `S`witch), the log store `L` and the clock `K`.
#[derive(Debug)]
pub struct Controller<R, C, E, D, S, L, K> {
    drawers: Vec<Drawer<R>>,
    camera: C,
    estimator: E,
    display: D,
    switch: S,
    store: L,
    clock: K,
    access: AccessController,
    publisher: QrPublisher,
    archive: Option<FrameArchive>,
    poll_interval: Duration,
    message_duration: Duration,
    switch_on: bool,
    /// Bumped on every log change and day rollover.
    revision: u64,
    today: NaiveDate,
}

impl<R, C, E, D, S, L, K> Controller<R, C, E, D, S, L, K>
where
    R: RfidDevice,
    C: CameraDevice,
    E: CountEstimator,
    D: DisplayDevice,
    S: SwitchDevice,
    L: LogStore,
    K: Clock,
{
    /// Build a controller from a configuration and its devices.
    ///
    /// # Errors
    ///
    /// Returns `ControllerError::InvalidConfig` if the configuration does
    /// not validate and `ControllerError::Wiring` if the readers do not
    /// match the configured compartments one to one.
    pub fn new(
        config: &ControllerConfig,
        peripherals: Peripherals<R, C, E, D, S>,
        store: L,
        clock: K,
    ) -> Result<Self> {
        config.validate()?;
        let compartments = config.compartments()?;

        let Peripherals {
            mut readers,
            camera,
            estimator,
            display,
            switch,
        } = peripherals;

        if readers.len() != compartments.len() {
            return Err(ControllerError::wiring(format!(
                "{} readers for {} compartments",
                readers.len(),
                compartments.len()
            )));
        }
        readers.sort_by_key(|(id, _)| *id);

        let drawers = compartments
            .into_iter()
            .zip(readers)
            .map(|(compartment, (id, reader))| {
                if compartment.id != id {
                    return Err(ControllerError::wiring(format!(
                        "reader for compartment {id} has no matching compartment"
                    )));
                }
                Ok(Drawer {
                    monitor: DrawerMonitor::new(id, config.settle_delay()),
                    compartment,
                    reader,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let today = clock.local_now().date();
        info!(
            drawers = drawers.len(),
            date = %today,
            "controller ready"
        );

        Ok(Self {
            drawers,
            camera,
            estimator,
            display,
            switch,
            store,
            clock,
            access: config.access_controller()?,
            publisher: QrPublisher::new(config.qr_max_payload),
            archive: None,
            poll_interval: config.poll_interval(),
            message_duration: config.message_duration(),
            switch_on: false,
            revision: 0,
            today,
        })
    }

    /// Keep every captured frame in `archive`.
    pub fn with_archive(mut self, archive: FrameArchive) -> Self {
        self.archive = Some(archive);
        self
    }

    pub fn compartment(&self, id: CompartmentId) -> Option<&Compartment> {
        self.drawer(id).map(|d| &d.compartment)
    }

    pub fn compartments(&self) -> impl Iterator<Item = &Compartment> {
        self.drawers.iter().map(|d| &d.compartment)
    }

    pub fn drawer_state(&self, id: CompartmentId) -> Option<DrawerState> {
        self.drawer(id).map(|d| d.monitor.current_state())
    }

    pub fn monitor(&self, id: CompartmentId) -> Option<&DrawerMonitor> {
        self.drawer(id).map(|d| &d.monitor)
    }

    pub fn store(&self) -> &L {
        &self.store
    }

    pub fn is_switch_on(&self) -> bool {
        self.switch_on
    }

    /// Date of the log currently being written.
    pub fn today(&self) -> NaiveDate {
        self.today
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    fn drawer(&self, id: CompartmentId) -> Option<&Drawer<R>> {
        self.drawers.iter().find(|d| d.compartment.id == id)
    }

    /// Run one polling cycle.
    ///
    /// # Errors
    ///
    /// Returns `ControllerError::Core` only if a drawer state machine hit an
    /// impossible transition. Device and storage failures are reported as
    /// events instead.
    pub async fn tick(&mut self) -> Result<Vec<ControllerEvent>> {
        let mut events = Vec::new();

        let date = self.clock.local_now().date();
        if date != self.today {
            info!(from = %self.today, to = %date, "day rolled over");
            self.today = date;
            self.revision += 1;
            events.push(ControllerEvent::DayRolledOver { date });
        }

        for index in 0..self.drawers.len() {
            self.poll_drawer(index, &mut events).await?;
        }

        self.poll_switch(&mut events).await;

        let action = self
            .publisher
            .update(
                self.switch_on,
                self.revision,
                self.today,
                self.clock.now(),
                &self.store,
                &mut self.display,
            )
            .await;
        match action {
            QrAction::Rendered { bytes, entries } => {
                events.push(ControllerEvent::QrRendered { bytes, entries });
            }
            QrAction::Cleared => events.push(ControllerEvent::QrCleared),
            QrAction::Idle => {}
        }

        Ok(events)
    }

    /// Tick every poll interval until `shutdown` completes.
    ///
    /// A tick in progress always finishes; `shutdown` is only checked
    /// between ticks. `on_event` sees every event in order.
    ///
    /// # Errors
    ///
    /// Stops at the first error returned by [`tick`](Self::tick).
    pub async fn run_until<F, H>(&mut self, shutdown: F, mut on_event: H) -> Result<()>
    where
        F: Future<Output = ()>,
        H: FnMut(&ControllerEvent),
    {
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        info!(interval = ?self.poll_interval, "polling started");

        loop {
            tokio::select! {
                () = &mut shutdown => {
                    info!("shutdown requested");
                    return Ok(());
                }
                _ = ticker.tick() => {
                    for event in self.tick().await? {
                        on_event(&event);
                    }
                }
            }
        }
    }

    async fn poll_drawer(&mut self, index: usize, events: &mut Vec<ControllerEvent>) -> Result<()> {
        let now = self.clock.now();
        let drawer = &mut self.drawers[index];
        let id = drawer.compartment.id;

        let reading = match drawer.reader.poll_tag().await {
            Ok(reading) => reading,
            Err(e) => {
                warn!(compartment = %id, error = %e, "reader poll failed");
                events.push(ControllerEvent::ReaderFault {
                    compartment: id,
                    error: e.to_string(),
                });
                return Ok(());
            }
        };

        let access = &self.access;
        let drawer_events = drawer
            .monitor
            .observe(reading.as_ref(), now, |tag| access.classify(tag))?;

        for event in drawer_events {
            self.handle_drawer_event(index, event, events).await;
        }
        Ok(())
    }

    async fn handle_drawer_event(
        &mut self,
        index: usize,
        event: DrawerEvent,
        events: &mut Vec<ControllerEvent>,
    ) {
        let id = self.drawers[index].compartment.id;

        match event {
            DrawerEvent::TagArrived {
                tag,
                classification,
            } => {
                self.access
                    .announce(&mut self.display, &tag, classification, self.message_duration)
                    .await;
                self.publisher
                    .suspend_until(self.clock.now() + self.message_duration);
                events.push(ControllerEvent::TagScanned {
                    compartment: id,
                    tag,
                    classification,
                });
            }
            DrawerEvent::DrawerClosed => {
                debug!(compartment = %id, "drawer closed, settling");
                events.push(ControllerEvent::DrawerClosed { compartment: id });
            }
            DrawerEvent::SettleCancelled => {
                info!(compartment = %id, "drawer reopened, capture cancelled");
                events.push(ControllerEvent::CaptureCancelled { compartment: id });
            }
            DrawerEvent::SettleElapsed { tag, authorized } => {
                if authorized {
                    self.capture_cycle(index, events).await;
                } else {
                    info!(compartment = %id, tag = %tag, "unauthorized cycle, capture skipped");
                    events.push(ControllerEvent::CaptureSkipped {
                        compartment: id,
                        tag,
                    });
                }
            }
        }
    }

    /// Capture, count and log one authorized cycle.
    async fn capture_cycle(&mut self, index: usize, events: &mut Vec<ControllerEvent>) {
        let id = self.drawers[index].compartment.id;
        let captured_at = self.clock.local_now();

        let frame = match self.camera.capture_frame().await {
            Ok(frame) => frame,
            Err(e) => {
                warn!(compartment = %id, error = %e, "capture failed");
                events.push(ControllerEvent::CaptureFailed {
                    compartment: id,
                    error: e.to_string(),
                });
                return;
            }
        };

        self.archive_frame(&frame.data, captured_at).await;

        let estimated = match self.estimator.estimate(&frame, id).await {
            Ok(count) => count,
            Err(e) => {
                warn!(compartment = %id, frame = frame.sequence, error = %e, "count estimation failed");
                events.push(ControllerEvent::EstimateFailed {
                    compartment: id,
                    error: e.to_string(),
                });
                return;
            }
        };

        let drawer = &mut self.drawers[index];
        let record = ConsumptionRecord::new(
            captured_at,
            id,
            drawer.compartment.medicine.clone(),
            drawer.compartment.last_count,
            estimated,
        );

        match self.store.append(&record).await {
            Ok(entry) => {
                if record.is_increase() {
                    warn!(
                        compartment = %id,
                        previous = ?record.previous_count,
                        estimated,
                        "count went up, keeping previous count"
                    );
                }
                drawer.compartment.accept_count(estimated);
                self.revision += 1;

                info!(
                    compartment = %id,
                    medicine = %entry.medicine,
                    quantity = entry.quantity,
                    estimated,
                    "consumption logged"
                );
                events.push(ControllerEvent::Logged {
                    compartment: id,
                    entry,
                    estimated,
                    count: drawer.compartment.last_count,
                });
            }
            Err(e) => {
                error!(compartment = %id, error = %e, "failed to write log entry");
                events.push(ControllerEvent::StorageFailed {
                    compartment: id,
                    error: e.to_string(),
                });
            }
        }
    }

    async fn archive_frame(&self, data: &[u8], captured_at: NaiveDateTime) {
        if let Some(archive) = &self.archive
            && let Err(e) = archive.store(data, captured_at).await
        {
            warn!(error = %e, "failed to archive frame");
        }
    }

    async fn poll_switch(&mut self, events: &mut Vec<ControllerEvent>) {
        match self.switch.is_on().await {
            Ok(on) => {
                if on != self.switch_on {
                    info!(on, "QR switch changed");
                    self.switch_on = on;
                    events.push(ControllerEvent::SwitchChanged { on });
                }
            }
            Err(e) => {
                warn!(error = %e, on = self.switch_on, "switch read failed, keeping last state");
                events.push(ControllerEvent::SwitchFault {
                    error: e.to_string(),
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::NaiveDate;
    use pillbox_hardware::mock::{
        MockCamera, MockDisplay, MockEstimator, MockRfid, MockRfidHandle, MockSwitch,
    };
    use pillbox_storage::MemoryLogStore;

    const CONFIG: &str = r#"
log_dir = "unused"

[access]
authorized_tags = ["A1"]

[[compartments]]
index = 1
medicine = "Ibuprofen"

[[compartments]]
index = 2
medicine = "Paracetamol"
initial_count = 10
"#;

    fn id(n: u8) -> CompartmentId {
        CompartmentId::new(n).unwrap()
    }

    fn clock() -> ManualClock {
        ManualClock::new(
            NaiveDate::from_ymd_opt(2025, 3, 14)
                .unwrap()
                .and_hms_opt(9, 0, 0)
                .unwrap(),
        )
    }

    fn readers(ids: &[u8]) -> (Vec<(CompartmentId, MockRfid)>, Vec<MockRfidHandle>) {
        ids.iter()
            .map(|&n| {
                let (reader, handle) = MockRfid::new();
                ((id(n), reader), handle)
            })
            .unzip()
    }

    fn peripherals(
        readers: Vec<(CompartmentId, MockRfid)>,
    ) -> Peripherals<MockRfid, MockCamera, MockEstimator, MockDisplay, MockSwitch> {
        Peripherals {
            readers,
            camera: MockCamera::new().0,
            estimator: MockEstimator::new().0,
            display: MockDisplay::new().0,
            switch: MockSwitch::new().0,
        }
    }

    #[test]
    fn test_new_sorts_readers_by_compartment() {
        let config = ControllerConfig::from_toml_str(CONFIG).unwrap();
        let (readers, _handles) = readers(&[2, 1]);

        let controller =
            Controller::new(&config, peripherals(readers), MemoryLogStore::new(), clock()).unwrap();

        let ids: Vec<u8> = controller.compartments().map(|c| c.id.as_u8()).collect();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(controller.compartment(id(2)).unwrap().last_count, Some(10));
        assert_eq!(controller.drawer_state(id(1)), Some(DrawerState::Idle));
        assert_eq!(controller.drawer_state(id(3)), None);
    }

    #[test]
    fn test_missing_reader_is_wiring_error() {
        let config = ControllerConfig::from_toml_str(CONFIG).unwrap();
        let (readers, _handles) = readers(&[1]);

        let result = Controller::new(&config, peripherals(readers), MemoryLogStore::new(), clock());
        assert!(matches!(result, Err(ControllerError::Wiring(_))));
    }

    #[test]
    fn test_mismatched_reader_is_wiring_error() {
        let config = ControllerConfig::from_toml_str(CONFIG).unwrap();
        let (readers, _handles) = readers(&[1, 3]);

        let result = Controller::new(&config, peripherals(readers), MemoryLogStore::new(), clock());
        assert!(matches!(result, Err(ControllerError::Wiring(_))));
    }

    #[test]
    fn test_event_display() {
        let event = ControllerEvent::TagScanned {
            compartment: id(2),
            tag: TagId::new("a1").unwrap(),
            classification: Classification::Authorized,
        };
        assert_eq!(event.to_string(), "compartment 2: tag A1 AUTHORIZED");
        assert_eq!(
            ControllerEvent::SwitchChanged { on: false }.to_string(),
            "QR switch off"
        );
    }

    #[test]
    fn test_event_serializes_tagged() {
        let event = ControllerEvent::CaptureSkipped {
            compartment: id(4),
            tag: TagId::new("B2").unwrap(),
        };
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            serde_json::json!({"event": "capture_skipped", "compartment": 4, "tag": "B2"})
        );
    }
}
