//! Scripted runs of the controller on mock devices.
//!
//! A scenario is a JSON document listing what happens to the box:
//!
//! ```json
//! {
//!   "start": "2025-03-14T09:00:00",
//!   "steps": [
//!     {"action": "set_count", "compartment": 2, "count": 8},
//!     {"action": "present", "compartment": 2, "tag": "1047839255856"},
//!     {"action": "wait", "ms": 1000},
//!     {"action": "remove", "compartment": 2},
//!     {"action": "wait", "ms": 6000},
//!     {"action": "switch", "on": true},
//!     {"action": "wait", "ms": 200}
//!   ]
//! }
//! ```
//!
//! Device actions take effect immediately; `wait` advances a manual clock
//! one poll interval at a time and ticks the controller after each step.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use chrono::{Local, NaiveDate, NaiveDateTime};
use pillbox_controller::{Clock, Controller, ControllerConfig, ControllerEvent, ManualClock, Peripherals};
use pillbox_core::{CompartmentId, TagId};
use pillbox_hardware::mock::{
    MockCamera, MockCameraHandle, MockDisplay, MockDisplayHandle, MockEstimator,
    MockEstimatorHandle, MockRfid, MockRfidHandle, MockSwitch, MockSwitchHandle,
};
use pillbox_storage::{
    ConsumptionRecord, DailyLog, FrameArchive, LogEntry, LogStore, StorageError, StorageResult,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// A scripted run.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Scenario {
    /// Local wall-clock time the run starts at; now if unset.
    #[serde(default)]
    pub start: Option<NaiveDateTime>,

    pub steps: Vec<Step>,
}

fn once() -> u32 {
    1
}

/// One scripted action.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Step {
    /// Open a drawer: its tag comes into range.
    Present { compartment: u8, tag: String },

    /// Close a drawer.
    Remove { compartment: u8 },

    /// Strip count the estimator reports for a compartment.
    SetCount { compartment: u8, count: u32 },

    /// Make the estimator fail for a compartment until a count is set.
    ClearCount { compartment: u8 },

    FailReader {
        compartment: u8,
        #[serde(default = "once")]
        times: u32,
    },

    FailCapture {
        #[serde(default = "once")]
        times: u32,
    },

    FailEstimate {
        #[serde(default = "once")]
        times: u32,
    },

    FailStore {
        #[serde(default = "once")]
        times: u32,
    },

    FailDisplay {
        #[serde(default = "once")]
        times: u32,
    },

    FailSwitch {
        #[serde(default = "once")]
        times: u32,
    },

    /// Flip the QR switch.
    Switch { on: bool },

    /// Let time pass, polling as the controller would.
    Wait { ms: u64 },
}

impl Scenario {
    /// Parse a scenario document.
    pub fn from_json_str(text: &str) -> Result<Self> {
        serde_json::from_str(text).context("invalid scenario")
    }

    pub fn load_from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read scenario {}", path.display()))?;
        Self::from_json_str(&text)
    }
}

/// Log store wrapper that can be told to fail its next appends.
#[derive(Debug)]
pub struct FaultyStore<L> {
    inner: L,
    pending_failures: Arc<Mutex<u32>>,
}

impl<L: LogStore> FaultyStore<L> {
    pub fn new(inner: L) -> Self {
        Self {
            inner,
            pending_failures: Arc::new(Mutex::new(0)),
        }
    }

    pub fn inner(&self) -> &L {
        &self.inner
    }

    fn failures(&self) -> Arc<Mutex<u32>> {
        Arc::clone(&self.pending_failures)
    }
}

impl<L: LogStore> LogStore for FaultyStore<L> {
    async fn append(&mut self, record: &ConsumptionRecord) -> StorageResult<LogEntry> {
        {
            let mut pending = self
                .pending_failures
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if *pending > 0 {
                *pending -= 1;
                return Err(StorageError::WriteFailed("injected write failure".to_string()));
            }
        }
        self.inner.append(record).await
    }

    async fn read(&self, date: NaiveDate) -> StorageResult<DailyLog> {
        self.inner.read(date).await
    }
}

/// A controller event with the simulated time it happened at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimedEvent {
    pub at: NaiveDateTime,

    #[serde(flatten)]
    pub event: ControllerEvent,
}

impl fmt::Display for TimedEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}  {}", self.at.format("%H:%M:%S%.3f"), self.event)
    }
}

/// Controller type driven by a [`Simulation`].
pub type SimController<L> = Controller<
    MockRfid,
    MockCamera,
    MockEstimator,
    MockDisplay,
    MockSwitch,
    FaultyStore<L>,
    ManualClock,
>;

/// Controller on mock devices, driven by [`Step`]s.
pub struct Simulation<L: LogStore> {
    controller: SimController<L>,
    clock: ManualClock,
    readers: BTreeMap<CompartmentId, MockRfidHandle>,
    camera: MockCameraHandle,
    estimator: MockEstimatorHandle,
    display: MockDisplayHandle,
    switch: MockSwitchHandle,
    store_failures: Arc<Mutex<u32>>,
    poll_interval: Duration,
}

impl<L: LogStore> Simulation<L> {
    /// Wire a controller for `config` to fresh mocks, starting at `start`.
    pub fn new(config: &ControllerConfig, store: L, start: NaiveDateTime) -> Result<Self> {
        let clock = ManualClock::new(start);

        let mut readers = Vec::new();
        let mut reader_handles = BTreeMap::new();
        for compartment in config.compartments()? {
            let (reader, handle) = MockRfid::with_name(format!("Drawer {}", compartment.id));
            readers.push((compartment.id, reader));
            reader_handles.insert(compartment.id, handle);
        }

        let (camera, camera_handle) = MockCamera::new();
        let (estimator, estimator_handle) = MockEstimator::new();
        let (display, display_handle) = MockDisplay::new();
        let (switch, switch_handle) = MockSwitch::new();

        let store = FaultyStore::new(store);
        let store_failures = store.failures();

        let controller = Controller::new(
            config,
            Peripherals {
                readers,
                camera,
                estimator,
                display,
                switch,
            },
            store,
            clock.clone(),
        )?;

        Ok(Self {
            controller,
            clock,
            readers: reader_handles,
            camera: camera_handle,
            estimator: estimator_handle,
            display: display_handle,
            switch: switch_handle,
            store_failures,
            poll_interval: config.poll_interval(),
        })
    }

    /// Seed each compartment's estimator count with its configured count.
    pub fn with_initial_counts(self) -> Self {
        for compartment in self.controller.compartments() {
            if let Some(count) = compartment.last_count {
                self.estimator.set_count(compartment.id, count);
            }
        }
        self
    }

    pub fn with_archive(mut self, archive: FrameArchive) -> Self {
        self.controller = self.controller.with_archive(archive);
        self
    }

    pub fn store(&self) -> &L {
        self.controller.store().inner()
    }

    pub fn controller(&self) -> &SimController<L> {
        &self.controller
    }

    pub fn display(&self) -> &MockDisplayHandle {
        &self.display
    }

    /// Run every step of `scenario` in order.
    pub async fn run(&mut self, scenario: &Scenario) -> Result<Vec<TimedEvent>> {
        let mut events = Vec::new();
        for (index, step) in scenario.steps.iter().enumerate() {
            let produced = self
                .apply(step)
                .await
                .with_context(|| format!("step {} ({step:?})", index + 1))?;
            events.extend(produced);
        }
        Ok(events)
    }

    /// Apply one step; only `wait` produces events.
    pub async fn apply(&mut self, step: &Step) -> Result<Vec<TimedEvent>> {
        debug!(?step, "applying step");

        match step {
            Step::Present { compartment, tag } => {
                let tag = TagId::new(tag)?;
                self.reader(*compartment)?.place_tag(tag);
            }
            Step::Remove { compartment } => self.reader(*compartment)?.remove_tag(),
            Step::SetCount { compartment, count } => {
                self.estimator.set_count(configured(*compartment)?, *count);
            }
            Step::ClearCount { compartment } => {
                self.estimator.clear_count(configured(*compartment)?);
            }
            Step::FailReader { compartment, times } => self.reader(*compartment)?.fail_next(*times),
            Step::FailCapture { times } => self.camera.fail_next(*times),
            Step::FailEstimate { times } => self.estimator.fail_next(*times),
            Step::FailStore { times } => {
                *self
                    .store_failures
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner) += *times;
            }
            Step::FailDisplay { times } => self.display.fail_next(*times),
            Step::FailSwitch { times } => self.switch.fail_next(*times),
            Step::Switch { on } => self.switch.set(*on),
            Step::Wait { ms } => return self.wait(Duration::from_millis(*ms)).await,
        }

        Ok(Vec::new())
    }

    /// Advance time by `duration`, ticking once per poll interval.
    ///
    /// A zero wait ticks once without moving the clock.
    pub async fn wait(&mut self, duration: Duration) -> Result<Vec<TimedEvent>> {
        let mut events = Vec::new();
        let mut remaining = duration;

        loop {
            let step = remaining.min(self.poll_interval);
            self.clock.advance(step);
            remaining -= step;

            let at = self.clock.local_now();
            events.extend(
                self.controller
                    .tick()
                    .await?
                    .into_iter()
                    .map(|event| TimedEvent { at, event }),
            );

            if remaining.is_zero() {
                return Ok(events);
            }
        }
    }

    fn reader(&self, compartment: u8) -> Result<&MockRfidHandle> {
        let id = configured(compartment)?;
        match self.readers.get(&id) {
            Some(reader) => Ok(reader),
            None => bail!("compartment {compartment} is not configured"),
        }
    }
}

fn configured(compartment: u8) -> Result<CompartmentId> {
    Ok(CompartmentId::new(compartment)?)
}

/// Start time of `scenario`, defaulting to now.
pub fn start_time(scenario: &Scenario) -> NaiveDateTime {
    scenario
        .start
        .unwrap_or_else(|| Local::now().naive_local())
}
