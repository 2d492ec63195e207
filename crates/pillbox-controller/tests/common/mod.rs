//! Common test utilities for controller integration tests.
//!
//! [`Rig`] wires a controller to mock devices, a shared in-memory store and a
//! manual clock, and keeps every handle so a test can script a drawer cycle
//! step by step.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{NaiveDate, NaiveDateTime};
use pillbox_controller::{Controller, ControllerConfig, ControllerEvent, ManualClock, Peripherals};
use pillbox_core::{CompartmentId, TagId};
use pillbox_hardware::mock::{
    MockCamera, MockCameraHandle, MockDisplay, MockDisplayHandle, MockEstimator,
    MockEstimatorHandle, MockRfid, MockRfidHandle, MockSwitch, MockSwitchHandle,
};
use pillbox_storage::{LogStore, MemoryLogStore};

pub const AUTHORIZED: &str = "1047839255856";

pub const CONFIG: &str = r#"
log_dir = "unused"

[access]
authorized_tags = ["1047839255856"]

[[compartments]]
index = 1
medicine = "Ibuprofen"

[[compartments]]
index = 2
medicine = "Paracetamol"
initial_count = 10

[[compartments]]
index = 3
medicine = "Vitamin D"
initial_count = 30

[[compartments]]
index = 4
medicine = "Cetirizine"
initial_count = 6
"#;

pub type TestController<L = MemoryLogStore> =
    Controller<MockRfid, MockCamera, MockEstimator, MockDisplay, MockSwitch, L, ManualClock>;

pub fn id(n: u8) -> CompartmentId {
    CompartmentId::new(n).unwrap()
}

pub fn tag(value: &str) -> TagId {
    TagId::new(value).unwrap()
}

pub fn start_time() -> NaiveDateTime {
    day().and_hms_opt(9, 0, 0).unwrap()
}

pub fn day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, 14).unwrap()
}

/// Handles of every mock wired into a controller.
pub struct Devices {
    pub readers: BTreeMap<u8, MockRfidHandle>,
    pub camera: MockCameraHandle,
    pub estimator: MockEstimatorHandle,
    pub display: MockDisplayHandle,
    pub switch: MockSwitchHandle,
}

impl Devices {
    pub fn reader(&self, compartment: u8) -> &MockRfidHandle {
        &self.readers[&compartment]
    }
}

/// Build mock peripherals for every compartment of `config`.
pub fn peripherals(
    config: &ControllerConfig,
) -> (
    Peripherals<MockRfid, MockCamera, MockEstimator, MockDisplay, MockSwitch>,
    Devices,
) {
    let mut readers = Vec::new();
    let mut reader_handles = BTreeMap::new();
    for compartment in &config.compartments {
        let (reader, handle) = MockRfid::with_name(format!("Drawer {}", compartment.index));
        readers.push((id(compartment.index), reader));
        reader_handles.insert(compartment.index, handle);
    }

    let (camera, camera_handle) = MockCamera::new();
    let (estimator, estimator_handle) = MockEstimator::new();
    let (display, display_handle) = MockDisplay::new();
    let (switch, switch_handle) = MockSwitch::new();

    (
        Peripherals {
            readers,
            camera,
            estimator,
            display,
            switch,
        },
        Devices {
            readers: reader_handles,
            camera: camera_handle,
            estimator: estimator_handle,
            display: display_handle,
            switch: switch_handle,
        },
    )
}

/// A controller on mocks with a manual clock.
pub struct Rig<L: LogStore = MemoryLogStore> {
    pub controller: TestController<L>,
    pub devices: Devices,
    pub clock: ManualClock,
}

impl Rig<MemoryLogStore> {
    /// Rig over [`CONFIG`] with an in-memory store; returns a store clone
    /// for inspection.
    pub fn new() -> (Self, MemoryLogStore) {
        let store = MemoryLogStore::new();
        let config = ControllerConfig::from_toml_str(CONFIG).unwrap();
        (Self::with_store(&config, store.clone()), store)
    }
}

impl<L: LogStore> Rig<L> {
    pub fn with_store(config: &ControllerConfig, store: L) -> Self {
        let clock = ManualClock::new(start_time());
        let (peripherals, devices) = peripherals(config);
        let controller = Controller::new(config, peripherals, store, clock.clone()).unwrap();

        Self {
            controller,
            devices,
            clock,
        }
    }

    pub async fn tick(&mut self) -> Vec<ControllerEvent> {
        self.controller.tick().await.unwrap()
    }

    /// Advance the clock by `step`, then tick.
    pub async fn tick_after(&mut self, step: Duration) -> Vec<ControllerEvent> {
        self.clock.advance(step);
        self.tick().await
    }

    /// Open drawer `compartment` with `tag_id`, close it and let it settle.
    ///
    /// Returns the events of the tick on which the settle timer expired.
    pub async fn drawer_cycle(&mut self, compartment: u8, tag_id: &str) -> Vec<ControllerEvent> {
        self.devices.reader(compartment).place_tag(tag(tag_id));
        self.tick_after(Duration::from_millis(100)).await;

        self.devices.reader(compartment).remove_tag();
        self.tick_after(Duration::from_millis(100)).await;

        self.tick_after(Duration::from_secs(5)).await
    }
}

/// The single `Logged` event in `events`.
pub fn logged(events: &[ControllerEvent]) -> &ControllerEvent {
    let logged: Vec<&ControllerEvent> = events
        .iter()
        .filter(|e| matches!(e, ControllerEvent::Logged { .. }))
        .collect();
    assert_eq!(logged.len(), 1, "expected one Logged event in {events:?}");
    logged[0]
}
