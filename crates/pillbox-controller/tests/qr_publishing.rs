//! QR switch handling and payload updates through the controller.

mod common;

use std::time::Duration;

use common::{AUTHORIZED, Rig, id, tag};
use pillbox_controller::ControllerEvent;
use pillbox_hardware::mock::DisplayOp;

fn qr_events(events: &[ControllerEvent]) -> Vec<&ControllerEvent> {
    events
        .iter()
        .filter(|e| {
            matches!(
                e,
                ControllerEvent::QrRendered { .. } | ControllerEvent::QrCleared
            )
        })
        .collect()
}

#[tokio::test]
async fn test_switch_on_shows_logged_consumption() {
    let (mut rig, _store) = Rig::new();
    rig.devices.estimator.set_count(id(2), 8);
    rig.drawer_cycle(2, AUTHORIZED).await;
    assert_eq!(rig.devices.display.qr_render_count(), 0);

    rig.devices.switch.set(true);
    let events = rig.tick_after(Duration::from_millis(100)).await;

    assert_eq!(
        events,
        vec![
            ControllerEvent::SwitchChanged { on: true },
            ControllerEvent::QrRendered {
                bytes: 36,
                entries: 1,
            },
        ]
    );
    assert_eq!(
        rig.devices.display.current_qr().as_deref(),
        Some("2025-03-14\n09:00 AM|C2|Paracetamol|2")
    );
}

#[tokio::test]
async fn test_new_entry_rerenders_while_on() {
    let (mut rig, _store) = Rig::new();
    rig.devices.switch.set(true);
    rig.tick().await;
    assert_eq!(rig.devices.display.current_qr().as_deref(), Some("2025-03-14"));

    rig.devices.estimator.set_count(id(4), 4);
    rig.drawer_cycle(4, AUTHORIZED).await;

    // The scan message held the display; the settle tick re-rendered.
    let qr = rig.devices.display.current_qr().unwrap();
    assert!(qr.ends_with("|C4|Cetirizine|2"), "unexpected payload {qr:?}");

    // Nothing changed: no further renders.
    let renders = rig.devices.display.qr_render_count();
    rig.tick_after(Duration::from_millis(100)).await;
    assert_eq!(rig.devices.display.qr_render_count(), renders);
}

#[tokio::test]
async fn test_switch_off_clears_within_one_tick() {
    let (mut rig, _store) = Rig::new();
    rig.devices.switch.set(true);
    rig.tick().await;

    rig.devices.switch.set(false);
    let events = rig.tick_after(Duration::from_millis(100)).await;
    assert_eq!(
        events,
        vec![
            ControllerEvent::SwitchChanged { on: false },
            ControllerEvent::QrCleared,
        ]
    );
    assert_eq!(rig.devices.display.current_qr(), None);

    rig.devices.display.clear_ops();
    rig.devices.estimator.set_count(id(2), 9);
    rig.drawer_cycle(2, AUTHORIZED).await;
    rig.tick_after(Duration::from_secs(3)).await;

    assert!(
        rig.devices
            .display
            .ops()
            .iter()
            .all(|op| matches!(op, DisplayOp::Message { .. }))
    );
}

#[tokio::test]
async fn test_scan_message_is_not_overwritten() {
    let (mut rig, _store) = Rig::new();
    rig.devices.switch.set(true);
    rig.tick().await;

    rig.devices.reader(1).place_tag(tag("CAFE"));
    let scanned = rig.tick_after(Duration::from_millis(100)).await;
    assert!(qr_events(&scanned).is_empty());
    assert_eq!(
        rig.devices.display.ops().last(),
        Some(&DisplayOp::Message {
            text: "UNAUTHORIZED".to_string(),
            duration: Duration::from_secs(2),
        })
    );

    let held = rig.tick_after(Duration::from_secs(1)).await;
    assert!(qr_events(&held).is_empty());

    let back = rig.tick_after(Duration::from_secs(1)).await;
    assert_eq!(qr_events(&back).len(), 1);
    assert!(rig.devices.display.current_qr().is_some());
}

#[tokio::test]
async fn test_switch_fault_keeps_last_state() {
    let (mut rig, _store) = Rig::new();
    rig.devices.switch.set(true);
    rig.tick().await;

    rig.devices.switch.fail_next(1);
    rig.devices.switch.set(false);
    let events = rig.tick_after(Duration::from_millis(100)).await;

    assert!(matches!(
        events.as_slice(),
        [ControllerEvent::SwitchFault { .. }]
    ));
    assert!(rig.controller.is_switch_on());
    assert!(rig.devices.display.current_qr().is_some());

    let events = rig.tick_after(Duration::from_millis(100)).await;
    assert!(events.contains(&ControllerEvent::QrCleared));
}

#[tokio::test]
async fn test_display_failure_retries_render() {
    let (mut rig, _store) = Rig::new();
    rig.devices.display.fail_next(1);
    rig.devices.switch.set(true);

    let first = rig.tick().await;
    assert_eq!(first, vec![ControllerEvent::SwitchChanged { on: true }]);

    let second = rig.tick_after(Duration::from_millis(100)).await;
    assert_eq!(qr_events(&second).len(), 1);
}

#[tokio::test]
async fn test_day_rollover_rerenders_empty_day() {
    let (mut rig, _store) = Rig::new();
    rig.devices.estimator.set_count(id(2), 8);
    rig.drawer_cycle(2, AUTHORIZED).await;
    rig.devices.switch.set(true);
    rig.tick().await;

    let tomorrow = common::day().succ_opt().unwrap();
    rig.clock.set_local(tomorrow.and_hms_opt(0, 0, 0).unwrap());
    rig.tick().await;

    assert_eq!(rig.devices.display.current_qr().as_deref(), Some("2025-03-15"));
}
