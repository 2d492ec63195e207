//! Implementations of the `pillbox` subcommands.
//!
//! Each command returns its output instead of printing it.

use std::fmt::Write as _;
use std::path::Path;

use anyhow::{Context, Result, bail};
use chrono::{Local, NaiveDate};
use pillbox_controller::{Controller, ControllerConfig, ControllerEvent, Peripherals, SystemClock, qr};
use pillbox_hardware::mock::{MockCamera, MockDisplay, MockEstimator, MockRfid, MockSwitch};
use pillbox_storage::{FrameArchive, JsonLogStore, LogStore, MemoryLogStore};
use tracing::info;

use crate::scenario::{Scenario, Simulation, TimedEvent, start_time};

async fn open_logs(log_dir: &Path) -> Result<JsonLogStore> {
    if !log_dir.is_dir() {
        bail!("log directory {} does not exist", log_dir.display());
    }
    Ok(JsonLogStore::open(log_dir).await?)
}

fn day_or_today(date: Option<NaiveDate>) -> NaiveDate {
    date.unwrap_or_else(|| Local::now().date_naive())
}

/// Pretty-printed JSON of one day's log.
pub async fn show(log_dir: &Path, date: Option<NaiveDate>) -> Result<String> {
    let store = open_logs(log_dir).await?;
    let log = store.read(day_or_today(date)).await?;
    Ok(serde_json::to_string_pretty(&log)?)
}

/// QR payload of one day's log.
pub async fn qr_payload(log_dir: &Path, date: Option<NaiveDate>, max_len: usize) -> Result<String> {
    if max_len == 0 {
        bail!("--max-len must be positive");
    }
    let store = open_logs(log_dir).await?;
    let log = store.read(day_or_today(date)).await?;
    Ok(qr::render(&log, max_len))
}

/// Days that have a log file, oldest first.
pub async fn dates(log_dir: &Path) -> Result<Vec<NaiveDate>> {
    let store = open_logs(log_dir).await?;
    Ok(store.dates().await?)
}

/// Summary of a valid configuration file.
pub fn check_config(path: &Path) -> Result<String> {
    let config = ControllerConfig::load_from_file(path)
        .with_context(|| format!("{} is not a valid configuration", path.display()))?;

    let mut summary = String::new();
    writeln!(summary, "log_dir: {}", config.log_dir.display())?;
    if let Some(capture_dir) = &config.capture_dir {
        writeln!(summary, "capture_dir: {}", capture_dir.display())?;
    }
    writeln!(
        summary,
        "timing: poll {} ms, settle {} ms, message {} ms",
        config.poll_interval_ms, config.settle_delay_ms, config.message_duration_ms
    )?;
    writeln!(summary, "authorized tags: {}", config.access.authorized_tags.len())?;
    for compartment in config.compartments()? {
        let count = compartment
            .last_count
            .map_or_else(|| "unknown".to_string(), |c| c.to_string());
        writeln!(
            summary,
            "compartment {}: {} ({count})",
            compartment.id, compartment.medicine
        )?;
    }
    Ok(summary)
}

/// Run the polling loop on the wall clock until `shutdown` completes.
///
/// No device drivers ship yet, so the drawers, camera, estimator, display
/// and switch are idle mocks. Returns the number of events seen.
pub async fn run<F, H>(config_path: &Path, shutdown: F, mut on_event: H) -> Result<usize>
where
    F: Future<Output = ()>,
    H: FnMut(&ControllerEvent),
{
    let config = ControllerConfig::load_from_file(config_path)?;
    let store = JsonLogStore::open(&config.log_dir)
        .await
        .with_context(|| format!("cannot open log directory {}", config.log_dir.display()))?;

    let readers = config
        .compartments()?
        .into_iter()
        .map(|compartment| {
            let (reader, _) = MockRfid::with_name(format!("Drawer {}", compartment.id));
            (compartment.id, reader)
        })
        .collect();
    let peripherals = Peripherals {
        readers,
        camera: MockCamera::new().0,
        estimator: MockEstimator::new().0,
        display: MockDisplay::new().0,
        switch: MockSwitch::new().0,
    };

    let mut controller = Controller::new(&config, peripherals, store, SystemClock)?;
    if let Some(capture_dir) = &config.capture_dir {
        controller = controller.with_archive(FrameArchive::open(capture_dir).await?);
    }

    let mut seen = 0;
    controller
        .run_until(shutdown, |event| {
            seen += 1;
            on_event(event);
        })
        .await?;

    info!(events = seen, "controller stopped");
    Ok(seen)
}

/// Run a scenario against mock devices.
///
/// Entries go to the configured log directory unless `in_memory` is set.
pub async fn simulate(config_path: &Path, scenario_path: &Path, in_memory: bool) -> Result<Vec<TimedEvent>> {
    let config = ControllerConfig::load_from_file(config_path)?;
    let scenario = Scenario::load_from_file(scenario_path)?;
    let start = start_time(&scenario);

    info!(
        steps = scenario.steps.len(),
        start = %start,
        in_memory,
        "running scenario"
    );

    if in_memory {
        let mut simulation =
            Simulation::new(&config, MemoryLogStore::new(), start)?.with_initial_counts();
        return simulation.run(&scenario).await;
    }

    let store = JsonLogStore::open(&config.log_dir)
        .await
        .with_context(|| format!("cannot open log directory {}", config.log_dir.display()))?;
    let mut simulation = Simulation::new(&config, store, start)?.with_initial_counts();
    if let Some(capture_dir) = &config.capture_dir {
        simulation = simulation.with_archive(FrameArchive::open(capture_dir).await?);
    }
    simulation.run(&scenario).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::io::Write;
    use std::time::Duration;
    use tempfile::{NamedTempFile, TempDir};

    #[tokio::test]
    async fn test_show_missing_dir_fails() {
        let result = show(Path::new("/nonexistent/pillbox"), None).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_show_empty_day() {
        let tmp = TempDir::new().unwrap();
        let date = NaiveDate::from_ymd_opt(2025, 3, 14).unwrap();

        let text = show(tmp.path(), Some(date)).await.unwrap();
        let json: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(json, serde_json::json!({"date": "2025-03-14", "log": []}));
    }

    #[tokio::test]
    async fn test_qr_rejects_zero_bound() {
        let tmp = TempDir::new().unwrap();
        assert!(qr_payload(tmp.path(), None, 0).await.is_err());
    }

    #[test]
    fn test_check_config_summary() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(
            br#"
log_dir = "logs"

[access]
authorized_tags = ["1047839255856"]

[[compartments]]
index = 2
medicine = "Paracetamol"
initial_count = 10
"#,
        )
        .unwrap();

        let summary = check_config(file.path()).unwrap();
        assert!(summary.contains("authorized tags: 1"));
        assert!(summary.contains("compartment 2: Paracetamol (10)"));
        assert!(summary.contains("settle 5000 ms"));
    }

    #[rstest]
    #[case::no_compartments("log_dir = \"logs\"\ncompartments = []\n", "1-4 compartments")]
    #[case::malformed("log_dir = ", "Cannot parse configuration")]
    #[case::bad_tag(
        "log_dir = \"logs\"\n[access]\nauthorized_tags = [\"not a tag\"]\n[[compartments]]\nindex = 1\nmedicine = \"A\"\n",
        "authorized tag"
    )]
    fn test_check_config_rejects_invalid(#[case] text: &str, #[case] reason: &str) {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(text.as_bytes()).unwrap();

        let message = format!("{:#}", check_config(file.path()).unwrap_err());
        assert!(message.contains("is not a valid configuration"), "{message}");
        assert!(message.contains(reason), "{message}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_stops_on_shutdown() {
        let tmp = TempDir::new().unwrap();
        let logs = tmp.path().join("logs");
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            "log_dir = \"{}\"\n[[compartments]]\nindex = 1\nmedicine = \"Ibuprofen\"\n",
            logs.display()
        )
        .unwrap();

        let mut events = Vec::new();
        let seen = run(
            file.path(),
            tokio::time::sleep(Duration::from_millis(350)),
            |event| events.push(event.clone()),
        )
        .await
        .unwrap();

        // Idle drawers and an off switch produce nothing.
        assert_eq!(seen, 0);
        assert!(events.is_empty());
        assert!(logs.is_dir());
    }

    #[tokio::test]
    async fn test_run_rejects_missing_config() {
        let result = run(Path::new("/nonexistent/pillbox.toml"), async {}, |_| {}).await;
        assert!(result.is_err());
    }
}
